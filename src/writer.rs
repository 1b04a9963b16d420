//! Archive writer.
//!
//! Payloads are encoded (serialized, compressed, checksummed) as they are
//! added and buffered in insertion order.  [`Writer::finish`] emits the
//! archive header carrying the final payload count, then every block.  The
//! sink therefore needs only [`Write`], never [`Seek`](std::io::Seek).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::codec::Compression;
use crate::error::{Error, FormatError, Result};
use crate::header::{ArchiveHeader, FileType, MAX_FORMAT_VERSION};
use crate::payload::{encode_payload, write_payload, Payload};

/// Default Zstd compression level.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Configuration for [`Writer::with_options`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WriterOptions {
    pub format_version: u32,
    pub file_type:      FileType,
    /// Applied to every payload not given an explicit compression.
    pub compression:    Compression,
    pub level:          i32,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            format_version: MAX_FORMAT_VERSION,
            file_type:      FileType::Binary,
            compression:    Compression::Zstd,
            level:          DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl WriterOptions {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

pub struct Writer<W: Write> {
    writer:  W,
    header:  ArchiveHeader,
    options: WriterOptions,
    blocks:  Vec<u8>,
}

impl Writer<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P, options: WriterOptions) -> Result<Self> {
        let file = File::create(path.as_ref()).map_err(Error::Write)?;
        Ok(Self::with_options(BufWriter::new(file), options))
    }
}

impl<W: Write> Writer<W> {
    pub fn new(writer: W) -> Self {
        Self::with_options(writer, WriterOptions::default())
    }

    pub fn with_options(writer: W, options: WriterOptions) -> Self {
        let header = ArchiveHeader::new(options.format_version).with_file_type(options.file_type);
        Self { writer, header, options, blocks: Vec::new() }
    }

    pub fn num_payloads(&self) -> u16 {
        self.header.num_payloads
    }

    /// Append a payload using the configured compression.
    pub fn add_payload(&mut self, payload: &Payload) -> Result<()> {
        self.add_payload_with(payload, self.options.compression)
    }

    /// Append a payload with an explicit compression for this block only.
    pub fn add_payload_with(&mut self, payload: &Payload, compression: Compression) -> Result<()> {
        let count = self
            .header
            .num_payloads
            .checked_add(1)
            .ok_or(FormatError::TooManyPayloads)?;
        let (header, stored) = encode_payload(payload, compression, self.options.level)?;
        write_payload(&mut self.blocks, &header, &stored)?;
        self.header.num_payloads = count;
        Ok(())
    }

    /// Emit the header and every buffered block, returning the sink.
    pub fn finish(mut self) -> Result<W> {
        self.header.validate()?;
        self.header.encode(&mut self.writer)?;
        self.writer.write_all(&self.blocks).map_err(Error::Write)?;
        self.writer.flush().map_err(Error::Write)?;
        debug!(
            "wrote {} archive: {} payload(s), {} bytes",
            self.header.file_type.name(),
            self.header.num_payloads,
            crate::header::HEADER_SIZE + self.blocks.len()
        );
        Ok(self.writer)
    }
}

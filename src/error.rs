//! Error taxonomy shared by the reader and writer.
//!
//! Every variant is fatal for the archive being processed: there is no
//! field-level salvage and no retry.  [`FormatError`] names the exact
//! invariant that failed so callers can tell corruption apart from a valid
//! archive written by a newer tool.

use std::io::{self, Read};
use thiserror::Error;

use crate::codec::CodecError;
use crate::payload::PayloadKind;

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("Invalid magic number {0:#010x}")]
    InvalidMagic(u32),
    #[error("Header integrity check is corrupted")]
    CorruptIntegrityCheck,
    #[error("Unknown archive file type")]
    UnknownFileType,
    #[error("Unsupported format version {found} (highest supported is {max})")]
    UnsupportedVersion { found: u32, max: u32 },
    #[error("Truncated input: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },
    #[error("Unknown payload kind {0}")]
    UnknownPayloadKind(u8),
    #[error("Unknown compression kind {0}")]
    UnknownCompression(u8),
    #[error("Unsupported {kind} payload version {found} (highest supported is {max})")]
    UnsupportedPayloadVersion { kind: PayloadKind, found: u16, max: u16 },
    #[error("{kind} payload expanded to {actual} bytes, header declares {declared}")]
    PlainSizeMismatch { kind: PayloadKind, declared: u64, actual: u64 },
    #[error("{kind} payload declares {declared} records, body holds {actual}")]
    RecordCountMismatch { kind: PayloadKind, declared: u32, actual: u32 },
    #[error("Malformed record: {0}")]
    InvalidRecord(String),
    #[error("Archive cannot hold more than {} payloads", u16::MAX)]
    TooManyPayloads,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Format error: {0}")]
    Format(#[from] FormatError),
    #[error("Checksum mismatch in {kind} payload: expected {expected}, computed {actual}")]
    Integrity { kind: PayloadKind, expected: String, actual: String },
    #[error("Write error: {0}")]
    Write(#[source] io::Error),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("IO error: {0}")]
    Io(io::Error),
}

impl Error {
    pub fn is_format(&self) -> bool {
        matches!(self, Error::Format(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Fill `buf` completely; running out of input is [`FormatError::Truncated`].
pub(crate) fn read_exact<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(FormatError::Truncated { needed: buf.len(), available: filled }.into());
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(())
}

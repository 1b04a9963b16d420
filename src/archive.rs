//! High-level [`Archive`] value: one header plus its ordered payloads.
//!
//! ```no_run
//! use stone::archive::Archive;
//! use stone::payload::{MetaRecord, MetaTag, Payload};
//! use stone::writer::WriterOptions;
//!
//! let mut archive = Archive::default();
//! archive.push(Payload::Meta(vec![MetaRecord::string(MetaTag::Name, "nano")]));
//! archive.save("nano.stone", WriterOptions::default())?;
//!
//! let archive = Archive::open("nano.stone")?;
//! assert_eq!(archive.meta().count(), 1);
//! # Ok::<(), stone::Error>(())
//! ```

use std::io::{Read, Write};
use std::path::Path;

use crate::error::Result;
use crate::header::{ArchiveHeader, FileType, MAX_FORMAT_VERSION};
use crate::payload::{AttributeRecord, IndexRecord, LayoutRecord, MetaRecord, Payload, PayloadKind};
use crate::reader::Reader;
use crate::writer::{Writer, WriterOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub header:   ArchiveHeader,
    pub payloads: Vec<Payload>,
}

impl Default for Archive {
    fn default() -> Self {
        Self::new(FileType::Binary)
    }
}

impl Archive {
    pub fn new(file_type: FileType) -> Self {
        Self {
            header:   ArchiveHeader::new(MAX_FORMAT_VERSION).with_file_type(file_type),
            payloads: Vec::new(),
        }
    }

    // ── Decode ───────────────────────────────────────────────────────────────

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Reader::new(reader)?.read_all()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_reader(bytes)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Reader::open(path)?.read_all()
    }

    // ── Encode ───────────────────────────────────────────────────────────────

    /// Append a payload; order is preserved on write.  `header.num_payloads`
    /// follows the payload list and saturates at `u16::MAX`; writing more
    /// than that fails with [`FormatError::TooManyPayloads`].
    ///
    /// [`FormatError::TooManyPayloads`]: crate::FormatError::TooManyPayloads
    pub fn push(&mut self, payload: Payload) {
        self.payloads.push(payload);
        self.header.num_payloads = u16::try_from(self.payloads.len()).unwrap_or(u16::MAX);
    }

    /// Write this archive.  File type and format version come from
    /// `self.header`; compression policy from `options`.
    pub fn write_to<W: Write>(&self, writer: W, options: WriterOptions) -> Result<W> {
        let options = WriterOptions {
            file_type:      self.header.file_type,
            format_version: self.header.format_version,
            ..options
        };
        let mut out = Writer::with_options(writer, options);
        for payload in &self.payloads {
            out.add_payload(payload)?;
        }
        out.finish()
    }

    pub fn to_bytes(&self, options: WriterOptions) -> Result<Vec<u8>> {
        self.write_to(Vec::new(), options)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P, options: WriterOptions) -> Result<()> {
        let file = std::fs::File::create(path.as_ref()).map_err(crate::Error::Write)?;
        self.write_to(std::io::BufWriter::new(file), options)?;
        Ok(())
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn payloads_of(&self, kind: PayloadKind) -> impl Iterator<Item = &Payload> {
        self.payloads.iter().filter(move |p| p.kind() == kind)
    }

    pub fn meta(&self) -> impl Iterator<Item = &MetaRecord> {
        self.payloads.iter().flat_map(|p| match p {
            Payload::Meta(r) => r.as_slice(),
            _ => &[][..],
        })
    }

    pub fn layouts(&self) -> impl Iterator<Item = &LayoutRecord> {
        self.payloads.iter().flat_map(|p| match p {
            Payload::Layout(r) => r.as_slice(),
            _ => &[][..],
        })
    }

    pub fn indices(&self) -> impl Iterator<Item = &IndexRecord> {
        self.payloads.iter().flat_map(|p| match p {
            Payload::Index(r) => r.as_slice(),
            _ => &[][..],
        })
    }

    pub fn attributes(&self) -> impl Iterator<Item = &AttributeRecord> {
        self.payloads.iter().flat_map(|p| match p {
            Payload::Attributes(r) => r.as_slice(),
            _ => &[][..],
        })
    }

    /// The first content payload, if any.
    pub fn content(&self) -> Option<&[u8]> {
        self.payloads.iter().find_map(|p| match p {
            Payload::Content(data) => Some(data.as_slice()),
            _ => None,
        })
    }

    /// Bytes addressed by an index record within the content payload.
    pub fn file_contents(&self, index: &IndexRecord) -> Option<&[u8]> {
        index.slice(self.content()?)
    }
}

//! Filesystem layout records.
//!
//! ```text
//! [uid u32][gid u32][mode u32][tag u32]
//! [source_len u16][target_len u16][file_type u8][reserved 11 B]
//! [source: source_len B][target: target_len B]
//! ```
//!
//! `source` depends on the file type: the 16-byte content digest for
//! regular files, the link destination for symlinks, empty otherwise.
//! `target` is the installed path.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use super::{read_string, record_err, Record};
use crate::error::FormatError;
use crate::path::{PathDefinition, PathKind};

const RESERVED: [u8; 11] = [0; 11];
const FIXED_SIZE: usize = 16 + 2 + 2 + 1 + RESERVED.len();
const DIGEST_SIZE: usize = 16;

const MODE_EXEC_BITS: u32 = 0o111;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LayoutEntry {
    /// Content digest, target path.
    Regular(u128, String),
    /// Link destination, target path.
    Symlink(String, String),
    Directory(String),
    CharacterDevice(String),
    BlockDevice(String),
    Fifo(String),
    Socket(String),
}

impl LayoutEntry {
    fn file_type(&self) -> u8 {
        match self {
            LayoutEntry::Regular(..)        => 1,
            LayoutEntry::Symlink(..)        => 2,
            LayoutEntry::Directory(_)       => 3,
            LayoutEntry::CharacterDevice(_) => 4,
            LayoutEntry::BlockDevice(_)     => 5,
            LayoutEntry::Fifo(_)            => 6,
            LayoutEntry::Socket(_)          => 7,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            LayoutEntry::Regular(_, t)
            | LayoutEntry::Symlink(_, t)
            | LayoutEntry::Directory(t)
            | LayoutEntry::CharacterDevice(t)
            | LayoutEntry::BlockDevice(t)
            | LayoutEntry::Fifo(t)
            | LayoutEntry::Socket(t) => t,
        }
    }

    fn source_len(&self) -> usize {
        match self {
            LayoutEntry::Regular(..)     => DIGEST_SIZE,
            LayoutEntry::Symlink(s, _)   => s.len(),
            _                            => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LayoutRecord {
    pub uid:   u32,
    pub gid:   u32,
    pub mode:  u32,
    pub tag:   u32,
    pub entry: LayoutEntry,
}

impl LayoutRecord {
    /// Classify this entry for path-based policy.
    pub fn path_definition(&self) -> PathDefinition {
        let kind = match &self.entry {
            LayoutEntry::Symlink(..) => PathKind::Symlink,
            LayoutEntry::CharacterDevice(_)
            | LayoutEntry::BlockDevice(_)
            | LayoutEntry::Fifo(_)
            | LayoutEntry::Socket(_) => PathKind::Special,
            LayoutEntry::Regular(..) if self.mode & MODE_EXEC_BITS != 0 => PathKind::Exe,
            _ => PathKind::Any,
        };
        PathDefinition::new(self.entry.target(), kind)
    }
}

fn too_long(what: &str, len: usize) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, format!("layout {what} of {len} bytes exceeds u16"))
}

impl Record for LayoutRecord {
    fn decode<R: Read>(reader: &mut R) -> Result<Self, FormatError> {
        let uid  = reader.read_u32::<BigEndian>().map_err(record_err("layout uid"))?;
        let gid  = reader.read_u32::<BigEndian>().map_err(record_err("layout gid"))?;
        let mode = reader.read_u32::<BigEndian>().map_err(record_err("layout mode"))?;
        let tag  = reader.read_u32::<BigEndian>().map_err(record_err("layout tag"))?;
        let source_len = reader.read_u16::<BigEndian>().map_err(record_err("layout source length"))?;
        let target_len = reader.read_u16::<BigEndian>().map_err(record_err("layout target length"))?;
        let file_type  = reader.read_u8().map_err(record_err("layout file type"))?;
        let mut reserved = [0u8; RESERVED.len()];
        reader.read_exact(&mut reserved).map_err(record_err("layout padding"))?;

        let expect_source = |expected: usize| {
            if source_len as usize == expected {
                Ok(())
            } else {
                Err(FormatError::InvalidRecord(format!(
                    "layout file type {file_type} carries a {source_len}-byte source, expected {expected}"
                )))
            }
        };

        let entry = match file_type {
            1 => {
                expect_source(DIGEST_SIZE)?;
                let digest = reader.read_u128::<BigEndian>().map_err(record_err("layout digest"))?;
                LayoutEntry::Regular(digest, read_string(reader, target_len.into(), "layout target")?)
            }
            2 => {
                let source = read_string(reader, source_len.into(), "layout symlink source")?;
                LayoutEntry::Symlink(source, read_string(reader, target_len.into(), "layout target")?)
            }
            3..=7 => {
                expect_source(0)?;
                let target = read_string(reader, target_len.into(), "layout target")?;
                match file_type {
                    3 => LayoutEntry::Directory(target),
                    4 => LayoutEntry::CharacterDevice(target),
                    5 => LayoutEntry::BlockDevice(target),
                    6 => LayoutEntry::Fifo(target),
                    _ => LayoutEntry::Socket(target),
                }
            }
            other => {
                return Err(FormatError::InvalidRecord(format!("unknown layout file type {other}")));
            }
        };

        Ok(Self { uid, gid, mode, tag, entry })
    }

    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let target = self.entry.target();
        let source_len = u16::try_from(self.entry.source_len())
            .map_err(|_| too_long("source", self.entry.source_len()))?;
        let target_len = u16::try_from(target.len()).map_err(|_| too_long("target", target.len()))?;

        writer.write_u32::<BigEndian>(self.uid)?;
        writer.write_u32::<BigEndian>(self.gid)?;
        writer.write_u32::<BigEndian>(self.mode)?;
        writer.write_u32::<BigEndian>(self.tag)?;
        writer.write_u16::<BigEndian>(source_len)?;
        writer.write_u16::<BigEndian>(target_len)?;
        writer.write_u8(self.entry.file_type())?;
        writer.write_all(&RESERVED)?;
        match &self.entry {
            LayoutEntry::Regular(digest, _) => writer.write_u128::<BigEndian>(*digest)?,
            LayoutEntry::Symlink(source, _) => writer.write_all(source.as_bytes())?,
            _ => {}
        }
        writer.write_all(target.as_bytes())
    }

    fn size(&self) -> usize {
        FIXED_SIZE + self.entry.source_len() + self.entry.target().len()
    }
}

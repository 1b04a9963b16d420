use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use super::{record_err, Record};
use crate::error::FormatError;

/// Maps a content digest to the byte range it occupies in the content
/// payload.  `start..end` is half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexRecord {
    pub start:  u64,
    pub end:    u64,
    pub digest: u128,
}

impl IndexRecord {
    /// Zero for an inverted range, which never survives encode or decode.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slice this record's bytes out of a decoded content blob.
    pub fn slice<'a>(&self, content: &'a [u8]) -> Option<&'a [u8]> {
        content.get(usize::try_from(self.start).ok()?..usize::try_from(self.end).ok()?)
    }
}

impl Record for IndexRecord {
    fn decode<R: Read>(reader: &mut R) -> Result<Self, FormatError> {
        let start  = reader.read_u64::<BigEndian>().map_err(record_err("index start"))?;
        let end    = reader.read_u64::<BigEndian>().map_err(record_err("index end"))?;
        let digest = reader.read_u128::<BigEndian>().map_err(record_err("index digest"))?;
        if start > end {
            return Err(FormatError::InvalidRecord(format!("index range {start}..{end} is inverted")));
        }
        Ok(Self { start, end, digest })
    }

    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        if self.start > self.end {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("index range {}..{} is inverted", self.start, self.end),
            ));
        }
        writer.write_u64::<BigEndian>(self.start)?;
        writer.write_u64::<BigEndian>(self.end)?;
        writer.write_u128::<BigEndian>(self.digest)?;
        Ok(())
    }

    fn size(&self) -> usize {
        32
    }
}

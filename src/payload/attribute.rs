use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use super::{read_vec, record_err, Record};
use crate::error::FormatError;

/// Free-form key/value pair; neither side is interpreted here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeRecord {
    pub key:   Vec<u8>,
    pub value: Vec<u8>,
}

impl AttributeRecord {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

impl Record for AttributeRecord {
    fn decode<R: Read>(reader: &mut R) -> Result<Self, FormatError> {
        let key_len   = reader.read_u64::<BigEndian>().map_err(record_err("attribute key length"))?;
        let value_len = reader.read_u64::<BigEndian>().map_err(record_err("attribute value length"))?;
        let key   = read_vec(reader, key_len, "attribute key")?;
        let value = read_vec(reader, value_len, "attribute value")?;
        Ok(Self { key, value })
    }

    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u64::<BigEndian>(self.key.len() as u64)?;
        writer.write_u64::<BigEndian>(self.value.len() as u64)?;
        writer.write_all(&self.key)?;
        writer.write_all(&self.value)
    }

    fn size(&self) -> usize {
        16 + self.key.len() + self.value.len()
    }
}

//! Payload blocks: the per-block record header, the [`Record`] trait and
//! variant dispatch.
//!
//! # On-disk shape
//! ```text
//! [PayloadHeader: 32 B][stored body: stored_size B]
//!
//! offset size field
//!      0    8 stored_size    bytes following this header
//!      8    8 plain_size     body length after decompression
//!     16    8 checksum       XXH3-64 of the plain body, big-endian
//!     24    4 num_records
//!     28    2 version        per-kind payload version
//!     30    1 kind           PayloadKind
//!     31    1 compression    Compression
//! ```
//!
//! # Extension
//! A new payload type is a [`Record`] implementation, a [`PayloadKind`]
//! identifier and a [`Payload`] variant.  Identifiers are frozen once
//! released; readers reject every identifier they do not know rather than
//! skipping the block.

use std::io::{self, Cursor, Read, Write};

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use crate::codec::{get_codec, Compression};
use crate::endian::{self, Field};
use crate::error::{read_exact, Error, FormatError, Result};

pub mod attribute;
pub mod index;
pub mod layout;
pub mod meta;

pub use attribute::AttributeRecord;
pub use index::IndexRecord;
pub use layout::{LayoutEntry, LayoutRecord};
pub use meta::{Dependency, DependencyKind, MetaKind, MetaRecord, MetaTag, MetaValue};

pub const PAYLOAD_HEADER_SIZE: usize = 32;
/// Highest payload version this build reads and the one it writes.
pub const PAYLOAD_VERSION: u16 = 1;

const F_STORED_SIZE: Field = Field::new(0, 8);
const F_PLAIN_SIZE:  Field = Field::new(8, 8);
const CHECKSUM_OFFSET: usize = 16;
const F_NUM_RECORDS: Field = Field::new(24, 4);
const F_VERSION:     Field = Field::new(28, 2);
const KIND_OFFSET:        usize = 30;
const COMPRESSION_OFFSET: usize = 31;

const WIRE_FIELDS: &[Field] = &[F_STORED_SIZE, F_PLAIN_SIZE, F_NUM_RECORDS, F_VERSION];

const _: () = assert!(F_PLAIN_SIZE.offset + F_PLAIN_SIZE.width == CHECKSUM_OFFSET);
const _: () = assert!(CHECKSUM_OFFSET + 8 == F_NUM_RECORDS.offset);
const _: () = assert!(F_VERSION.offset + F_VERSION.width == KIND_OFFSET);
const _: () = assert!(COMPRESSION_OFFSET + 1 == PAYLOAD_HEADER_SIZE);

/// Digest guarding every payload body.
pub fn checksum(bytes: &[u8]) -> [u8; 8] {
    xxh3_64(bytes).to_be_bytes()
}

// ── PayloadKind ──────────────────────────────────────────────────────────────

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Meta       = 1,
    Content    = 2,
    Layout     = 3,
    Index      = 4,
    Attributes = 5,
}

const PAYLOAD_KINDS: &[(PayloadKind, &str)] = &[
    (PayloadKind::Meta,       "meta"),
    (PayloadKind::Content,    "content"),
    (PayloadKind::Layout,     "layout"),
    (PayloadKind::Index,      "index"),
    (PayloadKind::Attributes, "attributes"),
];

impl PayloadKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        PAYLOAD_KINDS.iter().map(|&(k, _)| k).find(|&k| k as u8 == v)
    }

    pub fn name(self) -> &'static str {
        PAYLOAD_KINDS
            .iter()
            .find(|&&(k, _)| k == self)
            .map_or("unknown", |&(_, n)| n)
    }
}

impl std::fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ── PayloadHeader ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    pub stored_size: u64,
    pub plain_size:  u64,
    pub checksum:    [u8; 8],
    pub num_records: u32,
    pub version:     u16,
    pub kind:        PayloadKind,
    pub compression: Compression,
}

impl PayloadHeader {
    pub fn encode_to_bytes(&self) -> [u8; PAYLOAD_HEADER_SIZE] {
        let mut image = [0u8; PAYLOAD_HEADER_SIZE];
        endian::put_u64(&mut image, F_STORED_SIZE, self.stored_size);
        endian::put_u64(&mut image, F_PLAIN_SIZE, self.plain_size);
        image[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 8].copy_from_slice(&self.checksum);
        endian::put_u32(&mut image, F_NUM_RECORDS, self.num_records);
        endian::put_u16(&mut image, F_VERSION, self.version);
        image[KIND_OFFSET] = self.kind as u8;
        image[COMPRESSION_OFFSET] = self.compression as u8;
        endian::to_wire_order(&mut image, WIRE_FIELDS);
        image
    }

    /// Decode and check the closed sets (kind, compression, version).
    pub fn decode(bytes: &[u8; PAYLOAD_HEADER_SIZE]) -> Result<Self, FormatError> {
        let mut image = *bytes;
        endian::to_host_order(&mut image, WIRE_FIELDS);

        let kind = PayloadKind::from_u8(image[KIND_OFFSET])
            .ok_or(FormatError::UnknownPayloadKind(image[KIND_OFFSET]))?;
        let compression = Compression::from_u8(image[COMPRESSION_OFFSET])
            .ok_or(FormatError::UnknownCompression(image[COMPRESSION_OFFSET]))?;
        let version = endian::get_u16(&image, F_VERSION);
        if version > PAYLOAD_VERSION {
            return Err(FormatError::UnsupportedPayloadVersion {
                kind,
                found: version,
                max: PAYLOAD_VERSION,
            });
        }

        let mut checksum = [0u8; 8];
        checksum.copy_from_slice(&image[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 8]);

        Ok(Self {
            stored_size: endian::get_u64(&image, F_STORED_SIZE),
            plain_size:  endian::get_u64(&image, F_PLAIN_SIZE),
            checksum,
            num_records: endian::get_u32(&image, F_NUM_RECORDS),
            version,
            kind,
            compression,
        })
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.encode_to_bytes()).map_err(Error::Write)
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut image = [0u8; PAYLOAD_HEADER_SIZE];
        read_exact(&mut reader, &mut image)?;
        Ok(Self::decode(&image)?)
    }
}

// ── Record trait ─────────────────────────────────────────────────────────────

/// One structured entry within a decompressed payload body.
pub trait Record: Sized {
    fn decode<R: Read>(reader: &mut R) -> Result<Self, FormatError>;
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()>;
    /// Encoded size in bytes.
    fn size(&self) -> usize;
}

/// Adapt a record-level read failure; running short is a malformed record.
pub(crate) fn record_err(what: &'static str) -> impl Fn(io::Error) -> FormatError {
    move |e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            FormatError::InvalidRecord(format!("truncated {what}"))
        } else {
            FormatError::InvalidRecord(format!("{what}: {e}"))
        }
    }
}

/// Read `len` bytes of a variable-length record field.
pub(crate) fn read_vec<R: Read>(reader: &mut R, len: u64, what: &'static str) -> Result<Vec<u8>, FormatError> {
    let mut buf = Vec::new();
    reader.take(len).read_to_end(&mut buf).map_err(record_err(what))?;
    if buf.len() as u64 != len {
        return Err(FormatError::InvalidRecord(format!("truncated {what}")));
    }
    Ok(buf)
}

pub(crate) fn read_string<R: Read>(reader: &mut R, len: u64, what: &'static str) -> Result<String, FormatError> {
    String::from_utf8(read_vec(reader, len, what)?)
        .map_err(|_| FormatError::InvalidRecord(format!("{what} is not valid UTF-8")))
}

fn decode_records<T: Record>(body: &[u8], num_records: u32) -> Result<Vec<T>, FormatError> {
    let mut cursor = Cursor::new(body);
    let mut records = Vec::new();
    for _ in 0..num_records {
        records.push(T::decode(&mut cursor)?);
    }
    let trailing = body.len() as u64 - cursor.position();
    if trailing != 0 {
        return Err(FormatError::InvalidRecord(format!(
            "{trailing} trailing bytes after {num_records} records"
        )));
    }
    Ok(records)
}

fn encode_records<T: Record>(records: &[T]) -> Result<Vec<u8>, FormatError> {
    let mut out = Vec::with_capacity(records.iter().map(Record::size).sum());
    for record in records {
        record
            .encode(&mut out)
            .map_err(|e| FormatError::InvalidRecord(e.to_string()))?;
    }
    Ok(out)
}

// ── Payload ──────────────────────────────────────────────────────────────────

/// A decoded payload: the ordered records of one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Meta(Vec<MetaRecord>),
    /// Opaque content store; index records address ranges within it.
    Content(Vec<u8>),
    Layout(Vec<LayoutRecord>),
    Index(Vec<IndexRecord>),
    Attributes(Vec<AttributeRecord>),
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Meta(_)       => PayloadKind::Meta,
            Payload::Content(_)    => PayloadKind::Content,
            Payload::Layout(_)     => PayloadKind::Layout,
            Payload::Index(_)      => PayloadKind::Index,
            Payload::Attributes(_) => PayloadKind::Attributes,
        }
    }

    pub fn num_records(&self) -> usize {
        match self {
            Payload::Meta(r)       => r.len(),
            Payload::Content(_)    => 1,
            Payload::Layout(r)     => r.len(),
            Payload::Index(r)      => r.len(),
            Payload::Attributes(r) => r.len(),
        }
    }

    /// Serialize the records into a plain (uncompressed) body.
    pub fn encode_body(&self) -> Result<Vec<u8>, FormatError> {
        match self {
            Payload::Meta(r)       => encode_records(r),
            Payload::Content(data) => Ok(data.clone()),
            Payload::Layout(r)     => encode_records(r),
            Payload::Index(r)      => encode_records(r),
            Payload::Attributes(r) => encode_records(r),
        }
    }

    /// Dispatch a plain body to the record decoder for `kind`.
    pub fn decode_body(kind: PayloadKind, body: &[u8], num_records: u32) -> Result<Self, FormatError> {
        Ok(match kind {
            PayloadKind::Meta       => Payload::Meta(decode_records(body, num_records)?),
            PayloadKind::Content    => {
                if num_records != 1 {
                    return Err(FormatError::RecordCountMismatch {
                        kind,
                        declared: num_records,
                        actual:   1,
                    });
                }
                Payload::Content(body.to_vec())
            }
            PayloadKind::Layout     => Payload::Layout(decode_records(body, num_records)?),
            PayloadKind::Index      => Payload::Index(decode_records(body, num_records)?),
            PayloadKind::Attributes => Payload::Attributes(decode_records(body, num_records)?),
        })
    }
}

// ── Block encode / decode ────────────────────────────────────────────────────

/// Serialize, compress and checksum one payload.
pub fn encode_payload(payload: &Payload, compression: Compression, level: i32) -> Result<(PayloadHeader, Vec<u8>)> {
    let num_records = u32::try_from(payload.num_records()).map_err(|_| {
        FormatError::InvalidRecord(format!("{} payload has too many records", payload.kind()))
    })?;
    let plain = payload.encode_body()?;
    let stored = get_codec(compression).compress(&plain, level)?;

    let header = PayloadHeader {
        stored_size: stored.len() as u64,
        plain_size:  plain.len() as u64,
        checksum:    checksum(&plain),
        num_records,
        version:     PAYLOAD_VERSION,
        kind:        payload.kind(),
        compression,
    };
    debug!(
        "encoded {} payload: {} records, {} -> {} bytes ({})",
        header.kind, header.num_records, header.plain_size, header.stored_size, compression
    );
    Ok((header, stored))
}

/// Decompress, verify and decode one stored body.
pub fn decode_payload(header: &PayloadHeader, stored: &[u8]) -> Result<Payload> {
    let plain = get_codec(header.compression).decompress(stored, header.plain_size)?;
    if plain.len() as u64 != header.plain_size {
        return Err(FormatError::PlainSizeMismatch {
            kind:     header.kind,
            declared: header.plain_size,
            actual:   plain.len() as u64,
        }
        .into());
    }
    let actual = checksum(&plain);
    if actual != header.checksum {
        return Err(Error::Integrity {
            kind:     header.kind,
            expected: hex::encode(header.checksum),
            actual:   hex::encode(actual),
        });
    }
    let payload = Payload::decode_body(header.kind, &plain, header.num_records)?;
    debug!("decoded {} payload: {} records", header.kind, header.num_records);
    Ok(payload)
}

/// Read one `[header][body]` block from a stream.
pub fn read_payload<R: Read>(mut reader: R) -> Result<(PayloadHeader, Payload)> {
    let header = PayloadHeader::read(&mut reader)?;
    trace!("{} payload header: stored {} plain {}", header.kind, header.stored_size, header.plain_size);

    let mut stored = Vec::new();
    (&mut reader)
        .take(header.stored_size)
        .read_to_end(&mut stored)
        .map_err(Error::Io)?;
    if stored.len() as u64 != header.stored_size {
        return Err(FormatError::Truncated {
            needed:    header.stored_size as usize,
            available: stored.len(),
        }
        .into());
    }
    let payload = decode_payload(&header, &stored)?;
    Ok((header, payload))
}

/// Emit one `[header][body]` block.
pub fn write_payload<W: Write>(mut writer: W, header: &PayloadHeader, stored: &[u8]) -> Result<()> {
    header.write(&mut writer)?;
    writer.write_all(stored).map_err(Error::Write)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecError;

    #[test]
    fn header_wire_layout() {
        let header = PayloadHeader {
            stored_size: 0x0102,
            plain_size:  0x0304,
            checksum:    [9, 8, 7, 6, 5, 4, 3, 2],
            num_records: 5,
            version:     1,
            kind:        PayloadKind::Index,
            compression: Compression::Zstd,
        };
        let bytes = header.encode_to_bytes();
        assert_eq!(&bytes[0..8], &[0, 0, 0, 0, 0, 0, 1, 2]);
        assert_eq!(&bytes[8..16], &[0, 0, 0, 0, 0, 0, 3, 4]);
        assert_eq!(&bytes[16..24], &[9, 8, 7, 6, 5, 4, 3, 2]);
        assert_eq!(&bytes[24..28], &[0, 0, 0, 5]);
        assert_eq!(&bytes[28..30], &[0, 1]);
        assert_eq!(bytes[30], 4);
        assert_eq!(bytes[31], 2);
        assert_eq!(PayloadHeader::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn closed_sets_are_enforced() {
        let (header, _) = encode_payload(&Payload::Content(vec![1, 2, 3]), Compression::None, 0).unwrap();
        let good = header.encode_to_bytes();

        let mut bad_kind = good;
        bad_kind[30] = 0;
        assert!(matches!(PayloadHeader::decode(&bad_kind), Err(FormatError::UnknownPayloadKind(0))));
        bad_kind[30] = 42;
        assert!(matches!(PayloadHeader::decode(&bad_kind), Err(FormatError::UnknownPayloadKind(42))));

        let mut bad_compression = good;
        bad_compression[31] = 9;
        assert!(matches!(PayloadHeader::decode(&bad_compression), Err(FormatError::UnknownCompression(9))));

        let mut newer = good;
        newer[29] = 2;
        assert!(matches!(
            PayloadHeader::decode(&newer),
            Err(FormatError::UnsupportedPayloadVersion { found: 2, .. })
        ));
    }

    #[test]
    fn checksum_mismatch_is_an_integrity_error() {
        let payload = Payload::Content(b"hello".to_vec());
        let (mut header, stored) = encode_payload(&payload, Compression::None, 0).unwrap();
        header.checksum[0] ^= 0xFF;
        assert!(matches!(decode_payload(&header, &stored), Err(Error::Integrity { kind: PayloadKind::Content, .. })));
    }

    #[test]
    fn short_expansion_is_a_size_mismatch() {
        for compression in Compression::all() {
            let (mut header, stored) = encode_payload(&Payload::Content(vec![5; 40]), compression, 3).unwrap();
            header.plain_size += 8;
            let err = decode_payload(&header, &stored).unwrap_err();
            assert!(
                matches!(
                    err,
                    Error::Format(FormatError::PlainSizeMismatch { kind: PayloadKind::Content, declared: 48, actual: 40 })
                ),
                "{compression}: {err}"
            );
        }
    }

    #[test]
    fn oversized_expansion_is_cut_off() {
        let (mut header, stored) = encode_payload(&Payload::Content(vec![0; 1 << 22]), Compression::Zstd, 3).unwrap();
        assert!(stored.len() < 1 << 12);
        header.plain_size = 3;
        let err = decode_payload(&header, &stored).unwrap_err();
        assert!(matches!(
            err,
            Error::Codec(CodecError::Decompression { codec: Compression::Zstd, .. })
        ), "{err}");
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let payload = Payload::Index(vec![IndexRecord { start: 0, end: 4, digest: 7 }]);
        let mut body = payload.encode_body().unwrap();
        body.push(0);
        let err = Payload::decode_body(PayloadKind::Index, &body, 1).unwrap_err();
        assert!(matches!(err, FormatError::InvalidRecord(_)));
    }

    #[test]
    fn short_body_is_truncated() {
        let payload = Payload::Content(vec![0xAB; 64]);
        let (header, stored) = encode_payload(&payload, Compression::None, 0).unwrap();
        let mut block = Vec::new();
        write_payload(&mut block, &header, &stored).unwrap();
        block.truncate(block.len() - 10);
        let err = read_payload(block.as_slice()).unwrap_err();
        assert!(matches!(err, Error::Format(FormatError::Truncated { needed: 64, available: 54 })));
    }
}

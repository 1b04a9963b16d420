//! Compression registry for payload bodies.
//!
//! # Identity rules
//! Each compression kind has a frozen one-byte identifier written into every
//! payload header.  Identifiers are never reused.  `0` is reserved and, like
//! any identifier this build does not know, is rejected on read; a reader
//! never falls back to another codec.

use std::io::{self, Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Compression enum ─────────────────────────────────────────────────────────

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Body stored verbatim.
    None = 1,
    /// Zstandard (default).
    Zstd = 2,
    /// zlib/deflate.
    Zlib = 3,
    /// LZ4 block format with a prepended size.
    Lz4  = 4,
}

/// Identifier ↔ name table, fixed at compile time.
const COMPRESSIONS: &[(Compression, &str)] = &[
    (Compression::None, "none"),
    (Compression::Zstd, "zstd"),
    (Compression::Zlib, "zlib"),
    (Compression::Lz4,  "lz4"),
];

impl Compression {
    pub fn from_u8(v: u8) -> Option<Self> {
        COMPRESSIONS.iter().map(|&(c, _)| c).find(|&c| c as u8 == v)
    }

    /// Human-readable name (diagnostics and CLI).
    pub fn name(self) -> &'static str {
        COMPRESSIONS
            .iter()
            .find(|&&(c, _)| c == self)
            .map_or("none", |&(_, n)| n)
    }

    pub fn from_name(s: &str) -> Option<Self> {
        let s = s.to_lowercase();
        COMPRESSIONS.iter().find(|&&(_, n)| n == s).map(|&(c, _)| c)
    }

    pub fn all() -> impl Iterator<Item = Compression> {
        COMPRESSIONS.iter().map(|&(c, _)| c)
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("{codec} compression error: {reason}")]
    Compression { codec: Compression, reason: String },
    #[error("{codec} decompression error: {reason}")]
    Decompression { codec: Compression, reason: String },
}

// ── Codec trait ──────────────────────────────────────────────────────────────

pub trait Codec: Send + Sync {
    fn compression(&self) -> Compression;
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>, CodecError>;
    /// Expand `data`, producing at most `limit` bytes.  Output that would
    /// grow past `limit` is a decompression error; the caller decides what
    /// a short result means.
    fn decompress(&self, data: &[u8], limit: u64) -> Result<Vec<u8>, CodecError>;

    fn compress_err(&self, e: impl ToString) -> CodecError where Self: Sized {
        CodecError::Compression { codec: self.compression(), reason: e.to_string() }
    }

    fn decompress_err(&self, e: impl ToString) -> CodecError where Self: Sized {
        CodecError::Decompression { codec: self.compression(), reason: e.to_string() }
    }

    fn overflow_err(&self, limit: u64) -> CodecError where Self: Sized {
        self.decompress_err(format!("output exceeds the declared {limit} bytes"))
    }

    /// Drain a decoding stream, stopping one byte past `limit`.
    fn read_bounded<R: Read>(&self, reader: R, limit: u64) -> Result<Vec<u8>, CodecError> where Self: Sized {
        let mut out = Vec::new();
        reader
            .take(limit.saturating_add(1))
            .read_to_end(&mut out)
            .map_err(|e: io::Error| self.decompress_err(e))?;
        if out.len() as u64 > limit {
            return Err(self.overflow_err(limit));
        }
        Ok(out)
    }
}

// ── Built-in codec implementations ──────────────────────────────────────────

pub struct NoneCodec;
impl Codec for NoneCodec {
    fn compression(&self) -> Compression { Compression::None }
    fn compress(&self, data: &[u8], _: i32) -> Result<Vec<u8>, CodecError> { Ok(data.to_vec()) }
    fn decompress(&self, data: &[u8], limit: u64) -> Result<Vec<u8>, CodecError> {
        if data.len() as u64 > limit {
            return Err(self.overflow_err(limit));
        }
        Ok(data.to_vec())
    }
}

pub struct ZstdCodec;
impl Codec for ZstdCodec {
    fn compression(&self) -> Compression { Compression::Zstd }
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>, CodecError> {
        zstd::encode_all(data, level).map_err(|e| self.compress_err(e))
    }
    fn decompress(&self, data: &[u8], limit: u64) -> Result<Vec<u8>, CodecError> {
        let decoder = zstd::stream::read::Decoder::new(data).map_err(|e| self.decompress_err(e))?;
        self.read_bounded(decoder, limit)
    }
}

pub struct ZlibCodec;
impl Codec for ZlibCodec {
    fn compression(&self) -> Compression { Compression::Zlib }
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>, CodecError> {
        let level = flate2::Compression::new(level.clamp(0, 9) as u32);
        let mut encoder = ZlibEncoder::new(Vec::new(), level);
        encoder.write_all(data).map_err(|e| self.compress_err(e))?;
        encoder.finish().map_err(|e| self.compress_err(e))
    }
    fn decompress(&self, data: &[u8], limit: u64) -> Result<Vec<u8>, CodecError> {
        self.read_bounded(ZlibDecoder::new(data), limit)
    }
}

pub struct Lz4Codec;
impl Codec for Lz4Codec {
    fn compression(&self) -> Compression { Compression::Lz4 }
    fn compress(&self, data: &[u8], _: i32) -> Result<Vec<u8>, CodecError> {
        Ok(lz4_flex::compress_prepend_size(data))
    }
    fn decompress(&self, data: &[u8], limit: u64) -> Result<Vec<u8>, CodecError> {
        // compress_prepend_size writes the plain length as a little-endian u32
        let prefix: [u8; 4] = data
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| self.decompress_err("missing size prefix"))?;
        if u64::from(u32::from_le_bytes(prefix)) > limit {
            return Err(self.overflow_err(limit));
        }
        lz4_flex::decompress_size_prepended(data).map_err(|e| self.decompress_err(e))
    }
}

// ── Factory ──────────────────────────────────────────────────────────────────

pub fn get_codec(compression: Compression) -> &'static dyn Codec {
    match compression {
        Compression::None => &NoneCodec,
        Compression::Zstd => &ZstdCodec,
        Compression::Zlib => &ZlibCodec,
        Compression::Lz4  => &Lz4Codec,
    }
}

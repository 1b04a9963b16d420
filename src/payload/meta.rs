//! Package metadata records.
//!
//! ```text
//! [length u32][tag u16][kind u8][reserved u8][value: length B]
//! ```
//!
//! Integers are big-endian.  Strings are UTF-8 without a terminator.
//! Dependency and provider values are `[DependencyKind u8][UTF-8 name]`.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;

use super::{read_string, record_err, Record};
use crate::error::FormatError;

const FIXED_SIZE: usize = 4 + 2 + 1 + 1;

// ── Tags ─────────────────────────────────────────────────────────────────────

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaTag {
    Name = 1,
    Architecture,
    Version,
    Summary,
    Description,
    Homepage,
    SourceId,
    Depends,
    Provides,
    Conflicts,
    Release,
    License,
    BuildRelease,
    PackageUri,
    PackageHash,
    PackageSize,
    BuildDepends,
    SourceUri,
    SourcePath,
    SourceRef,
}

const META_TAGS: &[(MetaTag, &str)] = &[
    (MetaTag::Name,         "name"),
    (MetaTag::Architecture, "architecture"),
    (MetaTag::Version,      "version"),
    (MetaTag::Summary,      "summary"),
    (MetaTag::Description,  "description"),
    (MetaTag::Homepage,     "homepage"),
    (MetaTag::SourceId,     "source-id"),
    (MetaTag::Depends,      "depends"),
    (MetaTag::Provides,     "provides"),
    (MetaTag::Conflicts,    "conflicts"),
    (MetaTag::Release,      "release"),
    (MetaTag::License,      "license"),
    (MetaTag::BuildRelease, "build-release"),
    (MetaTag::PackageUri,   "package-uri"),
    (MetaTag::PackageHash,  "package-hash"),
    (MetaTag::PackageSize,  "package-size"),
    (MetaTag::BuildDepends, "build-depends"),
    (MetaTag::SourceUri,    "source-uri"),
    (MetaTag::SourcePath,   "source-path"),
    (MetaTag::SourceRef,    "source-ref"),
];

impl MetaTag {
    pub fn from_u16(v: u16) -> Option<Self> {
        META_TAGS.iter().map(|&(t, _)| t).find(|&t| t as u16 == v)
    }

    pub fn name(self) -> &'static str {
        META_TAGS.iter().find(|&&(t, _)| t == self).map_or("", |&(_, n)| n)
    }

    pub fn from_name(s: &str) -> Option<Self> {
        META_TAGS.iter().find(|&&(_, n)| n == s).map(|&(t, _)| t)
    }
}

// ── Value kinds ──────────────────────────────────────────────────────────────

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaKind {
    Int8 = 1,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    String,
    Dependency,
    Provider,
}

impl MetaKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        use MetaKind::*;
        [Int8, Uint8, Int16, Uint16, Int32, Uint32, Int64, Uint64, String, Dependency, Provider]
            .into_iter()
            .find(|&k| k as u8 == v)
    }
}

// ── Dependencies ─────────────────────────────────────────────────────────────

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DependencyKind {
    PackageName = 0,
    SharedLibrary,
    PkgConfig,
    Interpreter,
    CMake,
    Python,
    Binary,
    SystemBinary,
    PkgConfig32,
}

const DEPENDENCY_KINDS: &[(DependencyKind, &str)] = &[
    (DependencyKind::PackageName,   "name"),
    (DependencyKind::SharedLibrary, "soname"),
    (DependencyKind::PkgConfig,     "pkgconfig"),
    (DependencyKind::Interpreter,   "interpreter"),
    (DependencyKind::CMake,         "cmake"),
    (DependencyKind::Python,        "python"),
    (DependencyKind::Binary,        "binary"),
    (DependencyKind::SystemBinary,  "sysbinary"),
    (DependencyKind::PkgConfig32,   "pkgconfig32"),
];

impl DependencyKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        DEPENDENCY_KINDS.iter().map(|&(k, _)| k).find(|&k| k as u8 == v)
    }

    pub fn name(self) -> &'static str {
        DEPENDENCY_KINDS.iter().find(|&&(k, _)| k == self).map_or("name", |&(_, n)| n)
    }

    pub fn from_name(s: &str) -> Option<Self> {
        DEPENDENCY_KINDS.iter().find(|&&(_, n)| n == s).map(|&(k, _)| k)
    }
}

/// A typed dependency or provider, written as `kind(name)` in text form.
/// Plain package names carry no prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Dependency {
    pub kind: DependencyKind,
    pub name: String,
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DependencyKind::PackageName => f.write_str(&self.name),
            kind => write!(f, "{}({})", kind.name(), self.name),
        }
    }
}

impl FromStr for Dependency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((kind, rest)) = s.split_once('(') else {
            return Ok(Self { kind: DependencyKind::PackageName, name: s.to_owned() });
        };
        let name = rest
            .strip_suffix(')')
            .ok_or_else(|| format!("unterminated dependency '{s}'"))?;
        let kind = DependencyKind::from_name(kind)
            .ok_or_else(|| format!("unknown dependency kind '{kind}'"))?;
        Ok(Self { kind, name: name.to_owned() })
    }
}

// ── Records ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetaValue {
    Int8(i8),
    Uint8(u8),
    Int16(i16),
    Uint16(u16),
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    String(String),
    Dependency(Dependency),
    Provider(Dependency),
}

impl MetaValue {
    pub fn kind(&self) -> MetaKind {
        match self {
            MetaValue::Int8(_)       => MetaKind::Int8,
            MetaValue::Uint8(_)      => MetaKind::Uint8,
            MetaValue::Int16(_)      => MetaKind::Int16,
            MetaValue::Uint16(_)     => MetaKind::Uint16,
            MetaValue::Int32(_)      => MetaKind::Int32,
            MetaValue::Uint32(_)     => MetaKind::Uint32,
            MetaValue::Int64(_)      => MetaKind::Int64,
            MetaValue::Uint64(_)     => MetaKind::Uint64,
            MetaValue::String(_)     => MetaKind::String,
            MetaValue::Dependency(_) => MetaKind::Dependency,
            MetaValue::Provider(_)   => MetaKind::Provider,
        }
    }

    fn encoded_len(&self) -> usize {
        match self {
            MetaValue::Int8(_) | MetaValue::Uint8(_)   => 1,
            MetaValue::Int16(_) | MetaValue::Uint16(_) => 2,
            MetaValue::Int32(_) | MetaValue::Uint32(_) => 4,
            MetaValue::Int64(_) | MetaValue::Uint64(_) => 8,
            MetaValue::String(s) => s.len(),
            MetaValue::Dependency(d) | MetaValue::Provider(d) => 1 + d.name.len(),
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Int8(v)   => write!(f, "{v}"),
            MetaValue::Uint8(v)  => write!(f, "{v}"),
            MetaValue::Int16(v)  => write!(f, "{v}"),
            MetaValue::Uint16(v) => write!(f, "{v}"),
            MetaValue::Int32(v)  => write!(f, "{v}"),
            MetaValue::Uint32(v) => write!(f, "{v}"),
            MetaValue::Int64(v)  => write!(f, "{v}"),
            MetaValue::Uint64(v) => write!(f, "{v}"),
            MetaValue::String(s) => f.write_str(s),
            MetaValue::Dependency(d) | MetaValue::Provider(d) => write!(f, "{d}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetaRecord {
    pub tag:   MetaTag,
    pub value: MetaValue,
}

impl MetaRecord {
    pub fn new(tag: MetaTag, value: MetaValue) -> Self {
        Self { tag, value }
    }

    pub fn string(tag: MetaTag, value: impl Into<String>) -> Self {
        Self::new(tag, MetaValue::String(value.into()))
    }
}

fn expect_len(kind: MetaKind, len: u32, expected: u32) -> Result<(), FormatError> {
    if len == expected {
        Ok(())
    } else {
        Err(FormatError::InvalidRecord(format!(
            "{kind:?} meta value is {len} bytes, expected {expected}"
        )))
    }
}

fn read_dependency<R: Read>(reader: &mut R, len: u32) -> Result<Dependency, FormatError> {
    if len == 0 {
        return Err(FormatError::InvalidRecord("empty dependency value".into()));
    }
    let raw = reader.read_u8().map_err(record_err("dependency kind"))?;
    let kind = DependencyKind::from_u8(raw)
        .ok_or_else(|| FormatError::InvalidRecord(format!("unknown dependency kind {raw}")))?;
    let name = read_string(reader, u64::from(len - 1), "dependency name")?;
    Ok(Dependency { kind, name })
}

impl Record for MetaRecord {
    fn decode<R: Read>(reader: &mut R) -> Result<Self, FormatError> {
        let len = reader.read_u32::<BigEndian>().map_err(record_err("meta length"))?;
        let raw_tag = reader.read_u16::<BigEndian>().map_err(record_err("meta tag"))?;
        let raw_kind = reader.read_u8().map_err(record_err("meta kind"))?;
        let _reserved = reader.read_u8().map_err(record_err("meta padding"))?;

        let tag = MetaTag::from_u16(raw_tag)
            .ok_or_else(|| FormatError::InvalidRecord(format!("unknown meta tag {raw_tag}")))?;
        let kind = MetaKind::from_u8(raw_kind)
            .ok_or_else(|| FormatError::InvalidRecord(format!("unknown meta kind {raw_kind}")))?;

        let err = record_err("meta value");
        let value = match kind {
            MetaKind::Int8   => { expect_len(kind, len, 1)?; MetaValue::Int8(reader.read_i8().map_err(err)?) }
            MetaKind::Uint8  => { expect_len(kind, len, 1)?; MetaValue::Uint8(reader.read_u8().map_err(err)?) }
            MetaKind::Int16  => { expect_len(kind, len, 2)?; MetaValue::Int16(reader.read_i16::<BigEndian>().map_err(err)?) }
            MetaKind::Uint16 => { expect_len(kind, len, 2)?; MetaValue::Uint16(reader.read_u16::<BigEndian>().map_err(err)?) }
            MetaKind::Int32  => { expect_len(kind, len, 4)?; MetaValue::Int32(reader.read_i32::<BigEndian>().map_err(err)?) }
            MetaKind::Uint32 => { expect_len(kind, len, 4)?; MetaValue::Uint32(reader.read_u32::<BigEndian>().map_err(err)?) }
            MetaKind::Int64  => { expect_len(kind, len, 8)?; MetaValue::Int64(reader.read_i64::<BigEndian>().map_err(err)?) }
            MetaKind::Uint64 => { expect_len(kind, len, 8)?; MetaValue::Uint64(reader.read_u64::<BigEndian>().map_err(err)?) }
            MetaKind::String => MetaValue::String(read_string(reader, len.into(), "meta string")?),
            MetaKind::Dependency => MetaValue::Dependency(read_dependency(reader, len)?),
            MetaKind::Provider   => MetaValue::Provider(read_dependency(reader, len)?),
        };
        Ok(Self { tag, value })
    }

    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let len = u32::try_from(self.value.encoded_len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "meta value exceeds u32 length")
        })?;
        writer.write_u32::<BigEndian>(len)?;
        writer.write_u16::<BigEndian>(self.tag as u16)?;
        writer.write_u8(self.value.kind() as u8)?;
        writer.write_u8(0)?;
        match &self.value {
            MetaValue::Int8(v)   => writer.write_i8(*v),
            MetaValue::Uint8(v)  => writer.write_u8(*v),
            MetaValue::Int16(v)  => writer.write_i16::<BigEndian>(*v),
            MetaValue::Uint16(v) => writer.write_u16::<BigEndian>(*v),
            MetaValue::Int32(v)  => writer.write_i32::<BigEndian>(*v),
            MetaValue::Uint32(v) => writer.write_u32::<BigEndian>(*v),
            MetaValue::Int64(v)  => writer.write_i64::<BigEndian>(*v),
            MetaValue::Uint64(v) => writer.write_u64::<BigEndian>(*v),
            MetaValue::String(s) => writer.write_all(s.as_bytes()),
            MetaValue::Dependency(d) | MetaValue::Provider(d) => {
                writer.write_u8(d.kind as u8)?;
                writer.write_all(d.name.as_bytes())
            }
        }
    }

    fn size(&self) -> usize {
        FIXED_SIZE + self.value.encoded_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(record: &MetaRecord) -> MetaRecord {
        let mut out = Vec::new();
        record.encode(&mut out).unwrap();
        assert_eq!(out.len(), record.size());
        MetaRecord::decode(&mut out.as_slice()).unwrap()
    }

    #[test]
    fn typed_values_survive() {
        let records = [
            MetaRecord::string(MetaTag::Name, "nano"),
            MetaRecord::new(MetaTag::Release, MetaValue::Uint64(12)),
            MetaRecord::new(MetaTag::BuildRelease, MetaValue::Int8(-1)),
            MetaRecord::new(MetaTag::Depends, MetaValue::Dependency("soname(libc.so.6(x86_64))".parse().unwrap())),
            MetaRecord::new(MetaTag::Provides, MetaValue::Provider("binary(nano)".parse().unwrap())),
        ];
        for r in &records {
            assert_eq!(&round_trip(r), r);
        }
    }

    #[test]
    fn dependency_text_form() {
        let dep: Dependency = "pkgconfig(zlib)".parse().unwrap();
        assert_eq!(dep.kind, DependencyKind::PkgConfig);
        assert_eq!(dep.name, "zlib");
        assert_eq!(dep.to_string(), "pkgconfig(zlib)");

        let plain: Dependency = "glibc".parse().unwrap();
        assert_eq!(plain.kind, DependencyKind::PackageName);
        assert_eq!(plain.to_string(), "glibc");

        assert!("nonsense(foo)".parse::<Dependency>().is_err());
        assert!("soname(foo".parse::<Dependency>().is_err());
    }

    #[test]
    fn lookup_tables_round_trip() {
        for &(tag, name) in META_TAGS {
            assert_eq!(MetaTag::from_u16(tag as u16), Some(tag));
            assert_eq!(MetaTag::from_name(name), Some(tag));
        }
        for &(kind, name) in DEPENDENCY_KINDS {
            assert_eq!(DependencyKind::from_u8(kind as u8), Some(kind));
            assert_eq!(DependencyKind::from_name(name), Some(kind));
        }
        assert_eq!(MetaTag::from_u16(0), None);
    }

    #[test]
    fn integer_length_must_match_kind() {
        let mut out = Vec::new();
        MetaRecord::new(MetaTag::Release, MetaValue::Uint32(1)).encode(&mut out).unwrap();
        out[3] = 8; // claim an 8-byte value
        assert!(matches!(MetaRecord::decode(&mut out.as_slice()), Err(FormatError::InvalidRecord(_))));
    }
}

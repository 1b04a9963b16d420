//! The fixed 32-byte archive header.
//!
//! ```text
//! offset size field
//!      0    4 magic            0x006D6F73
//!      4    2 num_payloads
//!      6   21 integrity_check  {0,0,1,0,0,2,…,0,0,7}
//!     27    1 file_type
//!     28    4 format_version
//! ```
//!
//! Integers are big-endian on the wire.  The layout is packed by offset into
//! a `[u8; HEADER_SIZE]` image; the compile-time checks below pin every
//! field boundary so nothing can drift or pad.

use std::io::{Read, Write};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::endian::{self, Field};
use crate::error::{read_exact, Error, FormatError, Result};

pub const MAGIC: u32 = 0x006D_6F73;
pub const HEADER_SIZE: usize = 32;
/// Highest `format_version` this build can read.
pub const MAX_FORMAT_VERSION: u32 = 1;

/// Gross-corruption guard; not a checksum.
pub const INTEGRITY_CHECK: [u8; 21] = [
    0, 0, 1, 0, 0, 2, 0, 0, 3, 0, 0, 4, 0, 0, 5, 0, 0, 6, 0, 0, 7,
];

const F_MAGIC:          Field = Field::new(0, 4);
const F_NUM_PAYLOADS:   Field = Field::new(4, 2);
const INTEGRITY_OFFSET: usize = 6;
const FILE_TYPE_OFFSET: usize = INTEGRITY_OFFSET + INTEGRITY_CHECK.len();
const F_FORMAT_VERSION: Field = Field::new(FILE_TYPE_OFFSET + 1, 4);

/// Integer fields subject to byte-order conversion.
const WIRE_FIELDS: &[Field] = &[F_MAGIC, F_NUM_PAYLOADS, F_FORMAT_VERSION];

const _: () = assert!(F_MAGIC.offset + F_MAGIC.width == F_NUM_PAYLOADS.offset);
const _: () = assert!(F_NUM_PAYLOADS.offset + F_NUM_PAYLOADS.width == INTEGRITY_OFFSET);
const _: () = assert!(FILE_TYPE_OFFSET == 27);
const _: () = assert!(F_FORMAT_VERSION.offset + F_FORMAT_VERSION.width == HEADER_SIZE);

/// Kind of container described by the header.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    /// Never valid on disk; rejected by [`ArchiveHeader::validate`].
    Unknown       = 0,
    Binary        = 1,
    Delta         = 2,
    Repository    = 3,
    BuildManifest = 4,
}

impl From<u8> for FileType {
    fn from(v: u8) -> Self {
        match v {
            1 => FileType::Binary,
            2 => FileType::Delta,
            3 => FileType::Repository,
            4 => FileType::BuildManifest,
            _ => FileType::Unknown,
        }
    }
}

impl FileType {
    pub fn name(self) -> &'static str {
        match self {
            FileType::Unknown       => "unknown",
            FileType::Binary        => "binary",
            FileType::Delta         => "delta",
            FileType::Repository    => "repository",
            FileType::BuildManifest => "build-manifest",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub magic:           u32,
    pub num_payloads:    u16,
    pub integrity_check: [u8; 21],
    pub file_type:       FileType,
    pub format_version:  u32,
}

impl ArchiveHeader {
    pub fn new(format_version: u32) -> Self {
        Self {
            magic:           MAGIC,
            num_payloads:    0,
            integrity_check: INTEGRITY_CHECK,
            file_type:       FileType::Binary,
            format_version,
        }
    }

    pub fn with_file_type(mut self, file_type: FileType) -> Self {
        self.file_type = file_type;
        self
    }

    /// The 32-byte wire image of this header.
    pub fn encode_to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut image = [0u8; HEADER_SIZE];
        endian::put_u32(&mut image, F_MAGIC, self.magic);
        endian::put_u16(&mut image, F_NUM_PAYLOADS, self.num_payloads);
        image[INTEGRITY_OFFSET..FILE_TYPE_OFFSET].copy_from_slice(&self.integrity_check);
        image[FILE_TYPE_OFFSET] = self.file_type as u8;
        endian::put_u32(&mut image, F_FORMAT_VERSION, self.format_version);
        endian::to_wire_order(&mut image, WIRE_FIELDS);
        image
    }

    pub fn encode<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.encode_to_bytes()).map_err(Error::Write)
    }

    /// Decode the leading [`HEADER_SIZE`] bytes of `bytes`.
    ///
    /// Returns the header and the number of bytes consumed.  The result is
    /// untrusted until [`validate`](Self::validate) succeeds.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), FormatError> {
        if bytes.len() < HEADER_SIZE {
            return Err(FormatError::Truncated { needed: HEADER_SIZE, available: bytes.len() });
        }
        let mut image = [0u8; HEADER_SIZE];
        image.copy_from_slice(&bytes[..HEADER_SIZE]);
        endian::to_host_order(&mut image, WIRE_FIELDS);

        let mut integrity_check = [0u8; 21];
        integrity_check.copy_from_slice(&image[INTEGRITY_OFFSET..FILE_TYPE_OFFSET]);

        let header = Self {
            magic:           endian::get_u32(&image, F_MAGIC),
            num_payloads:    endian::get_u16(&image, F_NUM_PAYLOADS),
            integrity_check,
            file_type:       FileType::from(image[FILE_TYPE_OFFSET]),
            format_version:  endian::get_u32(&image, F_FORMAT_VERSION),
        };
        Ok((header, HEADER_SIZE))
    }

    /// Read and decode a header from a stream (unvalidated).
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut image = [0u8; HEADER_SIZE];
        read_exact(&mut reader, &mut image)?;
        let (header, _) = Self::decode(&image)?;
        Ok(header)
    }

    pub fn validate(&self) -> Result<(), FormatError> {
        if self.magic != MAGIC {
            return Err(FormatError::InvalidMagic(self.magic));
        }
        if self.integrity_check != INTEGRITY_CHECK {
            return Err(FormatError::CorruptIntegrityCheck);
        }
        if self.file_type == FileType::Unknown {
            return Err(FormatError::UnknownFileType);
        }
        if self.format_version > MAX_FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion {
                found: self.format_version,
                max:   MAX_FORMAT_VERSION,
            });
        }
        debug!(
            "header ok: {} archive v{}, {} payload(s)",
            self.file_type.name(),
            self.format_version,
            self.num_payloads
        );
        Ok(())
    }
}

//! Codec for the stone package archive container.
//!
//! An archive is a fixed 32-byte [`ArchiveHeader`] followed by
//! `num_payloads` independently compressed, checksummed payload blocks.
//! [`Reader`] validates and decodes them sequentially; [`Writer`] is the
//! mirror.

pub mod endian;
pub mod error;
pub mod header;
pub mod codec;
pub mod payload;
pub mod path;
pub mod reader;
pub mod writer;
pub mod archive;

pub use archive::Archive;
pub use codec::{get_codec, Codec, CodecError, Compression};
pub use error::{Error, FormatError, Result};
pub use header::{ArchiveHeader, FileType, HEADER_SIZE, MAGIC, MAX_FORMAT_VERSION};
pub use path::{PathDefinition, PathKind};
pub use payload::{Payload, PayloadHeader, PayloadKind, Record};
pub use reader::Reader;
pub use writer::{Writer, WriterOptions};

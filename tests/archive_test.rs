use std::io::Cursor;

use proptest::prelude::*;
use stone::archive::Archive;
use stone::codec::{CodecError, Compression};
use stone::header::{ArchiveHeader, FileType, HEADER_SIZE};
use stone::payload::{
    AttributeRecord, Dependency, IndexRecord, LayoutEntry, LayoutRecord, MetaRecord, MetaTag,
    MetaValue, Payload, PayloadKind, PAYLOAD_HEADER_SIZE,
};
use stone::reader::{ReadState, Reader};
use stone::writer::{Writer, WriterOptions};
use stone::{Error, FormatError, PathKind};
use tempfile::NamedTempFile;

fn sample_payloads() -> Vec<Payload> {
    let content = b"#!/bin/sh\necho hi\nhello world\n".to_vec();
    vec![
        Payload::Meta(vec![
            MetaRecord::string(MetaTag::Name, "hello"),
            MetaRecord::string(MetaTag::Version, "1.0.2"),
            MetaRecord::new(MetaTag::Release, MetaValue::Uint64(3)),
            MetaRecord::new(MetaTag::Depends, MetaValue::Dependency("soname(libc.so.6)".parse().unwrap())),
            MetaRecord::new(MetaTag::Provides, MetaValue::Provider(Dependency {
                kind: stone::payload::DependencyKind::Binary,
                name: "hello".into(),
            })),
        ]),
        Payload::Index(vec![
            IndexRecord { start: 0, end: 18, digest: 0x1111 },
            IndexRecord { start: 18, end: 30, digest: 0x2222 },
        ]),
        Payload::Layout(vec![
            LayoutRecord { uid: 0, gid: 0, mode: 0o040755, tag: 0, entry: LayoutEntry::Directory("usr/bin".into()) },
            LayoutRecord { uid: 0, gid: 0, mode: 0o100755, tag: 0, entry: LayoutEntry::Regular(0x1111, "usr/bin/hello".into()) },
            LayoutRecord { uid: 0, gid: 0, mode: 0o100644, tag: 0, entry: LayoutEntry::Regular(0x2222, "usr/share/hello/greeting".into()) },
            LayoutRecord { uid: 0, gid: 0, mode: 0o120777, tag: 0, entry: LayoutEntry::Symlink("hello".into(), "usr/bin/hi".into()) },
        ]),
        Payload::Attributes(vec![AttributeRecord::new("origin", "unit-test"), AttributeRecord::new(vec![0xFF], Vec::new())]),
        Payload::Content(content),
    ]
}

fn write(payloads: &[Payload], compression: Compression) -> Vec<u8> {
    let options = WriterOptions { compression, ..WriterOptions::default() };
    let mut writer = Writer::with_options(Vec::new(), options);
    for p in payloads {
        writer.add_payload(p).unwrap();
    }
    writer.finish().unwrap()
}

#[test]
fn test_empty_archive() {
    let bytes = write(&[], Compression::Zstd);
    assert_eq!(bytes.len(), HEADER_SIZE);

    let reader = Reader::new(bytes.as_slice()).unwrap();
    assert_eq!(reader.state(), ReadState::Done);
    let archive = reader.read_all().unwrap();
    assert_eq!(archive.header.num_payloads, 0);
    assert!(archive.payloads.is_empty());
}

#[test]
fn test_mixed_payload_round_trip_all_codecs() {
    let payloads = sample_payloads();
    for compression in Compression::all() {
        let bytes = write(&payloads, compression);
        let archive = Archive::from_bytes(&bytes).unwrap();
        assert_eq!(archive.header.num_payloads as usize, payloads.len(), "{compression}");
        assert_eq!(archive.payloads, payloads, "{compression}");
    }
}

#[test]
fn test_insertion_order_is_preserved() {
    let payloads = vec![
        Payload::Content(b"a".to_vec()),
        Payload::Meta(vec![MetaRecord::string(MetaTag::Name, "x")]),
        Payload::Content(b"b".to_vec()),
        Payload::Index(Vec::new()),
    ];
    let archive = Archive::from_bytes(&write(&payloads, Compression::None)).unwrap();
    let kinds: Vec<_> = archive.payloads.iter().map(Payload::kind).collect();
    assert_eq!(kinds, [PayloadKind::Content, PayloadKind::Meta, PayloadKind::Content, PayloadKind::Index]);
}

#[test]
fn test_index_addresses_content() {
    let archive = Archive::from_bytes(&write(&sample_payloads(), Compression::Zstd)).unwrap();
    let indices: Vec<_> = archive.indices().copied().collect();
    assert_eq!(archive.file_contents(&indices[0]).unwrap(), b"#!/bin/sh\necho hi\n");
    assert_eq!(archive.file_contents(&indices[1]).unwrap(), b"hello world\n");

    let kinds: Vec<_> = archive.layouts().map(|l| l.path_definition().kind).collect();
    assert_eq!(kinds, [PathKind::Any, PathKind::Exe, PathKind::Any, PathKind::Symlink]);
    assert_eq!(archive.meta().count(), 5);
    assert_eq!(archive.attributes().count(), 2);
}

#[test]
fn test_per_payload_compression_override() {
    let mut writer = Writer::new(Vec::new());
    writer.add_payload_with(&Payload::Content(vec![7; 4096]), Compression::None).unwrap();
    writer.add_payload(&Payload::Content(vec![7; 4096])).unwrap();
    let bytes = writer.finish().unwrap();

    let mut reader = Reader::new(bytes.as_slice()).unwrap();
    let headers: Vec<_> = reader.payloads().map(|b| b.unwrap().0).collect();
    assert_eq!(headers[0].compression, Compression::None);
    assert_eq!(headers[0].stored_size, 4096);
    assert_eq!(headers[1].compression, Compression::Zstd);
    assert!(headers[1].stored_size < 4096);
}

#[test]
fn test_file_type_is_carried() {
    let mut archive = Archive::new(FileType::Repository);
    archive.push(Payload::Meta(vec![MetaRecord::string(MetaTag::Name, "repo")]));
    let bytes = archive.to_bytes(WriterOptions::default()).unwrap();
    assert_eq!(bytes[27], FileType::Repository as u8);
    assert_eq!(Archive::from_bytes(&bytes).unwrap().header.file_type, FileType::Repository);
}

#[test]
fn test_unknown_payload_kind_is_rejected_not_skipped() {
    let mut bytes = write(&[Payload::Content(b"one".to_vec()), Payload::Content(b"two".to_vec())], Compression::None);
    // kind byte of the second block header
    let second = HEADER_SIZE + PAYLOAD_HEADER_SIZE + 3;
    bytes[second + 30] = 0x7E;

    let mut reader = Reader::new(bytes.as_slice()).unwrap();
    assert!(reader.next_payload().unwrap().is_ok());
    let err = reader.next_payload().unwrap().unwrap_err();
    assert!(matches!(err, Error::Format(FormatError::UnknownPayloadKind(0x7E))));
    assert_eq!(reader.state(), ReadState::Failed);
    assert!(reader.next_payload().is_none());
}

#[test]
fn test_corrupted_body_fails_integrity() {
    let mut bytes = write(&[Payload::Content(b"precious bytes".to_vec())], Compression::None);
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    let err = Archive::from_bytes(&bytes).unwrap_err();
    assert!(matches!(err, Error::Integrity { kind: PayloadKind::Content, .. }), "{err}");
}

#[test]
fn test_corrupted_zstd_frame_is_a_codec_error() {
    let mut bytes = write(&[Payload::Content(vec![3; 1024])], Compression::Zstd);
    let body = HEADER_SIZE + PAYLOAD_HEADER_SIZE;
    assert_eq!(&bytes[body..body + 4], &[0x28, 0xB5, 0x2F, 0xFD]);
    bytes[body] ^= 0xFF;
    let err = Archive::from_bytes(&bytes).unwrap_err();
    assert!(
        matches!(err, Error::Codec(CodecError::Decompression { codec: Compression::Zstd, .. })),
        "{err}"
    );
}

#[test]
fn test_writer_rejects_inverted_index_range() {
    let mut writer = Writer::new(Vec::new());
    let inverted = Payload::Index(vec![IndexRecord { start: 9, end: 1, digest: 0xAB }]);
    let err = writer.add_payload(&inverted).unwrap_err();
    assert!(matches!(err, Error::Format(FormatError::InvalidRecord(_))), "{err}");
    assert_eq!(writer.num_payloads(), 0);

    let bytes = writer.finish().unwrap();
    assert!(Archive::from_bytes(&bytes).unwrap().payloads.is_empty());
}

#[test]
fn test_missing_payloads_are_truncation() {
    let bytes = write(&sample_payloads(), Compression::Zstd);
    let mut header = ArchiveHeader::decode(&bytes).unwrap().0;
    header.num_payloads += 1;
    let mut patched = header.encode_to_bytes().to_vec();
    patched.extend_from_slice(&bytes[HEADER_SIZE..]);
    let err = Archive::from_bytes(&patched).unwrap_err();
    assert!(matches!(err, Error::Format(FormatError::Truncated { needed: 32, available: 0 })));
}

#[test]
fn test_bad_header_stops_before_payloads() {
    let mut bytes = write(&sample_payloads(), Compression::Zstd);
    bytes[10] = 0xEE;
    let mut cursor = Cursor::new(bytes);
    let err = Reader::new(&mut cursor).err().unwrap();
    assert!(matches!(err, Error::Format(FormatError::CorruptIntegrityCheck)));
    assert_eq!(cursor.position(), HEADER_SIZE as u64);
}

#[test]
fn test_writer_refuses_unknown_file_type() {
    let options = WriterOptions { file_type: FileType::Unknown, ..WriterOptions::default() };
    let err = Writer::with_options(Vec::new(), options).finish().unwrap_err();
    assert!(matches!(err, Error::Format(FormatError::UnknownFileType)));
}

#[test]
fn test_options_from_json() {
    let opts = WriterOptions::from_json(r#"{ "compression": "zlib", "level": 6 }"#).unwrap();
    assert_eq!(opts.compression, Compression::Zlib);
    assert_eq!(opts.level, 6);
    assert_eq!(opts.file_type, FileType::Binary);
    assert!(WriterOptions::from_json(r#"{ "compresion": "zlib" }"#).is_err());
}

#[test]
fn test_file_round_trip() {
    let temp_file = NamedTempFile::new().unwrap();
    let mut archive = Archive::default();
    for p in sample_payloads() {
        archive.push(p);
    }
    archive.save(temp_file.path(), WriterOptions::default()).unwrap();

    assert_eq!(archive.header.num_payloads, 5);

    let loaded = Archive::open(temp_file.path()).unwrap();
    assert_eq!(loaded, archive);
}

#[test]
fn test_archive_header_is_written_as_held() {
    let mut archive = Archive {
        header:   ArchiveHeader::new(0).with_file_type(FileType::Delta),
        payloads: Vec::new(),
    };
    archive.push(Payload::Content(b"delta".to_vec()));
    assert_eq!(archive.header.num_payloads, 1);

    let loaded = Archive::from_bytes(&archive.to_bytes(WriterOptions::default()).unwrap()).unwrap();
    assert_eq!(loaded.header.format_version, 0);
    assert_eq!(loaded.header.file_type, FileType::Delta);
    assert_eq!(loaded, archive);
}

fn arb_payload() -> impl Strategy<Value = Payload> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..256).prop_map(Payload::Content),
        prop::collection::vec((any::<u64>(), any::<u64>(), any::<u128>()), 0..8).prop_map(|v| {
            Payload::Index(
                v.into_iter()
                    .map(|(a, b, digest)| IndexRecord { start: a.min(b), end: a.max(b), digest })
                    .collect(),
            )
        }),
        prop::collection::vec(("[a-z/]{0,24}", any::<u128>(), any::<u32>()), 0..8).prop_map(|v| {
            Payload::Layout(
                v.into_iter()
                    .map(|(path, digest, mode)| LayoutRecord { uid: 0, gid: 0, mode, tag: 0, entry: LayoutEntry::Regular(digest, path) })
                    .collect(),
            )
        }),
        prop::collection::vec(("[a-z]{0,12}", any::<u64>()), 0..8).prop_map(|v| {
            Payload::Meta(
                v.into_iter()
                    .flat_map(|(s, n)| [MetaRecord::string(MetaTag::Summary, s), MetaRecord::new(MetaTag::PackageSize, MetaValue::Uint64(n))])
                    .collect(),
            )
        }),
        prop::collection::vec((prop::collection::vec(any::<u8>(), 0..16), prop::collection::vec(any::<u8>(), 0..16)), 0..8)
            .prop_map(|v| Payload::Attributes(v.into_iter().map(|(k, val)| AttributeRecord::new(k, val)).collect())),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_archive_round_trip(payloads in prop::collection::vec(arb_payload(), 0..6)) {
        let bytes = write(&payloads, Compression::Zstd);
        let archive = Archive::from_bytes(&bytes).unwrap();
        prop_assert_eq!(archive.header.num_payloads as usize, payloads.len());
        prop_assert_eq!(archive.payloads, payloads);
    }
}

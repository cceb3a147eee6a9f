//! Encode and decode integration tests.
//!
//! Tests verify:
//! - Fresh streams have the expected header, pointers and directories
//! - Entries are sorted and every offset resolves inside the stream
//! - Tags that cannot be encoded are dropped with a diagnostic
//! - Hand-built TIFF files decode to the expected tag map

use exif_rewrite::{
    validate_stream, ByteOrder, DiagnosticKind, EncodeError, EncodeOptions, ExifCodec, Ifd,
    TagMap, TagRegistry, Value, ValueReader,
};

use super::test_utils::{create_camera_tiff, parse_ifd0, ByteOrderType};

fn tags(pairs: &[(&str, Value)]) -> TagMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn codec(order: ByteOrder) -> ExifCodec<'static> {
    ExifCodec::new(
        TagRegistry::standard(),
        EncodeOptions {
            byte_order: Some(order),
            ..EncodeOptions::default()
        },
    )
}

/// Follow a pointer entry of `ifd` to its directory.
fn follow(data: &[u8], order: ByteOrder, ifd: &Ifd, tag: u16) -> Ifd {
    let entry = ifd.get_entry_by_tag(tag).unwrap();
    Ifd::parse(data, entry.value_offset(order), order).unwrap()
}

fn assert_ascending(ifd: &Ifd) {
    let ids: Vec<u16> = ifd.entries.iter().map(|e| e.tag).collect();
    assert!(
        ids.windows(2).all(|w| w[0] < w[1]),
        "entries not strictly ascending: {:?}",
        ids
    );
}

// =============================================================================
// Fresh Stream Tests
// =============================================================================

#[test]
fn test_gps_stream_from_scratch() {
    let input = tags(&[
        ("EXIF:Make", Value::from("Canon")),
        ("EXIF:Model", Value::from("EOS 5D")),
        ("GPS:GPSLatitude", Value::Rational(45.0)),
    ]);
    let encoded = codec(ByteOrder::LittleEndian).encode(&input).unwrap();
    let data = &encoded.bytes;

    assert!(encoded.diagnostics.is_empty());
    assert_eq!(&data[0..2], b"II");
    assert_eq!(u16::from_le_bytes([data[2], data[3]]), 42);
    assert_eq!(u32::from_le_bytes([data[4], data[5], data[6], data[7]]), 8);

    let (order, ifd0) = parse_ifd0(data);
    let gps = follow(data, order, &ifd0, 0x8825);
    assert_eq!(gps.entries.len(), 1);
    assert_eq!(gps.entries[0].tag, 0x0002);
    assert_eq!(gps.offset, ifd0.get_entry_by_tag(0x8825).unwrap().value_offset(order));
}

#[test]
fn test_nested_value_dropped() {
    let input = tags(&[
        ("EXIF:Make", Value::from("Canon")),
        (
            "EXIF:Model",
            Value::Sequence(vec![Value::Sequence(vec![Value::Int(1)])]),
        ),
        ("EXIF:Artist", Value::from("Jane")),
    ]);
    let encoded = ExifCodec::standard().encode(&input).unwrap();

    assert_eq!(encoded.diagnostics.len(), 1);
    assert_eq!(encoded.diagnostics[0].key, "EXIF:Model");
    assert_eq!(
        encoded.diagnostics[0].kind,
        DiagnosticKind::Dropped(EncodeError::NestedValue)
    );

    let decoded = ExifCodec::standard().decode(&encoded.bytes).unwrap();
    assert_eq!(decoded.get("EXIF:Make"), Some(&Value::from("Canon")));
    assert_eq!(decoded.get("EXIF:Artist"), Some(&Value::from("Jane")));
    assert!(!decoded.contains_key("EXIF:Model"));
}

#[test]
fn test_exif_only_tags_land_in_exif_ifd() {
    let input = tags(&[
        ("EXIF:Make", Value::from("Acme")),
        ("EXIF:ISO", Value::Int(800)),
        ("EXIF:FNumber", Value::Rational(4.0)),
    ]);
    let encoded = ExifCodec::standard().encode(&input).unwrap();
    let data = &encoded.bytes;

    let (order, ifd0) = parse_ifd0(data);
    assert!(ifd0.get_entry_by_tag(0x010F).is_some());
    assert!(ifd0.get_entry_by_tag(0x8827).is_none());

    let exif = follow(data, order, &ifd0, 0x8769);
    assert!(exif.get_entry_by_tag(0x8827).is_some());
    assert!(exif.get_entry_by_tag(0x829D).is_some());
    assert!(exif.get_entry_by_tag(0x9000).is_some());
}

#[test]
fn test_streams_validate_in_both_orders() {
    let input = tags(&[
        ("EXIF:Make", Value::from("Acme")),
        ("EXIF:Software", Value::from("a fairly long software string")),
        ("EXIF:BitsPerSample", Value::from(vec![8i64, 8, 8])),
        ("EXIF:ExposureTime", Value::Rational(0.004)),
        ("GPS:GPSLatitudeRef", Value::from("S")),
        ("GPS:GPSLongitude", Value::from(vec![13.0, 24.0, 36.5])),
        ("InteropIFD:InteropIndex", Value::from("R98")),
        ("IFD1:Compression", Value::Int(6)),
    ]);

    for order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
        let encoded = codec(order).encode(&input).unwrap();
        assert!(encoded.diagnostics.is_empty(), "{:?}", encoded.diagnostics);

        let result = validate_stream(&encoded.bytes);
        assert!(result.is_valid, "{:?}: {:?}", order, result.errors);

        let data = &encoded.bytes;
        let (order, ifd0) = parse_ifd0(data);
        let exif = follow(data, order, &ifd0, 0x8769);
        let gps = follow(data, order, &ifd0, 0x8825);
        let interop = follow(data, order, &exif, 0xA005);
        let ifd1 = Ifd::parse(data, ifd0.next_ifd_offset, order).unwrap();

        for ifd in [&ifd0, &exif, &gps, &interop, &ifd1] {
            assert_ascending(ifd);
        }
        assert_eq!(ifd1.entries.len(), 1);
    }
}

#[test]
fn test_big_endian_header() {
    let encoded = codec(ByteOrder::BigEndian).encode(&TagMap::new()).unwrap();
    assert_eq!(&encoded.bytes[0..4], b"MM\0*");
    assert_eq!(&encoded.bytes[4..8], &[0, 0, 0, 8]);
}

#[test]
fn test_structural_and_unknown_keys_reported() {
    let input = tags(&[
        ("IFD0:0x0111", Value::Int(1234)),
        ("EXIF:NoSuchTag", Value::Int(1)),
        ("Maker:Thing", Value::Int(1)),
        ("EXIF:Make", Value::from("Acme")),
    ]);
    let encoded = ExifCodec::standard().encode(&input).unwrap();

    let find = |key: &str| {
        encoded
            .diagnostics
            .iter()
            .find(|d| d.key == key)
            .map(|d| d.kind.clone())
    };
    assert_eq!(
        find("IFD0:0x0111"),
        Some(DiagnosticKind::Dropped(EncodeError::StructuralTag { id: 0x0111 }))
    );
    assert!(matches!(
        find("EXIF:NoSuchTag"),
        Some(DiagnosticKind::Dropped(EncodeError::UnknownTag { .. }))
    ));
    assert!(matches!(
        find("Maker:Thing"),
        Some(DiagnosticKind::Dropped(EncodeError::UnknownNamespace { .. }))
    ));

    let (_, ifd0) = parse_ifd0(&encoded.bytes);
    assert!(ifd0.get_entry_by_tag(0x0111).is_none());
}

#[test]
fn test_value_shapes_survive_decoding() {
    let input = tags(&[
        ("EXIF:Artist", Value::from("Zoë")),
        ("EXIF:ImageWidth", Value::Int(70000)),
        ("EXIF:ExposureCompensation", Value::Rational(-0.5)),
        ("EXIF:MakerNote", Value::Bytes(vec![0x00, 0xFF, 0x10, 0x80, 0x7F])),
        ("EXIF:UserComment", Value::from("hello")),
        ("GPS:GPSVersionID", Value::from(vec![2i64, 3, 0, 0])),
        ("EXIF:XPTitle", Value::from("Zoë")),
    ]);

    for order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
        let codec = codec(order);
        let encoded = codec.encode(&input).unwrap();
        assert!(encoded.diagnostics.is_empty(), "{:?}", encoded.diagnostics);

        let decoded = codec.decode(&encoded.bytes).unwrap();
        for (key, value) in &input {
            assert_eq!(decoded.get(key), Some(value), "{} in {:?}", key, order);
        }

        // XP* text is UTF-16LE BYTE data in either byte order
        let (data_order, ifd0) = parse_ifd0(&encoded.bytes);
        let entry = ifd0.get_entry_by_tag(0x9C9B).unwrap();
        assert_eq!(entry.field_type_raw, 1);
        assert_eq!(entry.count, 8);
        let raw = ValueReader::new(&encoded.bytes, data_order).read_bytes(entry).unwrap();
        assert_eq!(&raw[..], &[b'Z', 0, b'o', 0, 0xEB, 0, 0, 0][..]);
    }
}

#[test]
fn test_utf8_text_lossy_before_exif_3() {
    let codec = ExifCodec::new(
        TagRegistry::standard(),
        EncodeOptions {
            exif_version: "0232".parse().unwrap(),
            ..EncodeOptions::default()
        },
    );
    let encoded = codec.encode(&tags(&[("EXIF:Artist", Value::from("Zoë"))])).unwrap();

    assert_eq!(encoded.diagnostics.len(), 1);
    assert!(matches!(encoded.diagnostics[0].kind, DiagnosticKind::Lossy(_)));

    let decoded = codec.decode(&encoded.bytes).unwrap();
    assert_eq!(decoded.get("EXIF:ExifVersion"), Some(&Value::from("0232")));
}

// =============================================================================
// Decode Tests
// =============================================================================

#[test]
fn test_decode_hand_built_tiff() {
    for order in [ByteOrderType::LittleEndian, ByteOrderType::BigEndian] {
        let data = create_camera_tiff(order);
        let decoded = ExifCodec::standard().decode(&data).unwrap();

        assert_eq!(decoded.get("EXIF:Make"), Some(&Value::from("Acme")));
        assert_eq!(decoded.get("EXIF:Model"), Some(&Value::from("Shooter 3000")));
        assert_eq!(decoded.get("EXIF:ImageWidth"), Some(&Value::Int(4)));
        assert_eq!(decoded.get("EXIF:FNumber"), Some(&Value::Rational(2.8)));
        assert_eq!(decoded.get("EXIF:ISO"), Some(&Value::Int(400)));
        assert_eq!(decoded.get("EXIF:ExifVersion"), Some(&Value::from("0232")));
        assert_eq!(decoded.get("GPS:GPSLatitudeRef"), Some(&Value::from("N")));
        assert_eq!(
            decoded.get("GPS:GPSLatitude"),
            Some(&Value::from(vec![52.0, 30.0, 12.34]))
        );
        assert_eq!(decoded.get("IFD1:Compression"), Some(&Value::Int(6)));

        // Layout tags never reach the map
        assert!(decoded.keys().all(|k| !k.contains("Strip") && !k.contains("Pointer")));
    }
}

#[test]
fn test_hand_built_tiff_validates() {
    let data = create_camera_tiff(ByteOrderType::BigEndian);
    let result = validate_stream(&data);
    assert!(result.is_valid, "{:?}", result.errors);
}

//! Rewrite integration tests.
//!
//! Tests verify:
//! - Strip and tile payloads survive a rewrite byte for byte
//! - Offsets follow the payload to its new location
//! - The IFD1 thumbnail is carried over, as a JPEG or as strips
//! - Image data outside IFD0 and IFD1 refuses the rewrite
//! - Rewriting is idempotent
//! - Rewritten files replace the original atomically

use std::fs;

use exif_rewrite::{
    validate_stream, write_atomic, ByteOrder, ContainerFormat, EncodeOptions, ExifCodec,
    PayloadLayout, TagDiff, TagRegistry, Value, WriteError,
};

use super::test_utils::{
    create_camera_tiff, create_test_jpeg, create_tiled_tiff, is_valid_jpeg, parse_ifd0,
    read_longs, ByteOrderType, EntryValue, TiffBuilder,
};

fn diff(pairs: &[(&str, Option<Value>)]) -> TagDiff {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// A little-endian directory of `(tag, type, count, value)` entries.
fn le_directory(entries: &[(u16, u16, u32, u32)], next: u32) -> Vec<u8> {
    let mut ifd = (entries.len() as u16).to_le_bytes().to_vec();
    for &(tag, ty, count, value) in entries {
        ifd.extend_from_slice(&tag.to_le_bytes());
        ifd.extend_from_slice(&ty.to_le_bytes());
        ifd.extend_from_slice(&count.to_le_bytes());
        ifd.extend_from_slice(&value.to_le_bytes());
    }
    ifd.extend_from_slice(&next.to_le_bytes());
    ifd
}

// =============================================================================
// Payload Tests
// =============================================================================

#[test]
fn test_single_strip_identical_after_rewrite() {
    let strip: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 251) as u8).collect();
    let original = TiffBuilder::new(ByteOrderType::LittleEndian)
        .ifd0(271, EntryValue::ascii("Acme"))
        .strips(vec![strip.clone()])
        .build();

    let codec = ExifCodec::standard();
    let rewritten = codec.rewrite(&original, &TagDiff::new()).unwrap();
    let data = &rewritten.bytes;

    let (order, ifd0) = parse_ifd0(data);
    let offsets = read_longs(data, order, &ifd0, 273);
    let counts = read_longs(data, order, &ifd0, 279);
    assert_eq!(counts, vec![1000]);
    assert_eq!(offsets.len(), 1);

    let start = offsets[0] as usize;
    assert_eq!(&data[start..start + 1000], strip.as_slice());
    assert!(validate_stream(data).is_valid);
}

#[test]
fn test_strips_follow_growing_metadata() {
    let original = create_camera_tiff(ByteOrderType::BigEndian);
    let codec = ExifCodec::standard();
    let before = codec.preserve_image_data(&original).unwrap();

    let long_text = "x".repeat(500);
    let rewritten = codec
        .rewrite(
            &original,
            &diff(&[("EXIF:ImageDescription", Some(Value::from(long_text.as_str())))]),
        )
        .unwrap();

    let after = codec.preserve_image_data(&rewritten.bytes).unwrap();
    assert_eq!(after.layout, PayloadLayout::Strips);
    assert_eq!(after.byte_counts, vec![9, 7]);
    assert_eq!(after.data, before.data);
    assert_eq!(after.digest(), before.digest());
    assert!(after.original_offsets[0] > before.original_offsets[0] + 500);

    let decoded = codec.decode(&rewritten.bytes).unwrap();
    assert_eq!(
        decoded.get("EXIF:ImageDescription"),
        Some(&Value::from(long_text.as_str()))
    );
}

#[test]
fn test_tiles_preserved() {
    for order in [ByteOrderType::LittleEndian, ByteOrderType::BigEndian] {
        let original = create_tiled_tiff(order);
        let codec = ExifCodec::standard();
        let before = codec.preserve_image_data(&original).unwrap();
        assert_eq!(before.layout, PayloadLayout::Tiles);

        let rewritten = codec
            .rewrite(&original, &diff(&[("EXIF:Artist", Some(Value::from("Jane")))]))
            .unwrap();
        let after = codec.preserve_image_data(&rewritten.bytes).unwrap();

        assert_eq!(after.layout, PayloadLayout::Tiles);
        assert_eq!(after.byte_counts, vec![10, 11, 12, 13]);
        assert_eq!(after.data, before.data);

        let (_, ifd0) = parse_ifd0(&rewritten.bytes);
        assert!(ifd0.get_entry_by_tag(273).is_none());
        assert!(validate_stream(&rewritten.bytes).is_valid);
    }
}

#[test]
fn test_thumbnail_preserved() {
    let original = create_camera_tiff(ByteOrderType::LittleEndian);
    let thumbnail = create_test_jpeg(16, 16, 70);

    let rewritten = ExifCodec::standard()
        .rewrite(&original, &diff(&[("EXIF:Software", None)]))
        .unwrap();
    let data = &rewritten.bytes;

    let (order, ifd0) = parse_ifd0(data);
    assert_ne!(ifd0.next_ifd_offset, 0);
    let ifd1 = exif_rewrite::Ifd::parse(data, ifd0.next_ifd_offset, order).unwrap();
    let offset = read_longs(data, order, &ifd1, 0x0201)[0] as usize;
    let length = read_longs(data, order, &ifd1, 0x0202)[0] as usize;

    assert_eq!(length, thumbnail.len());
    assert_eq!(&data[offset..offset + length], thumbnail.as_slice());
    assert!(is_valid_jpeg(&data[offset..offset + length]));
}

#[test]
fn test_strip_thumbnail_preserved() {
    // IFD0 at 8, IFD1 at 26 (5 entries), offsets array at 92, strips at 100
    // and 112
    let mut original = b"II*\0\x08\0\0\0".to_vec();
    original.extend(le_directory(&[(0x0112, 3, 1, 1)], 26));
    original.extend(le_directory(
        &[
            (0x0100, 3, 1, 4),
            (0x0101, 3, 1, 2),
            (0x0103, 3, 1, 1),
            (273, 4, 2, 92),
            (279, 3, 2, u32::from_le_bytes([12, 0, 12, 0])),
        ],
        0,
    ));
    original.extend_from_slice(&100u32.to_le_bytes());
    original.extend_from_slice(&112u32.to_le_bytes());
    original.extend_from_slice(b"RGBRGBRGBRGB");
    original.extend_from_slice(b"rgbrgbrgbrgb");
    assert_eq!(original.len(), 124);

    let codec = ExifCodec::standard();
    let rewritten = codec
        .rewrite(&original, &diff(&[("EXIF:Artist", Some(Value::from("Jane")))]))
        .unwrap();
    let data = &rewritten.bytes;
    assert!(rewritten.diagnostics.is_empty());

    let (order, ifd0) = parse_ifd0(data);
    let ifd1 = exif_rewrite::Ifd::parse(data, ifd0.next_ifd_offset, order).unwrap();
    assert!(ifd1.get_entry_by_tag(0x0201).is_none());

    let offsets = read_longs(data, order, &ifd1, 273);
    assert_eq!(read_longs(data, order, &ifd1, 279), vec![12, 12]);
    let first = offsets[0] as usize;
    let second = offsets[1] as usize;
    assert_eq!(&data[first..first + 12], b"RGBRGBRGBRGB");
    assert_eq!(&data[second..second + 12], b"rgbrgbrgbrgb");

    let tags = codec.decode(data).unwrap();
    assert_eq!(tags.get("IFD1:Compression"), Some(&Value::Int(1)));
    assert_eq!(tags.get("EXIF:Artist"), Some(&Value::from("Jane")));
    assert!(validate_stream(data).is_valid);
}

// =============================================================================
// Uncarried Image Data Tests
// =============================================================================

#[test]
fn test_sub_ifd_raw_data_refuses_rewrite() {
    // IFD0 at 8 points at a SubIFD at 38 whose strip sits at 80
    let mut original = b"II*\0\x08\0\0\0".to_vec();
    original.extend(le_directory(&[(0x0112, 3, 1, 1), (0x014A, 4, 1, 38)], 0));
    original.extend(le_directory(&[(0x00FE, 4, 1, 0), (273, 4, 1, 80), (279, 4, 1, 16)], 0));
    original.extend_from_slice(b"RAWSENSORPIXELS!");
    assert_eq!(original.len(), 96);

    let codec = ExifCodec::standard();
    let artist = diff(&[("EXIF:Artist", Some(Value::from("Jane")))]);

    assert!(matches!(
        codec.rewrite(&original, &artist),
        Err(WriteError::UncarriedImageData { location: "SubIFDs" })
    ));
    assert!(matches!(
        codec.rewrite_container(&original, ContainerFormat::Tiff, &artist),
        Err(WriteError::UncarriedImageData { .. })
    ));

    // reading is unaffected
    let tags = codec.decode(&original).unwrap();
    assert_eq!(tags.get("EXIF:Orientation"), Some(&Value::Int(1)));
}

#[test]
fn test_ifd2_raw_data_refuses_rewrite() {
    // IFD0 at 8, IFD1 at 26, IFD2 at 44 with its strip at 74
    let mut original = b"II*\0\x08\0\0\0".to_vec();
    original.extend(le_directory(&[(0x0112, 3, 1, 1)], 26));
    original.extend(le_directory(&[(0x0103, 3, 1, 6)], 44));
    original.extend(le_directory(&[(273, 4, 1, 74), (279, 4, 1, 16)], 0));
    original.extend_from_slice(b"RAWSENSORPIXELS!");
    assert_eq!(original.len(), 90);

    let result = ExifCodec::standard().rewrite(&original, &TagDiff::new());
    assert!(matches!(
        result,
        Err(WriteError::UncarriedImageData { location: "IFD2" })
    ));
}

// =============================================================================
// Rewrite Semantics Tests
// =============================================================================

#[test]
fn test_rewrite_applies_diff_and_keeps_the_rest() {
    let original = create_camera_tiff(ByteOrderType::BigEndian);
    let codec = ExifCodec::standard();

    let rewritten = codec
        .rewrite(
            &original,
            &diff(&[
                ("EXIF:Software", None),
                ("EXIF:Make", Some(Value::from("Other"))),
                ("GPS:GPSAltitude", Some(Value::Rational(120.5))),
            ]),
        )
        .unwrap();
    assert!(rewritten.diagnostics.is_empty());

    let before = codec.decode(&original).unwrap();
    let after = codec.decode(&rewritten.bytes).unwrap();

    assert!(!after.contains_key("EXIF:Software"));
    assert_eq!(after.get("EXIF:Make"), Some(&Value::from("Other")));
    assert_eq!(after.get("GPS:GPSAltitude"), Some(&Value::Rational(120.5)));
    for key in ["EXIF:Model", "EXIF:FNumber", "EXIF:ISO", "GPS:GPSLatitude", "IFD1:Compression"] {
        assert_eq!(after.get(key), before.get(key), "{}", key);
    }
    assert_eq!(&rewritten.bytes[0..2], b"MM");
}

#[test]
fn test_rewrite_idempotent() {
    let original = create_camera_tiff(ByteOrderType::LittleEndian);
    let codec = ExifCodec::standard();

    let once = codec.rewrite(&original, &TagDiff::new()).unwrap();
    let twice = codec.rewrite(&once.bytes, &TagDiff::new()).unwrap();

    assert_eq!(once.bytes, twice.bytes);
    assert!(once.diagnostics.is_empty());
}

#[test]
fn test_rewrite_switches_byte_order() {
    let original = create_camera_tiff(ByteOrderType::LittleEndian);
    let codec = ExifCodec::new(
        TagRegistry::standard(),
        EncodeOptions {
            byte_order: Some(ByteOrder::BigEndian),
            ..EncodeOptions::default()
        },
    );

    let rewritten = codec.rewrite(&original, &TagDiff::new()).unwrap();
    assert_eq!(&rewritten.bytes[0..2], b"MM");
    assert!(validate_stream(&rewritten.bytes).is_valid);

    let standard = ExifCodec::standard();
    assert_eq!(
        standard.decode(&rewritten.bytes).unwrap(),
        standard.decode(&original).unwrap()
    );
    assert_eq!(
        standard.preserve_image_data(&rewritten.bytes).unwrap().data,
        standard.preserve_image_data(&original).unwrap().data
    );
}

#[test]
fn test_rewrite_rejects_out_of_bounds_payload() {
    let mut original = create_camera_tiff(ByteOrderType::LittleEndian);
    // Cut into the strip data
    let keep = original.len() - create_test_jpeg(16, 16, 70).len() - 4;
    original.truncate(keep);

    assert!(ExifCodec::standard()
        .rewrite(&original, &TagDiff::new())
        .is_err());
}

// =============================================================================
// File Tests
// =============================================================================

#[test]
fn test_write_atomic_replaces_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("photo.tif");
    fs::write(&path, create_camera_tiff(ByteOrderType::LittleEndian)).unwrap();

    let original = fs::read(&path).unwrap();
    let rewritten = ExifCodec::standard()
        .rewrite(&original, &diff(&[("EXIF:Artist", Some(Value::from("Jane")))]))
        .unwrap();
    write_atomic(&path, &rewritten.bytes).unwrap();

    let on_disk = fs::read(&path).unwrap();
    assert_eq!(on_disk, rewritten.bytes);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

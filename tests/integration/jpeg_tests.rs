//! JPEG container integration tests.
//!
//! Tests verify:
//! - An EXIF segment is inserted into a JPEG that has none
//! - An existing segment is replaced in place
//! - Everything outside the APP1 segment is left untouched
//! - Streams too large for one segment are rejected

use exif_rewrite::format::jpeg::{extract_exif, find_exif_segment, segments, MAX_EXIF_LEN};
use exif_rewrite::{
    detect_container, ContainerFormat, EncodeOptions, ExifCodec, OutputKind, TagDiff, TagMap,
    TagRegistry, Value, WriteError,
};

use super::test_utils::{
    create_camera_tiff, create_test_jpeg, is_valid_jpeg, jpeg_with_exif, ByteOrderType,
};

fn diff(pairs: &[(&str, Option<Value>)]) -> TagDiff {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

// =============================================================================
// Insert and Replace Tests
// =============================================================================

#[test]
fn test_insert_exif_into_plain_jpeg() {
    let jpeg = create_test_jpeg(32, 24, 80);
    assert!(find_exif_segment(&jpeg).is_none());
    assert_eq!(detect_container(&jpeg, Some("jpg")).unwrap(), ContainerFormat::Jpeg);

    let codec = ExifCodec::standard();
    let encoded = codec
        .rewrite_container(
            &jpeg,
            ContainerFormat::Jpeg,
            &diff(&[
                ("EXIF:Make", Some(Value::from("Acme"))),
                ("EXIF:DateTimeOriginal", Some(Value::from("2024:05:01 12:00:00"))),
            ]),
        )
        .unwrap();
    let out = &encoded.bytes;

    assert!(is_valid_jpeg(out));
    let segment = find_exif_segment(out).unwrap();
    let segment_len = segment.range.len();
    assert_eq!(out.len(), jpeg.len() + segment_len);

    // Bytes before and after the new segment are the original file
    assert_eq!(&out[..segment.range.start], &jpeg[..segment.range.start]);
    assert_eq!(&out[segment.range.end..], &jpeg[segment.range.start..]);

    let decoded = codec.decode(extract_exif(out).unwrap()).unwrap();
    assert_eq!(decoded.get("EXIF:Make"), Some(&Value::from("Acme")));
    assert_eq!(
        decoded.get("EXIF:DateTimeOriginal"),
        Some(&Value::from("2024:05:01 12:00:00"))
    );
}

#[test]
fn test_replace_existing_segment() {
    let jpeg = create_test_jpeg(32, 24, 80);
    let tiff = create_camera_tiff(ByteOrderType::BigEndian);
    let original = jpeg_with_exif(&jpeg, &tiff);

    let codec = ExifCodec::standard();
    let encoded = codec
        .rewrite_container(
            &original,
            ContainerFormat::Jpeg,
            &diff(&[("EXIF:Model", Some(Value::from("Shooter 4000")))]),
        )
        .unwrap();
    let out = &encoded.bytes;

    let exif_segments = segments(out)
        .into_iter()
        .filter(|s| s.marker == 0xE1)
        .count();
    assert_eq!(exif_segments, 1);

    let stream = extract_exif(out).unwrap();
    assert_eq!(&stream[0..2], b"MM");

    let decoded = codec.decode(stream).unwrap();
    assert_eq!(decoded.get("EXIF:Model"), Some(&Value::from("Shooter 4000")));
    assert_eq!(decoded.get("EXIF:Make"), Some(&Value::from("Acme")));

    // Strips carried inside the APP1 stream survive
    let payload = codec.preserve_image_data(stream).unwrap();
    assert_eq!(payload.byte_counts, vec![9, 7]);

    // Entropy-coded data after the segment is unchanged
    let old_end = find_exif_segment(&original).unwrap().range.end;
    let new_end = find_exif_segment(out).unwrap().range.end;
    assert_eq!(&out[new_end..], &original[old_end..]);
}

#[test]
fn test_app1_output_option() {
    let codec = ExifCodec::new(
        TagRegistry::standard(),
        EncodeOptions {
            output: OutputKind::JpegApp1,
            ..EncodeOptions::default()
        },
    );
    let mut tags = TagMap::new();
    tags.insert("EXIF:Artist".to_string(), Value::from("Jane"));
    let segment = codec.encode(&tags).unwrap().bytes;

    // A JPEG built from SOI + segment + the rest of an encoded image
    let jpeg = create_test_jpeg(8, 8, 50);
    let mut assembled = jpeg[..2].to_vec();
    assembled.extend_from_slice(&segment);
    assembled.extend_from_slice(&jpeg[2..]);

    let stream = extract_exif(&assembled).unwrap();
    let decoded = ExifCodec::standard().decode(stream).unwrap();
    assert_eq!(decoded.get("EXIF:Artist"), Some(&Value::from("Jane")));
}

// =============================================================================
// Error Tests
// =============================================================================

#[test]
fn test_oversized_stream_rejected() {
    let jpeg = create_test_jpeg(8, 8, 50);
    let big = "x".repeat(MAX_EXIF_LEN);

    let result = ExifCodec::standard().rewrite_container(
        &jpeg,
        ContainerFormat::Jpeg,
        &diff(&[("EXIF:ImageDescription", Some(Value::from(big.as_str())))]),
    );
    assert!(matches!(result, Err(WriteError::SegmentTooLarge { .. })));
}

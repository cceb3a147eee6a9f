//! Test utilities for integration tests.
//!
//! Fixtures are assembled independently of the crate's own writer, so the
//! tests compare the codec against hand-laid streams rather than against
//! itself.

use image::codecs::jpeg::JpegEncoder;
use image::{GrayImage, Luma};

use exif_rewrite::{ByteOrder, Ifd, TiffHeader, ValueReader};

// =============================================================================
// Test JPEG Creation
// =============================================================================

/// Create a test JPEG image with a simple gradient pattern.
pub fn create_test_jpeg(width: u32, height: u32, quality: u8) -> Vec<u8> {
    let img = GrayImage::from_fn(width, height, |x, y| {
        let val = ((x + y) % 256) as u8;
        Luma([val])
    });

    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder.encode_image(&img).unwrap();
    buf
}

// =============================================================================
// TIFF File Builder
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteOrderType {
    LittleEndian,
    BigEndian,
}

/// Typed value of a fixture entry.
#[derive(Clone, Debug)]
pub enum EntryValue {
    Ascii(String),
    Short(Vec<u16>),
    Long(Vec<u32>),
    Rational(Vec<(u32, u32)>),
    Undefined(Vec<u8>),
}

impl EntryValue {
    pub fn ascii(s: &str) -> Self {
        EntryValue::Ascii(s.to_string())
    }

    fn field_type(&self) -> u16 {
        match self {
            EntryValue::Ascii(_) => 2,
            EntryValue::Short(_) => 3,
            EntryValue::Long(_) => 4,
            EntryValue::Rational(_) => 5,
            EntryValue::Undefined(_) => 7,
        }
    }

    fn count(&self) -> u32 {
        match self {
            EntryValue::Ascii(s) => s.len() as u32 + 1,
            EntryValue::Short(v) => v.len() as u32,
            EntryValue::Long(v) => v.len() as u32,
            EntryValue::Rational(v) => v.len() as u32,
            EntryValue::Undefined(v) => v.len() as u32,
        }
    }

    fn encode(&self, order: ByteOrderType) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            EntryValue::Ascii(s) => {
                out.extend_from_slice(s.as_bytes());
                out.push(0);
            }
            EntryValue::Short(v) => v.iter().for_each(|&x| write_value(&mut out, order, x as u64, 2)),
            EntryValue::Long(v) => v.iter().for_each(|&x| write_value(&mut out, order, x as u64, 4)),
            EntryValue::Rational(v) => v.iter().for_each(|&(n, d)| {
                write_value(&mut out, order, n as u64, 4);
                write_value(&mut out, order, d as u64, 4);
            }),
            EntryValue::Undefined(v) => out.extend_from_slice(v),
        }
        out
    }
}

/// Builder for classic TIFF streams with IFD0, Exif, GPS, strips or tiles,
/// and an IFD1 thumbnail.
///
/// Layout: header, IFD0, Exif, GPS, IFD1, payload segments, thumbnail.
pub struct TiffBuilder {
    byte_order: ByteOrderType,
    ifd0: Vec<(u16, EntryValue)>,
    exif: Vec<(u16, EntryValue)>,
    gps: Vec<(u16, EntryValue)>,
    segments: Vec<Vec<u8>>,
    tiled: bool,
    thumbnail: Option<Vec<u8>>,
}

impl TiffBuilder {
    pub fn new(byte_order: ByteOrderType) -> Self {
        Self {
            byte_order,
            ifd0: Vec::new(),
            exif: Vec::new(),
            gps: Vec::new(),
            segments: Vec::new(),
            tiled: false,
            thumbnail: None,
        }
    }

    pub fn ifd0(mut self, tag: u16, value: EntryValue) -> Self {
        self.ifd0.push((tag, value));
        self
    }

    pub fn exif(mut self, tag: u16, value: EntryValue) -> Self {
        self.exif.push((tag, value));
        self
    }

    pub fn gps(mut self, tag: u16, value: EntryValue) -> Self {
        self.gps.push((tag, value));
        self
    }

    /// Image data as strips (StripOffsets / StripByteCounts).
    pub fn strips(mut self, segments: Vec<Vec<u8>>) -> Self {
        self.segments = segments;
        self.tiled = false;
        self
    }

    /// Image data as tiles (TileOffsets / TileByteCounts).
    pub fn tiles(mut self, segments: Vec<Vec<u8>>) -> Self {
        self.segments = segments;
        self.tiled = true;
        self
    }

    pub fn thumbnail(mut self, jpeg: Vec<u8>) -> Self {
        self.thumbnail = Some(jpeg);
        self
    }

    /// Build the TIFF file data.
    pub fn build(self) -> Vec<u8> {
        let order = self.byte_order;
        let (offsets_tag, counts_tag) = if self.tiled { (324, 325) } else { (273, 279) };
        let segment_count = self.segments.len();

        // Pass 1: entries with placeholder offsets, to size every directory
        let mut ifd0 = self.ifd0.clone();
        if !self.exif.is_empty() {
            ifd0.push((0x8769, EntryValue::Long(vec![0])));
        }
        if !self.gps.is_empty() {
            ifd0.push((0x8825, EntryValue::Long(vec![0])));
        }
        if segment_count > 0 {
            ifd0.push((offsets_tag, EntryValue::Long(vec![0; segment_count])));
            let counts = self.segments.iter().map(|s| s.len() as u32).collect();
            ifd0.push((counts_tag, EntryValue::Long(counts)));
        }
        let mut ifd1 = Vec::new();
        if let Some(thumbnail) = &self.thumbnail {
            ifd1.push((259, EntryValue::Short(vec![6])));
            ifd1.push((0x0201, EntryValue::Long(vec![0])));
            ifd1.push((0x0202, EntryValue::Long(vec![thumbnail.len() as u32])));
        }

        let ifd0_at = 8u32;
        let exif_at = ifd0_at + ifd_size(&ifd0, order);
        let gps_at = exif_at + optional_size(&self.exif, order);
        let ifd1_at = gps_at + optional_size(&self.gps, order);
        let payload_at = ifd1_at + optional_size(&ifd1, order);

        let mut segment_offsets = Vec::with_capacity(segment_count);
        let mut pos = payload_at;
        for segment in &self.segments {
            segment_offsets.push(pos);
            pos += segment.len() as u32;
        }
        let thumbnail_at = pos;

        // Pass 2: real offsets
        for (tag, value) in ifd0.iter_mut() {
            match *tag {
                0x8769 => *value = EntryValue::Long(vec![exif_at]),
                0x8825 => *value = EntryValue::Long(vec![gps_at]),
                t if t == offsets_tag => *value = EntryValue::Long(segment_offsets.clone()),
                _ => {}
            }
        }
        for (tag, value) in ifd1.iter_mut() {
            if *tag == 0x0201 {
                *value = EntryValue::Long(vec![thumbnail_at]);
            }
        }

        let mut data = Vec::new();
        match order {
            ByteOrderType::LittleEndian => data.extend_from_slice(b"II"),
            ByteOrderType::BigEndian => data.extend_from_slice(b"MM"),
        }
        write_value(&mut data, order, 42, 2);
        write_value(&mut data, order, ifd0_at as u64, 4);

        let next = if ifd1.is_empty() { 0 } else { ifd1_at };
        data.extend(serialize_ifd(&ifd0, ifd0_at, next, order));
        if !self.exif.is_empty() {
            data.extend(serialize_ifd(&self.exif, exif_at, 0, order));
        }
        if !self.gps.is_empty() {
            data.extend(serialize_ifd(&self.gps, gps_at, 0, order));
        }
        if !ifd1.is_empty() {
            data.extend(serialize_ifd(&ifd1, ifd1_at, 0, order));
        }
        assert_eq!(data.len() as u32, payload_at);

        for segment in &self.segments {
            data.extend_from_slice(segment);
        }
        if let Some(thumbnail) = &self.thumbnail {
            data.extend_from_slice(thumbnail);
        }
        data
    }
}

fn optional_size(entries: &[(u16, EntryValue)], order: ByteOrderType) -> u32 {
    if entries.is_empty() {
        0
    } else {
        ifd_size(entries, order)
    }
}

fn ifd_size(entries: &[(u16, EntryValue)], order: ByteOrderType) -> u32 {
    let external: usize = entries
        .iter()
        .map(|(_, v)| v.encode(order).len())
        .filter(|&len| len > 4)
        .map(|len| len + len % 2)
        .sum();
    (2 + 12 * entries.len() + 4 + external) as u32
}

fn serialize_ifd(entries: &[(u16, EntryValue)], at: u32, next: u32, order: ByteOrderType) -> Vec<u8> {
    let mut sorted: Vec<&(u16, EntryValue)> = entries.iter().collect();
    sorted.sort_by_key(|(tag, _)| *tag);

    let mut out = Vec::new();
    let mut external = Vec::new();
    let data_at = at + 2 + 12 * entries.len() as u32 + 4;

    write_value(&mut out, order, entries.len() as u64, 2);
    for (tag, value) in sorted {
        write_value(&mut out, order, *tag as u64, 2);
        write_value(&mut out, order, value.field_type() as u64, 2);
        write_value(&mut out, order, value.count() as u64, 4);

        let bytes = value.encode(order);
        if bytes.len() <= 4 {
            let mut inline = bytes;
            inline.resize(4, 0);
            out.extend_from_slice(&inline);
        } else {
            write_value(&mut out, order, (data_at + external.len() as u32) as u64, 4);
            external.extend_from_slice(&bytes);
            if external.len() % 2 == 1 {
                external.push(0);
            }
        }
    }
    write_value(&mut out, order, next as u64, 4);
    out.extend(external);
    out
}

fn write_value(data: &mut Vec<u8>, byte_order: ByteOrderType, value: u64, size: usize) {
    match byte_order {
        ByteOrderType::LittleEndian => match size {
            1 => data.push(value as u8),
            2 => data.extend(&(value as u16).to_le_bytes()),
            4 => data.extend(&(value as u32).to_le_bytes()),
            _ => {}
        },
        ByteOrderType::BigEndian => match size {
            1 => data.push(value as u8),
            2 => data.extend(&(value as u16).to_be_bytes()),
            4 => data.extend(&(value as u32).to_be_bytes()),
            _ => {}
        },
    }
}

// =============================================================================
// Standard Fixtures
// =============================================================================

/// Camera-style TIFF: Make/Model in IFD0, exposure tags in Exif, GPS
/// coordinates, two strips of image data and a JPEG thumbnail.
pub fn create_camera_tiff(order: ByteOrderType) -> Vec<u8> {
    TiffBuilder::new(order)
        .ifd0(256, EntryValue::Short(vec![4]))
        .ifd0(257, EntryValue::Short(vec![4]))
        .ifd0(271, EntryValue::ascii("Acme"))
        .ifd0(272, EntryValue::ascii("Shooter 3000"))
        .ifd0(305, EntryValue::ascii("firmware 1.0"))
        .exif(0x829D, EntryValue::Rational(vec![(28, 10)]))
        .exif(0x8827, EntryValue::Short(vec![400]))
        .exif(0x9000, EntryValue::Undefined(b"0232".to_vec()))
        .exif(0x9003, EntryValue::ascii("2024:05:01 12:00:00"))
        .gps(0x0001, EntryValue::ascii("N"))
        .gps(
            0x0002,
            EntryValue::Rational(vec![(52, 1), (30, 1), (1234, 100)]),
        )
        .strips(vec![vec![0xAA; 9], vec![0x55; 7]])
        .thumbnail(create_test_jpeg(16, 16, 70))
        .build()
}

/// TIFF with tiled image data and no sub-directories.
pub fn create_tiled_tiff(order: ByteOrderType) -> Vec<u8> {
    TiffBuilder::new(order)
        .ifd0(256, EntryValue::Long(vec![32]))
        .ifd0(257, EntryValue::Long(vec![32]))
        .ifd0(322, EntryValue::Short(vec![16]))
        .ifd0(323, EntryValue::Short(vec![16]))
        .tiles((0..4u8).map(|i| vec![i; 10 + i as usize]).collect())
        .build()
}

// =============================================================================
// RAW Fixtures
// =============================================================================

/// ORF: a TIFF whose magic is replaced by the Olympus signature.
pub fn create_orf() -> Vec<u8> {
    let mut data = create_camera_tiff(ByteOrderType::LittleEndian);
    data[2..4].copy_from_slice(b"RO");
    data
}

/// RAW file whose TIFF body follows an opaque vendor prefix.
pub fn create_prefixed_raw(prefix_len: usize) -> Vec<u8> {
    let mut data: Vec<u8> = (0..prefix_len).map(|i| (i % 7) as u8 + 1).collect();
    data.extend(create_camera_tiff(ByteOrderType::BigEndian));
    data
}

/// RAF: 108-byte header, embedded JPEG preview carrying the EXIF stream,
/// then a CFA block whose header fields point past the preview.
pub fn create_raf() -> Vec<u8> {
    let tiff = create_camera_tiff(ByteOrderType::BigEndian);
    let preview = jpeg_with_exif(&create_test_jpeg(8, 8, 60), &tiff);

    let jpeg_start = 108u32;
    let jpeg_end = jpeg_start + preview.len() as u32;
    let cfa = vec![0xC3u8; 64];

    let mut data = vec![0u8; 108];
    data[..16].copy_from_slice(b"FUJIFILMCCD-RAW ");
    data[84..88].copy_from_slice(&jpeg_start.to_be_bytes());
    data[88..92].copy_from_slice(&(preview.len() as u32).to_be_bytes());
    data[92..96].copy_from_slice(&jpeg_end.to_be_bytes());
    data[96..100].copy_from_slice(&16u32.to_be_bytes());
    data[100..104].copy_from_slice(&(jpeg_end + 16).to_be_bytes());
    data[104..108].copy_from_slice(&48u32.to_be_bytes());
    data.extend(preview);
    data.extend(cfa);
    data
}

/// MRW: `MRM` block holding a `PRD` block and a `TTW` block with the TIFF,
/// followed by image data outside the `MRM` block.
pub fn create_mrw() -> Vec<u8> {
    let tiff = create_camera_tiff(ByteOrderType::BigEndian);

    let mut blocks = Vec::new();
    blocks.extend_from_slice(b"\0PRD");
    blocks.extend_from_slice(&8u32.to_be_bytes());
    blocks.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
    blocks.extend_from_slice(b"\0TTW");
    blocks.extend_from_slice(&(tiff.len() as u32).to_be_bytes());
    blocks.extend_from_slice(&tiff);

    let mut data = b"\0MRM".to_vec();
    data.extend_from_slice(&(blocks.len() as u32).to_be_bytes());
    data.extend(blocks);
    data.extend_from_slice(&[0xEE; 32]);
    data
}

/// Insert an EXIF APP1 segment right after SOI.
pub fn jpeg_with_exif(jpeg: &[u8], tiff: &[u8]) -> Vec<u8> {
    let mut out = jpeg[..2].to_vec();
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(tiff);
    out.extend_from_slice(&jpeg[2..]);
    out
}

// =============================================================================
// Stream Inspection
// =============================================================================

/// Parse the header and IFD0 of a stream.
pub fn parse_ifd0(data: &[u8]) -> (ByteOrder, Ifd) {
    let header = TiffHeader::parse(data).unwrap();
    let ifd = Ifd::parse(data, header.first_ifd_offset, header.byte_order).unwrap();
    (header.byte_order, ifd)
}

/// Read a LONG array entry of a directory.
pub fn read_longs(data: &[u8], order: ByteOrder, ifd: &Ifd, tag: u16) -> Vec<u32> {
    let entry = ifd.get_entry_by_tag(tag).unwrap();
    ValueReader::new(data, order)
        .read_u32_array(entry)
        .unwrap()
}

/// Check if data starts with a JPEG SOI marker.
pub fn is_valid_jpeg(data: &[u8]) -> bool {
    data.len() >= 4 && data[0] == 0xFF && data[1] == 0xD8 && data.ends_with(&[0xFF, 0xD9])
}

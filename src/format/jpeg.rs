//! JPEG APP1 embedding of EXIF streams.
//!
//! JPEG files carry EXIF as a TIFF stream inside an APP1 marker segment:
//!
//! ```text
//! FF E1 | length (u16 BE, counts itself) | "Exif\0\0" | TIFF stream
//! ```
//!
//! Only the segments before the first SOS are metadata; the walk stops
//! there, so entropy-coded data is never scanned.

use std::ops::Range;

use tracing::debug;

use crate::error::WriteError;

// =============================================================================
// JPEG Markers
// =============================================================================

/// Start Of Image marker
pub const SOI: [u8; 2] = [0xFF, 0xD8];

/// End Of Image marker
pub const EOI: [u8; 2] = [0xFF, 0xD9];

/// Start Of Scan marker
pub const SOS: [u8; 2] = [0xFF, 0xDA];

/// Application segment 0 (JFIF) marker
pub const APP0: [u8; 2] = [0xFF, 0xE0];

/// Application segment 1 (EXIF, XMP) marker
pub const APP1: [u8; 2] = [0xFF, 0xE1];

/// Identifier that opens an EXIF APP1 payload
pub const EXIF_HEADER: &[u8; 6] = b"Exif\0\0";

/// Largest TIFF stream that fits one APP1 segment.
pub const MAX_EXIF_LEN: usize = u16::MAX as usize - 2 - EXIF_HEADER.len();

// =============================================================================
// Segment Walking
// =============================================================================

/// A marker segment before the first scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Marker byte following 0xFF
    pub marker: u8,

    /// Whole segment, from the 0xFF to the end of its payload
    pub range: Range<usize>,
}

impl Segment {
    /// Payload after the length field.
    pub fn payload<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.range.start + 4..self.range.end]
    }

    fn is_exif(&self, data: &[u8]) -> bool {
        self.marker == APP1[1] && self.payload(data).starts_with(EXIF_HEADER)
    }
}

/// Check for the SOI marker.
pub fn is_jpeg(data: &[u8]) -> bool {
    data.len() >= 3 && data[0..2] == SOI && data[2] == 0xFF
}

/// Collect marker segments up to the first SOS or EOI.
///
/// A truncated segment ends the walk.
pub fn segments(data: &[u8]) -> Vec<Segment> {
    let mut found = Vec::new();
    if !is_jpeg(data) {
        return found;
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            break;
        }
        let marker = data[pos + 1];
        match marker {
            // Fill byte
            0xFF => {
                pos += 1;
                continue;
            }
            // Standalone markers carry no length
            0x01 | 0xD0..=0xD7 => {
                pos += 2;
                continue;
            }
            m if m == SOS[1] || m == EOI[1] => break,
            _ => {}
        }

        if pos + 4 > data.len() {
            break;
        }
        let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let end = pos + 2 + length;
        if length < 2 || end > data.len() {
            break;
        }

        found.push(Segment {
            marker,
            range: pos..end,
        });
        pos = end;
    }

    found
}

/// Locate the EXIF APP1 segment.
pub fn find_exif_segment(data: &[u8]) -> Option<Segment> {
    segments(data).into_iter().find(|s| s.is_exif(data))
}

/// TIFF stream of the EXIF APP1 segment, if there is one.
pub fn extract_exif(data: &[u8]) -> Option<&[u8]> {
    find_exif_segment(data).map(|s| &s.payload(data)[EXIF_HEADER.len()..])
}

// =============================================================================
// Segment Writing
// =============================================================================

/// Wrap a TIFF stream in an APP1 segment.
///
/// # Errors
/// `SegmentTooLarge` if the stream exceeds [`MAX_EXIF_LEN`].
pub fn build_exif_segment(tiff: &[u8]) -> Result<Vec<u8>, WriteError> {
    if tiff.len() > MAX_EXIF_LEN {
        return Err(WriteError::SegmentTooLarge { len: tiff.len() });
    }
    let length = (2 + EXIF_HEADER.len() + tiff.len()) as u16;

    let mut segment = Vec::with_capacity(2 + length as usize);
    segment.extend_from_slice(&APP1);
    segment.extend_from_slice(&length.to_be_bytes());
    segment.extend_from_slice(EXIF_HEADER);
    segment.extend_from_slice(tiff);
    Ok(segment)
}

/// Replace the EXIF segment of a JPEG file with a new TIFF stream.
///
/// Without an existing segment, the new one goes right after SOI, or after
/// a leading APP0 (JFIF) segment, which must stay first.
///
/// # Errors
/// - `UnsupportedFormat` if `data` is not a JPEG stream
/// - `SegmentTooLarge` if the stream does not fit one segment
pub fn replace_exif_segment(data: &[u8], tiff: &[u8]) -> Result<Vec<u8>, WriteError> {
    if !is_jpeg(data) {
        return Err(WriteError::UnsupportedFormat {
            reason: "missing JPEG SOI marker".to_string(),
        });
    }
    let segment = build_exif_segment(tiff)?;
    let all = segments(data);

    let (splice, action) = match all.iter().find(|s| s.is_exif(data)) {
        Some(existing) => (existing.range.clone(), "replaced"),
        None => {
            let at = all
                .first()
                .filter(|s| s.marker == APP0[1])
                .map_or(SOI.len(), |s| s.range.end);
            (at..at, "inserted")
        }
    };

    let mut out = Vec::with_capacity(data.len() - splice.len() + segment.len());
    out.extend_from_slice(&data[..splice.start]);
    out.extend_from_slice(&segment);
    out.extend_from_slice(&data[splice.end..]);

    debug!("{} EXIF segment at {} ({} bytes)", action, splice.start, segment.len());
    Ok(out)
}

// =============================================================================
// Tests
// =============================================================================

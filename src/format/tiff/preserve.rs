//! Image payload and thumbnail preservation.
//!
//! A rewrite regenerates every directory, so the pixel data referenced by
//! IFD0 and the thumbnail referenced by IFD1 have to be lifted out of the
//! original stream first. They are copied verbatim and written back after
//! the new directories, with fresh offsets.
//!
//! Tiles take precedence over strips when a directory carries both. A
//! thumbnail is either a JPEG stream or uncompressed strips.
//!
//! Image data hanging off SubIFDs or an IFD2+ chain is never lifted out;
//! [`uncarried_image_data`] reports where it lives so a rewrite can refuse.

use std::fmt;

use bytes::Bytes;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::TiffError;

use super::parser::{Ifd, TiffHeader};
use super::tags::TiffTag;
use super::values::ValueReader;

// =============================================================================
// ImagePayload
// =============================================================================

/// How the pixel data of IFD0 is organized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadLayout {
    Strips,
    Tiles,
    #[default]
    None,
}

impl PayloadLayout {
    /// The offsets and byte counts tags for this layout.
    pub fn tags(self) -> Option<(TiffTag, TiffTag)> {
        match self {
            PayloadLayout::Strips => Some((TiffTag::StripOffsets, TiffTag::StripByteCounts)),
            PayloadLayout::Tiles => Some((TiffTag::TileOffsets, TiffTag::TileByteCounts)),
            PayloadLayout::None => None,
        }
    }
}

impl fmt::Display for PayloadLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PayloadLayout::Strips => "strips",
            PayloadLayout::Tiles => "tiles",
            PayloadLayout::None => "none",
        })
    }
}

/// Pixel data of IFD0, as the concatenation of its strips or tiles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImagePayload {
    pub layout: PayloadLayout,

    /// Length of each segment, in tag order
    pub byte_counts: Vec<u32>,

    /// Where each segment was found in the original stream
    pub original_offsets: Vec<u32>,

    /// All segments back to back
    pub data: Bytes,
}

impl ImagePayload {
    pub fn is_empty(&self) -> bool {
        self.byte_counts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Iterate over the individual segments.
    pub fn segments(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let mut start = 0usize;
        self.byte_counts.iter().map(move |&count| {
            let segment = &self.data[start..start + count as usize];
            start += count as usize;
            segment
        })
    }

    /// Hex SHA-256 of the payload bytes.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(&self.data))
    }

    pub fn summary(&self) -> PayloadSummary {
        PayloadSummary {
            layout: self.layout,
            segments: self.byte_counts.len(),
            bytes: self.data.len(),
            sha256: self.digest(),
        }
    }
}

/// Serializable description of a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadSummary {
    pub layout: PayloadLayout,
    pub segments: usize,
    pub bytes: usize,
    pub sha256: String,
}

/// Image data referenced by IFD1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Thumbnail {
    /// JPEGInterchangeFormat stream
    Jpeg(Bytes),

    /// Uncompressed thumbnail stored as strips or tiles
    Segments(ImagePayload),
}

impl Thumbnail {
    pub fn data(&self) -> &[u8] {
        match self {
            Thumbnail::Jpeg(bytes) => bytes.as_ref(),
            Thumbnail::Segments(payload) => payload.data.as_ref(),
        }
    }

    /// Length of each region to place, a JPEG being a single one.
    pub fn byte_counts(&self) -> Vec<u32> {
        match self {
            Thumbnail::Jpeg(bytes) => vec![bytes.len() as u32],
            Thumbnail::Segments(payload) => payload.byte_counts.clone(),
        }
    }
}

/// Everything a rewrite carries over from the original stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreservedStructure {
    pub payload: ImagePayload,

    pub thumbnail: Option<Thumbnail>,
}

impl PreservedStructure {
    /// Extract payload and thumbnail from a TIFF stream.
    ///
    /// # Errors
    /// Header errors, and any payload range outside `data`, are fatal.
    /// A thumbnail that cannot be read is dropped with a warning.
    pub fn extract(data: &[u8]) -> Result<Self, TiffError> {
        let header = TiffHeader::parse(data)?;
        let ifd0 = Ifd::parse(data, header.first_ifd_offset, header.byte_order)?;
        let reader = ValueReader::new(data, header.byte_order);

        let payload = payload_from_ifd(data, &ifd0, &reader)?;

        let thumbnail = if ifd0.next_ifd_offset == 0 {
            None
        } else {
            match thumbnail_from_ifd1(data, ifd0.next_ifd_offset, &reader) {
                Ok(thumbnail) => thumbnail,
                Err(e) => {
                    warn!("dropping unreadable thumbnail: {}", e);
                    None
                }
            }
        };

        Ok(PreservedStructure { payload, thumbnail })
    }
}

/// Name the directory holding image data that a rewrite cannot carry over.
///
/// Returns `Some("SubIFDs")` when IFD0 points at SubIFDs (NEF, DNG and ARW
/// keep the sensor data there) and `Some("IFD2")` when IFD1 chains to a
/// further directory (CR2 keeps it in IFD3). An unreadable IFD1 or IFD2
/// offset is not counted, as nothing could be read from it anyway.
pub fn uncarried_image_data(data: &[u8]) -> Result<Option<&'static str>, TiffError> {
    let header = TiffHeader::parse(data)?;
    let order = header.byte_order;
    let ifd0 = Ifd::parse(data, header.first_ifd_offset, order)?;

    if ifd0.get_entry_by_tag(TiffTag::SubIfds.as_u16()).is_some() {
        return Ok(Some("SubIFDs"));
    }
    if ifd0.next_ifd_offset == 0 {
        return Ok(None);
    }

    let Ok(ifd1) = Ifd::parse(data, ifd0.next_ifd_offset, order) else {
        return Ok(None);
    };
    if ifd1.next_ifd_offset != 0 && Ifd::parse(data, ifd1.next_ifd_offset, order).is_ok() {
        return Ok(Some("IFD2"));
    }
    Ok(None)
}

/// Extract the IFD0 image payload of a TIFF stream.
pub fn extract_payload(data: &[u8]) -> Result<ImagePayload, TiffError> {
    let header = TiffHeader::parse(data)?;
    let ifd0 = Ifd::parse(data, header.first_ifd_offset, header.byte_order)?;
    let reader = ValueReader::new(data, header.byte_order);
    payload_from_ifd(data, &ifd0, &reader)
}

fn payload_from_ifd(data: &[u8], ifd: &Ifd, reader: &ValueReader<'_>) -> Result<ImagePayload, TiffError> {
    let found = [PayloadLayout::Tiles, PayloadLayout::Strips]
        .into_iter()
        .find_map(|layout| {
            let (offsets_tag, counts_tag) = layout.tags()?;
            let offsets = ifd.get_entry_by_tag(offsets_tag.as_u16())?;
            Some((layout, offsets, ifd.get_entry_by_tag(counts_tag.as_u16())))
        });

    let Some((layout, offsets_entry, counts_entry)) = found else {
        return Ok(ImagePayload::default());
    };

    let counts_entry = counts_entry.ok_or_else(|| TiffError::InvalidTagValue {
        tag: "ByteCounts",
        message: "offsets present without byte counts".to_string(),
    })?;

    let offsets = reader.read_u32_array(offsets_entry)?;
    let byte_counts = reader.read_u32_array(counts_entry)?;
    if offsets.len() != byte_counts.len() {
        return Err(TiffError::InvalidTagValue {
            tag: "ByteCounts",
            message: format!(
                "{} offsets but {} byte counts",
                offsets.len(),
                byte_counts.len()
            ),
        });
    }

    let total: u64 = byte_counts.iter().map(|&c| c as u64).sum();
    let mut buffer = Vec::with_capacity(total as usize);
    for (&offset, &count) in offsets.iter().zip(&byte_counts) {
        buffer.extend_from_slice(checked_range(data, offset, count)?);
    }

    debug!(
        "preserved {:?} payload: {} segments, {} bytes",
        layout,
        byte_counts.len(),
        buffer.len()
    );

    Ok(ImagePayload {
        layout,
        byte_counts,
        original_offsets: offsets,
        data: Bytes::from(buffer),
    })
}

fn thumbnail_from_ifd1(
    data: &[u8],
    offset: u32,
    reader: &ValueReader<'_>,
) -> Result<Option<Thumbnail>, TiffError> {
    let ifd1 = Ifd::parse(data, offset, reader.byte_order())?;
    let order = reader.byte_order();

    let start = ifd1
        .get_entry_by_tag(TiffTag::JpegInterchangeFormat.as_u16())
        .and_then(|e| e.inline_u32(order));
    let len = ifd1
        .get_entry_by_tag(TiffTag::JpegInterchangeFormatLength.as_u16())
        .and_then(|e| e.inline_u32(order));

    if let (Some(start), Some(len)) = (start, len) {
        if len > 0 {
            let bytes = checked_range(data, start, len)?;
            return Ok(Some(Thumbnail::Jpeg(Bytes::copy_from_slice(bytes))));
        }
    }

    let segments = payload_from_ifd(data, &ifd1, reader)?;
    Ok((!segments.is_empty()).then_some(Thumbnail::Segments(segments)))
}

fn checked_range(data: &[u8], offset: u32, len: u32) -> Result<&[u8], TiffError> {
    let start = offset as u64;
    let end = start + len as u64;
    if end > data.len() as u64 {
        return Err(TiffError::PayloadOutOfBounds {
            offset: start,
            len: len as u64,
            size: data.len() as u64,
        });
    }
    Ok(&data[start as usize..end as usize])
}

// =============================================================================
// Tests
// =============================================================================

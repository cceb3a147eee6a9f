//! TIFF-based RAW containers.
//!
//! Most camera RAW formats are TIFF streams, some behind a vendor framing.
//! Rewriting metadata means finding the TIFF body, rewriting it like any
//! other TIFF stream, and putting the framing back:
//!
//! | Framing            | Formats        | Body                                   |
//! |--------------------|----------------|----------------------------------------|
//! | Plain              | CR2, NEF, DNG… | the whole file                         |
//! | Signature          | ORF, RW2, RWL  | the file with `II*\0`/`MM\0*` restored  |
//! | Embedded JPEG      | RAF            | EXIF of the JPEG at the header offset  |
//! | Block              | MRW            | TIFF inside the `TTW` block            |
//! | Scanned prefix     | any other      | from the first TIFF header in 1000 bytes |
//!
//! CR3 (ISO media), CRW (CIFF) and X3F are not TIFF-based and are rejected
//! before anything is written.

use std::fmt;

use tracing::debug;

use crate::error::WriteError;

use super::jpeg;
use super::tiff::is_tiff_header;

/// How far into a file a TIFF header is searched for.
pub const SEARCH_WINDOW: usize = 1000;

// =============================================================================
// RawFormat
// =============================================================================

/// Camera RAW formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawFormat {
    Cr2,
    Nef,
    Nrw,
    Arw,
    Sr2,
    Srf,
    Dng,
    Orf,
    Raf,
    Rw2,
    Rwl,
    Pef,
    Srw,
    Erf,
    Mrw,
    Dcr,
    Kdc,
    Mef,
    Mos,
    Iiq,
    ThreeFr,
    Fff,
    Cr3,
    Crw,
    X3f,
}

const ALL_FORMATS: [RawFormat; 25] = [
    RawFormat::Cr2,
    RawFormat::Nef,
    RawFormat::Nrw,
    RawFormat::Arw,
    RawFormat::Sr2,
    RawFormat::Srf,
    RawFormat::Dng,
    RawFormat::Orf,
    RawFormat::Raf,
    RawFormat::Rw2,
    RawFormat::Rwl,
    RawFormat::Pef,
    RawFormat::Srw,
    RawFormat::Erf,
    RawFormat::Mrw,
    RawFormat::Dcr,
    RawFormat::Kdc,
    RawFormat::Mef,
    RawFormat::Mos,
    RawFormat::Iiq,
    RawFormat::ThreeFr,
    RawFormat::Fff,
    RawFormat::Cr3,
    RawFormat::Crw,
    RawFormat::X3f,
];

impl RawFormat {
    pub const fn name(self) -> &'static str {
        match self {
            RawFormat::Cr2 => "CR2",
            RawFormat::Nef => "NEF",
            RawFormat::Nrw => "NRW",
            RawFormat::Arw => "ARW",
            RawFormat::Sr2 => "SR2",
            RawFormat::Srf => "SRF",
            RawFormat::Dng => "DNG",
            RawFormat::Orf => "ORF",
            RawFormat::Raf => "RAF",
            RawFormat::Rw2 => "RW2",
            RawFormat::Rwl => "RWL",
            RawFormat::Pef => "PEF",
            RawFormat::Srw => "SRW",
            RawFormat::Erf => "ERF",
            RawFormat::Mrw => "MRW",
            RawFormat::Dcr => "DCR",
            RawFormat::Kdc => "KDC",
            RawFormat::Mef => "MEF",
            RawFormat::Mos => "MOS",
            RawFormat::Iiq => "IIQ",
            RawFormat::ThreeFr => "3FR",
            RawFormat::Fff => "FFF",
            RawFormat::Cr3 => "CR3",
            RawFormat::Crw => "CRW",
            RawFormat::X3f => "X3F",
        }
    }

    /// Format for a file extension, case-insensitive, with or without dot.
    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.trim_start_matches('.');
        ALL_FORMATS
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(extension))
    }

    /// Whether the container can be rewritten.
    pub const fn is_supported(self) -> bool {
        !matches!(self, RawFormat::Cr3 | RawFormat::Crw | RawFormat::X3f)
    }

    /// Identify a RAW file by its magic bytes, using the extension to tell
    /// apart formats that share a plain TIFF header.
    ///
    /// Returns `None` for data that is neither a known RAW signature nor a
    /// TIFF stream with a RAW extension.
    pub fn detect(data: &[u8], extension: Option<&str>) -> Option<Self> {
        let hint = extension.and_then(RawFormat::from_extension);

        if data.get(4..12) == Some(b"ftypcrx ".as_slice()) {
            return Some(RawFormat::Cr3);
        }
        if data.get(6..14) == Some(b"HEAPCCDR".as_slice()) {
            return Some(RawFormat::Crw);
        }
        if data.starts_with(b"FOVb") {
            return Some(RawFormat::X3f);
        }
        if data.starts_with(b"IIRO") || data.starts_with(b"IIRS") || data.starts_with(b"MMOR") {
            return Some(RawFormat::Orf);
        }
        if data.starts_with(b"IIU\0") {
            return Some(match hint {
                Some(RawFormat::Rwl) => RawFormat::Rwl,
                _ => RawFormat::Rw2,
            });
        }
        if data.starts_with(b"FUJIFILMCCD-RAW") {
            return Some(RawFormat::Raf);
        }
        if data.starts_with(b"\0MRM") {
            return Some(RawFormat::Mrw);
        }
        if is_tiff_header(data) && data.get(8..10) == Some(b"CR".as_slice()) {
            return Some(RawFormat::Cr2);
        }

        hint.filter(|f| f.is_supported())
    }
}

impl fmt::Display for RawFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Framing
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Framing {
    /// The file is the TIFF stream
    Plain,

    /// A 4-byte vendor signature replaces the TIFF byte order and magic
    Signature([u8; 4]),

    /// Opaque bytes before the TIFF stream, which runs to the end
    Prefix(usize),

    /// TIFF inside the EXIF segment of the RAF preview JPEG
    Raf { jpeg_start: usize, jpeg_end: usize },

    /// TIFF inside the MRW `TTW` block
    Mrw {
        ttw_header: usize,
        tiff_start: usize,
        ttw_end: usize,
    },
}

/// A RAW file split into its TIFF body and framing.
#[derive(Debug, Clone)]
pub struct RawSplit<'a> {
    format: RawFormat,
    original: &'a [u8],
    framing: Framing,
    body: Vec<u8>,
}

impl<'a> RawSplit<'a> {
    /// Locate the TIFF body of a RAW file.
    ///
    /// # Errors
    /// - `UnsupportedContainer` for CR3, CRW and X3F
    /// - `TiffBodyNotFound` if the framing does not lead to a TIFF header
    pub fn split(data: &'a [u8], format: RawFormat) -> Result<Self, WriteError> {
        if !format.is_supported() {
            return Err(WriteError::UnsupportedContainer {
                format: format.name(),
            });
        }
        let not_found = || WriteError::TiffBodyNotFound {
            format: format.name(),
        };

        let (framing, body) = match format {
            RawFormat::Orf | RawFormat::Rw2 | RawFormat::Rwl if !is_tiff_header(data) => {
                let signature: [u8; 4] = data
                    .get(0..4)
                    .and_then(|s| s.try_into().ok())
                    .ok_or_else(not_found)?;
                let restored: &[u8; 4] = match signature[0] {
                    b'I' => b"II*\0",
                    b'M' => b"MM\0*",
                    _ => return Err(not_found()),
                };
                let mut body = restored.to_vec();
                body.extend_from_slice(&data[4..]);
                (Framing::Signature(signature), body)
            }
            RawFormat::Raf => {
                let (jpeg_start, jpeg_end) = raf_jpeg_range(data).ok_or_else(not_found)?;
                let tiff = jpeg::extract_exif(&data[jpeg_start..jpeg_end])
                    .filter(|t| is_tiff_header(t))
                    .ok_or_else(not_found)?;
                (Framing::Raf { jpeg_start, jpeg_end }, tiff.to_vec())
            }
            RawFormat::Mrw if data.starts_with(b"\0MRM") => {
                let (ttw_header, ttw_end) = mrw_ttw_block(data).ok_or_else(not_found)?;
                let window = &data[ttw_header + 8..ttw_end];
                let tiff_start = ttw_header + 8 + find_tiff_header(window).ok_or_else(not_found)?;
                (
                    Framing::Mrw {
                        ttw_header,
                        tiff_start,
                        ttw_end,
                    },
                    data[tiff_start..ttw_end].to_vec(),
                )
            }
            _ => match find_tiff_header(data) {
                Some(0) => (Framing::Plain, data.to_vec()),
                Some(start) => (Framing::Prefix(start), data[start..].to_vec()),
                None => return Err(not_found()),
            },
        };

        debug!("{} framing: {:?}, body {} bytes", format, framing, body.len());
        Ok(RawSplit {
            format,
            original: data,
            framing,
            body,
        })
    }

    pub fn format(&self) -> RawFormat {
        self.format
    }

    /// The TIFF stream, with a standard header.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Length of the opaque bytes kept before the body.
    #[cfg(test)]
    fn prefix_len(&self) -> usize {
        match self.framing {
            Framing::Plain | Framing::Signature(_) => 0,
            Framing::Prefix(len) => len,
            Framing::Raf { .. } => 0,
            Framing::Mrw { tiff_start, .. } => tiff_start,
        }
    }

    /// Put a rewritten body back into the original framing.
    ///
    /// # Errors
    /// `OffsetOverflow` if a patched container length no longer fits its
    /// 32-bit field; `SegmentTooLarge` if a RAF body no longer fits one
    /// JPEG segment.
    pub fn rewrap(&self, body: &[u8]) -> Result<Vec<u8>, WriteError> {
        let original = self.original;
        match &self.framing {
            Framing::Plain => Ok(body.to_vec()),
            Framing::Signature(signature) => {
                let mut out = signature.to_vec();
                out.extend_from_slice(body.get(4..).unwrap_or_default());
                Ok(out)
            }
            Framing::Prefix(len) => {
                let mut out = original[..*len].to_vec();
                out.extend_from_slice(body);
                Ok(out)
            }
            Framing::Raf {
                jpeg_start,
                jpeg_end,
            } => rewrap_raf(original, *jpeg_start, *jpeg_end, body),
            Framing::Mrw {
                ttw_header,
                tiff_start,
                ttw_end,
            } => rewrap_mrw(original, *ttw_header, *tiff_start, *ttw_end, body),
        }
    }
}

/// Split a RAW file, rewrite its TIFF body with `rewrite`, and re-frame it.
pub fn rewrite_raw<F>(data: &[u8], format: RawFormat, rewrite: F) -> Result<Vec<u8>, WriteError>
where
    F: FnOnce(&[u8]) -> Result<Vec<u8>, WriteError>,
{
    let split = RawSplit::split(data, format)?;
    let body = rewrite(split.body())?;
    split.rewrap(&body)
}

/// Offset of the first TIFF header within [`SEARCH_WINDOW`] bytes.
pub fn find_tiff_header(data: &[u8]) -> Option<usize> {
    let window = &data[..data.len().min(SEARCH_WINDOW + 4)];
    window
        .windows(4)
        .position(|w| w == b"II*\0" || w == b"MM\0*")
}

// =============================================================================
// RAF
// =============================================================================

/// Header fields (big-endian u32) of a RAF file.
const RAF_JPEG_OFFSET: usize = 84;
const RAF_JPEG_LENGTH: usize = 88;
const RAF_CFA_HEADER_OFFSET: usize = 92;
const RAF_CFA_OFFSET: usize = 100;
const RAF_HEADER_LEN: usize = 108;

fn read_be_u32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn write_be_u32(data: &mut [u8], at: usize, value: u32) {
    data[at..at + 4].copy_from_slice(&value.to_be_bytes());
}

fn raf_jpeg_range(data: &[u8]) -> Option<(usize, usize)> {
    if data.len() < RAF_HEADER_LEN {
        return None;
    }
    let start = read_be_u32(data, RAF_JPEG_OFFSET)? as usize;
    let len = read_be_u32(data, RAF_JPEG_LENGTH)? as usize;
    let end = start.checked_add(len)?;
    (start >= RAF_HEADER_LEN && end <= data.len()).then_some((start, end))
}

fn shifted(value: u32, delta: i64) -> Result<u32, WriteError> {
    let moved = value as i64 + delta;
    u32::try_from(moved).map_err(|_| WriteError::OffsetOverflow {
        offset: moved.max(0) as u64,
    })
}

fn rewrap_raf(
    original: &[u8],
    jpeg_start: usize,
    jpeg_end: usize,
    body: &[u8],
) -> Result<Vec<u8>, WriteError> {
    let jpeg = jpeg::replace_exif_segment(&original[jpeg_start..jpeg_end], body)?;
    let delta = jpeg.len() as i64 - (jpeg_end - jpeg_start) as i64;

    let mut out = Vec::with_capacity(original.len() + jpeg.len());
    out.extend_from_slice(&original[..jpeg_start]);
    out.extend_from_slice(&jpeg);
    out.extend_from_slice(&original[jpeg_end..]);

    let jpeg_len = u32::try_from(jpeg.len()).map_err(|_| WriteError::OffsetOverflow {
        offset: jpeg.len() as u64,
    })?;
    write_be_u32(&mut out, RAF_JPEG_LENGTH, jpeg_len);

    // Sections after the preview move with it
    for field in [RAF_CFA_HEADER_OFFSET, RAF_CFA_OFFSET] {
        if let Some(offset) = read_be_u32(original, field) {
            if offset as usize >= jpeg_end {
                write_be_u32(&mut out, field, shifted(offset, delta)?);
            }
        }
    }
    Ok(out)
}

// =============================================================================
// MRW
// =============================================================================

/// Find the `TTW` block inside the `MRM` block: (block header offset,
/// block data end).
fn mrw_ttw_block(data: &[u8]) -> Option<(usize, usize)> {
    let mrm_len = read_be_u32(data, 4)? as usize;
    let mrm_end = 8usize.checked_add(mrm_len)?.min(data.len());

    let mut pos = 8;
    while pos + 8 <= mrm_end {
        let name = &data[pos..pos + 4];
        let size = read_be_u32(data, pos + 4)? as usize;
        let end = pos.checked_add(8 + size)?;
        if end > data.len() {
            return None;
        }
        if name == b"\0TTW" {
            return Some((pos, end));
        }
        pos = end;
    }
    None
}

fn rewrap_mrw(
    original: &[u8],
    ttw_header: usize,
    tiff_start: usize,
    ttw_end: usize,
    body: &[u8],
) -> Result<Vec<u8>, WriteError> {
    let delta = body.len() as i64 - (ttw_end - tiff_start) as i64;

    let mut out = Vec::with_capacity(original.len() + body.len());
    out.extend_from_slice(&original[..tiff_start]);
    out.extend_from_slice(body);
    out.extend_from_slice(&original[ttw_end..]);

    let ttw_size = (tiff_start - ttw_header - 8) + body.len();
    let ttw_size = u32::try_from(ttw_size).map_err(|_| WriteError::OffsetOverflow {
        offset: ttw_size as u64,
    })?;
    write_be_u32(&mut out, ttw_header + 4, ttw_size);

    if let Some(mrm_len) = read_be_u32(original, 4) {
        write_be_u32(&mut out, 4, shifted(mrm_len, delta)?);
    }
    Ok(out)
}

// =============================================================================
// Tests
// =============================================================================

//! Structural validation of EXIF streams.
//!
//! Checks a stream the way a strict reader would consume it, without
//! decoding any values:
//! - **Header**: `II`/`MM`, magic 42, first IFD inside the stream
//! - **Directories**: every directory reachable from IFD0 parses inside the
//!   buffer, with strictly ascending tag ids
//! - **Values**: every offset-stored value lies inside the buffer
//! - **Regions**: strips, tiles and the thumbnail lie inside the buffer, and
//!   no two regions overlap
//!
//! Problems are collected rather than returned on first sight, so a single
//! report lists everything wrong with a file.

use std::collections::HashSet;

use thiserror::Error;

use crate::error::TiffError;

use super::parser::{ByteOrder, Ifd, TiffHeader, TIFF_HEADER_SIZE};
use super::tags::{DirectoryKind, TiffTag};
use super::values::ValueReader;

// =============================================================================
// Validation Result
// =============================================================================

/// Result of validating a stream.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether the stream passed every check
    pub is_valid: bool,

    /// List of validation errors (empty if valid)
    pub errors: Vec<ValidationError>,

    /// Non-fatal findings
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        ValidationResult {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Convert to a TiffError if invalid.
    ///
    /// Returns the first error as a TiffError, or Ok(()) if valid.
    pub fn into_result(self) -> Result<(), TiffError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }
}

/// A specific validation error.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("malformed header: {0}")]
    MalformedHeader(TiffError),

    #[error("{directory} at offset {offset} cannot be read: {reason}")]
    UnreadableDirectory {
        directory: DirectoryKind,
        offset: u32,
        reason: String,
    },

    #[error("{directory}: tag 0x{tag:04X} is out of order")]
    UnsortedEntries { directory: DirectoryKind, tag: u16 },

    #[error("{directory}: pointer 0x{tag:04X} is not a single SHORT or LONG")]
    InvalidPointer { directory: DirectoryKind, tag: u16 },

    #[error("{region} at {offset}+{len} runs past the end of the stream ({size} bytes)")]
    OutOfBounds {
        region: String,
        offset: u64,
        len: u64,
        size: u64,
    },

    #[error("{first} overlaps {second}")]
    Overlap { first: String, second: String },

    #[error("{directory}: {offsets} offsets but {counts} byte counts")]
    CountMismatch {
        directory: DirectoryKind,
        offsets: usize,
        counts: usize,
    },
}

impl From<ValidationError> for TiffError {
    fn from(error: ValidationError) -> Self {
        match error {
            ValidationError::MalformedHeader(inner) => inner,
            ValidationError::UnreadableDirectory { offset, .. } => {
                TiffError::InvalidIfdOffset(offset as u64)
            }
            ValidationError::OutOfBounds {
                offset, len, size, ..
            } => TiffError::PayloadOutOfBounds { offset, len, size },
            other => TiffError::InvalidTagValue {
                tag: "structure",
                message: other.to_string(),
            },
        }
    }
}

// =============================================================================
// Regions
// =============================================================================

#[derive(Debug, Clone)]
struct Region {
    label: String,
    start: u64,
    end: u64,
}

struct Checker<'a> {
    data: &'a [u8],
    reader: ValueReader<'a>,
    regions: Vec<Region>,
    result: ValidationResult,
}

impl Checker<'_> {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn byte_order(&self) -> ByteOrder {
        self.reader.byte_order()
    }

    /// Record a region, or report it if it leaves the buffer.
    fn claim(&mut self, label: String, start: u64, len: u64) {
        if len == 0 {
            return;
        }
        if start + len > self.size() {
            let size = self.size();
            self.result.add_error(ValidationError::OutOfBounds {
                region: label,
                offset: start,
                len,
                size,
            });
            return;
        }
        self.regions.push(Region {
            label,
            start,
            end: start + len,
        });
    }

    fn check_directory(&mut self, kind: DirectoryKind, ifd: &Ifd, queue: &mut Vec<(DirectoryKind, u32)>) {
        self.claim(format!("{}", kind), ifd.offset as u64, ifd.byte_len() as u64);

        let mut previous: Option<u16> = None;
        for entry in &ifd.entries {
            if previous.is_some_and(|p| entry.tag <= p) {
                self.result.add_error(ValidationError::UnsortedEntries {
                    directory: kind,
                    tag: entry.tag,
                });
            }
            previous = Some(entry.tag);

            match entry.value_byte_size() {
                None => self.result.add_warning(format!(
                    "{}: tag 0x{:04X} has unknown type {}",
                    kind, entry.tag, entry.field_type_raw
                )),
                Some(size) if !entry.is_inline() => {
                    let offset = entry.value_offset(self.byte_order()) as u64;
                    self.claim(format!("{} tag 0x{:04X}", kind, entry.tag), offset, size);
                }
                Some(_) => {}
            }

            let pointer = TiffTag::from_u16(entry.tag)
                .filter(|&tag| kind.owns_pointer(tag))
                .and_then(|tag| tag.target_directory());
            if let Some(target) = pointer {
                match entry.inline_u32(self.byte_order()) {
                    Some(offset) => queue.push((target, offset)),
                    None => self.result.add_error(ValidationError::InvalidPointer {
                        directory: kind,
                        tag: entry.tag,
                    }),
                }
            }
        }

        if ifd.get_entry_by_tag(TiffTag::SubIfds.as_u16()).is_some() {
            self.result
                .add_warning(format!("{}: SubIFDs are not checked", kind));
        }

        for (offsets_tag, counts_tag, label) in [
            (TiffTag::StripOffsets, TiffTag::StripByteCounts, "strip"),
            (TiffTag::TileOffsets, TiffTag::TileByteCounts, "tile"),
        ] {
            self.check_segments(kind, ifd, offsets_tag, counts_tag, label);
        }

        if kind == DirectoryKind::Ifd1 {
            self.check_thumbnail(ifd);
        }
    }

    fn check_segments(
        &mut self,
        kind: DirectoryKind,
        ifd: &Ifd,
        offsets_tag: TiffTag,
        counts_tag: TiffTag,
        label: &str,
    ) {
        let (Some(offsets_entry), Some(counts_entry)) = (
            ifd.get_entry_by_tag(offsets_tag.as_u16()),
            ifd.get_entry_by_tag(counts_tag.as_u16()),
        ) else {
            return;
        };

        // Unreadable arrays were already reported as out-of-bounds values
        let (Ok(offsets), Ok(counts)) = (
            self.reader.read_u32_array(offsets_entry),
            self.reader.read_u32_array(counts_entry),
        ) else {
            return;
        };

        if offsets.len() != counts.len() {
            self.result.add_error(ValidationError::CountMismatch {
                directory: kind,
                offsets: offsets.len(),
                counts: counts.len(),
            });
            return;
        }

        for (index, (&offset, &count)) in offsets.iter().zip(&counts).enumerate() {
            self.claim(
                format!("{} {} {}", kind, label, index),
                offset as u64,
                count as u64,
            );
        }
    }

    fn check_thumbnail(&mut self, ifd: &Ifd) {
        let order = self.byte_order();
        let start = ifd
            .get_entry_by_tag(TiffTag::JpegInterchangeFormat.as_u16())
            .and_then(|e| e.inline_u32(order));
        let len = ifd
            .get_entry_by_tag(TiffTag::JpegInterchangeFormatLength.as_u16())
            .and_then(|e| e.inline_u32(order));

        match (start, len) {
            (Some(start), Some(len)) => self.claim("thumbnail".to_string(), start as u64, len as u64),
            (None, None) => {}
            _ => self
                .result
                .add_warning("IFD1: thumbnail offset without length, or length without offset".to_string()),
        }
    }

    fn check_overlaps(&mut self) {
        self.regions.sort_by_key(|r| (r.start, r.end));
        for pair in self.regions.windows(2) {
            if pair[0].end > pair[1].start {
                self.result.add_error(ValidationError::Overlap {
                    first: pair[0].label.clone(),
                    second: pair[1].label.clone(),
                });
            }
        }
    }
}

// =============================================================================
// Stream Validation
// =============================================================================

/// Validate the structure of a classic TIFF stream.
pub fn validate_stream(data: &[u8]) -> ValidationResult {
    let mut result = ValidationResult::ok();

    let header = match TiffHeader::parse(data) {
        Ok(header) => header,
        Err(e) => {
            result.add_error(ValidationError::MalformedHeader(e));
            return result;
        }
    };

    let mut checker = Checker {
        data,
        reader: ValueReader::new(data, header.byte_order),
        regions: Vec::new(),
        result,
    };
    checker.claim("header".to_string(), 0, TIFF_HEADER_SIZE as u64);

    let mut queue = vec![(DirectoryKind::Ifd0, header.first_ifd_offset)];
    let mut visited = HashSet::new();

    while let Some((kind, offset)) = queue.pop() {
        if !visited.insert(offset) {
            checker
                .result
                .add_warning(format!("{} at offset {} is referenced twice", kind, offset));
            continue;
        }

        let ifd = match Ifd::parse(data, offset, header.byte_order) {
            Ok(ifd) => ifd,
            Err(e) => {
                checker.result.add_error(ValidationError::UnreadableDirectory {
                    directory: kind,
                    offset,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        checker.check_directory(kind, &ifd, &mut queue);

        match (kind, ifd.next_ifd_offset) {
            (_, 0) => {}
            (DirectoryKind::Ifd0, next) => queue.push((DirectoryKind::Ifd1, next)),
            (DirectoryKind::Ifd1, _) => checker
                .result
                .add_warning("directories chained after IFD1 are not checked".to_string()),
            (other, _) => checker
                .result
                .add_warning(format!("{} has a next-directory link", other)),
        }
    }

    checker.check_overlaps();
    checker.result
}

// =============================================================================
// Tests
// =============================================================================

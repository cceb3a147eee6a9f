//! Container detection.
//!
//! Identifies what kind of file carries the EXIF stream by examining magic
//! bytes, with the file extension as a hint for RAW formats that share the
//! plain TIFF header:
//!
//! - **TIFF**: `II*\0` or `MM\0*` with no RAW extension
//! - **JPEG**: SOI marker
//! - **RAW**: vendor signatures, or a TIFF header with a RAW extension
//!
//! Anything else is rejected with `UnsupportedFormat`.

use std::fmt;
use std::path::Path;

use crate::error::WriteError;

use super::jpeg::is_jpeg;
use super::raw::RawFormat;
use super::tiff::is_tiff_header;

// =============================================================================
// ContainerFormat
// =============================================================================

/// Detected container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    /// Standalone classic TIFF
    Tiff,

    /// JPEG with (or without) an EXIF APP1 segment
    Jpeg,

    /// Camera RAW file
    Raw(RawFormat),
}

impl ContainerFormat {
    /// Get a human-readable name for the format.
    pub const fn name(&self) -> &'static str {
        match self {
            ContainerFormat::Tiff => "TIFF",
            ContainerFormat::Jpeg => "JPEG",
            ContainerFormat::Raw(raw) => raw.name(),
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Format Detection
// =============================================================================

/// Minimum bytes needed to tell containers apart.
const MIN_HEADER_BYTES: usize = 4;

/// Detect the container of `data`.
///
/// # Errors
/// `UnsupportedFormat` if the data is too short or matches no known
/// container.
pub fn detect_container(data: &[u8], extension: Option<&str>) -> Result<ContainerFormat, WriteError> {
    if data.len() < MIN_HEADER_BYTES {
        return Err(WriteError::UnsupportedFormat {
            reason: format!("{} bytes is too small to identify", data.len()),
        });
    }

    if is_jpeg(data) {
        return Ok(ContainerFormat::Jpeg);
    }
    if let Some(raw) = RawFormat::detect(data, extension) {
        return Ok(ContainerFormat::Raw(raw));
    }
    if is_tiff_header(data) {
        return Ok(ContainerFormat::Tiff);
    }

    Err(WriteError::UnsupportedFormat {
        reason: format!(
            "unrecognized signature {:02X?}",
            &data[..MIN_HEADER_BYTES]
        ),
    })
}

/// Detect the container of a file's contents, using its extension as a hint.
pub fn detect_path(path: &Path, data: &[u8]) -> Result<ContainerFormat, WriteError> {
    let extension = path.extension().and_then(|e| e.to_str());
    detect_container(data, extension)
}

// =============================================================================
// Tests
// =============================================================================

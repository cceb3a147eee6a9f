use thiserror::Error;

use crate::format::tiff::DirectoryKind;

/// Errors that can occur when parsing TIFF streams
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42, got {0}")]
    InvalidVersion(u16),

    /// Stream is too small to contain the requested structure
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside the stream)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Unknown field type in IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Value bytes end before the declared count is satisfied
    #[error("Truncated value: need {required} bytes, got {actual}")]
    TruncatedValue { required: u64, actual: u64 },

    /// Strip, tile or thumbnail range lies outside the stream
    #[error("Image data out of bounds: {len} bytes at offset {offset}, stream is {size} bytes")]
    PayloadOutOfBounds { offset: u64, len: u64, size: u64 },
}

impl TiffError {
    /// Whether this error means the stream does not start with a usable TIFF header.
    pub fn is_malformed_header(&self) -> bool {
        matches!(
            self,
            TiffError::InvalidMagic(_)
                | TiffError::InvalidVersion(_)
                | TiffError::FileTooSmall { .. }
                | TiffError::InvalidIfdOffset(_)
        )
    }
}

/// Reasons a single tag cannot be written.
///
/// These never abort a write: the tag is dropped and the error is reported
/// as a [`Diagnostic`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("no tag named {name} in the {namespace} namespace")]
    UnknownTag { namespace: String, name: String },

    #[error("unknown namespace in key {key}")]
    UnknownNamespace { key: String },

    #[error("tag 0x{id:04X} is managed by the writer and cannot be set directly")]
    StructuralTag { id: u16 },

    #[error("empty value")]
    EmptyValue,

    #[error("value {0} is not finite")]
    NonFinite(f64),

    #[error("value {0} does not fit a 32-bit rational")]
    OutOfRange(f64),

    #[error("sequence mixes text and numbers")]
    MixedSequence,

    #[error("sequences may only contain text or numbers")]
    NestedValue,

    #[error("value of {0} elements exceeds the 32-bit count field")]
    TooLong(u64),
}

/// Fatal errors that abort a write before any output is produced
#[derive(Debug, Clone, Error)]
pub enum WriteError {
    /// The input could not be parsed
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// An absolute position does not fit the 32-bit offset field
    #[error("Offset overflow: position {offset} exceeds the 32-bit TIFF offset range")]
    OffsetOverflow { offset: u64 },

    /// A directory holds more entries than its 16-bit count allows
    #[error("Too many entries in {directory}: {count}")]
    TooManyEntries { directory: DirectoryKind, count: usize },

    /// An entry the writer generates itself could not be encoded
    #[error("Structural entry could not be encoded: {0}")]
    Structural(#[from] EncodeError),

    /// A layout-dependent entry has no matching region in the output
    #[error("Entry 0x{tag:04X} in {directory} cannot be resolved from the layout")]
    UnresolvedEntry { directory: DirectoryKind, tag: u16 },

    /// Container that cannot be rewritten (CR3, CRW, X3F)
    #[error("Unsupported container: {format} cannot be rewritten")]
    UnsupportedContainer { format: &'static str },

    /// Image data lives in a directory a rewrite does not carry over
    #[error("Image data in {location} cannot be carried over by a rewrite")]
    UncarriedImageData { location: &'static str },

    /// No TIFF header found where the container promises one
    #[error("No TIFF body found in {format} container")]
    TiffBodyNotFound { format: &'static str },

    /// EXIF stream too large for a single JPEG APP1 segment
    #[error("EXIF data of {len} bytes does not fit in a JPEG APP1 segment")]
    SegmentTooLarge { len: usize },

    /// Input is not TIFF, JPEG or a recognized RAW file
    #[error("Unsupported format: {reason}")]
    UnsupportedFormat { reason: String },
}

// =============================================================================
// Diagnostics
// =============================================================================

/// What a diagnostic reports.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticKind {
    /// The tag was dropped from the output
    Dropped(EncodeError),

    /// The tag was written, but not exactly as given
    Lossy(String),
}

/// A non-fatal issue found while building a directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Tag key as supplied by the caller
    pub key: String,

    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn dropped(key: impl Into<String>, error: EncodeError) -> Self {
        Diagnostic {
            key: key.into(),
            kind: DiagnosticKind::Dropped(error),
        }
    }

    pub fn lossy(key: impl Into<String>, note: impl Into<String>) -> Self {
        Diagnostic {
            key: key.into(),
            kind: DiagnosticKind::Lossy(note.into()),
        }
    }

    pub fn is_dropped(&self) -> bool {
        matches!(self.kind, DiagnosticKind::Dropped(_))
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            DiagnosticKind::Dropped(error) => write!(f, "{}: dropped ({})", self.key, error),
            DiagnosticKind::Lossy(note) => write!(f, "{}: {}", self.key, note),
        }
    }
}

//! File formats that carry EXIF streams.
//!
//! The [`tiff`] module is the codec itself. The other modules locate and
//! replace the TIFF stream inside its container:
//!
//! - **JPEG**: APP1 segment ([`jpeg`])
//! - **RAW**: TIFF-based camera RAW files behind vendor framings ([`raw`])
//!
//! Use [`detect::detect_container`] to identify a file before rewriting it.

pub mod detect;
pub mod jpeg;
pub mod raw;
pub mod tiff;

pub use detect::{detect_container, detect_path, ContainerFormat};
pub use raw::{rewrite_raw, RawFormat, RawSplit};

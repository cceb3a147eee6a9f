//! # exif-rewrite
//!
//! Read and rewrite the EXIF metadata embedded in TIFF files, JPEG files and
//! TIFF-based camera RAW files, without touching the image data.
//!
//! Every write rebuilds the whole directory structure from a flat tag map:
//! values are encoded byte-exactly, directories are laid out in one pass with
//! every pointer resolved before serialization, and strip/tile payloads and
//! thumbnails are copied over byte for byte.
//!
//! ## Features
//!
//! - **Typed values**: text, integers, rationals, byte blobs and sequences,
//!   with the binary type chosen from the tag's registered hint
//! - **Standard directories**: IFD0, Exif, GPS, Interoperability and IFD1
//! - **Containers**: standalone TIFF, JPEG APP1, and RAW files behind
//!   vendor framings (ORF, RW2, RAF, MRW, prefixed TIFF bodies)
//! - **Diagnostics**: tags that cannot be written are reported, never fatal
//! - **Validation**: structural checks of any classic TIFF stream
//!
//! ## Architecture
//!
//! - [`codec`] - the [`ExifCodec`] facade
//! - [`mod@format`] - TIFF codec, JPEG segments, RAW framings, detection
//! - [`io`] - byte order helpers and atomic file replacement
//! - [`config`] - CLI configuration types
//! - [`error`] - error and diagnostic types
//!
//! ## Example
//!
//! ```rust
//! use exif_rewrite::{ExifCodec, TagMap, Value};
//!
//! let mut tags = TagMap::new();
//! tags.insert("EXIF:Make".to_string(), Value::from("Acme"));
//! tags.insert("EXIF:FNumber".to_string(), Value::Rational(2.8));
//!
//! let codec = ExifCodec::standard();
//! let encoded = codec.encode(&tags).unwrap();
//! assert!(encoded.diagnostics.is_empty());
//!
//! let decoded = codec.decode(&encoded.bytes).unwrap();
//! assert_eq!(decoded["EXIF:Make"], Value::from("Acme"));
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod format;
pub mod io;

// Re-export commonly used types
pub use codec::{apply_diff, embedded_stream, EncodeOptions, ExifCodec, OutputKind};
pub use config::{CheckConfig, Cli, Command, EndianArg, InspectConfig, WriteConfig};
pub use error::{Diagnostic, DiagnosticKind, EncodeError, TiffError, WriteError};
pub use format::tiff::{
    decode_stream, extract_payload, validate_stream, ByteOrder, DirectoryKind, Encoded,
    ExifVersion, Ifd, IfdEntry, ImagePayload, PayloadLayout, PayloadSummary, PreservedStructure,
    TagCodec, TagDiff, TagMap, TagRegistry, Thumbnail, TiffHeader, TiffWriter, TypeHint,
    ValidationError, ValidationResult, Value, ValueReader,
};
pub use format::{detect_container, detect_path, rewrite_raw, ContainerFormat, RawFormat};
pub use io::write_atomic;

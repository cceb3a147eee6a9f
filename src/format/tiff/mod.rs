//! Classic TIFF / EXIF directory codec.
//!
//! This module reads and writes the TIFF structure that carries EXIF
//! metadata, both as standalone TIFF files and inside JPEG APP1 segments and
//! TIFF-based RAW files.
//!
//! # Key Concepts
//!
//! - **Byte order**: TIFF streams declare their endianness (II = little-endian,
//!   MM = big-endian) in the header. Every multi-byte value follows it.
//!
//! - **Directories**: IFD0 holds primary image tags and links to the Exif and
//!   GPS sub-directories; the Exif directory links to the Interoperability
//!   directory; IFD1 (the thumbnail directory) is chained after IFD0.
//!
//! - **Inline vs offset values**: values of up to 4 bytes live in the entry
//!   itself, larger values live in a data block after the directory.
//!
//! - **Two-phase writes**: every entry of every directory exists before any
//!   offset is assigned ([`builder`]), then one layout pass places and links
//!   them ([`layout`]) and the stream is serialized once ([`writer`]).

pub mod builder;
pub mod codec;
pub mod layout;
mod parser;
pub mod preserve;
pub mod reader;
pub mod registry;
mod tags;
pub mod validation;
mod values;
pub mod writer;

pub use codec::{EncodedValue, ExifVersion, TagCodec};
pub use parser::{
    directory_len, is_tiff_header, ByteOrder, Ifd, IfdEntry, TiffHeader, IFD_ENTRY_SIZE,
    TIFF_HEADER_SIZE,
};
pub use preserve::{
    extract_payload, uncarried_image_data, ImagePayload, PayloadLayout, PayloadSummary,
    PreservedStructure, Thumbnail,
};
pub use reader::{decode_stream, DecodedStream};
pub use registry::{TagDefinition, TagRegistry, TypeHint};
pub use tags::{is_structural, DirectoryKind, TagType, TiffTag, EXIF_VERSION_TAG};
pub use validation::{validate_stream, ValidationError, ValidationResult};
pub use values::{TagDiff, TagMap, Value, ValueReader};
pub use writer::{Encoded, TiffWriter};

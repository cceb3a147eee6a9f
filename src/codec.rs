//! High-level EXIF codec.
//!
//! [`ExifCodec`] is the entry point for callers: it encodes tag maps into
//! fresh streams, decodes streams back into tag maps, and rewrites existing
//! files while carrying their image data over untouched.
//!
//! # Example
//!
//! ```no_run
//! use exif_rewrite::{ExifCodec, TagDiff, Value};
//!
//! let original = std::fs::read("photo.tif").unwrap();
//!
//! let mut diff = TagDiff::new();
//! diff.insert("EXIF:Artist".to_string(), Some(Value::from("Jane Doe")));
//! diff.insert("EXIF:Software".to_string(), None);
//!
//! let encoded = ExifCodec::standard().rewrite(&original, &diff).unwrap();
//! for diagnostic in &encoded.diagnostics {
//!     eprintln!("{}", diagnostic);
//! }
//! ```

use std::borrow::Cow;

use tracing::debug;

use crate::error::{TiffError, WriteError};
use crate::format::detect::ContainerFormat;
use crate::format::jpeg;
use crate::format::raw::{rewrite_raw, RawSplit};
use crate::format::tiff::registry::split_key;
use crate::format::tiff::{
    decode_stream, extract_payload, uncarried_image_data, ByteOrder, DirectoryKind, Encoded,
    ExifVersion, ImagePayload, PreservedStructure, TagDiff, TagMap, TagRegistry, TiffWriter,
};

// =============================================================================
// Options
// =============================================================================

/// What [`ExifCodec::encode`] produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputKind {
    /// Bare TIFF stream
    #[default]
    Tiff,

    /// TIFF stream wrapped in a JPEG APP1 segment
    JpegApp1,
}

/// Library-level write options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Byte order of new streams; `None` keeps the original's on rewrite
    /// and uses little-endian otherwise.
    pub byte_order: Option<ByteOrder>,

    /// ExifVersion written when the caller supplies none
    pub exif_version: ExifVersion,

    pub output: OutputKind,
}

// =============================================================================
// ExifCodec
// =============================================================================

/// Encodes, decodes and rewrites EXIF streams against a tag registry.
#[derive(Debug, Clone, Copy)]
pub struct ExifCodec<'r> {
    registry: &'r TagRegistry,
    options: EncodeOptions,
}

impl ExifCodec<'static> {
    /// Codec over the standard registry with default options.
    pub fn standard() -> Self {
        ExifCodec::new(TagRegistry::standard(), EncodeOptions::default())
    }
}

impl<'r> ExifCodec<'r> {
    pub fn new(registry: &'r TagRegistry, options: EncodeOptions) -> Self {
        Self { registry, options }
    }

    pub fn registry(&self) -> &'r TagRegistry {
        self.registry
    }

    pub fn options(&self) -> &EncodeOptions {
        &self.options
    }

    /// Encode a metadata-only stream.
    pub fn encode(&self, tags: &TagMap) -> Result<Encoded, WriteError> {
        self.encode_with_structure(tags, &PreservedStructure::default())
    }

    /// Encode a stream around a preserved payload and thumbnail.
    ///
    /// # Errors
    /// Structural failures only; per-tag problems are diagnostics.
    pub fn encode_with_structure(
        &self,
        tags: &TagMap,
        structure: &PreservedStructure,
    ) -> Result<Encoded, WriteError> {
        let order = self.options.byte_order.unwrap_or(ByteOrder::LittleEndian);
        let encoded = self.write_tiff(tags, structure, order)?;
        self.finish(encoded)
    }

    /// Decode a TIFF stream into a flat tag map.
    pub fn decode(&self, data: &[u8]) -> Result<TagMap, TiffError> {
        Ok(decode_stream(data, self.registry)?.tags)
    }

    /// Extract the strip or tile payload of a TIFF stream.
    pub fn preserve_image_data(&self, data: &[u8]) -> Result<ImagePayload, TiffError> {
        extract_payload(data)
    }

    /// Rewrite a TIFF stream with `diff` applied.
    ///
    /// The payload and thumbnail are carried over byte for byte; only the
    /// directories are rebuilt. `original` is never modified.
    ///
    /// # Errors
    /// `UncarriedImageData` if image data hangs off SubIFDs or an IFD2+
    /// chain, since only IFD0 and IFD1 data is carried over.
    pub fn rewrite(&self, original: &[u8], diff: &TagDiff) -> Result<Encoded, WriteError> {
        let encoded = self.rewrite_tiff(original, diff)?;
        self.finish(encoded)
    }

    /// Rewrite the EXIF stream of any supported container.
    ///
    /// The result is the whole container; [`EncodeOptions::output`] does not
    /// apply here.
    ///
    /// # Errors
    /// - `UnsupportedContainer` for RAW formats that cannot be rewritten
    /// - `SegmentTooLarge` if a JPEG's new stream outgrows one APP1 segment
    /// - `UncarriedImageData` for bodies with SubIFDs or an IFD2+ chain
    pub fn rewrite_container(
        &self,
        data: &[u8],
        format: ContainerFormat,
        diff: &TagDiff,
    ) -> Result<Encoded, WriteError> {
        debug!("rewriting {} container of {} bytes", format, data.len());

        match format {
            ContainerFormat::Tiff => self.rewrite_tiff(data, diff),
            ContainerFormat::Jpeg => {
                let encoded = match jpeg::extract_exif(data) {
                    Some(tiff) => self.rewrite_tiff(tiff, diff)?,
                    None => {
                        let tags = apply_diff(TagMap::new(), diff, self.registry);
                        let order = self.options.byte_order.unwrap_or(ByteOrder::LittleEndian);
                        self.write_tiff(&tags, &PreservedStructure::default(), order)?
                    }
                };
                Ok(Encoded {
                    bytes: jpeg::replace_exif_segment(data, &encoded.bytes)?,
                    diagnostics: encoded.diagnostics,
                })
            }
            ContainerFormat::Raw(raw) => {
                let mut diagnostics = Vec::new();
                let bytes = rewrite_raw(data, raw, |body| {
                    let encoded = self.rewrite_tiff(body, diff)?;
                    diagnostics = encoded.diagnostics;
                    Ok(encoded.bytes)
                })?;
                Ok(Encoded { bytes, diagnostics })
            }
        }
    }

    fn rewrite_tiff(&self, original: &[u8], diff: &TagDiff) -> Result<Encoded, WriteError> {
        if let Some(location) = uncarried_image_data(original)? {
            return Err(WriteError::UncarriedImageData { location });
        }
        let decoded = decode_stream(original, self.registry)?;
        let structure = PreservedStructure::extract(original)?;
        let tags = apply_diff(decoded.tags, diff, self.registry);
        let order = self.options.byte_order.unwrap_or(decoded.byte_order);
        self.write_tiff(&tags, &structure, order)
    }

    fn write_tiff(
        &self,
        tags: &TagMap,
        structure: &PreservedStructure,
        order: ByteOrder,
    ) -> Result<Encoded, WriteError> {
        TiffWriter::new(self.registry, order, self.options.exif_version).write(tags, structure)
    }

    fn finish(&self, encoded: Encoded) -> Result<Encoded, WriteError> {
        match self.options.output {
            OutputKind::Tiff => Ok(encoded),
            OutputKind::JpegApp1 => Ok(Encoded {
                bytes: jpeg::build_exif_segment(&encoded.bytes)?,
                diagnostics: encoded.diagnostics,
            }),
        }
    }
}

// =============================================================================
// Stream Location
// =============================================================================

/// The TIFF stream embedded in a container.
///
/// Returns `None` for a JPEG without an EXIF segment. RAW bodies come back
/// with their standard TIFF header restored.
pub fn embedded_stream(
    data: &[u8],
    format: ContainerFormat,
) -> Result<Option<Cow<'_, [u8]>>, WriteError> {
    match format {
        ContainerFormat::Tiff => Ok(Some(Cow::Borrowed(data))),
        ContainerFormat::Jpeg => Ok(jpeg::extract_exif(data).map(Cow::Borrowed)),
        ContainerFormat::Raw(raw) => {
            let split = RawSplit::split(data, raw)?;
            Ok(Some(Cow::Owned(split.body().to_vec())))
        }
    }
}

// =============================================================================
// Diffs
// =============================================================================

/// Apply `diff` to `tags`.
///
/// A diff key replaces every existing key naming the same tag, so
/// `IFD0:Make` in a diff overrides a decoded `EXIF:Make`. Keys that do not
/// resolve are inserted as given and reported when the map is written.
pub fn apply_diff(mut tags: TagMap, diff: &TagDiff, registry: &TagRegistry) -> TagMap {
    let resolve = |key: &str| -> Option<(DirectoryKind, u16)> {
        split_key(key)
            .and_then(|(namespace, name)| registry.resolve(namespace, name))
            .ok()
    };

    for (key, change) in diff {
        if let Some(target) = resolve(key) {
            tags.retain(|existing, _| existing == key || resolve(existing) != Some(target));
        }
        match change {
            Some(value) => {
                tags.insert(key.clone(), value.clone());
            }
            None => {
                tags.remove(key);
            }
        }
    }

    tags
}

// =============================================================================
// Tests
// =============================================================================

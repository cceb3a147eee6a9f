//! Stream assembly.
//!
//! [`TiffWriter`] drives a complete write: route the tag map, build every
//! directory with its pointer and payload entries, link them, and serialize
//! the linked stream once with [`assemble`]. Nothing is serialized before
//! the layout is final, so no bytes are ever patched after the fact.

use tracing::{debug, info};

use crate::error::{Diagnostic, WriteError};

use super::builder::{route_tags, BuiltDirectory, Deferred, DirectoryBuilder};
use super::codec::{ExifVersion, TagCodec};
use super::layout::{IfdLinker, LinkedStream};
use super::parser::{ByteOrder, TiffHeader};
use super::preserve::{PreservedStructure, Thumbnail};
use super::registry::TagRegistry;
use super::tags::{DirectoryKind, TiffTag};
use super::values::TagMap;

/// Output of a write: the stream and the per-tag diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub diagnostics: Vec<Diagnostic>,
}

// =============================================================================
// TiffWriter
// =============================================================================

/// Writes tag maps as classic TIFF streams.
pub struct TiffWriter<'r> {
    registry: &'r TagRegistry,
    codec: TagCodec,
}

impl<'r> TiffWriter<'r> {
    pub fn new(registry: &'r TagRegistry, byte_order: ByteOrder, version: ExifVersion) -> Self {
        Self {
            registry,
            codec: TagCodec::new(byte_order, version),
        }
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.codec.byte_order()
    }

    /// Encode `tags` around a preserved payload and thumbnail.
    ///
    /// # Errors
    /// Only structural failures are fatal (offset overflow, too many
    /// entries). Tags that cannot be encoded are reported in
    /// [`Encoded::diagnostics`].
    pub fn write(
        &self,
        tags: &TagMap,
        structure: &PreservedStructure,
    ) -> Result<Encoded, WriteError> {
        let mut diagnostics = Vec::new();
        let routed = route_tags(tags, self.registry, &mut diagnostics);

        let has_thumbnail = structure.thumbnail.is_some();
        let builder = |kind| DirectoryBuilder::new(kind, self.registry, self.codec);

        let mut ifd0 = builder(DirectoryKind::Ifd0);
        let mut exif = builder(DirectoryKind::Exif);
        let mut gps = routed.has(DirectoryKind::Gps).then(|| builder(DirectoryKind::Gps));
        let mut interop = routed
            .has(DirectoryKind::Interop)
            .then(|| builder(DirectoryKind::Interop));
        let mut ifd1 = (routed.has(DirectoryKind::Ifd1) || has_thumbnail)
            .then(|| builder(DirectoryKind::Ifd1));

        // Phase 1: every entry, including layout-dependent ones
        ifd0.add_tags(routed.group(DirectoryKind::Ifd0), &mut diagnostics);
        exif.add_tags(routed.group(DirectoryKind::Exif), &mut diagnostics);
        exif.ensure_exif_version();

        ifd0.insert_deferred(
            TiffTag::ExifIfdPointer.as_u16(),
            1,
            Deferred::Directory(DirectoryKind::Exif),
        );
        if let Some(gps) = gps.as_mut() {
            gps.add_tags(routed.group(DirectoryKind::Gps), &mut diagnostics);
            ifd0.insert_deferred(
                TiffTag::GpsIfdPointer.as_u16(),
                1,
                Deferred::Directory(DirectoryKind::Gps),
            );
        }
        if let Some(interop) = interop.as_mut() {
            interop.add_tags(routed.group(DirectoryKind::Interop), &mut diagnostics);
            exif.insert_deferred(
                TiffTag::InteropIfdPointer.as_u16(),
                1,
                Deferred::Directory(DirectoryKind::Interop),
            );
        }

        let payload = &structure.payload;
        if let Some((offsets_tag, counts_tag)) = payload.layout.tags().filter(|_| !payload.is_empty()) {
            let count = segment_count(&payload.byte_counts)?;
            ifd0.insert_deferred(offsets_tag.as_u16(), count, Deferred::PayloadOffsets);
            ifd0.insert_encoded(
                counts_tag.as_u16(),
                self.codec.encode_longs(&payload.byte_counts)?,
            );
        }

        if let Some(ifd1) = ifd1.as_mut() {
            ifd1.add_tags(routed.group(DirectoryKind::Ifd1), &mut diagnostics);
            match &structure.thumbnail {
                Some(Thumbnail::Jpeg(jpeg)) => {
                    let len = u32::try_from(jpeg.len()).map_err(|_| WriteError::OffsetOverflow {
                        offset: jpeg.len() as u64,
                    })?;
                    ifd1.insert_deferred(
                        TiffTag::JpegInterchangeFormat.as_u16(),
                        1,
                        Deferred::Thumbnail,
                    );
                    ifd1.insert_encoded(
                        TiffTag::JpegInterchangeFormatLength.as_u16(),
                        self.codec.encode_longs(&[len])?,
                    );
                }
                Some(Thumbnail::Segments(segments)) => {
                    if let Some((offsets_tag, counts_tag)) = segments.layout.tags() {
                        let count = segment_count(&segments.byte_counts)?;
                        ifd1.insert_deferred(offsets_tag.as_u16(), count, Deferred::Thumbnail);
                        ifd1.insert_encoded(
                            counts_tag.as_u16(),
                            self.codec.encode_longs(&segments.byte_counts)?,
                        );
                    }
                }
                None => {}
            }
        }

        let mut directories: Vec<BuiltDirectory> = vec![ifd0.finish()?, exif.finish()?];
        for optional in [gps, interop, ifd1].into_iter().flatten() {
            directories.push(optional.finish()?);
        }

        // Phase 2: one layout pass, then serialize
        let byte_counts: Vec<u64> = payload.byte_counts.iter().map(|&c| c as u64).collect();
        let thumbnail_counts: Vec<u64> = structure
            .thumbnail
            .iter()
            .flat_map(|t| t.byte_counts())
            .map(u64::from)
            .collect();
        let linked = IfdLinker::new(self.codec.byte_order()).link(
            directories,
            &thumbnail_counts,
            &byte_counts,
        )?;
        let bytes = assemble(&linked, structure)?;

        info!(
            "wrote {} bytes, {} directories, {} diagnostics",
            bytes.len(),
            linked.directories.len(),
            diagnostics.len()
        );

        Ok(Encoded { bytes, diagnostics })
    }
}

fn segment_count(byte_counts: &[u32]) -> Result<u32, WriteError> {
    u32::try_from(byte_counts.len()).map_err(|_| WriteError::OffsetOverflow {
        offset: byte_counts.len() as u64,
    })
}

// =============================================================================
// Assembly
// =============================================================================

/// Serialize a linked stream with its thumbnail and payload.
///
/// # Errors
/// `UnresolvedEntry` if the structure does not match the regions the
/// stream was linked with.
pub fn assemble(stream: &LinkedStream, structure: &PreservedStructure) -> Result<Vec<u8>, WriteError> {
    let order = stream.byte_order;
    let mut out = Vec::with_capacity(stream.total_len as usize);

    let first_ifd_offset = stream
        .directories
        .first()
        .map(|d| d.offset)
        .ok_or(WriteError::UnresolvedEntry {
            directory: DirectoryKind::Ifd0,
            tag: 0,
        })?;
    out.extend_from_slice(
        &TiffHeader {
            byte_order: order,
            first_ifd_offset,
        }
        .to_bytes(),
    );

    for directory in &stream.directories {
        pad_to(&mut out, directory.offset);
        order.write_u16(&mut out, directory.entries.len() as u16);
        for entry in &directory.entries {
            order.write_u16(&mut out, entry.id);
            order.write_u16(&mut out, entry.tag_type.as_u16());
            order.write_u32(&mut out, entry.count);
            out.extend_from_slice(&entry.value_field);
        }
        order.write_u32(&mut out, directory.next_offset);
        out.extend_from_slice(&directory.data);
    }

    if let (Some(offset), Some(thumbnail)) = (stream.thumbnail_offset, &structure.thumbnail) {
        pad_to(&mut out, offset);
        out.extend_from_slice(thumbnail.data());
    }

    if let Some(offset) = stream.payload_offset {
        pad_to(&mut out, offset);
        out.extend_from_slice(&structure.payload.data);
    }

    // Trailing alignment padding after the last region
    if out.len() as u64 > stream.total_len {
        return Err(WriteError::UnresolvedEntry {
            directory: DirectoryKind::Ifd0,
            tag: 0,
        });
    }
    out.resize(stream.total_len as usize, 0);

    debug!("assembled {} bytes", out.len());
    Ok(out)
}

fn pad_to(out: &mut Vec<u8>, offset: u32) {
    if out.len() < offset as usize {
        out.resize(offset as usize, 0);
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Layout and linking.
//!
//! The linker is the second phase of a write. It receives every built
//! directory, with all entries already present (pointer and payload entries
//! included as deferred placeholders), so entry counts and data block sizes
//! are final before any offset is assigned. One pass over the regions then
//! fixes every offset:
//!
//! ```text
//! +--------+------+-----------+------+------+-----+------+------+-----------+---------+
//! | header | IFD0 | IFD0 data | Exif | data | GPS | data | ...  | thumbnail | payload |
//! +--------+------+-----------+------+------+-----+------+------+-----------+---------+
//!   8 bytes  each directory is followed by its own data block; every region
//!            starts at an even offset
//! ```
//!
//! After placement, deferred entries are resolved in place: pointer entries
//! receive the target directory's offset, payload offset entries receive the
//! new strip or tile offsets, and thumbnail entries receive the offset of
//! the JPEG thumbnail or of each thumbnail strip.

use tracing::debug;

use crate::error::WriteError;

use super::builder::{BuiltDirectory, Deferred, Storage};
use super::parser::{ByteOrder, TIFF_HEADER_SIZE};
use super::tags::{DirectoryKind, TagType};

// =============================================================================
// Linked output
// =============================================================================

/// A directory entry with its final 4-byte value field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedEntry {
    pub id: u16,
    pub tag_type: TagType,
    pub count: u32,

    /// Inline value or absolute offset, in stream byte order
    pub value_field: [u8; 4],
}

/// A directory placed at its final offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedDirectory {
    pub kind: DirectoryKind,

    /// Offset of the entry count field
    pub offset: u32,

    pub entries: Vec<LinkedEntry>,

    /// Offset of the next directory in the chain (0 = none)
    pub next_offset: u32,

    /// Overflow values, with deferred values filled in
    pub data: Vec<u8>,
}

/// Complete placement of an output stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedStream {
    pub byte_order: ByteOrder,

    /// Directories in output order
    pub directories: Vec<LinkedDirectory>,

    /// Offset of the thumbnail region, if any
    pub thumbnail_offset: Option<u32>,

    /// Offset of the payload region, if any
    pub payload_offset: Option<u32>,

    /// Offset of each payload segment
    pub payload_offsets: Vec<u32>,

    /// Total length of the stream
    pub total_len: u64,
}

impl LinkedStream {
    pub fn directory(&self, kind: DirectoryKind) -> Option<&LinkedDirectory> {
        self.directories.iter().find(|d| d.kind == kind)
    }

    pub fn directory_offset(&self, kind: DirectoryKind) -> Option<u32> {
        self.directory(kind).map(|d| d.offset)
    }
}

// =============================================================================
// IfdLinker
// =============================================================================

/// Places directories and resolves deferred entries.
#[derive(Debug, Clone, Copy)]
pub struct IfdLinker {
    byte_order: ByteOrder,
}

impl IfdLinker {
    pub fn new(byte_order: ByteOrder) -> Self {
        Self { byte_order }
    }

    /// Lay out `directories`, a thumbnail made of segments of
    /// `thumbnail_byte_counts` bytes (one segment for a JPEG thumbnail, one
    /// per strip otherwise) and a payload made of segments of
    /// `payload_byte_counts` bytes. Empty slices place no region.
    ///
    /// Directories are placed in [`DirectoryKind`] order regardless of the
    /// order given. IFD0's next pointer links to IFD1 when present.
    ///
    /// # Errors
    /// - `OffsetOverflow` if any region would start or end beyond the
    ///   32-bit offset range
    /// - `UnresolvedEntry` if a deferred entry targets a missing directory
    ///   or its count does not match the region it points at
    pub fn link(
        &self,
        mut directories: Vec<BuiltDirectory>,
        thumbnail_byte_counts: &[u64],
        payload_byte_counts: &[u64],
    ) -> Result<LinkedStream, WriteError> {
        directories.sort_by_key(|d| d.kind);

        // Pass 1: region placement
        let mut cursor = TIFF_HEADER_SIZE as u64;
        let mut placements = Vec::with_capacity(directories.len());
        for directory in &directories {
            let offset = cursor;
            let data_offset = offset + directory.directory_len() as u64;
            cursor = align_even(data_offset + directory.data.len() as u64);
            placements.push((checked_offset(offset)?, checked_offset(data_offset)?));
        }

        let (thumbnail_offset, thumbnail_offsets) = place_segments(&mut cursor, thumbnail_byte_counts)?;
        if thumbnail_offset.is_some() {
            cursor = align_even(cursor);
        }
        let (payload_offset, payload_offsets) = place_segments(&mut cursor, payload_byte_counts)?;

        // The last region must also end inside the offset range
        checked_offset(cursor)?;

        let directory_offsets: Vec<(DirectoryKind, u32)> = directories
            .iter()
            .zip(&placements)
            .map(|(d, &(offset, _))| (d.kind, offset))
            .collect();
        let offset_of = |kind: DirectoryKind| {
            directory_offsets
                .iter()
                .find(|(k, _)| *k == kind)
                .map(|&(_, offset)| offset)
        };

        // Pass 2: resolve deferred entries
        let mut linked = Vec::with_capacity(directories.len());
        for (directory, &(offset, data_offset)) in directories.into_iter().zip(&placements) {
            let kind = directory.kind;
            let mut data = directory.data;
            let mut entries = Vec::with_capacity(directory.entries.len());

            for pending in directory.entries {
                let entry = pending.entry;
                let mut value_field = match entry.storage {
                    Storage::Inline(bytes) => bytes,
                    Storage::Offset(relative) => self
                        .byte_order
                        .u32_bytes(data_offset + relative),
                };

                if let Some(target) = pending.deferred {
                    let unresolved = || WriteError::UnresolvedEntry {
                        directory: kind,
                        tag: entry.id,
                    };
                    let values = match target {
                        Deferred::Directory(target) => vec![offset_of(target).ok_or_else(unresolved)?],
                        Deferred::Thumbnail => thumbnail_offsets.clone(),
                        Deferred::PayloadOffsets => payload_offsets.clone(),
                    };
                    if values.len() != entry.count as usize {
                        return Err(unresolved());
                    }

                    let bytes: Vec<u8> = values
                        .iter()
                        .flat_map(|&v| self.byte_order.u32_bytes(v))
                        .collect();
                    match entry.storage {
                        Storage::Inline(_) => {
                            value_field = [0; 4];
                            value_field[..bytes.len()].copy_from_slice(&bytes);
                        }
                        Storage::Offset(relative) => {
                            let start = relative as usize;
                            data[start..start + bytes.len()].copy_from_slice(&bytes);
                        }
                    }
                }

                entries.push(LinkedEntry {
                    id: entry.id,
                    tag_type: entry.tag_type,
                    count: entry.count,
                    value_field,
                });
            }

            let next_offset = match kind {
                DirectoryKind::Ifd0 => offset_of(DirectoryKind::Ifd1).unwrap_or(0),
                _ => 0,
            };

            linked.push(LinkedDirectory {
                kind,
                offset,
                entries,
                next_offset,
                data,
            });
        }

        debug!(
            "linked {} directories, {} payload segments, {} bytes total",
            linked.len(),
            payload_offsets.len(),
            cursor
        );

        Ok(LinkedStream {
            byte_order: self.byte_order,
            directories: linked,
            thumbnail_offset,
            payload_offset,
            payload_offsets,
            total_len: cursor,
        })
    }
}

/// Place back-to-back segments at `cursor`: the region start and the
/// offset of each segment.
fn place_segments(cursor: &mut u64, byte_counts: &[u64]) -> Result<(Option<u32>, Vec<u32>), WriteError> {
    if byte_counts.is_empty() {
        return Ok((None, Vec::new()));
    }
    let start = checked_offset(*cursor)?;
    let mut offsets = Vec::with_capacity(byte_counts.len());
    for &len in byte_counts {
        offsets.push(checked_offset(*cursor)?);
        *cursor += len;
    }
    Ok((Some(start), offsets))
}

#[inline]
fn align_even(position: u64) -> u64 {
    position + (position & 1)
}

fn checked_offset(position: u64) -> Result<u32, WriteError> {
    u32::try_from(position).map_err(|_| WriteError::OffsetOverflow { offset: position })
}

// =============================================================================
// Tests
// =============================================================================

//! Reading EXIF streams back into tag maps.
//!
//! The reader walks IFD0, the sub-directories its pointer tags reference,
//! and the IFD1 chain link. Every directory offset is visited at most once,
//! so self-referencing pointers terminate. Structural tags (pointers, strip
//! and tile layout, thumbnail location) are consumed by the walk and never
//! reported as tags.
//!
//! Only IFD0 is required to parse. A broken sub-directory or entry is logged
//! and skipped, since EXIF blocks from real cameras often carry dangling
//! offsets in vendor areas.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::TiffError;

use super::codec::{ExifVersion, TagCodec};
use super::parser::{ByteOrder, Ifd, TiffHeader};
use super::registry::TagRegistry;
use super::tags::{DirectoryKind, TiffTag};
use super::values::{TagMap, ValueReader};

/// Tags decoded from a stream, with the stream's byte order.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedStream {
    pub byte_order: ByteOrder,

    /// Directories found, in visit order
    pub directories: Vec<DirectoryKind>,

    pub tags: TagMap,
}

/// Decode a classic TIFF stream into a flat tag map.
///
/// # Errors
/// Fails only if the header or IFD0 cannot be parsed.
pub fn decode_stream(data: &[u8], registry: &TagRegistry) -> Result<DecodedStream, TiffError> {
    let header = TiffHeader::parse(data)?;
    let byte_order = header.byte_order;
    let ifd0 = Ifd::parse(data, header.first_ifd_offset, byte_order)?;

    let mut walker = Walker {
        data,
        registry,
        reader: ValueReader::new(data, byte_order),
        codec: TagCodec::new(byte_order, ExifVersion::default()),
        visited: HashSet::from([header.first_ifd_offset]),
        directories: Vec::new(),
        tags: TagMap::new(),
    };

    walker.read_directory(DirectoryKind::Ifd0, &ifd0);

    if ifd0.next_ifd_offset != 0 {
        walker.visit(DirectoryKind::Ifd1, ifd0.next_ifd_offset);
    }

    debug!(
        "decoded {} tags from {} directories",
        walker.tags.len(),
        walker.directories.len()
    );

    Ok(DecodedStream {
        byte_order,
        directories: walker.directories,
        tags: walker.tags,
    })
}

struct Walker<'a, 'r> {
    data: &'a [u8],
    registry: &'r TagRegistry,
    reader: ValueReader<'a>,
    codec: TagCodec,
    visited: HashSet<u32>,
    directories: Vec<DirectoryKind>,
    tags: TagMap,
}

impl Walker<'_, '_> {
    fn visit(&mut self, kind: DirectoryKind, offset: u32) {
        if !self.visited.insert(offset) {
            warn!("{} at offset {} already visited, skipping", kind, offset);
            return;
        }
        match Ifd::parse(self.data, offset, self.reader.byte_order()) {
            Ok(ifd) => self.read_directory(kind, &ifd),
            Err(e) => warn!("skipping {} at offset {}: {}", kind, offset, e),
        }
    }

    fn read_directory(&mut self, kind: DirectoryKind, ifd: &Ifd) {
        self.directories.push(kind);
        let mut children = Vec::new();

        for entry in &ifd.entries {
            if let Some(structural) = TiffTag::from_u16(entry.tag) {
                let target = structural
                    .target_directory()
                    .filter(|_| kind.owns_pointer(structural));
                if let Some(target) = target {
                    match self.reader.read_u32_array(entry) {
                        Ok(offsets) if offsets.len() == 1 => children.push((target, offsets[0])),
                        Ok(_) => warn!("{} pointer in {} has {} values", target, kind, entry.count),
                        Err(e) => warn!("bad {} pointer in {}: {}", target, kind, e),
                    }
                } else if structural == TiffTag::SubIfds {
                    warn!("{} has SubIFDs, which are not decoded and block rewrites", kind);
                }
                continue;
            }

            let Some(tag_type) = entry.field_type else {
                warn!(
                    "skipping tag 0x{:04X} in {}: unknown type {}",
                    entry.tag, kind, entry.field_type_raw
                );
                continue;
            };

            let hint = self.registry.hint(kind, entry.tag);
            let decoded = self.reader.read_bytes(entry).and_then(|bytes| {
                self.codec
                    .decode_hinted(tag_type, &bytes, entry.count, hint)
            });
            match decoded {
                Ok(value) => {
                    self.tags.insert(self.registry.key_for(kind, entry.tag), value);
                }
                Err(e) => warn!("skipping tag 0x{:04X} in {}: {}", entry.tag, kind, e),
            }
        }

        for (target, offset) in children {
            self.visit(target, offset);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Directory building.
//!
//! Building a directory is the first of two phases. [`route_tags`] sorts a
//! flat tag map into per-directory groups, and a [`DirectoryBuilder`] turns
//! one group into ascending entries plus an overflow data block. Values that
//! depend on the final layout (sub-directory pointers, strip offsets, the
//! thumbnail offset) are added as deferred entries with a known count; the
//! linker fills them in once every directory is complete.
//!
//! # Entry storage
//!
//! ```text
//! byte_length <= 4   value stored inline, left-justified, zero padded
//! byte_length >  4   value appended to the data block at an even offset,
//!                    entry holds the offset relative to the block start
//! ```

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{Diagnostic, EncodeError, WriteError};

use super::codec::{EncodedValue, TagCodec};
use super::parser::directory_len;
use super::registry::{split_key, TagRegistry};
use super::tags::{is_structural, DirectoryKind, TagType, EXIF_VERSION_TAG};
use super::values::{TagMap, Value};

// =============================================================================
// Entries
// =============================================================================

/// Where an entry's value lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// Value bytes, left-justified in the 4-byte field
    Inline([u8; 4]),

    /// Offset relative to the start of the directory's data block
    Offset(u32),
}

/// A directory entry with its storage decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEntry {
    pub id: u16,
    pub tag_type: TagType,
    pub count: u32,
    pub storage: Storage,
}

impl TagEntry {
    pub fn byte_length(&self) -> u64 {
        self.tag_type.byte_length(self.count)
    }
}

/// Layout-dependent values resolved by the linker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    /// Offset of a sub-directory's header
    Directory(DirectoryKind),

    /// Offsets of each preserved strip or tile
    PayloadOffsets,

    /// Offset of the IFD1 thumbnail, or of each of its strips
    Thumbnail,
}

/// An entry, plus what to resolve its value from if it is deferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub entry: TagEntry,
    pub deferred: Option<Deferred>,
}

/// Output of [`DirectoryBuilder::finish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltDirectory {
    pub kind: DirectoryKind,

    /// Entries in strictly ascending id order
    pub entries: Vec<PendingEntry>,

    /// Overflow values, even-aligned
    pub data: Vec<u8>,
}

impl BuiltDirectory {
    /// Byte length of the directory header (count, entries, next offset).
    pub fn directory_len(&self) -> usize {
        directory_len(self.entries.len())
    }

    pub fn entry(&self, id: u16) -> Option<&PendingEntry> {
        self.entries.iter().find(|e| e.entry.id == id)
    }
}

// =============================================================================
// Routing
// =============================================================================

/// A caller tag resolved to its directory and id.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedTag<'a> {
    pub key: &'a str,
    pub id: u16,
    pub value: &'a Value,
}

/// Tags grouped by directory.
#[derive(Debug, Default)]
pub struct RoutedTags<'a> {
    groups: BTreeMap<DirectoryKind, Vec<RoutedTag<'a>>>,
}

impl<'a> RoutedTags<'a> {
    pub fn group(&self, kind: DirectoryKind) -> &[RoutedTag<'a>] {
        self.groups.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn has(&self, kind: DirectoryKind) -> bool {
        !self.group(kind).is_empty()
    }
}

/// Resolve every key in `tags` against the registry.
///
/// Keys with unknown namespaces or names, and keys naming structural tags,
/// are reported in `diagnostics` and left out.
pub fn route_tags<'a>(
    tags: &'a TagMap,
    registry: &TagRegistry,
    diagnostics: &mut Vec<Diagnostic>,
) -> RoutedTags<'a> {
    let mut routed = RoutedTags::default();

    for (key, value) in tags {
        let resolved = split_key(key).and_then(|(namespace, name)| registry.resolve(namespace, name));
        let (kind, id) = match resolved {
            Ok(found) => found,
            Err(error) => {
                debug!("dropping {}: {}", key, error);
                diagnostics.push(Diagnostic::dropped(key.as_str(), error));
                continue;
            }
        };

        let structural_directory = matches!(
            kind,
            DirectoryKind::Ifd0 | DirectoryKind::Exif | DirectoryKind::Ifd1
        );
        if structural_directory && is_structural(id) {
            diagnostics.push(Diagnostic::dropped(
                key.as_str(),
                EncodeError::StructuralTag { id },
            ));
            continue;
        }

        routed.groups.entry(kind).or_default().push(RoutedTag {
            key: key.as_str(),
            id,
            value,
        });
    }

    routed
}

// =============================================================================
// DirectoryBuilder
// =============================================================================

enum Field {
    Value(EncodedValue),
    Deferred { count: u32, target: Deferred },
}

/// Collects the fields of one directory.
pub struct DirectoryBuilder<'r> {
    kind: DirectoryKind,
    registry: &'r TagRegistry,
    codec: TagCodec,
    fields: BTreeMap<u16, Field>,
}

impl<'r> DirectoryBuilder<'r> {
    pub fn new(kind: DirectoryKind, registry: &'r TagRegistry, codec: TagCodec) -> Self {
        Self {
            kind,
            registry,
            codec,
            fields: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> DirectoryKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, id: u16) -> bool {
        self.fields.contains_key(&id)
    }

    /// Encode and add routed tags. Tags that fail to encode are dropped and
    /// reported; lossy encodings are kept and reported.
    pub fn add_tags(&mut self, tags: &[RoutedTag<'_>], diagnostics: &mut Vec<Diagnostic>) {
        for tag in tags {
            let hint = self.registry.hint(self.kind, tag.id);
            match self.codec.encode(tag.value, hint) {
                Ok(encoded) => {
                    if let Some(note) = &encoded.lossy {
                        diagnostics.push(Diagnostic::lossy(tag.key, note.as_str()));
                    }
                    self.insert_encoded(tag.id, encoded);
                }
                Err(error) => {
                    debug!("dropping {}: {}", tag.key, error);
                    diagnostics.push(Diagnostic::dropped(tag.key, error));
                }
            }
        }
    }

    /// Add an already encoded value, replacing any field with the same id.
    pub fn insert_encoded(&mut self, id: u16, encoded: EncodedValue) {
        self.fields.insert(id, Field::Value(encoded));
    }

    /// Add a LONG entry of `count` values resolved from the layout.
    pub fn insert_deferred(&mut self, id: u16, count: u32, target: Deferred) {
        self.fields.insert(id, Field::Deferred { count, target });
    }

    /// Add ExifVersion if the caller did not supply one.
    pub fn ensure_exif_version(&mut self) {
        if self.contains(EXIF_VERSION_TAG) {
            return;
        }
        let version = self.codec.version();
        self.insert_encoded(
            EXIF_VERSION_TAG,
            EncodedValue {
                tag_type: TagType::Undefined,
                count: 4,
                bytes: version.as_bytes().to_vec(),
                lossy: None,
            },
        );
    }

    /// Decide storage for every field and lay out the data block.
    ///
    /// # Errors
    /// `TooManyEntries` if the directory exceeds the 16-bit entry count.
    pub fn finish(self) -> Result<BuiltDirectory, WriteError> {
        if self.fields.len() > u16::MAX as usize {
            return Err(WriteError::TooManyEntries {
                directory: self.kind,
                count: self.fields.len(),
            });
        }

        let mut entries = Vec::with_capacity(self.fields.len());
        let mut data = Vec::new();

        for (id, field) in self.fields {
            let (tag_type, count, bytes, deferred) = match field {
                Field::Value(encoded) => (encoded.tag_type, encoded.count, encoded.bytes, None),
                Field::Deferred { count, target } => (
                    TagType::Long,
                    count,
                    vec![0u8; count as usize * 4],
                    Some(target),
                ),
            };

            let storage = if bytes.len() <= TagType::INLINE_THRESHOLD {
                let mut inline = [0u8; 4];
                inline[..bytes.len()].copy_from_slice(&bytes);
                Storage::Inline(inline)
            } else {
                let offset = data.len() as u32;
                data.extend_from_slice(&bytes);
                if data.len() % 2 == 1 {
                    data.push(0);
                }
                Storage::Offset(offset)
            };

            entries.push(PendingEntry {
                entry: TagEntry {
                    id,
                    tag_type,
                    count,
                    storage,
                },
                deferred,
            });
        }

        debug!(
            "built {} with {} entries, {} data bytes",
            self.kind,
            entries.len(),
            data.len()
        );

        Ok(BuiltDirectory {
            kind: self.kind,
            entries,
            data,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

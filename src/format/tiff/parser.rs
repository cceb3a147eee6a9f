//! TIFF header and directory parsing.
//!
//! EXIF data is always stored as classic TIFF: 32-bit offsets, 12-byte
//! directory entries, and a 4-byte value field.
//!
//! # TIFF Header Structure
//!
//! ```text
//! Bytes 0-1: Byte order (0x4949 = little-endian "II", 0x4D4D = big-endian "MM")
//! Bytes 2-3: Version (42 = 0x002A)
//! Bytes 4-7: Offset to first IFD (4 bytes)
//! ```
//!
//! # Directory Structure
//!
//! ```text
//! u16            entry count n
//! n × 12 bytes   entries: tag u16, type u16, count u32, value/offset u32
//! u32            offset of the next directory (0 = none)
//! ```

use crate::error::TiffError;
use crate::io::{read_u16_be, read_u16_le, read_u32_be, read_u32_le};

use super::tags::TagType;

// =============================================================================
// Constants
// =============================================================================

/// Magic bytes indicating little-endian byte order ("II" for Intel)
const BYTE_ORDER_LITTLE_ENDIAN: u16 = 0x4949;

/// Magic bytes indicating big-endian byte order ("MM" for Motorola)
const BYTE_ORDER_BIG_ENDIAN: u16 = 0x4D4D;

/// Version number for classic TIFF
pub const TIFF_MAGIC: u16 = 42;

/// Size of the TIFF header in bytes
pub const TIFF_HEADER_SIZE: usize = 8;

/// Size of one directory entry in bytes
pub const IFD_ENTRY_SIZE: usize = 12;

/// Size of the entry count plus the next-IFD offset
pub const IFD_OVERHEAD: usize = 2 + 4;

/// Byte length of a directory with `entry_count` entries.
#[inline]
pub const fn directory_len(entry_count: usize) -> usize {
    IFD_OVERHEAD + entry_count * IFD_ENTRY_SIZE
}

// =============================================================================
// ByteOrder
// =============================================================================

/// Byte order (endianness) of a TIFF stream.
///
/// All multi-byte values in the stream follow the order declared in the
/// first two header bytes, both when reading and when writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    /// Little-endian ("II" = Intel)
    #[default]
    LittleEndian,
    /// Big-endian ("MM" = Motorola)
    BigEndian,
}

impl ByteOrder {
    /// Read a u16 from a byte slice using this byte order.
    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        match self {
            ByteOrder::LittleEndian => read_u16_le(bytes),
            ByteOrder::BigEndian => read_u16_be(bytes),
        }
    }

    /// Read a u32 from a byte slice using this byte order.
    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            ByteOrder::LittleEndian => read_u32_le(bytes),
            ByteOrder::BigEndian => read_u32_be(bytes),
        }
    }

    #[inline]
    pub fn u16_bytes(self, value: u16) -> [u8; 2] {
        match self {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        }
    }

    #[inline]
    pub fn u32_bytes(self, value: u32) -> [u8; 4] {
        match self {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        }
    }

    /// Append a u16 in this byte order.
    #[inline]
    pub fn write_u16(self, out: &mut Vec<u8>, value: u16) {
        out.extend_from_slice(&self.u16_bytes(value));
    }

    /// Append a u32 in this byte order.
    #[inline]
    pub fn write_u32(self, out: &mut Vec<u8>, value: u32) {
        out.extend_from_slice(&self.u32_bytes(value));
    }

    /// The two marker bytes that open a stream in this order.
    pub const fn marker(self) -> [u8; 2] {
        match self {
            ByteOrder::LittleEndian => *b"II",
            ByteOrder::BigEndian => *b"MM",
        }
    }

    /// Parse a user-facing name ("little", "le", "II", "big", "be", "MM").
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "little" | "le" | "ii" | "intel" => Some(ByteOrder::LittleEndian),
            "big" | "be" | "mm" | "motorola" => Some(ByteOrder::BigEndian),
            _ => None,
        }
    }
}

// =============================================================================
// TiffHeader
// =============================================================================

/// Parsed TIFF stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    /// Byte order for all multi-byte values in the stream
    pub byte_order: ByteOrder,

    /// Offset to the first IFD
    pub first_ifd_offset: u32,
}

impl TiffHeader {
    /// Parse a TIFF header from the start of `bytes`.
    ///
    /// `bytes` is the whole stream; the first IFD offset is checked against
    /// its length.
    ///
    /// # Errors
    /// - `FileTooSmall` if there aren't enough bytes for the header
    /// - `InvalidMagic` if byte order bytes are not II or MM
    /// - `InvalidVersion` if version is not 42
    /// - `InvalidIfdOffset` if the first IFD offset is outside the stream
    pub fn parse(bytes: &[u8]) -> Result<Self, TiffError> {
        if bytes.len() < TIFF_HEADER_SIZE {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        // Checked as fixed byte patterns, so read the marker as little-endian
        let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
        let byte_order = match magic {
            BYTE_ORDER_LITTLE_ENDIAN => ByteOrder::LittleEndian,
            BYTE_ORDER_BIG_ENDIAN => ByteOrder::BigEndian,
            _ => return Err(TiffError::InvalidMagic(magic)),
        };

        let version = byte_order.read_u16(&bytes[2..4]);
        if version != TIFF_MAGIC {
            return Err(TiffError::InvalidVersion(version));
        }

        let first_ifd_offset = byte_order.read_u32(&bytes[4..8]);
        if (first_ifd_offset as usize) < TIFF_HEADER_SIZE
            || first_ifd_offset as usize >= bytes.len()
        {
            return Err(TiffError::InvalidIfdOffset(first_ifd_offset as u64));
        }

        Ok(TiffHeader {
            byte_order,
            first_ifd_offset,
        })
    }

    /// Serialize the header.
    pub fn to_bytes(&self) -> [u8; TIFF_HEADER_SIZE] {
        let mut out = [0u8; TIFF_HEADER_SIZE];
        out[0..2].copy_from_slice(&self.byte_order.marker());
        out[2..4].copy_from_slice(&self.byte_order.u16_bytes(TIFF_MAGIC));
        out[4..8].copy_from_slice(&self.byte_order.u32_bytes(self.first_ifd_offset));
        out
    }
}

/// Check whether `bytes` starts with a classic TIFF signature.
pub fn is_tiff_header(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && (bytes[..4] == *b"II*\0" || bytes[..4] == *b"MM\0*")
}

// =============================================================================
// IfdEntry
// =============================================================================

/// One 12-byte directory entry as found in a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfdEntry {
    pub tag: u16,

    /// Decoded field type, `None` if the type code is unknown
    pub field_type: Option<TagType>,

    pub field_type_raw: u16,

    pub count: u32,

    /// The raw value/offset field, in stream byte order
    pub value_offset_bytes: [u8; 4],
}

impl IfdEntry {
    /// Total size of the value in bytes, `None` for unknown types.
    pub fn value_byte_size(&self) -> Option<u64> {
        self.field_type.map(|t| t.byte_length(self.count))
    }

    /// Whether the value lives in the value/offset field itself.
    pub fn is_inline(&self) -> bool {
        self.value_byte_size()
            .is_some_and(|size| size <= TagType::INLINE_THRESHOLD as u64)
    }

    /// Interpret the value/offset field as an offset.
    #[inline]
    pub fn value_offset(&self, byte_order: ByteOrder) -> u32 {
        byte_order.read_u32(&self.value_offset_bytes)
    }

    /// Read an inline SHORT or LONG scalar.
    pub fn inline_u32(&self, byte_order: ByteOrder) -> Option<u32> {
        if self.count != 1 {
            return None;
        }
        match self.field_type? {
            TagType::Short => Some(byte_order.read_u16(&self.value_offset_bytes) as u32),
            TagType::Long => Some(byte_order.read_u32(&self.value_offset_bytes)),
            _ => None,
        }
    }

    fn parse(bytes: &[u8], byte_order: ByteOrder) -> Self {
        let field_type_raw = byte_order.read_u16(&bytes[2..4]);
        IfdEntry {
            tag: byte_order.read_u16(&bytes[0..2]),
            field_type: TagType::from_u16(field_type_raw),
            field_type_raw,
            count: byte_order.read_u32(&bytes[4..8]),
            value_offset_bytes: [bytes[8], bytes[9], bytes[10], bytes[11]],
        }
    }
}

// =============================================================================
// Ifd
// =============================================================================

/// A parsed Image File Directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ifd {
    /// Where the directory starts in the stream
    pub offset: u32,

    /// Entries in stream order
    pub entries: Vec<IfdEntry>,

    /// Offset of the next directory in the chain (0 = none)
    pub next_ifd_offset: u32,
}

impl Ifd {
    /// Parse the directory at `offset` in `data`.
    ///
    /// # Errors
    /// - `InvalidIfdOffset` if the count field lies outside the stream
    /// - `FileTooSmall` if the entries or next offset run past the end
    pub fn parse(data: &[u8], offset: u32, byte_order: ByteOrder) -> Result<Self, TiffError> {
        let start = offset as usize;
        if start < TIFF_HEADER_SIZE || start + 2 > data.len() {
            return Err(TiffError::InvalidIfdOffset(offset as u64));
        }

        let count = byte_order.read_u16(&data[start..start + 2]) as usize;
        let end = start + directory_len(count);
        if end > data.len() {
            return Err(TiffError::FileTooSmall {
                required: end as u64,
                actual: data.len() as u64,
            });
        }

        let entries = data[start + 2..end - 4]
            .chunks_exact(IFD_ENTRY_SIZE)
            .map(|chunk| IfdEntry::parse(chunk, byte_order))
            .collect();
        let next_ifd_offset = byte_order.read_u32(&data[end - 4..end]);

        Ok(Ifd {
            offset,
            entries,
            next_ifd_offset,
        })
    }

    /// Find an entry by tag id.
    pub fn get_entry_by_tag(&self, tag: u16) -> Option<&IfdEntry> {
        self.entries.iter().find(|e| e.tag == tag)
    }

    /// Byte length of the directory itself (without out-of-line values).
    pub fn byte_len(&self) -> usize {
        directory_len(self.entries.len())
    }
}

// =============================================================================
// Tests
// =============================================================================

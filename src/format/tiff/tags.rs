//! TIFF tag and field type definitions.
//!
//! This module defines the vocabulary shared by the reader and the writer:
//! - Field types that determine how values are encoded
//! - Structural tag IDs that the codec manages itself
//! - The directories an EXIF stream is made of

use std::fmt;

// =============================================================================
// TIFF Field Types
// =============================================================================

/// TIFF field types that determine how values are encoded.
///
/// Each field type has a fixed element size, which decides whether a value
/// fits inline in a directory entry and how arrays are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TagType {
    /// Unsigned 8-bit integer
    Byte = 1,

    /// 8-bit character, NUL terminated
    Ascii = 2,

    /// Unsigned 16-bit integer
    Short = 3,

    /// Unsigned 32-bit integer
    Long = 4,

    /// Two LONGs: numerator, denominator
    Rational = 5,

    /// Signed 8-bit integer
    SByte = 6,

    /// Opaque bytes
    Undefined = 7,

    /// Signed 16-bit integer
    SShort = 8,

    /// Signed 32-bit integer
    SLong = 9,

    /// Two SLONGs: numerator, denominator
    SRational = 10,

    /// IEEE single precision float
    Float = 11,

    /// IEEE double precision float
    Double = 12,
}

impl TagType {
    /// Maximum bytes that can be stored inline in a classic TIFF entry.
    pub const INLINE_THRESHOLD: usize = 4;

    /// Size of a single value of this type in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            TagType::Byte | TagType::Ascii | TagType::SByte | TagType::Undefined => 1,
            TagType::Short | TagType::SShort => 2,
            TagType::Long | TagType::SLong | TagType::Float => 4,
            TagType::Rational | TagType::SRational | TagType::Double => 8,
        }
    }

    /// Create a TagType from its numeric value.
    ///
    /// Returns `None` for unknown type values.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(TagType::Byte),
            2 => Some(TagType::Ascii),
            3 => Some(TagType::Short),
            4 => Some(TagType::Long),
            5 => Some(TagType::Rational),
            6 => Some(TagType::SByte),
            7 => Some(TagType::Undefined),
            8 => Some(TagType::SShort),
            9 => Some(TagType::SLong),
            10 => Some(TagType::SRational),
            11 => Some(TagType::Float),
            12 => Some(TagType::Double),
            _ => None,
        }
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Total byte length of `count` values of this type.
    #[inline]
    pub fn byte_length(self, count: u32) -> u64 {
        self.size_in_bytes() as u64 * count as u64
    }

    /// Check if `count` values of this type fit in the 4-byte value field.
    #[inline]
    pub fn fits_inline(self, count: u32) -> bool {
        self.byte_length(count) <= Self::INLINE_THRESHOLD as u64
    }

    pub const fn name(self) -> &'static str {
        match self {
            TagType::Byte => "BYTE",
            TagType::Ascii => "ASCII",
            TagType::Short => "SHORT",
            TagType::Long => "LONG",
            TagType::Rational => "RATIONAL",
            TagType::SByte => "SBYTE",
            TagType::Undefined => "UNDEFINED",
            TagType::SShort => "SSHORT",
            TagType::SLong => "SLONG",
            TagType::SRational => "SRATIONAL",
            TagType::Float => "FLOAT",
            TagType::Double => "DOUBLE",
        }
    }
}

// =============================================================================
// Structural Tags
// =============================================================================

/// Tags whose values are offsets or sizes of other parts of the stream.
///
/// The writer computes these from the layout; they are never taken from
/// caller input and never reported by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TiffTag {
    /// Byte offsets of strips
    StripOffsets = 273,

    /// Byte counts of strips
    StripByteCounts = 279,

    /// Offsets of free blocks (obsolete)
    FreeOffsets = 288,

    FreeByteCounts = 289,

    /// Byte offsets of each tile
    TileOffsets = 324,

    /// Byte counts of each tile
    TileByteCounts = 325,

    /// Offsets of child IFDs (DNG previews and raw data)
    SubIfds = 330,

    /// Offset of the IFD1 JPEG thumbnail
    JpegInterchangeFormat = 0x0201,

    /// Length of the IFD1 JPEG thumbnail
    JpegInterchangeFormatLength = 0x0202,

    /// Pointer from IFD0 to the Exif IFD
    ExifIfdPointer = 0x8769,

    /// Pointer from IFD0 to the GPS IFD
    GpsIfdPointer = 0x8825,

    /// Pointer from the Exif IFD to the Interoperability IFD
    InteropIfdPointer = 0xA005,
}

impl TiffTag {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            273 => Some(TiffTag::StripOffsets),
            279 => Some(TiffTag::StripByteCounts),
            288 => Some(TiffTag::FreeOffsets),
            289 => Some(TiffTag::FreeByteCounts),
            324 => Some(TiffTag::TileOffsets),
            325 => Some(TiffTag::TileByteCounts),
            330 => Some(TiffTag::SubIfds),
            0x0201 => Some(TiffTag::JpegInterchangeFormat),
            0x0202 => Some(TiffTag::JpegInterchangeFormatLength),
            0x8769 => Some(TiffTag::ExifIfdPointer),
            0x8825 => Some(TiffTag::GpsIfdPointer),
            0xA005 => Some(TiffTag::InteropIfdPointer),
            _ => None,
        }
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// The sub-directory this tag points to, if it is a pointer tag.
    pub const fn target_directory(self) -> Option<DirectoryKind> {
        match self {
            TiffTag::ExifIfdPointer => Some(DirectoryKind::Exif),
            TiffTag::GpsIfdPointer => Some(DirectoryKind::Gps),
            TiffTag::InteropIfdPointer => Some(DirectoryKind::Interop),
            _ => None,
        }
    }
}

/// ExifVersion tag in the Exif IFD.
pub const EXIF_VERSION_TAG: u16 = 0x9000;

/// Whether `id` is a structural tag (see [`TiffTag`]).
#[inline]
pub fn is_structural(id: u16) -> bool {
    TiffTag::from_u16(id).is_some()
}

// =============================================================================
// Directories
// =============================================================================

/// The directories that make up an EXIF stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DirectoryKind {
    /// Primary image directory
    Ifd0,

    /// Exif sub-IFD (camera settings), linked from IFD0
    Exif,

    /// GPS sub-IFD, linked from IFD0
    Gps,

    /// Interoperability sub-IFD, linked from the Exif IFD
    Interop,

    /// Thumbnail directory, chained after IFD0
    Ifd1,
}

impl DirectoryKind {
    /// All directories in output order.
    pub const ALL: [DirectoryKind; 5] = [
        DirectoryKind::Ifd0,
        DirectoryKind::Exif,
        DirectoryKind::Gps,
        DirectoryKind::Interop,
        DirectoryKind::Ifd1,
    ];

    /// Namespace prefix that pins a key to this directory.
    pub const fn namespace(self) -> &'static str {
        match self {
            DirectoryKind::Ifd0 => "IFD0",
            DirectoryKind::Exif => "ExifIFD",
            DirectoryKind::Gps => "GPS",
            DirectoryKind::Interop => "InteropIFD",
            DirectoryKind::Ifd1 => "IFD1",
        }
    }

    pub fn from_namespace(namespace: &str) -> Option<Self> {
        DirectoryKind::ALL
            .into_iter()
            .find(|kind| kind.namespace() == namespace)
    }

    /// The tag in the parent directory that points here.
    pub const fn pointer_tag(self) -> Option<TiffTag> {
        match self {
            DirectoryKind::Exif => Some(TiffTag::ExifIfdPointer),
            DirectoryKind::Gps => Some(TiffTag::GpsIfdPointer),
            DirectoryKind::Interop => Some(TiffTag::InteropIfdPointer),
            DirectoryKind::Ifd0 | DirectoryKind::Ifd1 => None,
        }
    }

    /// Whether this directory holds `tag` as a sub-directory pointer.
    pub const fn owns_pointer(self, tag: TiffTag) -> bool {
        matches!(
            (self, tag),
            (DirectoryKind::Ifd0, TiffTag::ExifIfdPointer)
                | (DirectoryKind::Ifd0, TiffTag::GpsIfdPointer)
                | (DirectoryKind::Exif, TiffTag::InteropIfdPointer)
        )
    }

    /// The directory whose name table this directory uses.
    ///
    /// IFD1 describes a thumbnail with the same vocabulary as IFD0.
    pub const fn vocabulary(self) -> DirectoryKind {
        match self {
            DirectoryKind::Ifd1 => DirectoryKind::Ifd0,
            other => other,
        }
    }
}

impl fmt::Display for DirectoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace())
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Tag name registry.
//!
//! Maps `(directory, name)` to a numeric tag id and back. The registry is
//! immutable once built: [`TagRegistry::standard`] builds the EXIF 3.0 table
//! once per process, and callers pass `&TagRegistry` to the codec. Custom
//! registries are assembled with [`TagRegistry::builder`].
//!
//! # Key namespaces
//!
//! Caller keys have the form `Namespace:Name`:
//!
//! | Namespace    | Directory                                             |
//! |--------------|-------------------------------------------------------|
//! | `EXIF`       | IFD0 or the Exif IFD, whichever defines the name      |
//! | `IFD0`       | IFD0                                                  |
//! | `ExifIFD`    | Exif IFD                                              |
//! | `GPS`        | GPS IFD (`GPS:Latitude` and `GPS:GPSLatitude` both work) |
//! | `InteropIFD` | Interoperability IFD                                  |
//! | `IFD1`       | Thumbnail directory (IFD0 vocabulary)                 |
//!
//! Directory-specific namespaces also accept hex ids (`IFD0:0xC612`) for
//! tags the registry does not name.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::EncodeError;

use super::tags::DirectoryKind;

// =============================================================================
// Type Hints
// =============================================================================

/// Encoding hint for tags whose standard type differs from what the value
/// shape alone would produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeHint {
    /// Pick the type from the value
    #[default]
    Auto,

    /// Text is written as raw UNDEFINED bytes without a terminator
    /// (ExifVersion, FlashpixVersion, ...)
    Undefined,

    /// Small integers are written as BYTE (GPSVersionID, GPSAltitudeRef)
    Byte,

    /// Text carries the 8-byte character code prefix (UserComment)
    Comment,

    /// Text is written as NUL-terminated UTF-16LE BYTE data (XPTitle, ...)
    Ucs2,
}

/// One named tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDefinition {
    pub directory: DirectoryKind,
    pub id: u16,
    pub name: String,
    pub hint: TypeHint,
}

// =============================================================================
// Key Parsing
// =============================================================================

/// Namespace part of a caller key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// `EXIF:` family alias over IFD0 and the Exif IFD
    Exif,

    /// A namespace pinned to one directory
    Directory(DirectoryKind),
}

impl Namespace {
    pub fn parse(prefix: &str) -> Option<Self> {
        if prefix == "EXIF" {
            return Some(Namespace::Exif);
        }
        DirectoryKind::from_namespace(prefix).map(Namespace::Directory)
    }

    /// Whether keys in this namespace may land in `directory`.
    pub fn covers(self, directory: DirectoryKind) -> bool {
        match self {
            Namespace::Exif => matches!(directory, DirectoryKind::Ifd0 | DirectoryKind::Exif),
            Namespace::Directory(kind) => kind == directory,
        }
    }
}

/// Split `Namespace:Name`.
///
/// Keys without a recognized namespace are rejected with
/// [`EncodeError::UnknownNamespace`].
pub fn split_key(key: &str) -> Result<(Namespace, &str), EncodeError> {
    key.split_once(':')
        .and_then(|(prefix, name)| Namespace::parse(prefix).map(|ns| (ns, name)))
        .filter(|(_, name)| !name.is_empty())
        .ok_or_else(|| EncodeError::UnknownNamespace {
            key: key.to_string(),
        })
}

/// Parse a `0xNNNN` tag id.
fn parse_hex_id(name: &str) -> Option<u16> {
    let digits = name
        .strip_prefix("0x")
        .or_else(|| name.strip_prefix("0X"))?;
    u16::from_str_radix(digits, 16).ok()
}

// =============================================================================
// TagRegistry
// =============================================================================

/// Immutable `(directory, name) ↔ id` table.
#[derive(Debug, Clone, Default)]
pub struct TagRegistry {
    by_name: HashMap<(DirectoryKind, String), usize>,
    by_id: HashMap<(DirectoryKind, u16), usize>,
    definitions: Vec<TagDefinition>,
}

impl TagRegistry {
    /// The standard EXIF table, built on first use.
    pub fn standard() -> &'static TagRegistry {
        static STANDARD: OnceLock<TagRegistry> = OnceLock::new();
        STANDARD.get_or_init(|| {
            let mut builder = TagRegistry::builder();
            for (directory, table) in [
                (DirectoryKind::Ifd0, IFD0_TAGS),
                (DirectoryKind::Exif, EXIF_TAGS),
                (DirectoryKind::Gps, GPS_TAGS),
                (DirectoryKind::Interop, INTEROP_TAGS),
            ] {
                for &(id, name, hint) in table {
                    builder = builder.with_tag(directory, id, name, hint);
                }
            }
            builder.build()
        })
    }

    pub fn builder() -> TagRegistryBuilder {
        TagRegistryBuilder::default()
    }

    /// Number of named tags.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Look up a tag by name in one directory.
    ///
    /// GPS names are accepted with or without their `GPS` prefix.
    pub fn lookup(&self, directory: DirectoryKind, name: &str) -> Option<&TagDefinition> {
        let vocabulary = directory.vocabulary();
        let found = self
            .by_name
            .get(&(vocabulary, name.to_string()))
            .or_else(|| match vocabulary {
                DirectoryKind::Gps => self.by_name.get(&(vocabulary, format!("GPS{}", name))),
                _ => None,
            });
        found.map(|&index| &self.definitions[index])
    }

    /// Look up a tag by id in one directory.
    pub fn definition(&self, directory: DirectoryKind, id: u16) -> Option<&TagDefinition> {
        self.by_id
            .get(&(directory.vocabulary(), id))
            .map(|&index| &self.definitions[index])
    }

    /// Registered name of a tag id.
    pub fn name_of(&self, directory: DirectoryKind, id: u16) -> Option<&str> {
        self.definition(directory, id).map(|d| d.name.as_str())
    }

    /// Type hint for a tag id; `Auto` for unregistered tags.
    pub fn hint(&self, directory: DirectoryKind, id: u16) -> TypeHint {
        self.definition(directory, id)
            .map(|d| d.hint)
            .unwrap_or_default()
    }

    /// Resolve the name part of a key within a namespace.
    ///
    /// Returns the directory the tag belongs to and its id. The `EXIF`
    /// family checks IFD0 first, then the Exif IFD.
    pub fn resolve(
        &self,
        namespace: Namespace,
        name: &str,
    ) -> Result<(DirectoryKind, u16), EncodeError> {
        let candidates: &[DirectoryKind] = match namespace {
            Namespace::Exif => &[DirectoryKind::Ifd0, DirectoryKind::Exif],
            Namespace::Directory(DirectoryKind::Ifd0) => &[DirectoryKind::Ifd0],
            Namespace::Directory(DirectoryKind::Exif) => &[DirectoryKind::Exif],
            Namespace::Directory(DirectoryKind::Gps) => &[DirectoryKind::Gps],
            Namespace::Directory(DirectoryKind::Interop) => &[DirectoryKind::Interop],
            Namespace::Directory(DirectoryKind::Ifd1) => &[DirectoryKind::Ifd1],
        };

        for &directory in candidates {
            if let Some(definition) = self.lookup(directory, name) {
                return Ok((directory, definition.id));
            }
        }

        if let (Namespace::Directory(directory), Some(id)) = (namespace, parse_hex_id(name)) {
            return Ok((directory, id));
        }

        Err(EncodeError::UnknownTag {
            namespace: match namespace {
                Namespace::Exif => "EXIF".to_string(),
                Namespace::Directory(kind) => kind.namespace().to_string(),
            },
            name: name.to_string(),
        })
    }

    /// Canonical key for a tag read from `directory`.
    ///
    /// Named IFD0 and Exif tags use the `EXIF` family namespace; other named
    /// tags use their directory namespace; unnamed tags use the directory
    /// namespace and a hex id.
    pub fn key_for(&self, directory: DirectoryKind, id: u16) -> String {
        match (directory, self.name_of(directory, id)) {
            (DirectoryKind::Ifd0 | DirectoryKind::Exif, Some(name)) => format!("EXIF:{}", name),
            (_, Some(name)) => format!("{}:{}", directory.namespace(), name),
            (_, None) => format!("{}:0x{:04X}", directory.namespace(), id),
        }
    }
}

/// Assembles a [`TagRegistry`].
#[derive(Debug, Default)]
pub struct TagRegistryBuilder {
    definitions: Vec<TagDefinition>,
}

impl TagRegistryBuilder {
    /// Add a tag. A later definition of the same name or id in the same
    /// directory replaces the earlier one.
    pub fn with_tag(
        mut self,
        directory: DirectoryKind,
        id: u16,
        name: impl Into<String>,
        hint: TypeHint,
    ) -> Self {
        self.definitions.push(TagDefinition {
            directory: directory.vocabulary(),
            id,
            name: name.into(),
            hint,
        });
        self
    }

    pub fn build(self) -> TagRegistry {
        let mut by_name = HashMap::new();
        let mut by_id = HashMap::new();
        let mut definitions: Vec<TagDefinition> = Vec::new();

        for definition in self.definitions {
            let name_key = (definition.directory, definition.name.clone());
            let id_key = (definition.directory, definition.id);

            let slot = by_name
                .get(&name_key)
                .or_else(|| by_id.get(&id_key))
                .copied();
            let index = match slot {
                Some(index) => {
                    let old: &TagDefinition = &definitions[index];
                    by_name.remove(&(old.directory, old.name.clone()));
                    by_id.remove(&(old.directory, old.id));
                    definitions[index] = definition;
                    index
                }
                None => {
                    definitions.push(definition);
                    definitions.len() - 1
                }
            };
            by_name.insert(name_key, index);
            by_id.insert(id_key, index);
        }

        TagRegistry {
            by_name,
            by_id,
            definitions,
        }
    }
}

// =============================================================================
// Standard Tables
// =============================================================================

type TagTable = &'static [(u16, &'static str, TypeHint)];

const IFD0_TAGS: TagTable = &[
    (0x00FE, "NewSubfileType", TypeHint::Auto),
    (0x00FF, "SubfileType", TypeHint::Auto),
    (0x0100, "ImageWidth", TypeHint::Auto),
    (0x0101, "ImageLength", TypeHint::Auto),
    (0x0102, "BitsPerSample", TypeHint::Auto),
    (0x0103, "Compression", TypeHint::Auto),
    (0x0106, "PhotometricInterpretation", TypeHint::Auto),
    (0x0107, "Thresholding", TypeHint::Auto),
    (0x010A, "FillOrder", TypeHint::Auto),
    (0x010D, "DocumentName", TypeHint::Auto),
    (0x010E, "ImageDescription", TypeHint::Auto),
    (0x010F, "Make", TypeHint::Auto),
    (0x0110, "Model", TypeHint::Auto),
    (0x0112, "Orientation", TypeHint::Auto),
    (0x0115, "SamplesPerPixel", TypeHint::Auto),
    (0x0116, "RowsPerStrip", TypeHint::Auto),
    (0x011A, "XResolution", TypeHint::Auto),
    (0x011B, "YResolution", TypeHint::Auto),
    (0x011C, "PlanarConfiguration", TypeHint::Auto),
    (0x011D, "PageName", TypeHint::Auto),
    (0x0128, "ResolutionUnit", TypeHint::Auto),
    (0x0129, "PageNumber", TypeHint::Auto),
    (0x012D, "TransferFunction", TypeHint::Auto),
    (0x0131, "Software", TypeHint::Auto),
    (0x0132, "DateTime", TypeHint::Auto),
    (0x013B, "Artist", TypeHint::Auto),
    (0x013C, "HostComputer", TypeHint::Auto),
    (0x013D, "Predictor", TypeHint::Auto),
    (0x013E, "WhitePoint", TypeHint::Auto),
    (0x013F, "PrimaryChromaticities", TypeHint::Auto),
    (0x0142, "TileWidth", TypeHint::Auto),
    (0x0143, "TileLength", TypeHint::Auto),
    (0x0152, "ExtraSamples", TypeHint::Auto),
    (0x0153, "SampleFormat", TypeHint::Auto),
    (0x015B, "JPEGTables", TypeHint::Auto),
    (0x0211, "YCbCrCoefficients", TypeHint::Auto),
    (0x0212, "YCbCrSubSampling", TypeHint::Auto),
    (0x0213, "YCbCrPositioning", TypeHint::Auto),
    (0x0214, "ReferenceBlackWhite", TypeHint::Auto),
    (0x02BC, "ApplicationNotes", TypeHint::Auto),
    (0x4746, "Rating", TypeHint::Auto),
    (0x4749, "RatingPercent", TypeHint::Auto),
    (0x8298, "Copyright", TypeHint::Auto),
    (0x83BB, "IPTC-NAA", TypeHint::Auto),
    (0x8773, "InterColorProfile", TypeHint::Auto),
    (0x9C9B, "XPTitle", TypeHint::Ucs2),
    (0x9C9C, "XPComment", TypeHint::Ucs2),
    (0x9C9D, "XPAuthor", TypeHint::Ucs2),
    (0x9C9E, "XPKeywords", TypeHint::Ucs2),
    (0x9C9F, "XPSubject", TypeHint::Ucs2),
    (0xC612, "DNGVersion", TypeHint::Byte),
    (0xC613, "DNGBackwardVersion", TypeHint::Byte),
    (0xC614, "UniqueCameraModel", TypeHint::Auto),
];

const EXIF_TAGS: TagTable = &[
    (0x829A, "ExposureTime", TypeHint::Auto),
    (0x829D, "FNumber", TypeHint::Auto),
    (0x8822, "ExposureProgram", TypeHint::Auto),
    (0x8824, "SpectralSensitivity", TypeHint::Auto),
    (0x8827, "ISO", TypeHint::Auto),
    (0x8828, "OECF", TypeHint::Auto),
    (0x8830, "SensitivityType", TypeHint::Auto),
    (0x8831, "StandardOutputSensitivity", TypeHint::Auto),
    (0x8832, "RecommendedExposureIndex", TypeHint::Auto),
    (0x8833, "ISOSpeed", TypeHint::Auto),
    (0x9000, "ExifVersion", TypeHint::Undefined),
    (0x9003, "DateTimeOriginal", TypeHint::Auto),
    (0x9004, "CreateDate", TypeHint::Auto),
    (0x9010, "OffsetTime", TypeHint::Auto),
    (0x9011, "OffsetTimeOriginal", TypeHint::Auto),
    (0x9012, "OffsetTimeDigitized", TypeHint::Auto),
    (0x9101, "ComponentsConfiguration", TypeHint::Auto),
    (0x9102, "CompressedBitsPerPixel", TypeHint::Auto),
    (0x9201, "ShutterSpeedValue", TypeHint::Auto),
    (0x9202, "ApertureValue", TypeHint::Auto),
    (0x9203, "BrightnessValue", TypeHint::Auto),
    (0x9204, "ExposureCompensation", TypeHint::Auto),
    (0x9205, "MaxApertureValue", TypeHint::Auto),
    (0x9206, "SubjectDistance", TypeHint::Auto),
    (0x9207, "MeteringMode", TypeHint::Auto),
    (0x9208, "LightSource", TypeHint::Auto),
    (0x9209, "Flash", TypeHint::Auto),
    (0x920A, "FocalLength", TypeHint::Auto),
    (0x9214, "SubjectArea", TypeHint::Auto),
    (0x927C, "MakerNote", TypeHint::Auto),
    (0x9286, "UserComment", TypeHint::Comment),
    (0x9290, "SubSecTime", TypeHint::Auto),
    (0x9291, "SubSecTimeOriginal", TypeHint::Auto),
    (0x9292, "SubSecTimeDigitized", TypeHint::Auto),
    (0x9400, "AmbientTemperature", TypeHint::Auto),
    (0x9401, "Humidity", TypeHint::Auto),
    (0x9402, "Pressure", TypeHint::Auto),
    (0x9403, "WaterDepth", TypeHint::Auto),
    (0x9404, "Acceleration", TypeHint::Auto),
    (0x9405, "CameraElevationAngle", TypeHint::Auto),
    (0xA000, "FlashpixVersion", TypeHint::Undefined),
    (0xA001, "ColorSpace", TypeHint::Auto),
    (0xA002, "ExifImageWidth", TypeHint::Auto),
    (0xA003, "ExifImageHeight", TypeHint::Auto),
    (0xA004, "RelatedSoundFile", TypeHint::Auto),
    (0xA20B, "FlashEnergy", TypeHint::Auto),
    (0xA20E, "FocalPlaneXResolution", TypeHint::Auto),
    (0xA20F, "FocalPlaneYResolution", TypeHint::Auto),
    (0xA210, "FocalPlaneResolutionUnit", TypeHint::Auto),
    (0xA214, "SubjectLocation", TypeHint::Auto),
    (0xA215, "ExposureIndex", TypeHint::Auto),
    (0xA217, "SensingMethod", TypeHint::Auto),
    (0xA300, "FileSource", TypeHint::Auto),
    (0xA301, "SceneType", TypeHint::Auto),
    (0xA302, "CFAPattern", TypeHint::Auto),
    (0xA401, "CustomRendered", TypeHint::Auto),
    (0xA402, "ExposureMode", TypeHint::Auto),
    (0xA403, "WhiteBalance", TypeHint::Auto),
    (0xA404, "DigitalZoomRatio", TypeHint::Auto),
    (0xA405, "FocalLengthIn35mmFormat", TypeHint::Auto),
    (0xA406, "SceneCaptureType", TypeHint::Auto),
    (0xA407, "GainControl", TypeHint::Auto),
    (0xA408, "Contrast", TypeHint::Auto),
    (0xA409, "Saturation", TypeHint::Auto),
    (0xA40A, "Sharpness", TypeHint::Auto),
    (0xA40C, "SubjectDistanceRange", TypeHint::Auto),
    (0xA420, "ImageUniqueID", TypeHint::Auto),
    (0xA430, "OwnerName", TypeHint::Auto),
    (0xA431, "SerialNumber", TypeHint::Auto),
    (0xA432, "LensInfo", TypeHint::Auto),
    (0xA433, "LensMake", TypeHint::Auto),
    (0xA434, "LensModel", TypeHint::Auto),
    (0xA435, "LensSerialNumber", TypeHint::Auto),
    (0xA436, "ImageTitle", TypeHint::Auto),
    (0xA437, "Photographer", TypeHint::Auto),
    (0xA438, "ImageEditor", TypeHint::Auto),
    (0xA439, "CameraFirmware", TypeHint::Auto),
    (0xA43A, "RAWDevelopingSoftware", TypeHint::Auto),
    (0xA43B, "ImageEditingSoftware", TypeHint::Auto),
    (0xA43C, "MetadataEditingSoftware", TypeHint::Auto),
    (0xA460, "CompositeImage", TypeHint::Auto),
    (0xA461, "CompositeImageCount", TypeHint::Auto),
    (0xA462, "CompositeImageExposureTimes", TypeHint::Auto),
    (0xA500, "Gamma", TypeHint::Auto),
];

const GPS_TAGS: TagTable = &[
    (0x0000, "GPSVersionID", TypeHint::Byte),
    (0x0001, "GPSLatitudeRef", TypeHint::Auto),
    (0x0002, "GPSLatitude", TypeHint::Auto),
    (0x0003, "GPSLongitudeRef", TypeHint::Auto),
    (0x0004, "GPSLongitude", TypeHint::Auto),
    (0x0005, "GPSAltitudeRef", TypeHint::Byte),
    (0x0006, "GPSAltitude", TypeHint::Auto),
    (0x0007, "GPSTimeStamp", TypeHint::Auto),
    (0x0008, "GPSSatellites", TypeHint::Auto),
    (0x0009, "GPSStatus", TypeHint::Auto),
    (0x000A, "GPSMeasureMode", TypeHint::Auto),
    (0x000B, "GPSDOP", TypeHint::Auto),
    (0x000C, "GPSSpeedRef", TypeHint::Auto),
    (0x000D, "GPSSpeed", TypeHint::Auto),
    (0x000E, "GPSTrackRef", TypeHint::Auto),
    (0x000F, "GPSTrack", TypeHint::Auto),
    (0x0010, "GPSImgDirectionRef", TypeHint::Auto),
    (0x0011, "GPSImgDirection", TypeHint::Auto),
    (0x0012, "GPSMapDatum", TypeHint::Auto),
    (0x0013, "GPSDestLatitudeRef", TypeHint::Auto),
    (0x0014, "GPSDestLatitude", TypeHint::Auto),
    (0x0015, "GPSDestLongitudeRef", TypeHint::Auto),
    (0x0016, "GPSDestLongitude", TypeHint::Auto),
    (0x0017, "GPSDestBearingRef", TypeHint::Auto),
    (0x0018, "GPSDestBearing", TypeHint::Auto),
    (0x0019, "GPSDestDistanceRef", TypeHint::Auto),
    (0x001A, "GPSDestDistance", TypeHint::Auto),
    (0x001B, "GPSProcessingMethod", TypeHint::Comment),
    (0x001C, "GPSAreaInformation", TypeHint::Comment),
    (0x001D, "GPSDateStamp", TypeHint::Auto),
    (0x001E, "GPSDifferential", TypeHint::Auto),
    (0x001F, "GPSHPositioningError", TypeHint::Auto),
];

const INTEROP_TAGS: TagTable = &[
    (0x0001, "InteropIndex", TypeHint::Auto),
    (0x0002, "InteropVersion", TypeHint::Undefined),
    (0x1000, "RelatedImageFileFormat", TypeHint::Auto),
    (0x1001, "RelatedImageWidth", TypeHint::Auto),
    (0x1002, "RelatedImageHeight", TypeHint::Auto),
];

// =============================================================================
// Tests
// =============================================================================

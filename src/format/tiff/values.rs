//! Tag values.
//!
//! [`Value`] is the caller-facing representation of a tag value, independent
//! of byte order and binary type. [`ValueReader`] pulls the raw bytes of a
//! directory entry out of an in-memory stream, whether the value is stored
//! inline or at an offset.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TiffError;

use super::parser::{ByteOrder, IfdEntry};
use super::tags::TagType;

// =============================================================================
// Value
// =============================================================================

/// Flat tag map keyed `Namespace:Name`, e.g. `EXIF:Make`.
pub type TagMap = BTreeMap<String, Value>;

/// Changes to apply to a tag map; `None` deletes the tag.
pub type TagDiff = BTreeMap<String, Option<Value>>;

/// A decoded or to-be-encoded tag value.
///
/// Serialized untagged: strings, integers, floats and arrays map to their
/// JSON counterparts, and byte blobs to `{"hex": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Text, written as ASCII (UTF-8 for EXIF 3.0 and later)
    Text(String),

    /// Integer, written as the narrowest fitting integer type
    Int(i64),

    /// Real number, written as a (signed) rational
    Rational(f64),

    /// Opaque bytes, written as UNDEFINED
    Bytes(#[serde(with = "hex_blob")] Vec<u8>),

    /// Homogeneous list of text or numbers
    Sequence(Vec<Value>),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric value of an `Int` or `Rational`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Rational(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Compare two values, allowing `tolerance` relative error on numbers.
    ///
    /// Integers and rationals compare by numeric value.
    pub fn approx_eq(&self, other: &Value, tolerance: f64) -> bool {
        match (self, other) {
            (Value::Sequence(a), Value::Sequence(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.approx_eq(y, tolerance))
            }
            (Value::Int(a), Value::Int(b)) => a == b,
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => (x - y).abs() <= tolerance * x.abs().max(1.0),
                _ => a == b,
            },
        }
    }

    /// Parse a command-line literal.
    ///
    /// `42` is an integer, `2.8` a rational, `hex:DEADBEEF` a byte blob, and
    /// a comma-separated list of numbers a sequence. Anything else is text.
    pub fn parse_literal(input: &str) -> Value {
        if let Some(hex) = input.strip_prefix("hex:") {
            if let Ok(bytes) = hex::decode(hex) {
                return Value::Bytes(bytes);
            }
        }

        if input.contains(',') {
            let parts: Option<Vec<Value>> = input
                .split(',')
                .map(|part| Self::parse_number(part.trim()))
                .collect();
            if let Some(parts) = parts {
                return Value::Sequence(parts);
            }
        }

        Self::parse_number(input).unwrap_or_else(|| Value::Text(input.to_string()))
    }

    fn parse_number(input: &str) -> Option<Value> {
        if let Ok(v) = input.parse::<i64>() {
            return Some(Value::Int(v));
        }
        match input.parse::<f64>() {
            Ok(v) if v.is_finite() => Some(Value::Rational(v)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Int(v) => write!(f, "{}", v),
            Value::Rational(v) => write!(f, "{}", v),
            Value::Bytes(b) if b.len() <= 16 => write!(f, "hex:{}", hex::encode(b)),
            Value::Bytes(b) => write!(f, "({} bytes)", b.len()),
            Value::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Rational(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::Sequence(values.into_iter().map(Into::into).collect())
    }
}

mod hex_blob {
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Blob {
        hex: String,
    }

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        Blob {
            hex: hex::encode(bytes),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let blob = Blob::deserialize(deserializer)?;
        hex::decode(&blob.hex).map_err(D::Error::custom)
    }
}

// =============================================================================
// ValueReader
// =============================================================================

/// Reads entry values out of an in-memory TIFF stream.
pub struct ValueReader<'a> {
    data: &'a [u8],
    byte_order: ByteOrder,
}

impl<'a> ValueReader<'a> {
    pub fn new(data: &'a [u8], byte_order: ByteOrder) -> Self {
        Self { data, byte_order }
    }

    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Raw value bytes of an entry.
    ///
    /// Inline values are copied out of the entry; offset values borrow the
    /// referenced slice of the stream.
    pub fn read_bytes(&self, entry: &IfdEntry) -> Result<Cow<'a, [u8]>, TiffError> {
        let size = entry
            .value_byte_size()
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if entry.is_inline() {
            return Ok(Cow::Owned(entry.value_offset_bytes[..size as usize].to_vec()));
        }

        let offset = entry.value_offset(self.byte_order) as u64;
        let end = offset + size;
        if end > self.data.len() as u64 {
            return Err(TiffError::PayloadOutOfBounds {
                offset,
                len: size,
                size: self.data.len() as u64,
            });
        }
        Ok(Cow::Borrowed(&self.data[offset as usize..end as usize]))
    }

    /// Read an array of SHORT or LONG values, widening to u32.
    pub fn read_u32_array(&self, entry: &IfdEntry) -> Result<Vec<u32>, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        let bytes = self.read_bytes(entry)?;
        let byte_order = self.byte_order;

        match field_type {
            TagType::Short => Ok(bytes
                .chunks_exact(2)
                .map(|c| byte_order.read_u16(c) as u32)
                .collect()),
            TagType::Long => Ok(bytes.chunks_exact(4).map(|c| byte_order.read_u32(c)).collect()),
            _ => Err(TiffError::InvalidTagValue {
                tag: "offsets",
                message: format!("expected SHORT or LONG array, got {}", field_type.name()),
            }),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

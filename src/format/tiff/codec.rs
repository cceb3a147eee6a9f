//! Tag value encoding and decoding.
//!
//! [`TagCodec`] turns a [`Value`] into the binary form of one directory entry
//! (type, count, value bytes in the target byte order) and back.
//!
//! # Type selection
//!
//! | Value                         | Type                                   |
//! |-------------------------------|----------------------------------------|
//! | text                          | ASCII + NUL (UTF-8 from EXIF 3.0 on)   |
//! | integer in `0..=65535`        | SHORT                                  |
//! | integer in `65536..=u32::MAX` | LONG                                   |
//! | negative integer              | SLONG                                  |
//! | real `>= 0` / `< 0`           | RATIONAL / SRATIONAL                   |
//! | bytes                         | UNDEFINED                              |
//! | list of the above             | array of the widest element type       |
//!
//! Reals are converted with a continued-fraction approximation bounded by the
//! 32-bit field range; the result is within [`RATIONAL_TOLERANCE`] (relative)
//! of the input unless the bound is reached first.

use std::fmt;
use std::str::FromStr;

use crate::error::{EncodeError, TiffError};

use super::parser::ByteOrder;
use super::registry::TypeHint;
use super::tags::TagType;
use super::values::Value;

/// Relative error accepted when approximating a real as a rational.
pub const RATIONAL_TOLERANCE: f64 = 1e-9;

/// Character code prefix for ASCII comments.
const COMMENT_ASCII: &[u8; 8] = b"ASCII\0\0\0";

/// Character code prefix for UTF-16 comments.
const COMMENT_UNICODE: &[u8; 8] = b"UNICODE\0";

/// Character code prefix for comments with an undefined encoding.
const COMMENT_UNDEFINED: &[u8; 8] = &[0; 8];

// =============================================================================
// ExifVersion
// =============================================================================

/// EXIF specification version written into ExifVersion, e.g. `0300`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExifVersion([u8; 4]);

impl ExifVersion {
    pub const V0230: ExifVersion = ExifVersion(*b"0230");
    pub const V0232: ExifVersion = ExifVersion(*b"0232");
    pub const V0300: ExifVersion = ExifVersion(*b"0300");

    /// Four ASCII digits, as stored in the ExifVersion tag.
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// EXIF 3.0 and later allow UTF-8 in ASCII fields.
    pub fn supports_utf8(&self) -> bool {
        *self >= Self::V0300
    }
}

impl Default for ExifVersion {
    fn default() -> Self {
        Self::V0300
    }
}

impl FromStr for ExifVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 || !bytes.iter().all(u8::is_ascii_digit) {
            return Err(format!("EXIF version must be four digits like 0232, got {:?}", s));
        }
        Ok(ExifVersion([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl fmt::Display for ExifVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Always ASCII digits by construction
        f.write_str(std::str::from_utf8(&self.0).unwrap_or("????"))
    }
}

// =============================================================================
// EncodedValue
// =============================================================================

/// Binary form of one tag value.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedValue {
    pub tag_type: TagType,
    pub count: u32,

    /// Value bytes in the target byte order, `type_size * count` long
    pub bytes: Vec<u8>,

    /// Set when the value could not be represented exactly
    pub lossy: Option<String>,
}

impl EncodedValue {
    fn exact(tag_type: TagType, count: usize, bytes: Vec<u8>) -> Result<Self, EncodeError> {
        let count = u32::try_from(count).map_err(|_| EncodeError::TooLong(count as u64))?;
        Ok(EncodedValue {
            tag_type,
            count,
            bytes,
            lossy: None,
        })
    }

    fn with_note(mut self, note: Option<String>) -> Self {
        self.lossy = note;
        self
    }
}

// =============================================================================
// TagCodec
// =============================================================================

/// Encodes and decodes tag values for one byte order and EXIF version.
#[derive(Debug, Clone, Copy)]
pub struct TagCodec {
    byte_order: ByteOrder,
    version: ExifVersion,
}

impl TagCodec {
    pub fn new(byte_order: ByteOrder, version: ExifVersion) -> Self {
        Self {
            byte_order,
            version,
        }
    }

    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    #[inline]
    pub fn version(&self) -> ExifVersion {
        self.version
    }

    // -------------------------------------------------------------------------
    // Encoding
    // -------------------------------------------------------------------------

    /// Encode a value.
    ///
    /// # Errors
    /// Empty values, non-finite reals, reals beyond the 32-bit rational range,
    /// and sequences that are nested or mix text with numbers cannot be
    /// encoded. The caller drops such tags.
    pub fn encode(&self, value: &Value, hint: TypeHint) -> Result<EncodedValue, EncodeError> {
        match value {
            Value::Text(text) => self.encode_text(text, hint),
            Value::Int(v) => self.encode_ints(&[*v], hint),
            Value::Rational(v) => self.encode_rationals(&[*v]),
            Value::Bytes(bytes) => {
                if bytes.is_empty() {
                    return Err(EncodeError::EmptyValue);
                }
                let tag_type = match hint {
                    TypeHint::Byte | TypeHint::Ucs2 => TagType::Byte,
                    _ => TagType::Undefined,
                };
                EncodedValue::exact(tag_type, bytes.len(), bytes.clone())
            }
            Value::Sequence(items) => self.encode_sequence(items, hint),
        }
    }

    fn encode_sequence(&self, items: &[Value], hint: TypeHint) -> Result<EncodedValue, EncodeError> {
        if items.is_empty() {
            return Err(EncodeError::EmptyValue);
        }
        if items
            .iter()
            .any(|item| matches!(item, Value::Sequence(_) | Value::Bytes(_)))
        {
            return Err(EncodeError::NestedValue);
        }

        if let Some(texts) = items.iter().map(Value::as_text).collect::<Option<Vec<_>>>() {
            return self.encode_text_list(&texts);
        }
        if let Some(ints) = items.iter().map(Value::as_int).collect::<Option<Vec<_>>>() {
            return self.encode_ints(&ints, hint);
        }
        if let Some(reals) = items.iter().map(Value::as_f64).collect::<Option<Vec<_>>>() {
            return self.encode_rationals(&reals);
        }
        Err(EncodeError::MixedSequence)
    }

    fn encode_text(&self, text: &str, hint: TypeHint) -> Result<EncodedValue, EncodeError> {
        match hint {
            TypeHint::Undefined => {
                if text.is_empty() {
                    return Err(EncodeError::EmptyValue);
                }
                let (bytes, note) = ascii_lossy(text);
                Ok(EncodedValue::exact(TagType::Undefined, bytes.len(), bytes)?.with_note(note))
            }
            TypeHint::Comment => {
                let mut bytes = Vec::with_capacity(8 + text.len() * 2);
                if text.is_ascii() {
                    bytes.extend_from_slice(COMMENT_ASCII);
                    bytes.extend_from_slice(text.as_bytes());
                } else {
                    bytes.extend_from_slice(COMMENT_UNICODE);
                    for unit in text.encode_utf16() {
                        bytes.extend_from_slice(&self.byte_order.u16_bytes(unit));
                    }
                }
                EncodedValue::exact(TagType::Undefined, bytes.len(), bytes)
            }
            TypeHint::Ucs2 => {
                // Windows reads these as little-endian whatever the stream order
                let mut bytes: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
                bytes.extend_from_slice(&[0, 0]);
                EncodedValue::exact(TagType::Byte, bytes.len(), bytes)
            }
            TypeHint::Auto | TypeHint::Byte => self.encode_text_list(&[text]),
        }
    }

    /// NUL-join strings and terminate with NUL.
    fn encode_text_list(&self, texts: &[&str]) -> Result<EncodedValue, EncodeError> {
        let mut bytes = Vec::new();
        let mut note = None;
        for text in texts {
            let (encoded, lossy) = self.text_bytes(text);
            bytes.extend_from_slice(&encoded);
            bytes.push(0);
            note = note.or(lossy);
        }
        Ok(EncodedValue::exact(TagType::Ascii, bytes.len(), bytes)?.with_note(note))
    }

    fn text_bytes(&self, text: &str) -> (Vec<u8>, Option<String>) {
        if text.is_ascii() || self.version.supports_utf8() {
            (text.as_bytes().to_vec(), None)
        } else {
            ascii_lossy(text)
        }
    }

    fn encode_ints(&self, values: &[i64], hint: TypeHint) -> Result<EncodedValue, EncodeError> {
        let order = self.byte_order;
        let min = values.iter().copied().min().unwrap_or(0);
        let max = values.iter().copied().max().unwrap_or(0);

        if hint == TypeHint::Byte && min >= 0 && max <= u8::MAX as i64 {
            let bytes = values.iter().map(|&v| v as u8).collect();
            return EncodedValue::exact(TagType::Byte, values.len(), bytes);
        }
        if min >= 0 && max <= u16::MAX as i64 {
            let bytes = values
                .iter()
                .flat_map(|&v| order.u16_bytes(v as u16))
                .collect();
            return EncodedValue::exact(TagType::Short, values.len(), bytes);
        }
        if min >= 0 && max <= u32::MAX as i64 {
            let bytes = values
                .iter()
                .flat_map(|&v| order.u32_bytes(v as u32))
                .collect();
            return EncodedValue::exact(TagType::Long, values.len(), bytes);
        }
        if min >= i32::MIN as i64 && max <= i32::MAX as i64 {
            let bytes = values
                .iter()
                .flat_map(|&v| order.u32_bytes(v as i32 as u32))
                .collect();
            return EncodedValue::exact(TagType::SLong, values.len(), bytes);
        }

        let bytes = values
            .iter()
            .flat_map(|&v| order.u32_bytes(v as u32))
            .collect();
        Ok(EncodedValue::exact(TagType::Long, values.len(), bytes)?
            .with_note(Some("integer truncated to 32 bits".to_string())))
    }

    /// Encode a LONG array regardless of magnitude, for byte counts and
    /// lengths that readers expect as LONG.
    pub fn encode_longs(&self, values: &[u32]) -> Result<EncodedValue, EncodeError> {
        if values.is_empty() {
            return Err(EncodeError::EmptyValue);
        }
        let bytes = values
            .iter()
            .flat_map(|&v| self.byte_order.u32_bytes(v))
            .collect();
        EncodedValue::exact(TagType::Long, values.len(), bytes)
    }

    fn encode_rationals(&self, values: &[f64]) -> Result<EncodedValue, EncodeError> {
        if let Some(&bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(EncodeError::NonFinite(bad));
        }

        let order = self.byte_order;
        let signed = values.iter().any(|&v| v < 0.0);
        let bound = if signed { i32::MAX as u64 } else { u32::MAX as u64 };

        let mut bytes = Vec::with_capacity(values.len() * 8);
        for &value in values {
            let (num, den) =
                approximate_rational(value.abs(), bound).ok_or(EncodeError::OutOfRange(value))?;
            let num = if value < 0.0 {
                (-(num as i64)) as i32 as u32
            } else {
                num as u32
            };
            bytes.extend_from_slice(&order.u32_bytes(num));
            bytes.extend_from_slice(&order.u32_bytes(den as u32));
        }

        let tag_type = if signed {
            TagType::SRational
        } else {
            TagType::Rational
        };
        EncodedValue::exact(tag_type, values.len(), bytes)
    }

    // -------------------------------------------------------------------------
    // Decoding
    // -------------------------------------------------------------------------

    /// Decode `count` values of `tag_type` from `bytes`.
    ///
    /// A single element decodes to a scalar; more decode to a sequence.
    ///
    /// # Errors
    /// `TruncatedValue` if `bytes` is shorter than `type_size * count`.
    pub fn decode(&self, tag_type: TagType, bytes: &[u8], count: u32) -> Result<Value, TiffError> {
        let required = tag_type.byte_length(count);
        if (bytes.len() as u64) < required {
            return Err(TiffError::TruncatedValue {
                required,
                actual: bytes.len() as u64,
            });
        }
        let bytes = &bytes[..required as usize];
        let order = self.byte_order;

        let value = match tag_type {
            TagType::Byte | TagType::Undefined => Value::Bytes(bytes.to_vec()),
            TagType::Ascii => decode_ascii(bytes),
            TagType::SByte => scalar_or_sequence(bytes.iter().map(|&b| Value::Int(b as i8 as i64))),
            TagType::Short => scalar_or_sequence(
                bytes
                    .chunks_exact(2)
                    .map(|c| Value::Int(order.read_u16(c) as i64)),
            ),
            TagType::SShort => scalar_or_sequence(
                bytes
                    .chunks_exact(2)
                    .map(|c| Value::Int(order.read_u16(c) as i16 as i64)),
            ),
            TagType::Long => scalar_or_sequence(
                bytes
                    .chunks_exact(4)
                    .map(|c| Value::Int(order.read_u32(c) as i64)),
            ),
            TagType::SLong => scalar_or_sequence(
                bytes
                    .chunks_exact(4)
                    .map(|c| Value::Int(order.read_u32(c) as i32 as i64)),
            ),
            TagType::Rational => scalar_or_sequence(bytes.chunks_exact(8).map(|c| {
                let num = order.read_u32(&c[0..4]) as f64;
                let den = order.read_u32(&c[4..8]) as f64;
                Value::Rational(num / den)
            })),
            TagType::SRational => scalar_or_sequence(bytes.chunks_exact(8).map(|c| {
                let num = order.read_u32(&c[0..4]) as i32 as f64;
                let den = order.read_u32(&c[4..8]) as i32 as f64;
                Value::Rational(num / den)
            })),
            TagType::Float => scalar_or_sequence(
                bytes
                    .chunks_exact(4)
                    .map(|c| Value::Rational(f32::from_bits(order.read_u32(c)) as f64)),
            ),
            TagType::Double => scalar_or_sequence(bytes.chunks_exact(8).map(|c| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(c);
                Value::Rational(match order {
                    ByteOrder::LittleEndian => f64::from_le_bytes(raw),
                    ByteOrder::BigEndian => f64::from_be_bytes(raw),
                })
            })),
        };
        Ok(value)
    }

    /// Decode with the tag's registry hint applied.
    ///
    /// Hinted tags decode to the shape their encoder accepts, so the value
    /// can be written back unchanged.
    pub fn decode_hinted(
        &self,
        tag_type: TagType,
        bytes: &[u8],
        count: u32,
        hint: TypeHint,
    ) -> Result<Value, TiffError> {
        let value = self.decode(tag_type, bytes, count)?;
        let Value::Bytes(raw) = value else {
            return Ok(value);
        };

        let hinted = match (hint, tag_type) {
            (TypeHint::Undefined, TagType::Undefined) => printable_ascii(&raw).map(Value::Text),
            (TypeHint::Comment, TagType::Undefined) => self.decode_comment(&raw),
            (TypeHint::Ucs2, TagType::Byte) => decode_ucs2(&raw),
            (TypeHint::Byte, TagType::Byte) => Some(scalar_or_sequence(
                raw.iter().map(|&b| Value::Int(b as i64)),
            )),
            _ => None,
        };
        Ok(hinted.unwrap_or(Value::Bytes(raw)))
    }

    fn decode_comment(&self, raw: &[u8]) -> Option<Value> {
        if raw.len() < 8 {
            return None;
        }
        let (code, body) = raw.split_at(8);

        if code == COMMENT_ASCII || code == COMMENT_UNDEFINED {
            return std::str::from_utf8(trim_trailing_nuls(body))
                .ok()
                .map(|s| Value::Text(s.to_string()));
        }
        if code == COMMENT_UNICODE {
            let mut units: Vec<u16> = body
                .chunks_exact(2)
                .map(|c| self.byte_order.read_u16(c))
                .collect();
            while units.last() == Some(&0) {
                units.pop();
            }
            return String::from_utf16(&units).ok().map(Value::Text);
        }
        None
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Best rational approximation of a non-negative real with numerator and
/// denominator both at most `bound`.
///
/// Returns `None` if `value` itself exceeds `bound`.
pub fn approximate_rational(value: f64, bound: u64) -> Option<(u64, u64)> {
    if !value.is_finite() || value < 0.0 || value > bound as f64 {
        return None;
    }

    // Convergents h/k of the continued fraction expansion
    let (mut h_prev, mut h) = (0u64, 1u64);
    let (mut k_prev, mut k) = (1u64, 0u64);
    let mut best = (value.round() as u64, 1u64);
    let mut remainder = value;

    for _ in 0..64 {
        let term = remainder.floor();
        if term > bound as f64 {
            break;
        }
        let term = term as u64;

        let next_h = term.checked_mul(h).and_then(|v| v.checked_add(h_prev));
        let next_k = term.checked_mul(k).and_then(|v| v.checked_add(k_prev));
        match (next_h, next_k) {
            (Some(nh), Some(nk)) if nh <= bound && nk <= bound && nk > 0 => {
                (h_prev, h) = (h, nh);
                (k_prev, k) = (k, nk);
                best = (nh, nk);
            }
            _ => break,
        }

        let approx = h as f64 / k as f64;
        if (approx - value).abs() <= RATIONAL_TOLERANCE * value.max(1.0) {
            break;
        }

        let fraction = remainder - term as f64;
        if fraction <= f64::EPSILON {
            break;
        }
        remainder = 1.0 / fraction;
    }

    Some(best)
}

fn ascii_lossy(text: &str) -> (Vec<u8>, Option<String>) {
    if text.is_ascii() {
        return (text.as_bytes().to_vec(), None);
    }
    let bytes = text
        .chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .collect();
    (
        bytes,
        Some("non-ASCII characters replaced (UTF-8 needs EXIF 3.0)".to_string()),
    )
}

fn scalar_or_sequence(values: impl Iterator<Item = Value>) -> Value {
    let mut values: Vec<Value> = values.collect();
    if values.len() == 1 {
        values.remove(0)
    } else {
        Value::Sequence(values)
    }
}

/// NUL-terminated UTF-16LE text, as Windows writes the XP* tags.
fn decode_ucs2(raw: &[u8]) -> Option<Value> {
    if raw.len() % 2 != 0 {
        return None;
    }
    let mut units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    while units.last() == Some(&0) {
        units.pop();
    }
    String::from_utf16(&units).ok().map(Value::Text)
}

fn trim_trailing_nuls(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

/// ASCII field contents: trailing NULs dropped, interior NULs split a list.
fn decode_ascii(bytes: &[u8]) -> Value {
    let parts: Vec<Value> = trim_trailing_nuls(bytes)
        .split(|&b| b == 0)
        .map(|part| match std::str::from_utf8(part) {
            Ok(s) => Value::Text(s.to_string()),
            // Legacy writers use Latin-1
            Err(_) => Value::Text(part.iter().map(|&b| b as char).collect()),
        })
        .collect();
    scalar_or_sequence(parts.into_iter())
}

fn printable_ascii(bytes: &[u8]) -> Option<String> {
    let bytes = trim_trailing_nuls(bytes);
    if !bytes.is_empty() && bytes.iter().all(|b| (0x20..0x7F).contains(b)) {
        Some(bytes.iter().map(|&b| b as char).collect())
    } else {
        None
    }
}

// =============================================================================
// Tests
// =============================================================================

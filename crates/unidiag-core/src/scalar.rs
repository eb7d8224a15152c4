//! Unicode scalar model and UTF-8 byte-length rules.
//!
//! Every code path that produces a [`Scalar`] goes through
//! [`is_valid_scalar`], whether the value comes from the stream decoder or
//! from a direct "character from code point" construction.

use std::fmt;

use crate::fault::ScalarError;

/// Largest Unicode scalar value.
pub const MAX_SCALAR: u32 = 0x10_FFFF;
/// First UTF-16 surrogate code point.
pub const SURROGATE_START: u32 = 0xD800;
/// Last UTF-16 surrogate code point.
pub const SURROGATE_END: u32 = 0xDFFF;
/// Last code point of the Basic Multilingual Plane.
pub const BMP_END: u32 = 0xFFFF;

/// Smallest code point that needs an `n`-byte encoding, indexed by `n`.
pub(crate) const MIN_FOR_LENGTH: [u32; 5] = [0, 0, 0x80, 0x800, 0x1_0000];

/// Payload mask applied to a lead byte, indexed by sequence length.
pub(crate) const LEAD_PAYLOAD_MASK: [u8; 5] = [0, 0x7F, 0x1F, 0x0F, 0x07];

/// Returns `true` for code points inside the UTF-16 surrogate range.
#[must_use]
pub const fn is_surrogate(value: u32) -> bool {
    matches!(value, SURROGATE_START..=SURROGATE_END)
}

/// The shared validity predicate: in `0..=0x10FFFF` and not a surrogate.
#[must_use]
pub const fn is_valid_scalar(value: u32) -> bool {
    value <= MAX_SCALAR && !is_surrogate(value)
}

/// Returns `true` for a UTF-8 continuation byte (`10xxxxxx`).
#[must_use]
pub const fn is_continuation(byte: u8) -> bool {
    byte & 0b1100_0000 == 0b1000_0000
}

/// Expected sequence length for a byte that may legally start a sequence.
///
/// `C0`, `C1` and `F5..=FF` never start a well-formed sequence and return
/// `None`, as do continuation bytes.
#[must_use]
pub const fn sequence_length(lead: u8) -> Option<u8> {
    match lead {
        0x00..=0x7F => Some(1),
        0xC2..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF4 => Some(4),
        _ => None,
    }
}

/// A validated Unicode scalar value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(try_from = "u32", into = "u32")
)]
pub struct Scalar(u32);

impl Scalar {
    /// Builds a scalar, rejecting surrogates and values above `0x10FFFF`.
    ///
    /// # Errors
    ///
    /// Returns [`ScalarError::Surrogate`] or [`ScalarError::OutOfRange`].
    pub fn new(value: u32) -> Result<Self, ScalarError> {
        if is_valid_scalar(value) {
            Ok(Self(value))
        } else if is_surrogate(value) {
            Err(ScalarError::Surrogate(value))
        } else {
            Err(ScalarError::OutOfRange(i64::from(value)))
        }
    }

    /// Builds a scalar from a signed code point, as a `chr()`-style
    /// constructor or a `%c` formatter would receive it.
    ///
    /// # Errors
    ///
    /// Negative values, values above `0x10FFFF`, and surrogates each fail
    /// with their own [`ScalarError`] variant.
    pub fn from_i64(value: i64) -> Result<Self, ScalarError> {
        if value < 0 {
            return Err(ScalarError::Negative(value));
        }
        let Ok(value) = u32::try_from(value) else {
            return Err(ScalarError::OutOfRange(value));
        };
        Self::new(value)
    }

    /// Returns the raw code point.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Returns the scalar as a `char`.
    #[must_use]
    pub fn as_char(self) -> char {
        char::from_u32(self.0).unwrap_or(char::REPLACEMENT_CHARACTER)
    }

    /// Returns `true` when the scalar lies above the Basic Multilingual Plane.
    #[must_use]
    pub const fn is_outside_bmp(self) -> bool {
        self.0 > BMP_END
    }

    /// Number of bytes in the UTF-8 encoding of this scalar.
    #[must_use]
    pub const fn utf8_len(self) -> usize {
        match self.0 {
            0..=0x7F => 1,
            0x80..=0x7FF => 2,
            0x800..=0xFFFF => 3,
            _ => 4,
        }
    }

    /// Encodes the scalar as UTF-8.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn encode_utf8(self) -> Utf8Bytes {
        let v = self.0;
        let mut bytes = [0u8; 4];
        let len = self.utf8_len();
        match len {
            1 => bytes[0] = v as u8,
            2 => {
                bytes[0] = 0xC0 | (v >> 6) as u8;
                bytes[1] = 0x80 | (v & 0x3F) as u8;
            }
            3 => {
                bytes[0] = 0xE0 | (v >> 12) as u8;
                bytes[1] = 0x80 | ((v >> 6) & 0x3F) as u8;
                bytes[2] = 0x80 | (v & 0x3F) as u8;
            }
            _ => {
                bytes[0] = 0xF0 | (v >> 18) as u8;
                bytes[1] = 0x80 | ((v >> 12) & 0x3F) as u8;
                bytes[2] = 0x80 | ((v >> 6) & 0x3F) as u8;
                bytes[3] = 0x80 | (v & 0x3F) as u8;
            }
        }
        Utf8Bytes {
            bytes,
            len: len as u8,
        }
    }
}

impl TryFrom<u32> for Scalar {
    type Error = ScalarError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Scalar> for u32 {
    fn from(scalar: Scalar) -> Self {
        scalar.0
    }
}

impl From<char> for Scalar {
    fn from(c: char) -> Self {
        Self(u32::from(c))
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U+{:04X}", self.0)
    }
}

/// Inline UTF-8 encoding of a single scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Utf8Bytes {
    bytes: [u8; 4],
    len: u8,
}

impl Utf8Bytes {
    /// The encoded bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..usize::from(self.len)]
    }

    /// Number of encoded bytes (1 to 4).
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    /// Always `false`; every scalar encodes to at least one byte.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<[u8]> for Utf8Bytes {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Display for Utf8Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.as_slice().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

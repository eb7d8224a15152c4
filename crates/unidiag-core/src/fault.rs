use thiserror::Error;

use crate::hazard::HazardTag;

/// Why a byte sequence failed to decode as UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum InvalidReason {
    /// A byte that cannot start or continue a UTF-8 sequence.
    #[error("invalid byte")]
    InvalidByte = 0x01,
    /// A sequence encoding a value a shorter sequence could represent.
    #[error("overlong encoding")]
    Overlong = 0x02,
    /// A sequence encoding a UTF-16 surrogate code point.
    #[error("encoded surrogate")]
    Surrogate = 0x03,
    /// Input ended in the middle of a sequence.
    #[error("truncated sequence")]
    Truncated = 0x04,
}

impl InvalidReason {
    /// Converts the reason to its stable code.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Converts a stable code back into a reason.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::InvalidByte),
            0x02 => Some(Self::Overlong),
            0x03 => Some(Self::Surrogate),
            0x04 => Some(Self::Truncated),
            _ => None,
        }
    }

    /// Returns the hazard tag recorded for a subject failing with this reason.
    #[must_use]
    pub const fn tag(self) -> HazardTag {
        match self {
            Self::InvalidByte => HazardTag::InvalidByte,
            Self::Overlong => HazardTag::Overlong,
            Self::Surrogate => HazardTag::Surrogate,
            Self::Truncated => HazardTag::Truncated,
        }
    }
}

/// A rejected byte sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[error("{reason} at byte offset {offset} ({consumed} byte(s) abandoned)")]
pub struct Invalid {
    /// Classification of the failure.
    pub reason: InvalidReason,
    /// Bytes of the abandoned sequence, excluding any byte that was
    /// reprocessed as the start of a new sequence.
    pub consumed: usize,
    /// Stream offset of the first byte of the abandoned sequence.
    pub offset: usize,
}

impl Invalid {
    /// Creates an invalid-sequence record.
    #[must_use]
    pub const fn new(reason: InvalidReason, consumed: usize, offset: usize) -> Self {
        Self {
            reason,
            consumed,
            offset,
        }
    }

    /// Byte range of the abandoned sequence within the stream.
    #[must_use]
    pub const fn span(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.consumed
    }
}

/// Failure to construct a [`crate::Scalar`] from a raw code point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ScalarError {
    /// The code point was negative.
    #[error("code point {0} is negative")]
    Negative(i64),
    /// The code point exceeded `0x10FFFF`.
    #[error("code point {0:#X} exceeds U+10FFFF")]
    OutOfRange(i64),
    /// The code point lies in the surrogate range `U+D800..=U+DFFF`.
    #[error("code point U+{0:04X} is a surrogate")]
    Surrogate(u32),
}

//! Codec name resolution and error-handling modes.
//!
//! Only UTF-8 is supported. Other encoding names are rejected outright
//! rather than silently decoded as something else.

use std::str::FromStr;

use thiserror::Error;

use crate::decoder::{DecodeOutcome, StreamDecoder};
use crate::fault::Invalid;

/// Failure to resolve a codec or error-mode name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CodecError {
    /// The encoding name is not a UTF-8 alias.
    #[error("unknown encoding: {0:?}")]
    UnknownCodec(String),
    /// The error-handling mode is not `strict`, `ignore` or `replace`.
    #[error("unknown error handler: {0:?}")]
    UnknownErrorMode(String),
}

/// Supported codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Codec {
    /// UTF-8, strict per RFC 3629.
    #[default]
    Utf8,
}

impl Codec {
    /// Resolves an encoding name.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnknownCodec`] for anything but a UTF-8 alias.
    pub fn from_name(name: &str) -> Result<Self, CodecError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" | "utf_8" | "u8" => Ok(Self::Utf8),
            _ => Err(CodecError::UnknownCodec(name.to_string())),
        }
    }

    /// Canonical name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
        }
    }
}

impl FromStr for Codec {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

/// What to do with an invalid sequence while decoding to text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ErrorMode {
    /// Fail on the first invalid sequence.
    #[default]
    Strict,
    /// Drop invalid sequences.
    Ignore,
    /// Substitute `U+FFFD` for each invalid sequence.
    Replace,
}

impl ErrorMode {
    /// Resolves an error-handler name.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnknownErrorMode`] for unrecognised names.
    pub fn from_name(name: &str) -> Result<Self, CodecError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "ignore" => Ok(Self::Ignore),
            "replace" => Ok(Self::Replace),
            _ => Err(CodecError::UnknownErrorMode(name.to_string())),
        }
    }
}

impl FromStr for ErrorMode {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

/// Incremental text decoder applying an [`ErrorMode`] to each chunk.
///
/// Incomplete trailing characters stay pending inside the decoder until the
/// next chunk or [`TextDecoder::finish`].
#[derive(Debug, Clone, Default)]
pub struct TextDecoder {
    decoder: StreamDecoder,
    mode: ErrorMode,
}

impl TextDecoder {
    /// Creates a decoder using `mode`.
    #[must_use]
    pub fn new(mode: ErrorMode) -> Self {
        Self {
            decoder: StreamDecoder::new(),
            mode,
        }
    }

    /// The error mode in use.
    #[must_use]
    pub const fn mode(&self) -> ErrorMode {
        self.mode
    }

    /// Returns `true` while a character is split across chunks.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.decoder.is_pending()
    }

    /// Decodes one chunk, returning the text it completed.
    ///
    /// # Errors
    ///
    /// Under [`ErrorMode::Strict`], the first invalid sequence in the chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Result<String, Invalid> {
        let mut text = String::with_capacity(chunk.len());
        for &byte in chunk {
            for outcome in self.decoder.feed(byte) {
                self.apply(outcome, &mut text)?;
            }
        }
        Ok(text)
    }

    /// Ends the input, flushing a truncated trailing character.
    ///
    /// # Errors
    ///
    /// Under [`ErrorMode::Strict`], [`crate::InvalidReason::Truncated`] if a
    /// character was left incomplete.
    pub fn finish(&mut self) -> Result<String, Invalid> {
        let mut text = String::new();
        if let Some(truncated) = self.decoder.finish() {
            self.apply(DecodeOutcome::Invalid(truncated), &mut text)?;
        }
        Ok(text)
    }

    fn apply(&self, outcome: DecodeOutcome, text: &mut String) -> Result<(), Invalid> {
        match outcome {
            DecodeOutcome::Scalar(scalar) => text.push(scalar.as_char()),
            DecodeOutcome::NeedMoreBytes => {}
            DecodeOutcome::Invalid(invalid) => match self.mode {
                ErrorMode::Strict => return Err(invalid),
                ErrorMode::Ignore => {}
                ErrorMode::Replace => text.push(char::REPLACEMENT_CHARACTER),
            },
        }
        Ok(())
    }
}

/// Decodes `bytes` to text under `mode`.
///
/// # Errors
///
/// Under [`ErrorMode::Strict`], returns the first invalid sequence,
/// including truncation at end of input.
pub fn decode_with(bytes: &[u8], mode: ErrorMode) -> Result<String, Invalid> {
    let mut decoder = TextDecoder::new(mode);
    let mut text = decoder.push(bytes)?;
    text.push_str(&decoder.finish()?);
    Ok(text)
}

/// Resolves `codec` and `errors` by name, then decodes.
///
/// # Errors
///
/// Name resolution failures are reported before any byte is examined;
/// decode failures follow [`decode_with`].
pub fn decode_named(bytes: &[u8], codec: &str, errors: &str) -> Result<String, DecodeNamedError> {
    let Codec::Utf8 = Codec::from_name(codec)?;
    let mode = ErrorMode::from_name(errors)?;
    Ok(decode_with(bytes, mode)?)
}

/// Failure of [`decode_named`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeNamedError {
    /// Codec or error-mode lookup failed.
    #[error(transparent)]
    Lookup(#[from] CodecError),
    /// Strict decoding hit an invalid sequence.
    #[error(transparent)]
    Decode(#[from] Invalid),
}

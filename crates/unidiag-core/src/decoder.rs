//! Byte-incremental UTF-8 decoder.
//!
//! [`StreamDecoder`] consumes one byte at a time and never looks ahead, so
//! it produces the same Scalars and Invalids no matter where a transport
//! splits its chunks. [`decode_slice`] is an independent whole-buffer
//! decoder with look-ahead; the two must always agree.
//!
//! First continuation bytes are constrained per lead byte:
//!
//! | lead | first continuation | violation |
//! |------|--------------------|-----------|
//! | `E0` | `A0..=BF`          | overlong  |
//! | `ED` | `80..=9F`          | surrogate |
//! | `F0` | `90..=BF`          | overlong  |
//! | `F4` | `80..=8F`          | invalid byte (above `U+10FFFF`) |

use smallvec::SmallVec;
use tracing::trace;

use crate::fault::{Invalid, InvalidReason, ScalarError};
use crate::scalar::{
    is_continuation, is_surrogate, is_valid_scalar, sequence_length, Scalar, LEAD_PAYLOAD_MASK,
    MIN_FOR_LENGTH,
};

/// Result of feeding one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum DecodeOutcome {
    /// A complete scalar was decoded.
    Scalar(Scalar),
    /// The byte was accepted but the character is not complete yet.
    NeedMoreBytes,
    /// A sequence was rejected.
    Invalid(Invalid),
}

impl DecodeOutcome {
    /// Returns the scalar if one was decoded.
    #[must_use]
    pub const fn scalar(self) -> Option<Scalar> {
        match self {
            Self::Scalar(s) => Some(s),
            Self::NeedMoreBytes | Self::Invalid(_) => None,
        }
    }

    /// Returns the rejection if the sequence was invalid.
    #[must_use]
    pub const fn invalid(self) -> Option<Invalid> {
        match self {
            Self::Invalid(i) => Some(i),
            Self::Scalar(_) | Self::NeedMoreBytes => None,
        }
    }

    /// `false` only for [`DecodeOutcome::NeedMoreBytes`], which defers a decision.
    #[must_use]
    pub const fn is_significant(self) -> bool {
        !matches!(self, Self::NeedMoreBytes)
    }
}

/// Outcomes produced by a single byte: one, or two when the byte aborted a
/// pending sequence and was then decoded on its own.
pub type Outcomes = SmallVec<[DecodeOutcome; 2]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Idle,
    Expecting {
        lead: u8,
        remaining: u8,
        accumulated: u32,
        seen: u8,
        start: usize,
    },
}

/// Strict UTF-8 decoder fed one byte at a time.
///
/// Create one per input sequence; decoder state is never shared between
/// subjects.
#[derive(Debug, Clone, Default)]
pub struct StreamDecoder {
    state: State,
    position: usize,
}

impl StreamDecoder {
    /// Creates an idle decoder at stream offset zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` while a multi-byte character is incomplete.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self.state, State::Expecting { .. })
    }

    /// Number of bytes fed since creation or the last [`Self::finish`].
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Feeds one byte.
    ///
    /// A byte that cannot continue the pending sequence yields the
    /// [`DecodeOutcome::Invalid`] for that sequence, followed by whatever the
    /// byte produces when decoded from the idle state.
    pub fn feed(&mut self, byte: u8) -> Outcomes {
        let mut out = Outcomes::new();
        match self.state {
            State::Idle => out.push(self.start(byte)),
            State::Expecting {
                lead,
                remaining,
                accumulated,
                seen,
                start,
            } => {
                if let Err(reason) = check_continuation(lead, seen, byte) {
                    self.state = State::Idle;
                    trace!(
                        offset = start,
                        byte,
                        ?reason,
                        "abandoning sequence, reprocessing byte"
                    );
                    out.push(DecodeOutcome::Invalid(Invalid::new(
                        reason,
                        usize::from(seen),
                        start,
                    )));
                    out.push(self.start(byte));
                } else {
                    let accumulated = (accumulated << 6) | u32::from(byte & 0x3F);
                    if remaining == 1 {
                        self.state = State::Idle;
                        out.push(complete(accumulated, seen + 1, start));
                    } else {
                        self.state = State::Expecting {
                            lead,
                            remaining: remaining - 1,
                            accumulated,
                            seen: seen + 1,
                            start,
                        };
                        out.push(DecodeOutcome::NeedMoreBytes);
                    }
                }
            }
        }
        self.position += 1;
        out
    }

    /// Feeds a chunk, returning every outcome in order.
    pub fn feed_chunk(&mut self, chunk: &[u8]) -> Vec<DecodeOutcome> {
        let mut out = Vec::with_capacity(chunk.len());
        for &byte in chunk {
            out.extend(self.feed(byte));
        }
        out
    }

    /// Signals end of input.
    ///
    /// Returns a [`InvalidReason::Truncated`] rejection if a character was
    /// left incomplete. The decoder is reset either way.
    pub fn finish(&mut self) -> Option<Invalid> {
        let truncated = match self.state {
            State::Idle => None,
            State::Expecting { seen, start, .. } => Some(Invalid::new(
                InvalidReason::Truncated,
                usize::from(seen),
                start,
            )),
        };
        *self = Self::new();
        truncated
    }

    fn start(&mut self, byte: u8) -> DecodeOutcome {
        let offset = self.position;
        match byte {
            0x00..=0x7F => DecodeOutcome::Scalar(Scalar::from(char::from(byte))),
            0xC0 | 0xC1 => {
                DecodeOutcome::Invalid(Invalid::new(InvalidReason::Overlong, 1, offset))
            }
            _ => match sequence_length(byte) {
                Some(len) => {
                    self.state = State::Expecting {
                        lead: byte,
                        remaining: len - 1,
                        accumulated: u32::from(byte & LEAD_PAYLOAD_MASK[usize::from(len)]),
                        seen: 1,
                        start: offset,
                    };
                    DecodeOutcome::NeedMoreBytes
                }
                None => {
                    DecodeOutcome::Invalid(Invalid::new(InvalidReason::InvalidByte, 1, offset))
                }
            },
        }
    }
}

/// Checks whether `byte` may follow the `seen` bytes already accepted after `lead`.
///
/// The first continuation byte fixes the lower bound of every code point the
/// sequence can still encode; that bound is run through the shared scalar
/// predicate so overlong, surrogate and out-of-range prefixes are rejected
/// as soon as they are recognisable.
fn check_continuation(lead: u8, seen: u8, byte: u8) -> Result<(), InvalidReason> {
    if !is_continuation(byte) {
        return Err(InvalidReason::InvalidByte);
    }
    if seen != 1 {
        return Ok(());
    }
    let Some(len) = sequence_length(lead) else {
        return Err(InvalidReason::InvalidByte);
    };
    let len = usize::from(len);
    let shift = 6 * (len - 1);
    let lower = (u32::from(lead & LEAD_PAYLOAD_MASK[len]) << shift)
        | (u32::from(byte & 0x3F) << (shift - 6));
    if lower < MIN_FOR_LENGTH[len] {
        Err(InvalidReason::Overlong)
    } else if is_surrogate(lower) {
        Err(InvalidReason::Surrogate)
    } else if !is_valid_scalar(lower) {
        Err(InvalidReason::InvalidByte)
    } else {
        Ok(())
    }
}

fn complete(value: u32, consumed: u8, offset: usize) -> DecodeOutcome {
    match Scalar::new(value) {
        Ok(scalar) => DecodeOutcome::Scalar(scalar),
        Err(ScalarError::Surrogate(_)) => DecodeOutcome::Invalid(Invalid::new(
            InvalidReason::Surrogate,
            usize::from(consumed),
            offset,
        )),
        Err(_) => DecodeOutcome::Invalid(Invalid::new(
            InvalidReason::InvalidByte,
            usize::from(consumed),
            offset,
        )),
    }
}

/// Decodes a whole buffer in one pass.
///
/// Never emits [`DecodeOutcome::NeedMoreBytes`]; a trailing incomplete
/// character is reported as [`InvalidReason::Truncated`].
#[must_use]
pub fn decode_slice(bytes: &[u8]) -> Vec<DecodeOutcome> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let lead = bytes[i];
        if matches!(lead, 0xC0 | 0xC1) {
            out.push(DecodeOutcome::Invalid(Invalid::new(
                InvalidReason::Overlong,
                1,
                i,
            )));
            i += 1;
            continue;
        }
        let Some(len) = sequence_length(lead) else {
            out.push(DecodeOutcome::Invalid(Invalid::new(
                InvalidReason::InvalidByte,
                1,
                i,
            )));
            i += 1;
            continue;
        };

        let mut value = u32::from(lead & LEAD_PAYLOAD_MASK[usize::from(len)]);
        let mut taken: u8 = 1;
        let mut failure = None;
        while taken < len {
            let Some(&byte) = bytes.get(i + usize::from(taken)) else {
                failure = Some(InvalidReason::Truncated);
                break;
            };
            if let Err(reason) = check_continuation(lead, taken, byte) {
                failure = Some(reason);
                break;
            }
            value = (value << 6) | u32::from(byte & 0x3F);
            taken += 1;
        }

        out.push(match failure {
            None => complete(value, taken, i),
            Some(reason) => DecodeOutcome::Invalid(Invalid::new(reason, usize::from(taken), i)),
        });
        i += usize::from(taken);
    }
    out
}

/// Decodes `bytes` one byte at a time, appending the [`StreamDecoder::finish`]
/// result. Only significant outcomes are returned.
#[must_use]
pub fn decode_incremental(bytes: &[u8]) -> Vec<DecodeOutcome> {
    let mut decoder = StreamDecoder::new();
    let mut out: Vec<DecodeOutcome> = decoder
        .feed_chunk(bytes)
        .into_iter()
        .filter(|outcome| outcome.is_significant())
        .collect();
    out.extend(decoder.finish().map(DecodeOutcome::Invalid));
    out
}

//! Core of the Unicode transport diagnostics toolkit: a strict streaming
//! UTF-8 decoder, a code point hazard classifier, and a per-subject
//! diagnostic aggregator.

/// Unicode scalar model and UTF-8 byte-length rules.
pub mod scalar;
pub use scalar::{
    is_continuation, is_surrogate, is_valid_scalar, sequence_length, Scalar, Utf8Bytes,
    BMP_END, MAX_SCALAR, SURROGATE_END, SURROGATE_START,
};

/// Decode failure and scalar construction error taxonomy.
pub mod fault;
pub use fault::{Invalid, InvalidReason, ScalarError};

/// Hazard tags in reporting priority order.
pub mod hazard;
pub use hazard::{HazardSet, HazardTag};

/// Code point hazard classification.
pub mod classify;
pub use classify::{
    classify, classify_str, is_format_char, is_hazardous_control, is_private_use, FORMAT_RANGES,
    PRIVATE_USE_RANGES,
};

/// Byte-incremental and whole-buffer UTF-8 decoding.
pub mod decoder;
pub use decoder::{decode_incremental, decode_slice, DecodeOutcome, Outcomes, StreamDecoder};

/// Codec name resolution and error-handling modes.
pub mod codec;
pub use codec::{
    decode_named, decode_with, Codec, CodecError, DecodeNamedError, ErrorMode, TextDecoder,
};

/// Configuration, subject identity and the transport seam.
pub mod api;
pub use api::{
    DiagnoseConfig, FailureCategory, SubjectId, Transport, TransportError, DEFAULT_PREVIEW_LEN,
    DEFAULT_TIMEOUT,
};

/// Per-subject diagnosis and failure-report aggregation.
pub mod diag;
pub use diag::{
    diagnose, DiagnosticAggregator, FailureReport, ReportEntry, SubjectDiagnosis,
    TransportFailure,
};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;

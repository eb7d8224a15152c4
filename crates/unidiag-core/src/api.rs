//! Host-facing contracts: configuration, subject identity and the transport seam.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Default per-fetch deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of raw bytes kept per report entry.
pub const DEFAULT_PREVIEW_LEN: usize = 16;

/// Configuration passed explicitly into a [`crate::DiagnosticAggregator`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DiagnoseConfig {
    /// Device connection target handed to the transport (e.g. `COM27`,
    /// `/dev/ttyUSB0`, `socket://localhost:2218`, or `auto`).
    pub target: String,
    /// Deadline for a single transport fetch.
    pub timeout: Duration,
    /// Maximum raw bytes kept in each report entry.
    pub preview_len: usize,
}

impl Default for DiagnoseConfig {
    fn default() -> Self {
        Self {
            target: "auto".to_string(),
            timeout: DEFAULT_TIMEOUT,
            preview_len: DEFAULT_PREVIEW_LEN,
        }
    }
}

impl DiagnoseConfig {
    /// Returns a copy with a different target.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Returns a copy with a different fetch deadline.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns a copy with a different preview length.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn with_preview_len(mut self, preview_len: usize) -> Self {
        self.preview_len = preview_len;
        self
    }
}

/// Opaque subject identifier, kept as raw bytes.
///
/// File names may not be valid UTF-8; the identifier is displayed lossily
/// but compared and stored byte-exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubjectId(Vec<u8>);

impl SubjectId {
    /// Wraps raw identifier bytes.
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The raw identifier bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lossy text rendering of the identifier.
    #[must_use]
    pub fn to_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl From<&str> for SubjectId {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for SubjectId {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// Wire form of a [`SubjectId`]: plain text when the bytes are UTF-8,
/// otherwise the lossy text together with the exact bytes.
#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
enum SubjectRepr {
    Text(String),
    Raw { lossy: String, bytes: Vec<u8> },
}

#[cfg(feature = "serde")]
impl serde::Serialize for SubjectId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match std::str::from_utf8(&self.0) {
            Ok(text) => serializer.serialize_str(text),
            Err(_) => serde::Serialize::serialize(
                &SubjectRepr::Raw {
                    lossy: self.to_lossy(),
                    bytes: self.0.clone(),
                },
                serializer,
            ),
        }
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for SubjectId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match <SubjectRepr as serde::Deserialize>::deserialize(deserializer)? {
            SubjectRepr::Text(text) => Self::from(text),
            SubjectRepr::Raw { bytes, .. } => Self(bytes),
        })
    }
}

/// Failure of the external transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum TransportError {
    /// No response within the caller's deadline. Never retried here.
    #[error("transport timed out after {0:?}")]
    Timeout(Duration),
    /// The collaborator ran but reported failure.
    #[error("transport failed (status {status:?}): {detail}")]
    Failed {
        /// Exit status, when the collaborator is a process that exited.
        status: Option<i32>,
        /// Collaborator's error output.
        detail: String,
    },
    /// The collaborator could not be reached at all.
    #[error("transport i/o error: {0}")]
    Io(String),
}

impl TransportError {
    /// Returns `true` for [`TransportError::Timeout`].
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Failure category for summaries.
    #[must_use]
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::Timeout(_) => FailureCategory::Timeout,
            Self::Failed { detail, .. } | Self::Io(detail) => FailureCategory::from_detail(detail),
        }
    }
}

/// Coarse cause of a transport failure, read from the collaborator's error
/// output.
///
/// Variants are ordered the way failures are grouped in summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FailureCategory {
    /// The device console could not print the name (`UnicodeEncodeError`).
    ConsoleEncoding,
    /// The device link broke or returned garbage.
    Link,
    /// The path was missing on one side of the copy.
    NotFound,
    /// The device tool's argument parser rejected the name, usually over `=`.
    ArgumentParser,
    /// No response within the deadline.
    Timeout,
    /// Anything not recognised above.
    Other,
}

impl FailureCategory {
    /// All categories in grouping order.
    pub const ALL: [Self; 6] = [
        Self::ConsoleEncoding,
        Self::Link,
        Self::NotFound,
        Self::ArgumentParser,
        Self::Timeout,
        Self::Other,
    ];

    /// Short label printed in summaries.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ConsoleEncoding => "console encoding",
            Self::Link => "transport error",
            Self::NotFound => "file not found",
            Self::ArgumentParser => "argument parser (= in name)",
            Self::Timeout => "timeout",
            Self::Other => "other",
        }
    }

    /// Classifies error output text. First match wins.
    #[must_use]
    pub fn from_detail(detail: &str) -> Self {
        if detail.contains("UnicodeEncodeError") {
            Self::ConsoleEncoding
        } else if detail.contains("SyntaxError") || detail.contains("Error with transport") {
            Self::Link
        } else if detail.contains("No such file") || detail.contains("ENOENT") {
            Self::NotFound
        } else if detail.contains("unexpected argument") {
            Self::ArgumentParser
        } else if detail.contains("TIMEOUT") {
            Self::Timeout
        } else {
            Self::Other
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Source of subject bytes: a device copy/read, the local filesystem, or a test double.
pub trait Transport {
    /// Fetches the bytes for `subject`, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// [`TransportError::Timeout`] when the deadline passes, otherwise
    /// [`TransportError::Failed`] or [`TransportError::Io`].
    fn fetch(&mut self, subject: &SubjectId, timeout: Duration) -> Result<Vec<u8>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn fetch(&mut self, subject: &SubjectId, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        (**self).fetch(subject, timeout)
    }
}

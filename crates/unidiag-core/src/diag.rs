//! Per-subject diagnosis and failure-report aggregation.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::api::{DiagnoseConfig, FailureCategory, SubjectId, Transport, TransportError};
use crate::classify::classify;
use crate::decoder::{DecodeOutcome, StreamDecoder};
use crate::fault::Invalid;
use crate::hazard::{HazardSet, HazardTag};
use crate::scalar::Scalar;

/// Verdict for one subject.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SubjectDiagnosis {
    /// Subject identifier.
    pub subject: SubjectId,
    /// Bytes that were diagnosed.
    pub raw: Vec<u8>,
    /// Decoded scalars; `None` when decoding failed.
    pub decoded: Option<Vec<Scalar>>,
    /// Every hazard tag found. On decode failure, only the failure's tag.
    pub hazards: HazardSet,
    /// First invalid sequence, if any.
    pub decode_error: Option<Invalid>,
}

impl SubjectDiagnosis {
    /// Highest-priority hazard, the bucket this subject is reported under.
    #[must_use]
    pub fn dominant(&self) -> Option<HazardTag> {
        self.hazards.dominant()
    }

    /// Returns `true` when the subject decoded cleanly and carries no hazard.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.hazards.is_empty()
    }

    /// Decoded text, when decoding succeeded.
    #[must_use]
    pub fn decoded_text(&self) -> Option<String> {
        self.decoded
            .as_ref()
            .map(|scalars| scalars.iter().map(|s| s.as_char()).collect())
    }

    /// Decoded scalars paired with their own hazard tags.
    pub fn tagged_scalars(&self) -> impl Iterator<Item = (Scalar, HazardSet)> + '_ {
        self.decoded
            .iter()
            .flatten()
            .map(|&scalar| (scalar, classify(scalar)))
    }
}

/// Decodes and classifies one subject.
///
/// Decoding halts at the first invalid sequence. A fresh decoder is used
/// for every call so no state leaks between subjects.
#[must_use]
pub fn diagnose(subject: SubjectId, bytes: &[u8]) -> SubjectDiagnosis {
    let mut decoder = StreamDecoder::new();
    let mut scalars = Vec::with_capacity(bytes.len());
    let mut hazards = HazardSet::new();
    let mut decode_error = None;

    'bytes: for &byte in bytes {
        for outcome in decoder.feed(byte) {
            match outcome {
                DecodeOutcome::Scalar(scalar) => {
                    hazards |= classify(scalar);
                    scalars.push(scalar);
                }
                DecodeOutcome::NeedMoreBytes => {}
                DecodeOutcome::Invalid(invalid) => {
                    decode_error = Some(invalid);
                    break 'bytes;
                }
            }
        }
    }
    if decode_error.is_none() {
        decode_error = decoder.finish();
    }

    let (decoded, hazards) = match decode_error {
        Some(invalid) => (None, HazardSet::single(invalid.reason.tag())),
        None => (Some(scalars), hazards),
    };

    SubjectDiagnosis {
        subject,
        raw: bytes.to_vec(),
        decoded,
        hazards,
        decode_error,
    }
}

/// One subject listed under a hazard bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ReportEntry {
    /// Subject identifier.
    pub subject: SubjectId,
    /// Leading raw bytes of the subject.
    pub preview: Vec<u8>,
    /// `true` when `preview` is shorter than the diagnosed bytes.
    pub truncated: bool,
    /// Every tag the subject carries, not only the bucket's.
    pub hazards: HazardSet,
    /// Decode failure, if any.
    pub decode_error: Option<Invalid>,
}

impl ReportEntry {
    fn from_diagnosis(diagnosis: &SubjectDiagnosis, preview_len: usize) -> Self {
        let keep = diagnosis.raw.len().min(preview_len);
        Self {
            subject: diagnosis.subject.clone(),
            preview: diagnosis.raw[..keep].to_vec(),
            truncated: keep < diagnosis.raw.len(),
            hazards: diagnosis.hazards,
            decode_error: diagnosis.decode_error,
        }
    }
}

/// A subject whose bytes could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TransportFailure {
    /// Subject identifier.
    pub subject: SubjectId,
    /// What the transport reported.
    pub error: TransportError,
    /// Category derived from `error`.
    pub category: FailureCategory,
}

/// Subjects grouped by dominant hazard, plus clean subjects and transport failures.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FailureReport {
    buckets: BTreeMap<HazardTag, Vec<ReportEntry>>,
    clean: Vec<SubjectId>,
    transport_timeouts: Vec<TransportFailure>,
    transport_failures: Vec<TransportFailure>,
}

impl FailureReport {
    /// Entries bucketed under `tag`, in insertion order.
    #[must_use]
    pub fn bucket(&self, tag: HazardTag) -> &[ReportEntry] {
        self.buckets
            .get(&tag)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Non-empty buckets in priority order.
    pub fn buckets(&self) -> impl Iterator<Item = (HazardTag, &[ReportEntry])> {
        self.buckets
            .iter()
            .map(|(tag, entries)| (*tag, entries.as_slice()))
    }

    /// Subjects without hazards, in insertion order.
    #[must_use]
    pub fn clean(&self) -> &[SubjectId] {
        &self.clean
    }

    /// Subjects whose fetch exceeded the deadline.
    #[must_use]
    pub fn transport_timeouts(&self) -> &[TransportFailure] {
        &self.transport_timeouts
    }

    /// Subjects whose fetch failed for other reasons.
    #[must_use]
    pub fn transport_failures(&self) -> &[TransportFailure] {
        &self.transport_failures
    }

    /// Number of subjects placed in a hazard bucket.
    #[must_use]
    pub fn hazardous_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Every subject seen, including clean ones and transport failures.
    #[must_use]
    pub fn total_subjects(&self) -> usize {
        self.hazardous_count()
            + self.clean.len()
            + self.transport_timeouts.len()
            + self.transport_failures.len()
    }

    /// Returns `true` when any subject landed in a hazard bucket.
    #[must_use]
    pub fn has_hazards(&self) -> bool {
        !self.buckets.is_empty()
    }
}

/// Drives diagnosis over many subjects and builds a [`FailureReport`].
///
/// A failing subject never stops the remaining ones from being processed.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticAggregator {
    config: DiagnoseConfig,
    report: FailureReport,
}

impl DiagnosticAggregator {
    /// Creates an empty aggregator.
    #[must_use]
    pub fn new(config: DiagnoseConfig) -> Self {
        Self {
            config,
            report: FailureReport::default(),
        }
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &DiagnoseConfig {
        &self.config
    }

    /// Diagnoses `bytes`, records the verdict and returns it.
    pub fn diagnose(&mut self, subject: SubjectId, bytes: &[u8]) -> SubjectDiagnosis {
        let diagnosis = diagnose(subject, bytes);
        self.record(&diagnosis);
        diagnosis
    }

    /// Records a verdict produced elsewhere.
    pub fn record(&mut self, diagnosis: &SubjectDiagnosis) {
        debug!(
            subject = %diagnosis.subject,
            hazards = %diagnosis.hazards,
            "diagnosed subject"
        );
        match diagnosis.dominant() {
            Some(tag) => self
                .report
                .buckets
                .entry(tag)
                .or_default()
                .push(ReportEntry::from_diagnosis(diagnosis, self.config.preview_len)),
            None => self.report.clean.push(diagnosis.subject.clone()),
        }
    }

    /// Records a subject that passed a check with no bytes to diagnose, such
    /// as a device upload judged only by exit status.
    pub fn record_clean(&mut self, subject: SubjectId) {
        debug!(subject = %subject, "subject passed");
        self.report.clean.push(subject);
    }

    /// Fetches the subject through `transport` under the configured
    /// deadline, then diagnoses it.
    ///
    /// # Errors
    ///
    /// Returns the transport's error after recording it in the report;
    /// timeouts and other failures are kept apart from hazard buckets.
    pub fn diagnose_fetched<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        subject: SubjectId,
    ) -> Result<SubjectDiagnosis, TransportError> {
        match transport.fetch(&subject, self.config.timeout) {
            Ok(bytes) => Ok(self.diagnose(subject, &bytes)),
            Err(error) => {
                self.record_transport_error(subject, error.clone());
                Err(error)
            }
        }
    }

    /// Records a fetch failure against a subject.
    pub fn record_transport_error(&mut self, subject: SubjectId, error: TransportError) {
        warn!(subject = %subject, %error, device = %self.config.target, "fetch failed");
        let category = error.category();
        let failure = TransportFailure {
            subject,
            error,
            category,
        };
        if failure.error.is_timeout() {
            self.report.transport_timeouts.push(failure);
        } else {
            self.report.transport_failures.push(failure);
        }
    }

    /// Ends aggregation and returns the immutable report.
    #[must_use]
    pub fn finalize(self) -> FailureReport {
        self.report
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::fault::InvalidReason;

    struct ScriptedTransport(Vec<Result<Vec<u8>, TransportError>>);

    impl Transport for ScriptedTransport {
        fn fetch(
            &mut self,
            _subject: &SubjectId,
            _timeout: Duration,
        ) -> Result<Vec<u8>, TransportError> {
            self.0.remove(0)
        }
    }

    #[test]
    fn clean_name_has_no_hazards() {
        let d = diagnose(SubjectId::from("readme.txt"), b"readme.txt");
        assert!(d.is_clean());
        assert_eq!(d.decoded_text().as_deref(), Some("readme.txt"));
        assert_eq!(d.decode_error, None);
    }

    #[test]
    fn emoji_name_is_outside_bmp() {
        let name = "smile_\u{1F600}.txt";
        let d = diagnose(SubjectId::from(name), name.as_bytes());
        assert_eq!(d.dominant(), Some(HazardTag::OutsideBmp));
        let tagged: Vec<_> = d.tagged_scalars().filter(|(_, t)| !t.is_empty()).collect();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].0, Scalar::from('\u{1F600}'));
    }

    #[test]
    fn decode_failure_discards_scalars_and_records_reason_tag() {
        let d = diagnose(SubjectId::from("bad"), b"\xe2\x9c\x93ok\xed\xa0\x80");
        assert_eq!(d.decoded, None);
        assert_eq!(d.hazards, HazardSet::single(HazardTag::Surrogate));
        let err = d.decode_error.expect("surrogate rejected");
        assert_eq!(err.reason, InvalidReason::Surrogate);
        assert_eq!(err.offset, 5);
    }

    #[test]
    fn truncated_content_is_tagged() {
        let d = diagnose(SubjectId::from("uart"), b"A\xf0");
        assert_eq!(d.hazards, HazardSet::single(HazardTag::Truncated));
    }

    #[test]
    fn aggregation_buckets_by_dominant_tag_only() {
        let mut agg = DiagnosticAggregator::new(DiagnoseConfig::default().with_preview_len(4));
        let mixed = "a\u{E000}e\u{0301}";
        agg.diagnose(SubjectId::from(mixed), mixed.as_bytes());
        agg.diagnose(SubjectId::from("plain"), b"plain");
        agg.diagnose(SubjectId::from("zw"), "z\u{200B}w".as_bytes());
        let report = agg.finalize();

        assert_eq!(report.bucket(HazardTag::CombiningMark).len(), 1);
        assert!(report.bucket(HazardTag::PrivateUse).is_empty());
        assert_eq!(report.bucket(HazardTag::FormatChar).len(), 1);
        assert_eq!(report.clean(), &[SubjectId::from("plain")]);
        assert_eq!(report.hazardous_count(), 2);
        assert_eq!(report.total_subjects(), 3);

        let entry = &report.bucket(HazardTag::CombiningMark)[0];
        assert_eq!(entry.preview, mixed.as_bytes()[..4].to_vec());
        assert!(entry.truncated);
        assert!(entry.hazards.contains(HazardTag::PrivateUse));

        let order: Vec<_> = report.buckets().map(|(tag, _)| tag).collect();
        assert_eq!(order, vec![HazardTag::CombiningMark, HazardTag::FormatChar]);
    }

    #[test]
    fn transport_timeout_is_kept_apart_and_processing_continues() {
        let mut transport = ScriptedTransport(vec![
            Err(TransportError::Timeout(Duration::from_secs(30))),
            Err(TransportError::Failed {
                status: Some(1),
                detail: "OSError: 2".to_string(),
            }),
            Ok(b"\xff".to_vec()),
        ]);
        let mut agg = DiagnosticAggregator::default();

        let first = agg.diagnose_fetched(&mut transport, SubjectId::from("slow"));
        assert!(matches!(first, Err(TransportError::Timeout(_))));
        let second = agg.diagnose_fetched(&mut transport, SubjectId::from("missing"));
        assert!(second.is_err());
        let third = agg
            .diagnose_fetched(&mut transport, SubjectId::from("binary"))
            .expect("fetched");
        assert_eq!(third.dominant(), Some(HazardTag::InvalidByte));

        let report = agg.finalize();
        assert_eq!(report.transport_timeouts().len(), 1);
        assert_eq!(report.transport_failures().len(), 1);
        assert_eq!(report.bucket(HazardTag::InvalidByte).len(), 1);
        assert_eq!(report.total_subjects(), 3);
    }

    #[test]
    fn failures_carry_their_category() {
        let mut agg = DiagnosticAggregator::default();
        agg.record_transport_error(
            SubjectId::from("a=b.txt"),
            TransportError::Failed {
                status: Some(2),
                detail: "error: unexpected argument 'b.txt' found".to_string(),
            },
        );
        agg.record_clean(SubjectId::from("uploaded.txt"));
        let report = agg.finalize();

        assert_eq!(
            report.transport_failures()[0].category,
            FailureCategory::ArgumentParser
        );
        assert_eq!(report.clean(), &[SubjectId::from("uploaded.txt")]);
        assert_eq!(report.total_subjects(), 2);
    }
}

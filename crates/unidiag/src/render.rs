//! Human-readable and JSON rendering of diagnosis results.

use std::fmt::Write as _;
use std::io::{self, Write};

use unidiag_core::{FailureCategory, FailureReport, SubjectDiagnosis, TransportFailure};

/// Subject names listed per category before the rest are summarised.
pub const MAX_LISTED: usize = 10;

/// Separator between subjects in the results file.
const RULE: &str = "----------------------------------------";

/// Formats bytes as space-separated upper-case hex, with a trailing `...`
/// when `truncated`.
#[must_use]
pub fn hex_bytes(bytes: &[u8], truncated: bool) -> String {
    let mut out = String::with_capacity(bytes.len() * 3 + 4);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02X}");
    }
    if truncated {
        out.push_str(" ...");
    }
    out
}

/// Lists failures grouped by category, each group capped at [`MAX_LISTED`].
fn write_failures<W: Write>(
    out: &mut W,
    heading: &str,
    failures: &[TransportFailure],
) -> io::Result<()> {
    if failures.is_empty() {
        return Ok(());
    }
    writeln!(out)?;
    writeln!(out, "{heading} - {} subject(s):", failures.len())?;
    for category in FailureCategory::ALL {
        let group: Vec<&TransportFailure> = failures
            .iter()
            .filter(|failure| failure.category == category)
            .collect();
        if group.is_empty() {
            continue;
        }
        writeln!(out, "  {category} ({}):", group.len())?;
        for failure in group.iter().take(MAX_LISTED) {
            writeln!(out, "    - {}: {}", failure.subject, failure.error)?;
        }
        if group.len() > MAX_LISTED {
            writeln!(out, "    ... and {} more", group.len() - MAX_LISTED)?;
        }
    }
    Ok(())
}

/// Writes the summary for one report: counts, then one section per hazard
/// category in priority order.
///
/// # Errors
///
/// Propagates write failures.
pub fn render_summary<W: Write>(out: &mut W, title: &str, report: &FailureReport) -> io::Result<()> {
    writeln!(out, "{title}")?;
    writeln!(out, "{}", "=".repeat(title.chars().count()))?;
    writeln!(out, "Subjects:   {}", report.total_subjects())?;
    writeln!(out, "Passed:     {}", report.clean().len())?;
    writeln!(out, "Hazardous:  {}", report.hazardous_count())?;
    writeln!(out, "Timed out:  {}", report.transport_timeouts().len())?;
    writeln!(out, "Unreadable: {}", report.transport_failures().len())?;

    for (tag, entries) in report.buckets() {
        writeln!(out)?;
        writeln!(
            out,
            "[{tag}] {} - {} subject(s):",
            tag.describe(),
            entries.len()
        )?;
        for entry in entries.iter().take(MAX_LISTED) {
            let preview = hex_bytes(&entry.preview, entry.truncated);
            write!(out, "  - {}  ({preview})", entry.subject)?;
            if let Some(error) = &entry.decode_error {
                write!(out, "  {error}")?;
            }
            writeln!(out)?;
        }
        if entries.len() > MAX_LISTED {
            writeln!(out, "  ... and {} more", entries.len() - MAX_LISTED)?;
        }
    }

    write_failures(out, "Transport timeouts", report.transport_timeouts())?;
    write_failures(out, "Transport failures", report.transport_failures())?;
    Ok(())
}

/// Writes the detailed per-subject listing kept in the results file.
///
/// # Errors
///
/// Propagates write failures.
pub fn render_details<W: Write>(
    out: &mut W,
    title: &str,
    diagnoses: &[SubjectDiagnosis],
) -> io::Result<()> {
    writeln!(out, "{title}")?;
    writeln!(out, "{}", "=".repeat(title.chars().count()))?;
    for diagnosis in diagnoses {
        writeln!(out, "Subject: {}", diagnosis.subject)?;
        writeln!(out, "Bytes: {}", hex_bytes(&diagnosis.raw, false))?;
        match diagnosis.dominant() {
            None => writeln!(out, "Status: clean")?,
            Some(tag) => writeln!(out, "Status: {tag} ({})", diagnosis.hazards)?,
        }
        if let Some(error) = &diagnosis.decode_error {
            writeln!(out, "Error: {error}")?;
        }
        if diagnosis.decoded.is_some() {
            writeln!(out, "Code points:")?;
            for (scalar, tags) in diagnosis.tagged_scalars() {
                writeln!(out, "  {scalar} [{tags}]")?;
            }
        }
        writeln!(out, "{RULE}")?;
    }
    Ok(())
}

/// Converts a report to a JSON value.
///
/// # Errors
///
/// Returns the serializer's error.
pub fn render_json(report: &FailureReport) -> serde_json::Result<serde_json::Value> {
    serde_json::to_value(report)
}

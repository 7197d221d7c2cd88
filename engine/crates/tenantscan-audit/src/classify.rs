//! Result classification: raw backend output to verdict
//!
//! Pure apart from logging, so every rule is testable without a backend.

use tenantscan_core::output::decode;
use tenantscan_core::{CheckExpr, Error, RawOutput, Result, ScanKind, Verdict};
use tracing::warn;

/// Text the shell prints for an unknown cmdlet
pub const UNRECOGNIZED_MARKER: &str = "is not recognized as a name of a cmdlet";

const TERM_PREFIX: &str = "The term ";

// Colour reset the shell prints before its spelling hint
const TERM_DELIMITER: &str = "\x1b[0m\n\x1b[31;1m\x1b[31;1mCheck the spelling of the name";

/// Extract the offending term when `text` carries the unrecognized-command
/// error. Returns `None` when the marker is absent.
pub fn unrecognized_term(text: &str) -> Option<String> {
    if !text.contains(UNRECOGNIZED_MARKER) {
        return None;
    }

    let rest = match text.find(TERM_PREFIX) {
        Some(at) => &text[at + TERM_PREFIX.len()..],
        None => return Some(String::new()),
    };

    let end = rest.find(TERM_DELIMITER).unwrap_or(rest.len());

    Some(rest[..end].to_string())
}

/// Classify one scan's output.
///
/// Returns `Ok(None)` for informational graph scans. `applies_if_empty`
/// false turns an empty CLI output into `NotApplicable`.
pub fn classify(
    kind: &ScanKind,
    output: &RawOutput,
    check: &CheckExpr,
    id: &str,
    applies_if_empty: bool,
) -> Result<Option<Verdict>> {
    match kind {
        ScanKind::Shell => classify_shell(output, check, id).map(Some),
        ScanKind::Cli => classify_cli(output, check, id, applies_if_empty).map(Some),
        ScanKind::Graph => Ok(None),
        ScanKind::Unknown(other) => Err(Error::InvalidScanType(other.clone())),
    }
}

fn classify_shell(output: &RawOutput, check: &CheckExpr, id: &str) -> Result<Verdict> {
    let text = match output {
        RawOutput::Scalar(bytes) => decode(bytes).into_owned(),
        RawOutput::Sequence(entries) => entries
            .iter()
            .flatten()
            .map(|entry| decode(entry).into_owned())
            .collect::<Vec<_>>()
            .join("\n"),
        RawOutput::Absent => String::new(),
    };

    if let Some(term) = unrecognized_term(&text) {
        warn!("{}: unrecognized command {}", id, term);
        return Ok(Verdict::Error);
    }

    check.matches_text(id, &text).map(Verdict::from_bool)
}

fn classify_cli(
    output: &RawOutput,
    check: &CheckExpr,
    id: &str,
    applies_if_empty: bool,
) -> Result<Verdict> {
    if output.is_absent() || (output.is_empty() && !applies_if_empty) {
        return Ok(Verdict::NotApplicable);
    }

    match check {
        CheckExpr::Always => return Ok(Verdict::True),
        CheckExpr::Never => return Ok(Verdict::False),
        _ => {}
    }

    match output {
        // List entries are matched against the check text as written, even
        // for `regex ` checks; a null entry never passes
        RawOutput::Sequence(entries) => {
            let needle = check.source();
            let passed = entries.iter().all(|entry| match entry {
                Some(bytes) => decode(bytes).contains(needle),
                None => false,
            });
            Ok(Verdict::from_bool(passed))
        }
        RawOutput::Scalar(bytes) => check.matches_bytes(id, bytes).map(Verdict::from_bool),
        RawOutput::Absent => Ok(Verdict::NotApplicable),
    }
}

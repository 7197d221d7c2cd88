//! Per-entry execution: run the backend call, then classify

use crate::classify::{classify, unrecognized_term};
use tenantscan_core::output::decode;
use tenantscan_core::{CancellationToken, Error, RawOutput, Result, ScanKind, ScanResult, ScanSpec, Verdict};
use tenantscan_session::Sessions;
use tracing::{debug, info};

/// Execute one checklist entry against its backend.
///
/// CLI failures and missing inventory are recorded in the comment and
/// classified from absent output. Every other error is returned to the
/// caller, which reports it as an `Error` result.
pub async fn execute(
    sessions: &Sessions,
    mut spec: ScanSpec,
    cancel: &CancellationToken,
) -> Result<ScanResult> {
    debug!("Executing scan: {} - {}", spec.id, spec.name);

    let output = match &spec.kind {
        ScanKind::Shell => RawOutput::Scalar(sessions.shell.run(&spec.command, cancel).await?),
        ScanKind::Cli => match sessions.cli.run(&spec.command, cancel).await {
            Ok(output) => output,
            Err(e) if e.is_unmet_precondition() => {
                debug!("{}: {}", spec.id, e);
                spec.comment = e.to_string();
                RawOutput::Absent
            }
            Err(e) => return Err(e),
        },
        ScanKind::Graph => {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let score = sessions.graph.secure_score().await?;
            spec.comment = score.summary();
            RawOutput::Absent
        }
        ScanKind::Unknown(kind) => return Err(Error::InvalidScanType(kind.clone())),
    };

    spec.status = classify(&spec.kind, &output, &spec.check, &spec.id, spec.applies_if_empty)?;

    if spec.status == Some(Verdict::Error) {
        if let RawOutput::Scalar(bytes) = &output {
            if let Some(term) = unrecognized_term(&decode(bytes)) {
                spec.comment = format!("Unrecognized command: {}", term);
            }
        }
    }

    match spec.status {
        Some(verdict) => info!(id = %spec.id, name = %spec.name, verdict = %verdict, "Scan classified"),
        None => info!(id = %spec.id, name = %spec.name, "{}", spec.comment),
    }

    Ok(spec.to_result())
}

//! Audit summary statistics

use serde::Serialize;
use tenantscan_core::{ScanResult, Verdict};

/// Summary of one audit run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditSummary {
    /// Entries scheduled
    pub total: usize,
    /// Verdict `True`
    pub passed: usize,
    /// Verdict `False`
    pub failed: usize,
    /// Verdict `Error`
    pub errors: usize,
    /// Verdict `NotApplicable`
    pub not_applicable: usize,
    /// Graph scans, which carry no verdict
    pub informational: usize,
    /// Entries that never produced a result
    pub cancelled: usize,
}

impl AuditSummary {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a ScanResult>, cancelled: usize) -> Self {
        let mut summary = AuditSummary {
            cancelled,
            ..Default::default()
        };

        for result in results {
            summary.total += 1;
            match result.status {
                Some(Verdict::True) => summary.passed += 1,
                Some(Verdict::False) => summary.failed += 1,
                Some(Verdict::Error) => summary.errors += 1,
                Some(Verdict::NotApplicable) => summary.not_applicable += 1,
                None => summary.informational += 1,
            }
        }

        summary.total += cancelled;
        summary
    }

    /// Entries that produced a result
    pub fn completed(&self) -> usize {
        self.total - self.cancelled
    }

    /// Share of passing entries among those with a pass/fail verdict
    pub fn pass_rate(&self) -> f64 {
        let judged = self.passed + self.failed;
        if judged == 0 {
            0.0
        } else {
            (self.passed as f64 / judged as f64) * 100.0
        }
    }
}

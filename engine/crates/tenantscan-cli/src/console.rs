//! Console rendering of verdicts and the run summary

use tenantscan_audit::{AuditReport, AuditSummary};
use tenantscan_core::{ScanResult, Verdict};

const RESET: &str = "\x1b[0m";

fn style(status: Option<Verdict>) -> (&'static str, &'static str) {
    match status {
        Some(Verdict::True) => ("\x1b[32m", "\u{2705}"),
        Some(Verdict::False) => ("\x1b[31m", "\u{26D4}"),
        Some(Verdict::Error) => ("\x1b[33m", "\u{26A0}\u{FE0F}"),
        Some(Verdict::NotApplicable) => ("\x1b[37;2m", "\u{274C}"),
        None => ("\x1b[36m", "\u{2139}\u{FE0F}"),
    }
}

/// One coloured line: `[emoji] id - name`
pub fn verdict_line(result: &ScanResult) -> String {
    let (color, emoji) = style(result.status);
    format!("{}[{}] {} - {}{}", color, emoji, result.id, result.name, RESET)
}

pub fn print_results(report: &AuditReport, debug: bool) {
    println!();
    for result in report.results() {
        println!("{}", verdict_line(result));
        if result.status.is_none() || (debug && !result.comment.is_empty()) {
            println!("      {}", result.comment);
        }
    }
}

pub fn print_summary(summary: &AuditSummary, elapsed_secs: i64) {
    println!("\nSummary:");
    println!("  Total:          {}", summary.total);
    println!("  Passed:         {} ({:.1}%)", summary.passed, summary.pass_rate());
    println!("  Failed:         {}", summary.failed);
    println!("  Errors:         {}", summary.errors);
    println!("  Not applicable: {}", summary.not_applicable);
    if summary.informational > 0 {
        println!("  Informational:  {}", summary.informational);
    }
    if summary.cancelled > 0 {
        println!("  Cancelled:      {}", summary.cancelled);
    }
    println!("  Duration:       {}s", elapsed_secs);
}

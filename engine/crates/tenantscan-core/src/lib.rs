//! TenantScan Core - Foundation types and error handling
//!
//! This crate provides the data model shared by the audit engine:
//! - `ScanSpec`: one checklist entry (what to run, how to judge it)
//! - `CheckExpr`: the parsed check grammar
//! - `RawOutput`: backend output before classification
//! - `Verdict`, `ScanKind`: core enums
//! - `ScanResult`: the reported subset of a completed scan

pub mod cancel;
pub mod check;
pub mod error;
pub mod output;
pub mod verdict;

// Re-export commonly used types at crate root
pub use cancel::CancellationToken;
pub use check::{parse_flag, CheckExpr, ScanResult, ScanSpec, CHECK_ALWAYS, REGEX_PREFIX};
pub use error::{Error, Result};
pub use output::RawOutput;
pub use verdict::{ScanKind, Verdict};

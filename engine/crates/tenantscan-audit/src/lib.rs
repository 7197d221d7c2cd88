//! TenantScan Audit - Classification and concurrent scan scheduling
//!
//! This crate provides the audit engine:
//! - Result classification from raw backend output to a verdict
//! - Per-entry dispatch to the shell, CLI, or graph backend
//! - A bounded, cancellable scheduler over the shared sessions
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tenantscan_audit::ScanScheduler;
//! use tenantscan_common::Config;
//! use tenantscan_session::Sessions;
//!
//! # async fn run(specs: Vec<tenantscan_core::ScanSpec>) -> tenantscan_core::Result<()> {
//! let config = Config::default();
//! let sessions = Arc::new(Sessions::establish(&config).await?);
//! let report = ScanScheduler::new(sessions).run(specs).await;
//!
//! println!("Passed: {}", report.summary.passed);
//! println!("Failed: {}", report.summary.failed);
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod dispatch;
pub mod scheduler;
pub mod summary;

#[cfg(test)]
mod testing;

pub use classify::{classify, unrecognized_term, UNRECOGNIZED_MARKER};
pub use dispatch::execute;
pub use scheduler::{AuditReport, ScanScheduler, DEFAULT_MAX_CONCURRENT};
pub use summary::AuditSummary;

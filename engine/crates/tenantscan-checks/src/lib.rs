//! TenantScan Checks - Checklist input and report output
//!
//! Checklists are semicolon-delimited tables with one scan entry per row;
//! reports are written as CSV, JSON or a colour-coded spreadsheet in
//! checklist order.

pub mod loader;
pub mod report;

pub use loader::{load_checklist, parse_checklist, REQUIRED_COLUMNS};
pub use report::{write_report, write_xlsx, ReportFormat};

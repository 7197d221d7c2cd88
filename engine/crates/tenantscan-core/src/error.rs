//! Error types for the TenantScan engine

use thiserror::Error;

/// Result type alias using TenantScan Error
pub type Result<T> = std::result::Result<T, Error>;

/// TenantScan error types
#[derive(Error, Debug)]
pub enum Error {
    // === Session Errors ===
    #[error("Failed to create the {backend} session: {reason}")]
    SessionCreationFailed {
        backend: &'static str,
        reason: String,
    },

    #[error("Failed to verify the {backend} session: {reason}")]
    SessionCheckFailed {
        backend: &'static str,
        reason: String,
    },

    #[error("Process ended unexpectedly: {}", exit_code_display(.code))]
    ProcessTerminated { code: Option<i32> },

    #[error("{backend} command timed out after {seconds}s")]
    CommandTimeout { backend: &'static str, seconds: u64 },

    // === Scan Errors ===
    #[error("No {kind} were found")]
    MissingInventory { kind: String },

    #[error("Invalid scan type: {0:?}")]
    InvalidScanType(String),

    #[error("Invalid check for {id}: {message}")]
    InvalidCheck { id: String, message: String },

    #[error("CLI error: {0}")]
    Cli(String),

    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Scan cancelled")]
    Cancelled,

    // === Input / Configuration Errors ===
    #[error("Checklist error: {0}")]
    Checklist(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Report error: {0}")]
    Report(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn exit_code_display(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => String::from("unknown"),
    }
}

impl Error {
    /// Check if this error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::SessionCreationFailed { .. } | Error::SessionCheckFailed { .. }
        )
    }

    /// Check if this error marks an unmet precondition rather than a failure.
    /// Such errors are recorded in the scan comment and the scan is classified
    /// from an absent output.
    pub fn is_unmet_precondition(&self) -> bool {
        matches!(self, Error::MissingInventory { .. } | Error::Cli(_))
    }

    /// Get an error code for logging
    pub fn code(&self) -> &'static str {
        match self {
            Error::SessionCreationFailed { .. } => "SESSION_CREATION_FAILED",
            Error::SessionCheckFailed { .. } => "SESSION_CHECK_FAILED",
            Error::ProcessTerminated { .. } => "PROCESS_TERMINATED",
            Error::CommandTimeout { .. } => "COMMAND_TIMEOUT",
            Error::MissingInventory { .. } => "MISSING_INVENTORY",
            Error::InvalidScanType(_) => "INVALID_SCAN_TYPE",
            Error::InvalidCheck { .. } => "INVALID_CHECK",
            Error::Cli(_) => "CLI_ERROR",
            Error::Graph(_) => "GRAPH_ERROR",
            Error::Cancelled => "CANCELLED",
            Error::Checklist(_) => "CHECKLIST_ERROR",
            Error::Configuration(_) => "CONFIG_ERROR",
            Error::Report(_) => "REPORT_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Json(_) => "JSON_ERROR",
        }
    }
}

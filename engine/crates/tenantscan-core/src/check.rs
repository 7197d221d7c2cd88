//! Checklist entries, their check expressions, and scan results

use crate::error::{Error, Result};
use crate::output::decode;
use crate::verdict::{ScanKind, Verdict};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sentinel check value meaning "always passes"
pub const CHECK_ALWAYS: &str = "None";

/// Prefix introducing a regular-expression check
pub const REGEX_PREFIX: &str = "regex ";

/// Parsed form of a checklist `check` cell
#[derive(Debug, Clone)]
pub enum CheckExpr {
    /// `"None"`: passes unconditionally
    Always,
    /// `""`: fails unconditionally
    Never,
    /// A regular expression. `source` keeps the cell text as written,
    /// which is what list outputs are matched against.
    Pattern { regex: Regex, source: String },
    /// Plain substring
    Contains(String),
    /// The cell could not be compiled; classifying against it is an error
    Invalid { source: String, message: String },
}

impl CheckExpr {
    /// Parse a check cell for the given backend.
    ///
    /// Shell checks are always regular expressions. CLI (and graph) checks
    /// use the sentinel / `regex <pattern>` / substring grammar.
    pub fn parse(kind: &ScanKind, raw: &str) -> Self {
        match kind {
            ScanKind::Shell => Self::compile(raw, raw),
            _ => {
                if raw == CHECK_ALWAYS {
                    CheckExpr::Always
                } else if raw.is_empty() {
                    CheckExpr::Never
                } else if let Some(rest) = raw.strip_prefix(REGEX_PREFIX) {
                    let pattern = rest.split_whitespace().collect::<Vec<_>>().join(" ");
                    Self::compile(&pattern, raw)
                } else {
                    CheckExpr::Contains(raw.to_string())
                }
            }
        }
    }

    fn compile(pattern: &str, source: &str) -> Self {
        match Regex::new(pattern) {
            Ok(regex) => CheckExpr::Pattern {
                regex,
                source: source.to_string(),
            },
            Err(e) => CheckExpr::Invalid {
                source: source.to_string(),
                message: e.to_string(),
            },
        }
    }

    /// The cell text this expression was parsed from
    pub fn source(&self) -> &str {
        match self {
            CheckExpr::Always => CHECK_ALWAYS,
            CheckExpr::Never => "",
            CheckExpr::Pattern { source, .. } => source,
            CheckExpr::Contains(s) => s,
            CheckExpr::Invalid { source, .. } => source,
        }
    }

    /// Match against decoded text: patterns search, substrings contain.
    pub fn matches_text(&self, id: &str, text: &str) -> Result<bool> {
        match self {
            CheckExpr::Always => Ok(true),
            CheckExpr::Never => Ok(false),
            CheckExpr::Pattern { regex, .. } => Ok(regex.is_match(text)),
            CheckExpr::Contains(s) => Ok(text.contains(s.as_str())),
            CheckExpr::Invalid { message, .. } => Err(Error::InvalidCheck {
                id: id.to_string(),
                message: message.clone(),
            }),
        }
    }

    /// Match against raw bytes after lossy decoding
    pub fn matches_bytes(&self, id: &str, bytes: &[u8]) -> Result<bool> {
        self.matches_text(id, &decode(bytes))
    }
}

/// One checklist entry: what to run and how to judge its output
#[derive(Debug, Clone)]
pub struct ScanSpec {
    /// Stable identifier, unique within a batch by convention
    pub id: String,
    /// Human label
    pub name: String,
    /// Backend this entry is dispatched to
    pub kind: ScanKind,
    /// Command template
    pub command: String,
    /// Parsed check expression
    pub check: CheckExpr,
    /// When false, an empty (but present) output means "not applicable"
    pub applies_if_empty: bool,
    /// Free text, overwritten when the scan fails
    pub comment: String,
    /// Verdict, unset until classified
    pub status: Option<Verdict>,
    /// Checklist columns the engine does not interpret
    pub extra: BTreeMap<String, String>,
}

impl ScanSpec {
    /// Create a new entry; the check cell is parsed for the given kind
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: ScanKind,
        command: impl Into<String>,
        check: &str,
    ) -> Self {
        let check = CheckExpr::parse(&kind, check);
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            command: command.into(),
            check,
            applies_if_empty: true,
            comment: String::new(),
            status: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_applies_if_empty(mut self, applies: bool) -> Self {
        self.applies_if_empty = applies;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Extract the reported subset of this entry
    pub fn to_result(&self) -> ScanResult {
        ScanResult {
            id: self.id.clone(),
            name: self.name.clone(),
            status: self.status,
            comment: self.comment.clone(),
        }
    }
}

/// Interpret the `applies_if_empty` cell. Only the exact literal `False`
/// turns the flag off; any other spelling leaves it on.
pub fn parse_flag(raw: &str) -> bool {
    raw.trim() != "False"
}

/// Reported outcome of one completed scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub id: String,
    pub name: String,
    /// `None` only for informational (graph) scans
    pub status: Option<Verdict>,
    pub comment: String,
}

impl ScanResult {
    /// Error result for an entry whose task failed
    pub fn error(id: impl Into<String>, name: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: Some(Verdict::Error),
            comment: comment.into(),
        }
    }

    /// Status column text; empty for informational scans
    pub fn status_str(&self) -> &'static str {
        self.status.map(|v| v.as_str()).unwrap_or("")
    }
}

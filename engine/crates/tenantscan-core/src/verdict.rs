//! Verdicts and backend kinds

use serde::{Deserialize, Serialize};

/// Classification outcome for a checklist entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// The tenant satisfies the check
    True,
    /// The tenant does not satisfy the check
    False,
    /// The backend call or the check itself failed
    Error,
    /// The check does not apply to this tenant
    NotApplicable,
}

impl Verdict {
    pub fn from_bool(passed: bool) -> Self {
        if passed {
            Verdict::True
        } else {
            Verdict::False
        }
    }

    /// Get display string
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::True => "True",
            Verdict::False => "False",
            Verdict::Error => "Error",
            Verdict::NotApplicable => "NotApplicable",
        }
    }

    /// Report background colour for this verdict
    pub fn color_hex(&self) -> &'static str {
        match self {
            Verdict::True => "#9ee866",
            Verdict::False => "#e86666",
            Verdict::Error => "#e8a566",
            Verdict::NotApplicable => "#adadad",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Backend a checklist entry is dispatched to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScanKind {
    /// Persistent interactive shell session
    Shell,
    /// Cloud CLI invoker
    Cli,
    /// Directory-graph client (informational only)
    Graph,
    /// Anything else found in the checklist
    Unknown(String),
}

impl ScanKind {
    /// Parse the `type` cell of a checklist row
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "ps" | "shell" => ScanKind::Shell,
            "az" | "cli" => ScanKind::Cli,
            "mc" | "graph" => ScanKind::Graph,
            _ => ScanKind::Unknown(s.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ScanKind::Shell => "shell",
            ScanKind::Cli => "cli",
            ScanKind::Graph => "graph",
            ScanKind::Unknown(raw) => raw,
        }
    }
}

impl std::fmt::Display for ScanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_literals() {
        for verdict in [
            Verdict::True,
            Verdict::False,
            Verdict::Error,
            Verdict::NotApplicable,
        ] {
            let json = serde_json::to_string(&verdict).unwrap();
            assert_eq!(json, format!("\"{}\"", verdict.as_str()));
        }
        assert_eq!(
            serde_json::to_string(&Verdict::NotApplicable).unwrap(),
            "\"NotApplicable\""
        );
    }

    #[test]
    fn test_scan_kind_aliases() {
        assert_eq!(ScanKind::parse("ps"), ScanKind::Shell);
        assert_eq!(ScanKind::parse(" AZ "), ScanKind::Cli);
        assert_eq!(ScanKind::parse("mc"), ScanKind::Graph);
        assert_eq!(
            ScanKind::parse("ldap"),
            ScanKind::Unknown(String::from("ldap"))
        );
    }
}

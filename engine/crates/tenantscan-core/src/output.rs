//! Raw backend output as seen by the classification engine

use serde_json::Value;
use std::borrow::Cow;

/// Output of one backend call, before classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawOutput {
    /// The call produced nothing (or failed with an unmet precondition)
    Absent,
    /// A single value
    Scalar(Vec<u8>),
    /// A list of values; `None` entries are nulls returned by the backend
    Sequence(Vec<Option<Vec<u8>>>),
}

impl RawOutput {
    pub fn scalar(text: impl Into<Vec<u8>>) -> Self {
        RawOutput::Scalar(text.into())
    }

    pub fn sequence<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<Vec<u8>>,
    {
        RawOutput::Sequence(entries.into_iter().map(|e| e.map(Into::into)).collect())
    }

    /// Build from a CLI JSON result. `None` and JSON `null` are absent.
    pub fn from_json(value: Option<Value>) -> Self {
        match value {
            None | Some(Value::Null) => RawOutput::Absent,
            Some(Value::Array(items)) => {
                RawOutput::Sequence(items.iter().map(render_entry).collect())
            }
            Some(Value::Object(map)) if map.is_empty() => RawOutput::Scalar(Vec::new()),
            Some(other) => RawOutput::Scalar(render_value(&other).into_bytes()),
        }
    }

    /// True for an empty scalar or an empty sequence. Absent output is not "empty".
    pub fn is_empty(&self) -> bool {
        match self {
            RawOutput::Absent => false,
            RawOutput::Scalar(bytes) => bytes.is_empty(),
            RawOutput::Sequence(entries) => entries.is_empty(),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, RawOutput::Absent)
    }

    /// Append this output to a batch accumulator: sequences are concatenated,
    /// scalars are appended as one entry and absent output as a null entry.
    pub fn merge_into(self, acc: &mut Vec<Option<Vec<u8>>>) {
        match self {
            RawOutput::Absent => acc.push(None),
            RawOutput::Scalar(bytes) => acc.push(Some(bytes)),
            RawOutput::Sequence(entries) => acc.extend(entries),
        }
    }
}

/// Decode backend bytes for matching
pub fn decode(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

fn render_entry(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::Null => None,
        other => Some(render_value(other).into_bytes()),
    }
}

// Strings are taken verbatim; booleans use the capitalised spelling that
// checklists are written against; everything else is compact JSON.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => String::from("True"),
        Value::Bool(false) => String::from("False"),
        other => other.to_string(),
    }
}

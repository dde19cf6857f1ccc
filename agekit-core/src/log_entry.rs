use std::fmt;

use serde_json::Value;

/// Response fields that make it into a log entry.
const LOGGED_FIELDS: [&str; 2] = ["scanningState", "userInfo"];

const INDENT: &str = "    ";

/// A formatted projection of a verification service response, shown in the host's log area.
///
/// Only the `scanningState` and `userInfo` fields are kept. Nested objects are rendered
/// recursively, one indentation level per depth, and primitive values as `key: value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    lines: Vec<String>,
}

impl LogEntry {
    /// Builds the entry for a parsed response body.
    #[must_use]
    pub fn from_response(response: &Value) -> Self {
        let mut lines = Vec::new();
        if let Value::Object(map) = response {
            for (key, value) in map
                .iter()
                .filter(|(key, _)| LOGGED_FIELDS.contains(&key.as_str()))
            {
                format_field(key, value, 0, &mut lines);
            }
        }
        Self { lines }
    }

    /// The rendered lines, in display order.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Whether the response carried none of the logged fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

fn format_field(key: &str, value: &Value, depth: usize, lines: &mut Vec<String>) {
    let indent = INDENT.repeat(depth);
    match value {
        Value::Object(map) => {
            lines.push(format!("{indent}{key}: {{"));
            for (child_key, child) in map {
                format_field(child_key, child, depth + 1, lines);
            }
            lines.push(format!("{indent}}}"));
        }
        Value::Array(items) => {
            lines.push(format!("{indent}{key}: {{"));
            for (index, child) in items.iter().enumerate() {
                format_field(&index.to_string(), child, depth + 1, lines);
            }
            lines.push(format!("{indent}}}"));
        }
        Value::String(text) => lines.push(format!("{indent}{key}: {text}")),
        primitive => lines.push(format!("{indent}{key}: {primitive}")),
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines.join("\n"))
    }
}

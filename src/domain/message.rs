//! Validator report model
//!
//! EPUBCheck writes its report with `--json <file>`. Only the `messages`
//! list is interpreted; everything else in the document is ignored.

use serde::{Deserialize, Serialize};

/// Severity bucket of a validator message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "WARNING_FATAL", alias = "FATAL")]
    Fatal,

    #[serde(rename = "ERROR")]
    Error,

    #[serde(rename = "WARNING")]
    Warning,

    #[serde(rename = "INFO")]
    Info,

    /// USAGE, SUPPRESSED and anything newer; counted but never bucketed
    #[default]
    #[serde(rename = "OTHER", other)]
    Other,
}

/// Where a message was raised
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub path: String,

    /// -1 when the validator has no line
    #[serde(default)]
    pub line: Option<i64>,

    /// -1 when the validator has no column
    #[serde(default)]
    pub column: Option<i64>,
}

impl Location {
    /// Line number, unless absent or the -1 sentinel
    pub fn line(&self) -> Option<i64> {
        self.line.filter(|&l| l != -1)
    }

    /// Column number, unless absent or the -1 sentinel
    pub fn column(&self) -> Option<i64> {
        self.column.filter(|&c| c != -1)
    }
}

fn unknown_message() -> String {
    "Unknown message".to_string()
}

/// A single diagnostic produced by the validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub severity: Severity,

    /// Stable message identifier, e.g. `RSC-005`
    #[serde(rename = "ID", default)]
    pub id: String,

    #[serde(default = "unknown_message")]
    pub message: String,

    #[serde(default)]
    pub locations: Vec<Location>,
}

impl Message {
    pub fn new(severity: Severity, id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            id: id.into(),
            message: message.into(),
            locations: Vec::new(),
        }
    }

    pub fn with_location(mut self, path: impl Into<String>, line: i64, column: i64) -> Self {
        self.locations.push(Location {
            path: path.into(),
            line: Some(line),
            column: Some(column),
        });
        self
    }
}

/// Message counts per severity bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SeverityCounts {
    pub total: usize,
    pub fatal: usize,
    pub error: usize,
    pub warning: usize,
    pub info: usize,
}

impl SeverityCounts {
    /// Returns true when there is at least one fatal or error message
    pub fn has_critical(&self) -> bool {
        self.fatal + self.error > 0
    }
}

/// Structured validator report
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Report {
    pub messages: Vec<Message>,
}

impl Report {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Messages of one severity, in report order
    pub fn bucket(&self, severity: Severity) -> Vec<&Message> {
        self.messages
            .iter()
            .filter(|m| m.severity == severity)
            .collect()
    }

    pub fn counts(&self) -> SeverityCounts {
        let mut counts = SeverityCounts {
            total: self.messages.len(),
            ..SeverityCounts::default()
        };

        for message in &self.messages {
            match message.severity {
                Severity::Fatal => counts.fatal += 1,
                Severity::Error => counts.error += 1,
                Severity::Warning => counts.warning += 1,
                Severity::Info => counts.info += 1,
                Severity::Other => {}
            }
        }

        counts
    }
}

/// Raw process output, used when no structured report was written
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RawOutput {
    /// None when the process was killed by a signal or the code is unknown
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RawOutput {
    /// Extracts whatever process fields a non-report JSON document carries
    fn from_json(value: &serde_json::Value) -> Self {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };

        Self {
            exit_code: value
                .get("returncode")
                .and_then(|v| v.as_i64())
                .and_then(|c| i32::try_from(c).ok()),
            stdout: text("stdout"),
            stderr: text("stderr"),
        }
    }
}

/// Outcome of a validator run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationResult {
    /// The validator wrote a report containing a message list
    Structured(Report),

    /// Anything else; only the process output is known
    Fallback(RawOutput),
}

impl ValidationResult {
    /// Classifies a parsed JSON document
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        match value.get("messages") {
            Some(messages) if messages.is_array() => {
                Ok(ValidationResult::Structured(serde_json::from_value(value)?))
            }
            _ => Ok(ValidationResult::Fallback(RawOutput::from_json(&value))),
        }
    }
}

//! Validation report rendering
//!
//! Structured reports are grouped by severity: fatal and error messages are
//! always shown in full, warnings up to a limit, info messages only counted.

use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use super::output::RULE_WIDTH;
use crate::domain::{Message, RawOutput, Report, Severity, SeverityCounts, ValidationResult};

/// Shown for locations that point at the archive itself
pub const ARCHIVE_ROOT_LABEL: &str = "EPUB file root";

/// Overall judgement of a structured report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// No messages at all
    NoIssues,

    /// Warnings or info only
    NoCriticalIssues,

    /// At least one fatal or error message
    Invalid,
}

impl Verdict {
    pub fn from_counts(counts: &SeverityCounts) -> Self {
        if counts.total == 0 {
            Verdict::NoIssues
        } else if !counts.has_critical() {
            Verdict::NoCriticalIssues
        } else {
            Verdict::Invalid
        }
    }

    /// Closing line; invalid books get none, their errors are already listed
    pub fn line(&self) -> Option<&'static str> {
        match self {
            Verdict::NoIssues => Some("Perfect! No issues found!"),
            Verdict::NoCriticalIssues => Some("No critical issues. Please review warnings."),
            Verdict::Invalid => None,
        }
    }
}

/// Renders validation results for humans or as JSON
#[derive(Debug, Clone)]
pub struct Reporter<'a> {
    archive: Option<&'a Path>,
    max_warnings: usize,
    max_locations: usize,
}

impl Default for Reporter<'_> {
    fn default() -> Self {
        Self {
            archive: None,
            max_warnings: 10,
            max_locations: 3,
        }
    }
}

impl<'a> Reporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Archive whose absolute path is stripped from message locations
    pub fn with_archive(mut self, archive: &'a Path) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn with_limits(mut self, max_warnings: usize, max_locations: usize) -> Self {
        self.max_warnings = max_warnings;
        self.max_locations = max_locations;
        self
    }

    /// Makes a location path relative to the archive root
    pub fn clean_path(&self, raw: &str) -> String {
        let normalized = raw.replace('\\', "/");
        let mut path = normalized.as_str();

        if let Some(archive) = self.archive {
            let prefix = archive.to_string_lossy().replace('\\', "/");
            if let Some(rest) = path.strip_prefix(prefix.as_str()) {
                // Only at a separator: `/tmp/b.epubx` is not inside `/tmp/b.epub`
                if rest.is_empty() || rest.starts_with('/') {
                    path = rest;
                }
            }
        }

        let path = path.strip_prefix('/').unwrap_or(path);
        if path.is_empty() {
            ARCHIVE_ROOT_LABEL.to_string()
        } else {
            path.to_string()
        }
    }

    /// Writes the human-readable summary
    pub fn render<W: Write>(&self, result: &ValidationResult, out: &mut W) -> io::Result<()> {
        match result {
            ValidationResult::Structured(report) => self.render_report(report, out),
            ValidationResult::Fallback(raw) => render_fallback(raw, out),
        }
    }

    fn render_report<W: Write>(&self, report: &Report, out: &mut W) -> io::Result<()> {
        let counts = report.counts();

        writeln!(out, "Total messages: {}", counts.total)?;
        writeln!(out, "Fatal warnings: {}", counts.fatal)?;
        writeln!(out, "Errors: {}", counts.error)?;
        writeln!(out, "Warnings: {}", counts.warning)?;
        writeln!(out, "Info: {}", counts.info)?;
        writeln!(out)?;

        self.render_section("Fatal Warnings:", &report.bucket(Severity::Fatal), out)?;
        self.render_section("Errors Found:", &report.bucket(Severity::Error), out)?;

        let warnings = report.bucket(Severity::Warning);
        let shown = warnings.len().min(self.max_warnings);
        self.render_section("Warnings:", &warnings[..shown], out)?;
        if warnings.len() > shown {
            writeln!(out, "   ... and {} more warnings.", warnings.len() - shown)?;
            writeln!(out)?;
        }

        if let Some(line) = Verdict::from_counts(&counts).line() {
            writeln!(out, "{}", line)?;
        }

        Ok(())
    }

    fn render_section<W: Write>(&self, title: &str, messages: &[&Message], out: &mut W) -> io::Result<()> {
        if messages.is_empty() {
            return Ok(());
        }

        writeln!(out, "{}", title)?;
        writeln!(out, "{}", "-".repeat(RULE_WIDTH))?;
        for message in messages {
            self.render_message(message, out)?;
        }
        Ok(())
    }

    fn render_message<W: Write>(&self, message: &Message, out: &mut W) -> io::Result<()> {
        writeln!(out, "Error Code: {}", message.id)?;
        writeln!(out, "Error Content: {}", message.message)?;

        if !message.locations.is_empty() {
            writeln!(out, "Error Location:")?;
            for (i, location) in message.locations.iter().take(self.max_locations).enumerate() {
                let mut line = format!("   {}. File: {}", i + 1, self.clean_path(&location.path));
                if let Some(l) = location.line() {
                    line.push_str(&format!(" (line {}", l));
                    if let Some(c) = location.column() {
                        line.push_str(&format!(", column {}", c));
                    }
                    line.push(')');
                }
                writeln!(out, "{}", line)?;
            }
        }

        writeln!(out)
    }

    /// Machine-readable form of the result, with cleaned location paths
    pub fn to_json(&self, result: &ValidationResult) -> serde_json::Value {
        match result {
            ValidationResult::Structured(report) => {
                let counts = report.counts();
                let messages: Vec<_> = report
                    .messages
                    .iter()
                    .map(|m| {
                        serde_json::json!({
                            "severity": m.severity,
                            "id": m.id,
                            "message": m.message,
                            "locations": m.locations.iter().map(|l| serde_json::json!({
                                "path": self.clean_path(&l.path),
                                "line": l.line(),
                                "column": l.column(),
                            })).collect::<Vec<_>>(),
                        })
                    })
                    .collect();

                serde_json::json!({
                    "kind": "structured",
                    "counts": counts,
                    "verdict": Verdict::from_counts(&counts),
                    "messages": messages,
                })
            }
            ValidationResult::Fallback(raw) => serde_json::json!({
                "kind": "fallback",
                "exit_code": raw.exit_code,
                "stdout": raw.stdout,
                "stderr": raw.stderr,
            }),
        }
    }
}

fn render_fallback<W: Write>(raw: &RawOutput, out: &mut W) -> io::Result<()> {
    match raw.exit_code {
        Some(0) => writeln!(out, "Validation successful!")?,
        Some(code) => writeln!(out, "Validation failed (exit code {})", code)?,
        None => writeln!(out, "Validator report not recognized.")?,
    }

    let stdout = raw.stdout.trim_end();
    if !stdout.is_empty() {
        writeln!(out, "Output: {}", stdout)?;
    }
    let stderr = raw.stderr.trim_end();
    if !stderr.is_empty() {
        writeln!(out, "Messages: {}", stderr)?;
    }
    Ok(())
}

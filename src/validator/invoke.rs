//! Validator invocation
//!
//! Runs the validator against an archive, asking for a JSON report in a
//! scratch directory that is removed when the call returns.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use thiserror::Error;

use super::process::{run_with_timeout, ProcessError};
use crate::domain::{RawOutput, ToolDescriptor, ValidationResult};

/// Name of the report file inside the scratch directory
const REPORT_FILE: &str = "result.json";

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("Validation timeout ({})", describe_duration(.0))]
    Timeout(Duration),

    #[error("Error running epubcheck: {0}")]
    Failed(String),
}

fn describe_duration(duration: &Duration) -> String {
    let secs = duration.as_secs();
    match secs {
        60 => "1 minute".to_string(),
        s if s > 0 && s % 60 == 0 => format!("{} minutes", s / 60),
        1 => "1 second".to_string(),
        s => format!("{} seconds", s),
    }
}

/// A finished validator run
#[derive(Debug, Clone)]
pub struct ValidatorRun {
    pub result: ValidationResult,

    /// The validator wrote something to stdout
    pub produced_output: bool,

    pub elapsed: Duration,
}

/// Runs `tool` against `archive`, bounded by `timeout`
///
/// A missing report file is not "zero issues": the raw process output is
/// returned as [`ValidationResult::Fallback`] instead.
pub fn run_validator(
    tool: &ToolDescriptor,
    archive: &Path,
    timeout: Duration,
) -> Result<ValidatorRun, InvokeError> {
    let scratch = TempDir::new()
        .map_err(|e| InvokeError::Failed(format!("cannot create output directory: {}", e)))?;
    let report_path = scratch.path().join(REPORT_FILE);

    let started = Instant::now();
    let output = run_with_timeout(&mut tool.validate_command(archive, &report_path), timeout)
        .map_err(|e| match e {
            ProcessError::Timeout { timeout, .. } => InvokeError::Timeout(timeout),
            other => InvokeError::Failed(other.to_string()),
        })?;
    let elapsed = started.elapsed();

    log::debug!(
        "epubcheck exited with {:?} after {:.1}s",
        output.exit_code,
        elapsed.as_secs_f64()
    );

    let result = if report_path.is_file() {
        let content = fs::read_to_string(&report_path)
            .map_err(|e| InvokeError::Failed(format!("cannot read report: {}", e)))?;
        let value: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| InvokeError::Failed(format!("invalid JSON report: {}", e)))?;
        ValidationResult::from_json(value)
            .map_err(|e| InvokeError::Failed(format!("unexpected report shape: {}", e)))?
    } else {
        ValidationResult::Fallback(RawOutput {
            exit_code: output.exit_code,
            stdout: output.stdout.clone(),
            stderr: output.stderr.clone(),
        })
    };

    Ok(ValidatorRun {
        result,
        produced_output: !output.stdout.is_empty(),
        elapsed,
    })
}

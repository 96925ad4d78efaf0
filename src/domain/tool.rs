//! Validator tool descriptor

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;

/// How the validator is packaged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// `epubcheck.jar`, run through a Java runtime
    Jar,

    /// A native launcher such as Homebrew's or Chocolatey's `epubcheck`
    Executable,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Jar => "jar",
            ToolKind::Executable => "exe",
        }
    }
}

/// A located validator installation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDescriptor {
    pub kind: ToolKind,

    /// Path to the jar or executable
    pub path: PathBuf,

    /// Java runtime used for jars; a bare `java` means "from PATH"
    pub runtime: Option<PathBuf>,
}

impl ToolDescriptor {
    pub fn jar(path: impl Into<PathBuf>, runtime: impl Into<PathBuf>) -> Self {
        Self {
            kind: ToolKind::Jar,
            path: path.into(),
            runtime: Some(runtime.into()),
        }
    }

    pub fn executable(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: ToolKind::Executable,
            path: path.into(),
            runtime: None,
        }
    }

    /// Base command: `<runtime> -jar <path>` or `<path>`
    pub fn command(&self) -> Command {
        match (self.kind, &self.runtime) {
            (ToolKind::Jar, Some(runtime)) => {
                let mut cmd = Command::new(runtime);
                cmd.arg("-jar").arg(&self.path);
                cmd
            }
            _ => Command::new(&self.path),
        }
    }

    /// Command that prints the validator version
    pub fn version_command(&self) -> Command {
        let mut cmd = self.command();
        cmd.arg("--version");
        cmd
    }

    /// Command that validates `archive` and writes a JSON report to `report`
    pub fn validate_command(&self, archive: &Path, report: &Path) -> Command {
        let mut cmd = self.command();
        cmd.arg(archive).arg("--json").arg(report);
        cmd
    }
}

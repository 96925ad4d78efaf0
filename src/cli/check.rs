//! Validation commands (check, locate, guide)

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use thiserror::Error;

use super::output::Output;
use super::report::Reporter;
use crate::domain::ToolDescriptor;
use crate::storage::{ArchiveAssembler, DirectoryBook, TempArchive};
use crate::validator::{installation_guide, run_validator, Located, ToolLocator};

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("epubcheck is not installed")]
    ToolNotFound,

    #[error("Not an unpacked book directory or .epub file: {}", .0.display())]
    UnsupportedInput(PathBuf),
}

/// Settings for a single `check` run, after config and flags are merged
#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub book: PathBuf,
    pub timeout: Duration,
    pub max_warnings: usize,
    pub max_locations: usize,
    pub keep_archive: bool,
}

/// Locate, package, validate and report
pub fn check(output: &Output, locator: &ToolLocator, options: &CheckOptions) -> Result<()> {
    output.banner("Starting EPUB validation");

    let located = find_tool(output, locator)?;

    // Holds the temp archive so it lives until the report is printed
    let mut assembled: Option<TempArchive> = None;
    let archive_path = if is_packed_epub(&options.book) {
        output.verbose_ctx("check", &format!("Validating packed file {}", options.book.display()));
        options.book.clone()
    } else if options.book.is_dir() {
        let book = DirectoryBook::open(&options.book)
            .with_context(|| format!("Failed to open book at {}", options.book.display()))?;
        output.verbose_ctx(
            "check",
            &format!(
                "Package descriptor: {}",
                book.root().join(book.package_path()).display()
            ),
        );

        let archive = ArchiveAssembler::in_temp_dir().assemble(&book)?;
        output.status(&format!(
            "EPUB created: {} (size: {} bytes)",
            archive.file_name(),
            group_thousands(archive.size())
        ));
        output.verbose_ctx(
            "check",
            &format!(
                "{} entries written, {} skipped",
                archive.entries().len(),
                archive.skipped().len()
            ),
        );

        if options.keep_archive {
            let kept = archive.keep();
            output.status(&format!("Archive kept at {}", kept.display()));
            kept
        } else {
            let path = archive.path().to_path_buf();
            assembled = Some(archive);
            path
        }
    } else {
        return Err(CheckError::UnsupportedInput(options.book.clone()).into());
    };

    output.status("Running validation...");
    let run = run_validator(&located.tool, &archive_path, options.timeout)?;
    if run.produced_output {
        output.status("epubcheck processing completed");
    }
    output.verbose_ctx(
        "check",
        &format!("Validation took {:.1}s", run.elapsed.as_secs_f64()),
    );

    let reporter = Reporter::new()
        .with_archive(&archive_path)
        .with_limits(options.max_warnings, options.max_locations);

    if output.is_json() {
        output.data(&serde_json::json!({
            "archive": archive_path,
            "tool": describe_tool(&located.tool),
            "version": located.version,
            "result": reporter.to_json(&run.result),
        }));
    } else {
        output.blank();
        output.status("Validation Results");
        output.rule('-');

        let stdout = io::stdout();
        let mut out = stdout.lock();
        reporter.render(&run.result, &mut out)?;
        out.flush()?;
        drop(out);

        output.banner("Validation completed");
    }

    drop(assembled);
    Ok(())
}

/// Run discovery only
pub fn locate(output: &Output, locator: &ToolLocator) -> Result<()> {
    let located = find_tool(output, locator)?;

    if output.is_json() {
        let mut value = describe_tool(&located.tool);
        value["version"] = serde_json::Value::String(located.version);
        output.data(&value);
    } else {
        output.status(&format!("Path: {}", located.tool.path.display()));
        output.status(&format!("Kind: {}", located.tool.kind.as_str()));
        if let Some(runtime) = &located.tool.runtime {
            output.status(&format!("Runtime: {}", runtime.display()));
        }
    }

    Ok(())
}

/// Print installation instructions for this machine
pub fn guide(output: &Output, locator: &ToolLocator) -> Result<()> {
    let java_installed = locator.find_runtime().is_some();
    let lines = installation_guide(locator.os(), java_installed);

    if output.is_json() {
        output.data(&serde_json::json!({
            "os": locator.os().label(),
            "java_installed": java_installed,
            "guide": lines,
        }));
    } else {
        for line in &lines {
            output.status(line);
        }
    }

    Ok(())
}

fn find_tool(output: &Output, locator: &ToolLocator) -> Result<Located> {
    output.status("Checking epubcheck installation...");

    match locator.locate() {
        Some(located) => {
            output.status(&format!("epubcheck found: {}", located.version));
            Ok(located)
        }
        None => {
            output.status("epubcheck is not installed.");
            let java_installed = locator.find_runtime().is_some();
            let lines = installation_guide(locator.os(), java_installed);

            if output.is_json() {
                output.data(&serde_json::json!({
                    "installed": false,
                    "java_installed": java_installed,
                    "guide": lines,
                }));
            } else {
                output.blank();
                for line in &lines {
                    output.status(line);
                }
            }

            Err(CheckError::ToolNotFound.into())
        }
    }
}

fn describe_tool(tool: &ToolDescriptor) -> serde_json::Value {
    serde_json::json!({
        "kind": tool.kind.as_str(),
        "path": tool.path,
        "runtime": tool.runtime,
    })
}

fn is_packed_epub(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("epub"))
            .unwrap_or(false)
}

/// 1234567 -> "1,234,567"
fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

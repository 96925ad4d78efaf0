//! Output formatting for CLI commands

use serde::Serialize;

/// Width of horizontal rules in text output
pub const RULE_WIDTH: usize = 60;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Output helper for consistent formatting
pub struct Output {
    format: OutputFormat,
    verbose: bool,
}

impl Output {
    pub fn new(format: OutputFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }

    /// Prints structured data
    pub fn data<T: Serialize>(&self, data: &T) {
        match self.format {
            OutputFormat::Text => {
                if let Ok(json) = serde_json::to_string_pretty(data) {
                    println!("{}", json);
                }
            }
            OutputFormat::Json => {
                if let Ok(json) = serde_json::to_string(data) {
                    println!("{}", json);
                }
            }
        }
    }

    /// Prints a progress line (text only)
    pub fn status(&self, message: &str) {
        if self.format == OutputFormat::Text {
            println!("{}", message);
        }
    }

    /// Prints a horizontal rule (text only)
    pub fn rule(&self, c: char) {
        if self.format == OutputFormat::Text {
            println!("{}", c.to_string().repeat(RULE_WIDTH));
        }
    }

    /// Prints a title framed by rules (text only)
    pub fn banner(&self, title: &str) {
        self.rule('=');
        self.status(title);
        self.rule('=');
    }

    /// Prints a blank line (text only)
    pub fn blank(&self) {
        if self.format == OutputFormat::Text {
            println!();
        }
    }

    /// Returns true if using JSON format
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Returns true if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Logs a debug message (shown with --verbose)
    pub fn verbose(&self, message: &str) {
        log::debug!("{}", message);
    }

    /// Logs a debug message with context (shown with --verbose)
    pub fn verbose_ctx(&self, context: &str, message: &str) {
        log::debug!("[{}] {}", context, message);
    }
}

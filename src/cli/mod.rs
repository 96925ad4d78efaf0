//! # Command-Line Interface
//!
//! User-facing commands and output formatting.
//!
//! ## Commands
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `check <BOOK>` | Package a book and validate it |
//! | `locate` | Find an installed epubcheck |
//! | `guide` | Show installation instructions |
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug output:
//! ```bash
//! epub-checker --verbose check MyBook/
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod check;
mod output;
mod report;

pub use app::{Cli, Commands, run};
pub use check::{CheckError, CheckOptions};
pub use output::{Output, OutputFormat};
pub use report::{Reporter, Verdict};

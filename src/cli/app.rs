//! Main CLI application structure

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use super::check::{self, CheckOptions};
use super::output::{Output, OutputFormat};
use crate::storage::Config;
use crate::validator::ToolLocator;

#[derive(Parser)]
#[command(name = "epub-checker")]
#[command(author, version, about = "Validate EPUB books with EPUBCheck")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Package a book and validate it
    Check {
        /// Unpacked book directory or packed .epub file
        book: PathBuf,

        /// epubcheck jar or executable to use instead of searching
        #[arg(long, env = "EPUBCHECK_PATH")]
        epubcheck: Option<PathBuf>,

        /// Java runtime for jar installations
        #[arg(long, env = "EPUBCHECK_JAVA")]
        java: Option<PathBuf>,

        /// Validation timeout in seconds (default: 300)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        timeout: Option<u64>,

        /// Warnings to list in detail (default: 10)
        #[arg(long)]
        max_warnings: Option<usize>,

        /// Keep the assembled archive instead of deleting it
        #[arg(long)]
        keep_archive: bool,
    },

    /// Find an installed epubcheck
    Locate {
        /// epubcheck jar or executable to probe first
        #[arg(long, env = "EPUBCHECK_PATH")]
        epubcheck: Option<PathBuf>,

        /// Java runtime for jar installations
        #[arg(long, env = "EPUBCHECK_JAVA")]
        java: Option<PathBuf>,
    },

    /// Show how to install epubcheck
    Guide,
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(cli.format, cli.verbose);
    init_logging(output.is_verbose());

    output.verbose("epub-checker starting");

    let mut config = Config::load()?;
    if let Some(path) = Config::config_path() {
        output.verbose_ctx("config", &format!("Config file: {}", path.display()));
    }

    match cli.command {
        Commands::Check {
            book,
            epubcheck,
            java,
            timeout,
            max_warnings,
            keep_archive,
        } => {
            apply_tool_overrides(&mut config, epubcheck, java);
            if let Some(secs) = timeout {
                config.timeout_secs = secs;
            }
            if let Some(n) = max_warnings {
                config.max_warnings = n;
            }

            let options = CheckOptions {
                book,
                timeout: config.timeout(),
                max_warnings: config.max_warnings,
                max_locations: config.max_locations,
                keep_archive,
            };
            output.verbose_ctx("check", &format!("{:?}", options));
            check::check(&output, &ToolLocator::from_config(&config), &options)?
        }

        Commands::Locate { epubcheck, java } => {
            apply_tool_overrides(&mut config, epubcheck, java);
            check::locate(&output, &ToolLocator::from_config(&config))?
        }

        Commands::Guide => check::guide(&output, &ToolLocator::from_config(&config))?,
    }

    Ok(())
}

fn apply_tool_overrides(config: &mut Config, epubcheck: Option<PathBuf>, java: Option<PathBuf>) {
    if epubcheck.is_some() {
        config.epubcheck = epubcheck;
    }
    if java.is_some() {
        config.java = java;
    }
}

/// `--verbose` shows debug records; `RUST_LOG` still wins when set
fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };

    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .try_init();
}

//! # Validator Integration
//!
//! Everything needed to drive the external EPUBCheck validator.
//!
//! ## Overview
//!
//! EPUBCheck is a separate program, shipped either as a jar run through a
//! Java runtime or as a native launcher. It is driven as a subprocess and
//! reports through a JSON file.
//!
//! ```text
//! epub-checker                       epubcheck
//!  │                                    │
//!  ├── Probe: epubcheck --version ─────▶│  (per candidate, 10s bound)
//!  │                                    │
//!  ├── Spawn: epubcheck <archive> --json <dir>/result.json
//!  │                                    │  (300s bound)
//!  └── Read: <dir>/result.json ◀────────┘
//! ```
//!
//! ## Key Types
//!
//! - [`ToolLocator`] - Discovers a working installation
//! - [`run_validator`] - Runs a validation and classifies the outcome
//! - [`run_with_timeout`] - Bounded subprocess execution shared by both

mod invoke;
mod locator;
mod process;

pub use invoke::{run_validator, InvokeError, ValidatorRun};
pub use locator::{
    executable_patterns, expand_pattern, installation_guide, jar_patterns, Located, OsFamily,
    ToolLocator,
};
pub use process::{run_with_timeout, ProcessError, ProcessOutput};

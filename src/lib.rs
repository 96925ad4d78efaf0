//! epub-checker - Validate EPUB books with the EPUBCheck validator
//!
//! The crate locates an installed EPUBCheck, packages a book into a
//! temporary EPUB container, runs the validator as a subprocess and
//! renders its JSON report as a grouped summary.

pub mod domain;
pub mod storage;
pub mod validator;
pub mod cli;

pub use domain::{DocumentModel, Message, Severity, ToolDescriptor, ToolKind, ValidationResult};

//! Domain models for epub-checker
//!
//! Contains the validator report types, the tool descriptor and the
//! document-model seam, without any I/O concerns.

mod document;
mod message;
mod tool;

pub use document::{DocumentError, DocumentModel, FileContent, ManifestEntry};
pub use message::{Location, Message, RawOutput, Report, Severity, SeverityCounts, ValidationResult};
pub use tool::{ToolDescriptor, ToolKind};

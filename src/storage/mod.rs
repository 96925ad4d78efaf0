//! # Storage Layer
//!
//! Everything that touches the filesystem on behalf of a validation run.
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Book | Unpacked EPUB tree | any directory |
//! | Temporary archive | EPUB (zip) | system temp dir, removed after the run |
//! | Config | TOML | platform config dir, `config.toml` |
//!
//! ## Key Types
//!
//! - [`DirectoryBook`] - Unpacked book exposed as a [`DocumentModel`](crate::domain::DocumentModel)
//! - [`ArchiveAssembler`] - Packs a book into a temporary EPUB
//! - [`TempArchive`] - Assembled archive, deleted on drop
//! - [`Config`] - Discovery and reporting settings

mod archive;
mod book;
mod config;

pub use archive::{sanitize_title, ArchiveAssembler, ArchiveError, SkippedFile, TempArchive, DEFAULT_TITLE};
pub use book::{media_type_for, BookError, DirectoryBook};
pub use config::{Config, ConfigError};

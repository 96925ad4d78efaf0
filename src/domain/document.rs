//! Document model seam
//!
//! The book being validated is owned by someone else (an editor, a
//! directory on disk). The archive assembler only ever reads from it
//! through [`DocumentModel`].

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("File not found in book: {0}")]
    NotFound(String),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// Content of a single book file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Bytes(Vec<u8>),
    Text(String),
}

impl FileContent {
    /// Returns the raw bytes; text is encoded as UTF-8
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            FileContent::Bytes(bytes) => bytes,
            FileContent::Text(text) => text.into_bytes(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FileContent::Bytes(bytes) => bytes.len(),
            FileContent::Text(text) => text.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<u8>> for FileContent {
    fn from(bytes: Vec<u8>) -> Self {
        FileContent::Bytes(bytes)
    }
}

impl From<String> for FileContent {
    fn from(text: String) -> Self {
        FileContent::Text(text)
    }
}

impl From<&str> for FileContent {
    fn from(text: &str) -> Self {
        FileContent::Text(text.to_string())
    }
}

/// A file declared in the package descriptor's manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Manifest item id
    pub id: String,

    /// Path relative to the package descriptor
    pub href: String,

    /// Declared media type
    pub media_type: String,
}

impl ManifestEntry {
    pub fn new(
        id: impl Into<String>,
        href: impl Into<String>,
        media_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            href: href.into(),
            media_type: media_type.into(),
        }
    }
}

/// Read-only view of a book
///
/// Implementations are never written to. Individual reads may fail; the
/// caller decides whether a failure is fatal.
pub trait DocumentModel {
    /// Looks up a metadata value such as `title`
    fn metadata_value(&self, key: &str) -> Result<Option<String>, DocumentError>;

    /// Serialized package descriptor (the OPF document)
    fn package_descriptor(&self) -> Result<FileContent, DocumentError>;

    /// Serialized table of contents (NCX), if the book has one
    fn table_of_contents(&self) -> Result<Option<FileContent>, DocumentError>;

    /// Manifest entries in declaration order
    fn manifest_entries(&self) -> Vec<ManifestEntry>;

    /// Reads a manifest file by id
    fn read_manifest_file(&self, id: &str) -> Result<FileContent, DocumentError>;

    /// Paths of files not declared in the manifest, relative to the book root
    fn other_files(&self) -> Vec<String>;

    /// Reads a non-manifest file by its book path
    fn read_other_file(&self, href: &str) -> Result<FileContent, DocumentError>;
}

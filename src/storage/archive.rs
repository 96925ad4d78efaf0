//! EPUB archive assembly
//!
//! Writes a book into a temporary EPUB container with a fixed layout:
//!
//! ```text
//! mimetype                  (stored, always first)
//! META-INF/container.xml    (synthesized unless the book has one)
//! OEBPS/content.opf
//! OEBPS/toc.ncx             (if present)
//! OEBPS/<manifest href>...
//! <other files>...
//! ```
//!
//! A path is written at most once. Individual files that fail to read or
//! write are skipped; only the mimetype, the container descriptor, the
//! package descriptor and finishing the archive are fatal.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::domain::{DocumentError, DocumentModel};

pub const MIMETYPE_PATH: &str = "mimetype";
pub const MIMETYPE: &str = "application/epub+zip";
pub const CONTAINER_PATH: &str = "META-INF/container.xml";
pub const PACKAGE_PATH: &str = "OEBPS/content.opf";
pub const TOC_PATH: &str = "OEBPS/toc.ncx";
pub const CONTENT_PREFIX: &str = "OEBPS/";

/// Used when the book has no usable title
pub const DEFAULT_TITLE: &str = "Current_EPUB";

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
    <rootfiles>
        <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
    </rootfiles>
</container>"#;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to create EPUB file {}: {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create EPUB file: cannot write {entry}: {message}")]
    Entry { entry: String, message: String },

    #[error("Failed to create EPUB file: cannot read package descriptor: {0}")]
    PackageDescriptor(#[source] DocumentError),

    #[error("Failed to create EPUB file: {0}")]
    Finish(String),
}

/// A book file left out of the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    /// Path inside the archive
    pub path: String,
    pub reason: String,
}

/// An assembled archive on temporary storage
///
/// The file is removed when this value is dropped, unless [`keep`](Self::keep)
/// was called.
#[derive(Debug)]
pub struct TempArchive {
    path: PathBuf,
    size: u64,
    entries: Vec<String>,
    skipped: Vec<SkippedFile>,
    keep: bool,
}

impl TempArchive {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Archive size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// File name of the archive, e.g. `My_Book.epub`
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Entry paths in write order
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn skipped(&self) -> &[SkippedFile] {
        &self.skipped
    }

    /// Disarms the cleanup and returns the archive path
    pub fn keep(mut self) -> PathBuf {
        self.keep = true;
        self.path.clone()
    }
}

impl Drop for TempArchive {
    fn drop(&mut self) {
        if !self.keep {
            if let Err(e) = fs::remove_file(&self.path) {
                log::debug!("Failed to remove {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Longest title, in bytes, used for an archive name before `.epub`
const MAX_TITLE_BYTES: usize = 200;

/// Replaces characters that are illegal in file names
///
/// Long titles are cut to [`MAX_TITLE_BYTES`] on a character boundary.
/// Falls back to [`DEFAULT_TITLE`] when nothing usable is left.
pub fn sanitize_title(title: Option<&str>) -> String {
    let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) else {
        return DEFAULT_TITLE.to_string();
    };

    let mut cleaned = String::with_capacity(title.len().min(MAX_TITLE_BYTES));
    for c in title.chars() {
        let c = match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        };
        if cleaned.len() + c.len_utf8() > MAX_TITLE_BYTES {
            break;
        }
        cleaned.push(c);
    }
    let cleaned = cleaned.trim_end().to_string();

    if cleaned.chars().all(|c| c == '.' || c.is_whitespace()) {
        DEFAULT_TITLE.to_string()
    } else {
        cleaned
    }
}

fn entry_error(entry: &str) -> impl FnOnce(String) -> ArchiveError {
    let entry = entry.to_string();
    move |message| ArchiveError::Entry { entry, message }
}

/// Tracks written entries so that each path lands in the archive once
struct EntryWriter {
    zip: ZipWriter<File>,
    added: HashSet<String>,
    order: Vec<String>,
}

impl EntryWriter {
    fn new(file: File) -> Self {
        Self {
            zip: ZipWriter::new(file),
            added: HashSet::new(),
            order: Vec::new(),
        }
    }

    fn contains(&self, path: &str) -> bool {
        self.added.contains(path)
    }

    /// Writes an entry; returns false if the path was already written
    fn put(&mut self, path: &str, data: &[u8], options: SimpleFileOptions) -> Result<bool, String> {
        if self.contains(path) {
            return Ok(false);
        }

        self.zip
            .start_file(path, options)
            .map_err(|e| e.to_string())?;
        self.zip.write_all(data).map_err(|e| e.to_string())?;

        self.added.insert(path.to_string());
        self.order.push(path.to_string());
        Ok(true)
    }

    fn finish(self) -> Result<Vec<String>, String> {
        self.zip.finish().map_err(|e| e.to_string())?;
        Ok(self.order)
    }
}

/// Assembles books into EPUB archives inside a work directory
#[derive(Debug, Clone)]
pub struct ArchiveAssembler {
    out_dir: PathBuf,
}

impl ArchiveAssembler {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// Assembler writing to the system temp directory
    pub fn in_temp_dir() -> Self {
        Self::new(std::env::temp_dir())
    }

    /// Where the archive for `book` will be written
    pub fn archive_path(&self, book: &dyn DocumentModel) -> PathBuf {
        let title = match book.metadata_value("title") {
            Ok(title) => title,
            Err(e) => {
                log::debug!("Title lookup failed: {}", e);
                None
            }
        };

        self.out_dir
            .join(format!("{}.epub", sanitize_title(title.as_deref())))
    }

    /// Writes `book` into a fresh archive
    ///
    /// On a fatal error the partial archive is deleted.
    /// A title the filesystem refuses falls back to [`DEFAULT_TITLE`].
    pub fn assemble(&self, book: &dyn DocumentModel) -> Result<TempArchive, ArchiveError> {
        let path = self.archive_path(book);
        let fallback = self.out_dir.join(format!("{}.epub", DEFAULT_TITLE));

        match self.assemble_at(path, book) {
            Err(ArchiveError::Create { path, source }) if path != fallback => {
                log::debug!("Cannot create {}: {}; using {}", path.display(), source, DEFAULT_TITLE);
                self.assemble_at(fallback, book)
            }
            result => result,
        }
    }

    fn assemble_at(&self, path: PathBuf, book: &dyn DocumentModel) -> Result<TempArchive, ArchiveError> {
        if path.exists() {
            if let Err(e) = fs::remove_file(&path) {
                log::debug!("Failed to remove stale {}: {}", path.display(), e);
            }
        }

        match Self::write_archive(&path, book) {
            Ok((entries, skipped)) => {
                let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                Ok(TempArchive {
                    path,
                    size,
                    entries,
                    skipped,
                    keep: false,
                })
            }
            Err(e) => {
                let _ = fs::remove_file(&path);
                Err(e)
            }
        }
    }

    fn write_archive(
        path: &Path,
        book: &dyn DocumentModel,
    ) -> Result<(Vec<String>, Vec<SkippedFile>), ArchiveError> {
        let file = File::create(path).map_err(|source| ArchiveError::Create {
            path: path.to_path_buf(),
            source,
        })?;

        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut writer = EntryWriter::new(file);
        let mut skipped = Vec::new();

        writer
            .put(MIMETYPE_PATH, MIMETYPE.as_bytes(), stored)
            .map_err(entry_error(MIMETYPE_PATH))?;

        let other_files = book.other_files();
        if !other_files.iter().any(|href| href == CONTAINER_PATH) {
            writer
                .put(CONTAINER_PATH, CONTAINER_XML.as_bytes(), deflated)
                .map_err(entry_error(CONTAINER_PATH))?;
        }

        let package = book
            .package_descriptor()
            .map_err(ArchiveError::PackageDescriptor)?;
        writer
            .put(PACKAGE_PATH, &package.into_bytes(), deflated)
            .map_err(entry_error(PACKAGE_PATH))?;

        match book.table_of_contents() {
            Ok(Some(toc)) if !toc.is_empty() => {
                if let Err(e) = writer.put(TOC_PATH, &toc.into_bytes(), deflated) {
                    log::debug!("Failed to add {}: {}", TOC_PATH, e);
                }
            }
            Ok(_) => {}
            Err(e) => log::debug!("No table of contents: {}", e),
        }

        for entry in book.manifest_entries() {
            let zip_path = format!("{}{}", CONTENT_PREFIX, entry.href);
            if writer.contains(&zip_path) {
                continue;
            }

            let written = book
                .read_manifest_file(&entry.id)
                .map_err(|e| e.to_string())
                .and_then(|content| writer.put(&zip_path, &content.into_bytes(), deflated));

            if let Err(reason) = written {
                log::warn!("Failed to add manifest file: {} - {}", entry.href, reason);
                skipped.push(SkippedFile {
                    path: zip_path,
                    reason,
                });
            }
        }

        for href in other_files {
            if writer.contains(&href) {
                continue;
            }

            let written = book
                .read_other_file(&href)
                .map_err(|e| e.to_string())
                .and_then(|content| writer.put(&href, &content.into_bytes(), deflated));

            if let Err(reason) = written {
                log::warn!("Failed to add other file: {} - {}", href, reason);
                skipped.push(SkippedFile { path: href, reason });
            }
        }

        let entries = writer.finish().map_err(ArchiveError::Finish)?;
        Ok((entries, skipped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FileContent, ManifestEntry};
    use std::collections::HashMap;
    use std::io::Read;
    use tempfile::TempDir;

    /// In-memory book; ids listed in `broken` fail to read
    #[derive(Default)]
    struct MemoryBook {
        title: Option<String>,
        toc: Option<String>,
        manifest: Vec<(ManifestEntry, FileContent)>,
        others: Vec<(String, FileContent)>,
        broken: Vec<String>,
        broken_package: bool,
    }

    impl MemoryBook {
        fn new() -> Self {
            Self {
                title: Some("Sample Book".to_string()),
                toc: Some("<ncx/>".to_string()),
                ..Self::default()
            }
        }

        fn manifest_file(mut self, id: &str, href: &str, content: impl Into<FileContent>) -> Self {
            self.manifest.push((
                ManifestEntry::new(id, href, "application/xhtml+xml"),
                content.into(),
            ));
            self
        }

        fn other_file(mut self, href: &str, content: impl Into<FileContent>) -> Self {
            self.others.push((href.to_string(), content.into()));
            self
        }

        fn broken(mut self, key: &str) -> Self {
            self.broken.push(key.to_string());
            self
        }
    }

    impl DocumentModel for MemoryBook {
        fn metadata_value(&self, key: &str) -> Result<Option<String>, DocumentError> {
            match key {
                "title" => Ok(self.title.clone()),
                _ => Ok(None),
            }
        }

        fn package_descriptor(&self) -> Result<FileContent, DocumentError> {
            if self.broken_package {
                return Err(DocumentError::Other("descriptor unavailable".into()));
            }
            Ok(FileContent::from("<package/>"))
        }

        fn table_of_contents(&self) -> Result<Option<FileContent>, DocumentError> {
            Ok(self.toc.as_deref().map(FileContent::from))
        }

        fn manifest_entries(&self) -> Vec<ManifestEntry> {
            self.manifest.iter().map(|(e, _)| e.clone()).collect()
        }

        fn read_manifest_file(&self, id: &str) -> Result<FileContent, DocumentError> {
            if self.broken.iter().any(|b| b == id) {
                return Err(DocumentError::Other(format!("cannot read {}", id)));
            }
            self.manifest
                .iter()
                .find(|(e, _)| e.id == id)
                .map(|(_, c)| c.clone())
                .ok_or_else(|| DocumentError::NotFound(id.to_string()))
        }

        fn other_files(&self) -> Vec<String> {
            self.others.iter().map(|(h, _)| h.clone()).collect()
        }

        fn read_other_file(&self, href: &str) -> Result<FileContent, DocumentError> {
            if self.broken.iter().any(|b| b == href) {
                return Err(DocumentError::Other(format!("cannot read {}", href)));
            }
            self.others
                .iter()
                .find(|(h, _)| h == href)
                .map(|(_, c)| c.clone())
                .ok_or_else(|| DocumentError::NotFound(href.to_string()))
        }
    }

    fn entry_names(path: &Path) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    fn read_entry(path: &Path, name: &str) -> String {
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut content = String::new();
        archive
            .by_name(name)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        content
    }

    #[test]
    fn writes_fixed_layout() {
        let dir = TempDir::new().unwrap();
        let book = MemoryBook::new()
            .manifest_file("ch1", "Text/ch1.xhtml", "<html/>")
            .manifest_file("cover", "Images/cover.png", vec![0x89, 0x50, 0x4e, 0x47])
            .other_file("META-INF/com.apple.ibooks.display-options.xml", "<display/>");

        let archive = ArchiveAssembler::new(dir.path()).assemble(&book).unwrap();

        assert_eq!(
            entry_names(archive.path()),
            vec![
                "mimetype",
                "META-INF/container.xml",
                "OEBPS/content.opf",
                "OEBPS/toc.ncx",
                "OEBPS/Text/ch1.xhtml",
                "OEBPS/Images/cover.png",
                "META-INF/com.apple.ibooks.display-options.xml",
            ]
        );
        assert_eq!(archive.entries().len(), 7);
        assert!(archive.skipped().is_empty());
        assert!(archive.size() > 0);
    }

    #[test]
    fn mimetype_is_first_and_stored() {
        let dir = TempDir::new().unwrap();
        let archive = ArchiveAssembler::new(dir.path())
            .assemble(&MemoryBook::new())
            .unwrap();

        let mut zip = zip::ZipArchive::new(File::open(archive.path()).unwrap()).unwrap();
        let mut first = zip.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), CompressionMethod::Stored);

        let mut content = String::new();
        first.read_to_string(&mut content).unwrap();
        assert_eq!(content, MIMETYPE);
    }

    #[test]
    fn container_is_not_duplicated_when_supplied() {
        let dir = TempDir::new().unwrap();
        let book = MemoryBook::new().other_file(CONTAINER_PATH, "<container from-book/>");

        let archive = ArchiveAssembler::new(dir.path()).assemble(&book).unwrap();
        let names = entry_names(archive.path());

        assert_eq!(names.iter().filter(|n| *n == CONTAINER_PATH).count(), 1);
        assert_eq!(
            read_entry(archive.path(), CONTAINER_PATH),
            "<container from-book/>"
        );
    }

    #[test]
    fn container_is_synthesized_when_missing() {
        let dir = TempDir::new().unwrap();
        let archive = ArchiveAssembler::new(dir.path())
            .assemble(&MemoryBook::new())
            .unwrap();

        let container = read_entry(archive.path(), CONTAINER_PATH);
        assert!(container.contains(r#"full-path="OEBPS/content.opf""#));
    }

    #[test]
    fn duplicate_paths_collapse_to_first_writer() {
        let dir = TempDir::new().unwrap();
        let book = MemoryBook::new()
            .manifest_file("a", "Text/ch1.xhtml", "first")
            .manifest_file("b", "Text/ch1.xhtml", "second")
            .other_file("OEBPS/Text/ch1.xhtml", "third")
            .other_file("mimetype", "text/plain");

        let archive = ArchiveAssembler::new(dir.path()).assemble(&book).unwrap();
        let names = entry_names(archive.path());

        assert_eq!(names.len(), 5);
        assert_eq!(read_entry(archive.path(), "OEBPS/Text/ch1.xhtml"), "first");
        assert_eq!(read_entry(archive.path(), "mimetype"), MIMETYPE);
    }

    #[test]
    fn unreadable_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        let book = MemoryBook::new()
            .manifest_file("ch1", "Text/ch1.xhtml", "<html/>")
            .manifest_file("ch2", "Text/ch2.xhtml", "<html/>")
            .manifest_file("ch3", "Text/ch3.xhtml", "<html/>")
            .other_file("META-INF/extra.xml", "<x/>")
            .broken("ch2")
            .broken("META-INF/extra.xml");

        let archive = ArchiveAssembler::new(dir.path()).assemble(&book).unwrap();
        let names = entry_names(archive.path());

        assert!(names.contains(&"OEBPS/Text/ch1.xhtml".to_string()));
        assert!(names.contains(&"OEBPS/Text/ch3.xhtml".to_string()));
        assert!(!names.contains(&"OEBPS/Text/ch2.xhtml".to_string()));
        assert!(!names.contains(&"META-INF/extra.xml".to_string()));

        let skipped: Vec<_> = archive.skipped().iter().map(|s| s.path.as_str()).collect();
        assert_eq!(skipped, vec!["OEBPS/Text/ch2.xhtml", "META-INF/extra.xml"]);
    }

    #[test]
    fn missing_package_descriptor_is_fatal() {
        let dir = TempDir::new().unwrap();
        let book = MemoryBook {
            broken_package: true,
            ..MemoryBook::new()
        };

        let assembler = ArchiveAssembler::new(dir.path());
        let path = assembler.archive_path(&book);
        let err = assembler.assemble(&book).unwrap_err();

        assert!(matches!(err, ArchiveError::PackageDescriptor(_)));
        assert!(!path.exists());
    }

    #[test]
    fn missing_toc_is_not_written() {
        let dir = TempDir::new().unwrap();
        let book = MemoryBook {
            toc: None,
            ..MemoryBook::new()
        };

        let archive = ArchiveAssembler::new(dir.path()).assemble(&book).unwrap();
        assert!(!entry_names(archive.path()).contains(&TOC_PATH.to_string()));
    }

    #[test]
    fn archive_is_named_after_title() {
        let dir = TempDir::new().unwrap();
        let book = MemoryBook {
            title: Some("War: and/or Peace?".to_string()),
            ..MemoryBook::new()
        };

        let archive = ArchiveAssembler::new(dir.path()).assemble(&book).unwrap();
        assert_eq!(archive.file_name(), "War_ and_or Peace_.epub");
    }

    #[test]
    fn long_title_is_cut_on_a_character_boundary() {
        let dir = TempDir::new().unwrap();
        let book = MemoryBook {
            title: Some("한국어 전자책 제목".repeat(10)),
            ..MemoryBook::new()
        };

        let archive = ArchiveAssembler::new(dir.path()).assemble(&book).unwrap();
        let name = archive.file_name();

        assert!(name.starts_with("한국어 전자책 제목"));
        assert!(name.ends_with(".epub"));
        assert!(name.len() <= MAX_TITLE_BYTES + ".epub".len());
    }

    #[test]
    fn uncreatable_name_falls_back_to_default_title() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("Sample Book.epub")).unwrap();

        let archive = ArchiveAssembler::new(dir.path())
            .assemble(&MemoryBook::new())
            .unwrap();

        assert_eq!(archive.file_name(), format!("{}.epub", DEFAULT_TITLE));
        assert_eq!(entry_names(archive.path())[0], "mimetype");
    }

    #[test]
    fn stale_archive_is_replaced() {
        let dir = TempDir::new().unwrap();
        let stale = dir.path().join("Sample Book.epub");
        fs::write(&stale, b"not a zip").unwrap();

        let archive = ArchiveAssembler::new(dir.path())
            .assemble(&MemoryBook::new())
            .unwrap();

        assert_eq!(archive.path(), stale.as_path());
        assert_eq!(entry_names(archive.path())[0], "mimetype");
    }

    #[test]
    fn archive_is_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let archive = ArchiveAssembler::new(dir.path())
            .assemble(&MemoryBook::new())
            .unwrap();
        let path = archive.path().to_path_buf();

        assert!(path.exists());
        drop(archive);
        assert!(!path.exists());
    }

    #[test]
    fn kept_archive_survives_drop() {
        let dir = TempDir::new().unwrap();
        let archive = ArchiveAssembler::new(dir.path())
            .assemble(&MemoryBook::new())
            .unwrap();

        let path = archive.keep();
        assert!(path.exists());
    }

    #[test]
    fn sanitize_falls_back_to_default() {
        assert_eq!(sanitize_title(None), DEFAULT_TITLE);
        assert_eq!(sanitize_title(Some("")), DEFAULT_TITLE);
        assert_eq!(sanitize_title(Some("   ")), DEFAULT_TITLE);
        assert_eq!(sanitize_title(Some("..")), DEFAULT_TITLE);
        assert_eq!(sanitize_title(Some("Moby Dick")), "Moby Dick");
        assert_eq!(sanitize_title(Some(&"a".repeat(300))), "a".repeat(MAX_TITLE_BYTES));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn sanitized_title_is_a_safe_file_name(title in ".*") {
                let cleaned = sanitize_title(Some(&title));

                prop_assert!(!cleaned.is_empty());
                prop_assert!(cleaned.len() <= MAX_TITLE_BYTES);
                prop_assert!(!cleaned.chars().any(|c| "<>:\"/\\|?*".contains(c) || c.is_control()));
            }
        }
    }
}

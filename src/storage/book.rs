//! Unpacked book directories
//!
//! An editor keeps a book on disk as an unpacked EPUB tree. [`DirectoryBook`]
//! exposes such a tree through [`DocumentModel`]: files below the package
//! descriptor's directory form the manifest, everything else is a
//! non-manifest file.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::{DocumentError, DocumentModel, FileContent, ManifestEntry};

use super::archive::{CONTAINER_PATH, PACKAGE_PATH};

#[derive(Debug, Error)]
pub enum BookError {
    #[error("Not a book directory: {0}")]
    NotADirectory(PathBuf),

    #[error("No package descriptor (.opf) found in {0}")]
    NoPackageDescriptor(PathBuf),

    #[error("Failed to scan {}: {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A book stored as an unpacked directory tree
#[derive(Debug, Clone)]
pub struct DirectoryBook {
    root: PathBuf,

    /// Book path of the package descriptor, e.g. `OEBPS/content.opf`
    package_path: String,

    /// Directory manifest hrefs are relative to, with trailing slash (or empty)
    content_dir: String,

    manifest: Vec<ManifestEntry>,
    others: Vec<String>,
}

impl DirectoryBook {
    /// Scans a book directory
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, BookError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(BookError::NotADirectory(root));
        }

        let mut files = Vec::new();
        collect_files(&root, &root, &mut files)?;
        files.sort();

        let package_path = locate_package(&root, &files)
            .ok_or_else(|| BookError::NoPackageDescriptor(root.clone()))?;

        let content_dir = match package_path.rfind('/') {
            Some(idx) => package_path[..=idx].to_string(),
            None => String::new(),
        };
        let toc_path = format!("{}toc.ncx", content_dir);

        let mut manifest = Vec::new();
        let mut others = Vec::new();

        for file in files {
            if file == package_path || file == toc_path {
                continue;
            }

            // A container pointing elsewhere would disagree with the fixed layout
            if file == CONTAINER_PATH && package_path != PACKAGE_PATH {
                continue;
            }

            let in_content_dir = if content_dir.is_empty() {
                !file.starts_with("META-INF/") && file != "mimetype"
            } else {
                file.starts_with(&content_dir)
            };

            if in_content_dir {
                let href = file[content_dir.len()..].to_string();
                let media_type = media_type_for(&href);
                manifest.push(ManifestEntry::new(href.clone(), href, media_type));
            } else {
                others.push(file);
            }
        }

        Ok(Self {
            root,
            package_path,
            content_dir,
            manifest,
            others,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Book path of the package descriptor
    pub fn package_path(&self) -> &str {
        &self.package_path
    }

    fn read(&self, book_path: &str) -> Result<FileContent, DocumentError> {
        let path = self.root.join(book_path);
        if !path.is_file() {
            return Err(DocumentError::NotFound(book_path.to_string()));
        }

        fs::read(&path)
            .map(FileContent::Bytes)
            .map_err(|source| DocumentError::Io { path, source })
    }
}

impl DocumentModel for DirectoryBook {
    fn metadata_value(&self, key: &str) -> Result<Option<String>, DocumentError> {
        let path = self.root.join(&self.package_path);
        let opf = fs::read_to_string(&path).map_err(|source| DocumentError::Io { path, source })?;
        Ok(dc_element(&opf, key))
    }

    fn package_descriptor(&self) -> Result<FileContent, DocumentError> {
        self.read(&self.package_path)
    }

    fn table_of_contents(&self) -> Result<Option<FileContent>, DocumentError> {
        let toc_path = format!("{}toc.ncx", self.content_dir);
        if !self.root.join(&toc_path).is_file() {
            return Ok(None);
        }
        self.read(&toc_path).map(Some)
    }

    fn manifest_entries(&self) -> Vec<ManifestEntry> {
        self.manifest.clone()
    }

    fn read_manifest_file(&self, id: &str) -> Result<FileContent, DocumentError> {
        let entry = self
            .manifest
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| DocumentError::NotFound(id.to_string()))?;

        self.read(&format!("{}{}", self.content_dir, entry.href))
    }

    fn other_files(&self) -> Vec<String> {
        self.others.clone()
    }

    fn read_other_file(&self, href: &str) -> Result<FileContent, DocumentError> {
        self.read(href)
    }
}

/// Recursively lists files as `/`-separated paths relative to `root`
fn collect_files(root: &Path, dir: &Path, files: &mut Vec<String>) -> Result<(), BookError> {
    let entries = fs::read_dir(dir).map_err(|source| BookError::Scan {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();

        // Editor and OS droppings such as .DS_Store
        if name.to_string_lossy().starts_with('.') {
            continue;
        }

        if path.is_dir() {
            collect_files(root, &path, files)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            let parts: Vec<_> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            files.push(parts.join("/"));
        }
    }

    Ok(())
}

/// Finds the package descriptor: container.xml's rootfile, the
/// conventional `OEBPS/content.opf`, then the first `.opf` file
fn locate_package(root: &Path, files: &[String]) -> Option<String> {
    if let Ok(container) = fs::read_to_string(root.join(CONTAINER_PATH)) {
        if let Some(full_path) = attribute_value(&container, "full-path") {
            if files.iter().any(|f| *f == full_path) {
                return Some(full_path);
            }
        }
    }

    if files.iter().any(|f| f == PACKAGE_PATH) {
        return Some(PACKAGE_PATH.to_string());
    }

    files.iter().find(|f| f.ends_with(".opf")).cloned()
}

/// Value of the first `name="..."` attribute in `xml`
fn attribute_value(xml: &str, name: &str) -> Option<String> {
    let needle = format!("{}=", name);
    let start = xml.find(&needle)? + needle.len();
    let rest = &xml[start..];
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let rest = &rest[1..];
    let end = rest.find(quote)?;
    Some(rest[..end].to_string())
}

/// Text of the first `<dc:name>` element in an OPF document
fn dc_element(opf: &str, name: &str) -> Option<String> {
    let open = format!("<dc:{}", name);
    let close = format!("</dc:{}>", name);

    let mut search = opf;
    while let Some(idx) = search.find(&open) {
        let after = &search[idx + open.len()..];

        // <dc:titleX> is a different element
        if !after.starts_with(|c: char| c == '>' || c.is_whitespace()) {
            search = after;
            continue;
        }

        let tag_end = after.find('>')?;
        if after[..tag_end].ends_with('/') {
            return None;
        }

        let body = &after[tag_end + 1..];
        let end = body.find(&close)?;
        let text = unescape(body[..end].trim());
        return if text.is_empty() { None } else { Some(text) };
    }

    None
}

/// Decodes the predefined XML entities and numeric character references
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let after = &rest[start..];

        let decoded = after
            .find(';')
            .and_then(|end| decode_entity(&after[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &after[end + 1..];
            }
            None => {
                out.push('&');
                rest = &after[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "amp" => Some('&'),
        _ => {
            let code = match name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => name.strip_prefix('#')?.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Media type from a file extension
pub fn media_type_for(href: &str) -> &'static str {
    let ext = href
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "xhtml" | "htm" | "html" => "application/xhtml+xml",
        "css" => "text/css",
        "ncx" => "application/x-dtbncx+xml",
        "opf" => "application/oebps-package+xml",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "js" => "application/javascript",
        "smil" => "application/smil+xml",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        "xml" => "application/xml",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

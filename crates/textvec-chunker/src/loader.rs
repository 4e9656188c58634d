//! Plain-text document loading
//!
//! Reads `.txt` and Markdown files, either individually or from a directory,
//! so their contents can be fed to the ingestion pipeline. Binary formats
//! such as PDF are reported as unsupported.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading documents
#[derive(Error, Debug)]
pub enum LoaderError {
    /// File format is not supported
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// IO error while reading a file or directory
    #[error("IO error reading {path}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// File types the loader distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    PlainText,
    Markdown,
    Pdf,
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "txt" | "text" => Self::PlainText,
            "md" | "markdown" => Self::Markdown,
            "pdf" => Self::Pdf,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from path
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    /// Whether the loader can read this type
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::PlainText | Self::Markdown)
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PlainText => write!(f, "text"),
            Self::Markdown => write!(f, "markdown"),
            Self::Pdf => write!(f, "pdf"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A document read from disk
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub path: PathBuf,
    pub file_type: FileType,
    pub content: String,
}

/// Load a single text or Markdown file
pub fn load_file(path: &Path) -> Result<LoadedDocument, LoaderError> {
    let file_type = FileType::from_path(path);
    if !file_type.is_supported() {
        return Err(LoaderError::UnsupportedFormat(file_type.to_string()));
    }

    let content = std::fs::read_to_string(path).map_err(|e| LoaderError::IoError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(LoadedDocument {
        path: path.to_path_buf(),
        file_type,
        content,
    })
}

/// Load every supported file directly inside `dir`, ordered by path
///
/// Unsupported files are skipped; subdirectories are not descended into.
pub fn load_directory(dir: &Path) -> Result<Vec<LoadedDocument>, LoaderError> {
    let io_err = |e: std::io::Error| LoaderError::IoError {
        path: dir.display().to_string(),
        source: e,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut documents = Vec::new();
    for path in paths {
        match FileType::from_path(&path) {
            file_type if file_type.is_supported() => documents.push(load_file(&path)?),
            FileType::Pdf => {
                tracing::warn!(path = %path.display(), "Skipping PDF: only plain text is loaded");
            }
            _ => {
                tracing::debug!(path = %path.display(), "Skipping unsupported file");
            }
        }
    }

    tracing::info!(dir = %dir.display(), count = documents.len(), "Loaded documents");
    Ok(documents)
}

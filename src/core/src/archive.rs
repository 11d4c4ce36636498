//! Images in the store and the members inside them.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A disk image found in the image store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageHandle {
    /// Identity used in URLs (file name without the format suffix)
    pub name: String,
    /// File name inside the store (e.g. "ubuntu.iso")
    pub file_name: String,
    /// Resolved location of the backing file
    pub path: PathBuf,
}

/// One file member of an archive.
///
/// Directories are never listed explicitly; they are inferred from the
/// paths of the files beneath them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// Slash-separated, root-relative internal path
    pub path: String,
    /// Uncompressed size in bytes
    pub size: u64,
}

impl ArchiveEntry {
    pub fn new(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }

    /// Non-empty path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }

    /// Last path segment.
    pub fn basename(&self) -> &str {
        self.segments().last().unwrap_or("")
    }
}

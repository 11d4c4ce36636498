//! Archive reading capability.
//!
//! Callers only see [`ArchiveReader`]; the subprocess-backed
//! [`SevenZipReader`] can be swapped for a native volume-descriptor decoder
//! without touching them.

mod sevenzip;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use isoshelf_core::error::Result;
use isoshelf_core::{ArchiveEntry, ImageHandle};

pub use sevenzip::{parse_listing, SevenZipReader};

/// Lists and extracts members of one image.
#[async_trait]
pub trait ArchiveReader: Send + Sync {
    /// Enumerate the file members of `image` in listing order.
    ///
    /// Fails with `ArchiveUnavailable` if the image is missing or the
    /// listing cannot be produced.
    async fn list_entries(&self, image: &ImageHandle) -> Result<Vec<ArchiveEntry>>;

    /// Materialize the member at `internal_path` inside `dest`.
    ///
    /// Returns the location of the extracted file. Fails with
    /// `ExtractionFailed` if the member cannot be produced.
    async fn extract_file(
        &self,
        image: &ImageHandle,
        internal_path: &str,
        dest: &Path,
    ) -> Result<PathBuf>;
}

//! Image inventory.
//!
//! The store is a plain directory of image files. Nothing is indexed or
//! cached; every call re-reads the directory.

use std::path::{Path, PathBuf};

use isoshelf_core::error::{Result, ShelfError};
use isoshelf_core::{ImageFormat, ImageHandle, VirtualNode};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

/// Read-only view over the configured image directory.
#[derive(Debug, Clone)]
pub struct ImageStore {
    /// Directory holding the images
    store_dir: PathBuf,
    /// Suffix and naming rules for images
    format: ImageFormat,
}

/// A whole image opened for download.
pub struct ImageFile {
    pub handle: ImageHandle,
    pub size: u64,
    pub stream: ReaderStream<File>,
}

impl ImageStore {
    pub fn new(store_dir: &Path, format: ImageFormat) -> Self {
        Self {
            store_dir: store_dir.to_path_buf(),
            format,
        }
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// Enumerate images in the store, sorted by name.
    ///
    /// Fails with `StoreUnavailable` if the directory cannot be read.
    pub async fn list_images(&self) -> Result<Vec<ImageHandle>> {
        let unavailable = |e: std::io::Error| {
            ShelfError::StoreUnavailable(format!("{}: {}", self.store_dir.display(), e))
        };

        let store = tokio::fs::canonicalize(&self.store_dir)
            .await
            .map_err(unavailable)?;
        let mut dir = tokio::fs::read_dir(&store).await.map_err(unavailable)?;

        let mut images = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(unavailable)? {
            let Ok(file_name) = entry.file_name().into_string() else {
                continue;
            };
            let Some(name) = self.image_name(&file_name) else {
                continue;
            };
            match entry.file_type().await {
                Ok(ft) if ft.is_file() => {}
                Ok(ft) if ft.is_symlink() => {
                    // Only links to regular files inside the store are images
                    if stored_file(&store, &entry.path()).await.is_none() {
                        tracing::debug!(file = %file_name, "Skipping symlink");
                        continue;
                    }
                }
                _ => continue,
            }
            images.push(ImageHandle {
                name: name.to_string(),
                file_name: file_name.clone(),
                path: entry.path(),
            });
        }

        images.sort_by(|a, b| a.name.cmp(&b.name));
        tracing::debug!(
            store = %self.store_dir.display(),
            count = images.len(),
            "Scanned image store"
        );
        Ok(images)
    }

    /// Inventory as IMAGE nodes.
    pub async fn image_nodes(&self) -> Result<Vec<VirtualNode>> {
        Ok(self
            .list_images()
            .await?
            .into_iter()
            .map(|image| VirtualNode::Image {
                name: image.name,
                file_name: image.file_name,
            })
            .collect())
    }

    /// Resolve an image by name (`ubuntu`) or file name (`ubuntu.iso`).
    ///
    /// The result is guaranteed to be a regular file inside the store
    /// directory, after resolving symlinks.
    pub async fn resolve(&self, requested: &str) -> Result<ImageHandle> {
        if requested.is_empty()
            || requested.starts_with('.')
            || requested.contains(['/', '\\', '\0'])
        {
            return Err(ShelfError::InvalidPath(format!(
                "'{}' is not a valid image name",
                requested
            )));
        }

        let file_name = if self.image_name(requested).is_some() {
            requested.to_string()
        } else {
            format!("{}{}", requested, self.format.suffix)
        };
        let name = self
            .image_name(&file_name)
            .unwrap_or(requested)
            .to_string();

        let not_found = || ShelfError::NotFound(format!("image {}", name));
        let store = tokio::fs::canonicalize(&self.store_dir).await.map_err(|e| {
            ShelfError::StoreUnavailable(format!("{}: {}", self.store_dir.display(), e))
        })?;
        let path = stored_file(&store, &store.join(&file_name))
            .await
            .ok_or_else(not_found)?;

        Ok(ImageHandle {
            name,
            file_name,
            path,
        })
    }

    /// Open a whole image for streaming, bypassing extraction.
    pub async fn open_image(&self, requested: &str) -> Result<ImageFile> {
        let handle = self.resolve(requested).await?;
        let file = File::open(&handle.path).await?;
        let size = file.metadata().await?.len();
        Ok(ImageFile {
            handle,
            size,
            stream: ReaderStream::new(file),
        })
    }

    /// Image name for a file name carrying the format suffix.
    fn image_name<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        file_name
            .strip_suffix(self.format.suffix.as_str())
            .filter(|name| !name.is_empty())
    }
}

/// Canonical location of `path` if it is a regular file inside `store`.
async fn stored_file(store: &Path, path: &Path) -> Option<PathBuf> {
    let resolved = tokio::fs::canonicalize(path).await.ok()?;
    if !resolved.starts_with(store) {
        tracing::warn!(
            path = %path.display(),
            "Image resolves outside the image store"
        );
        return None;
    }
    match tokio::fs::metadata(&resolved).await {
        Ok(meta) if meta.is_file() => Some(resolved),
        _ => None,
    }
}

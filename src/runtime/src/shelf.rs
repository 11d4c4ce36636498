//! Request-level entry points tying the components together.
//!
//! ```text
//! listing:  PathNormalizer → ImageStore::resolve → ArchiveReader::list_entries → build_children
//! download: ImageStore::resolve → Extractor (PathNormalizer → scratch → ArchiveReader::extract_file)
//! ```

use std::sync::Arc;

use isoshelf_core::error::Result;
use isoshelf_core::{ImageHandle, ShelfConfig, VirtualNode, VirtualPath};

use crate::extract::{ExtractedFile, Extractor};
use crate::path::PathNormalizer;
use crate::reader::{ArchiveReader, SevenZipReader};
use crate::store::{ImageFile, ImageStore};
use crate::tree::build_children_with;

/// Children of one virtual directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub image: ImageHandle,
    pub dir: VirtualPath,
    pub nodes: Vec<VirtualNode>,
}

/// The archive navigation and extraction engine.
pub struct Shelf {
    store: ImageStore,
    normalizer: PathNormalizer,
    reader: Arc<dyn ArchiveReader>,
    extractor: Extractor,
}

impl Shelf {
    /// Engine backed by the configured 7-Zip binary.
    pub fn from_config(config: &ShelfConfig) -> Self {
        Self::with_reader(config, Arc::new(SevenZipReader::from_config(config)))
    }

    /// Engine backed by an arbitrary reader.
    pub fn with_reader(config: &ShelfConfig, reader: Arc<dyn ArchiveReader>) -> Self {
        Self {
            store: ImageStore::new(&config.image_dir, config.format.clone()),
            normalizer: PathNormalizer::new(&config.format),
            extractor: Extractor::from_config(config, reader.clone()),
            reader,
        }
    }

    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    /// All images as IMAGE nodes.
    pub async fn inventory(&self) -> Result<Vec<VirtualNode>> {
        self.store.image_nodes().await
    }

    /// List one virtual directory of an image.
    ///
    /// A directory that does not exist yields only the BACK node.
    pub async fn list_directory(&self, image: &str, raw_path: &str) -> Result<Listing> {
        let dir = self.normalizer.normalize(raw_path)?;
        let image = self.store.resolve(image).await?;
        let entries = self.reader.list_entries(&image).await?;
        let nodes = build_children_with(&entries, &dir, &self.normalizer);

        tracing::debug!(
            image = %image.name,
            dir = %dir,
            children = nodes.len() - 1,
            "Built directory listing"
        );
        Ok(Listing { image, dir, nodes })
    }

    /// Extract one member of an image.
    pub async fn extract(&self, image: &str, raw_path: &str) -> Result<ExtractedFile> {
        let image = self.store.resolve(image).await?;
        self.extractor.extract(&image, raw_path).await
    }

    /// Open a whole image file.
    pub async fn open_image(&self, image: &str) -> Result<ImageFile> {
        self.store.open_image(image).await
    }
}

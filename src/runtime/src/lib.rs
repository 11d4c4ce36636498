//! Isoshelf Runtime - Archive navigation and extraction engine.
//!
//! Turns a directory of disk images into a browsable virtual tree and
//! extracts single members on demand:
//!
//! - [`ImageStore`]: image inventory and whole-image access
//! - [`ArchiveReader`]: listing/extraction capability ([`SevenZipReader`])
//! - [`PathNormalizer`]: the traversal boundary for client paths
//! - [`build_children`]: virtual directory synthesis
//! - [`Extractor`]: single-member extraction with scratch cleanup

pub mod extract;
pub mod path;
pub mod reader;
pub mod shelf;
pub mod store;
pub mod tree;

// Re-export common types
pub use extract::{ExtractedFile, ExtractedStream, Extractor, ScratchDir};
pub use path::{PathNormalizer, PATH_MARKER};
pub use reader::{parse_listing, ArchiveReader, SevenZipReader};
pub use shelf::{Listing, Shelf};
pub use store::{ImageFile, ImageStore};
pub use tree::{build_children, build_children_with};

/// Isoshelf Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

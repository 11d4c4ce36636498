//! Isoshelf Core - Shared Types and Abstractions
//!
//! Configuration, the error taxonomy and the data model shared by the
//! navigation/extraction runtime and the HTTP server.

pub mod archive;
pub mod config;
pub mod error;
pub mod node;

// Re-export commonly used types
pub use archive::{ArchiveEntry, ImageHandle};
pub use config::{ImageFormat, ShelfConfig};
pub use error::{Result, ShelfError};
pub use node::{BackTarget, NodeKind, VirtualNode, VirtualPath};

/// Isoshelf version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Isoshelf Server - HTTP surface for the archive engine.
//!
//! Routes browse and download requests to [`isoshelf_runtime::Shelf`],
//! rendering listings as HTML or JSON and streaming extracted members.

pub mod args;
pub mod error;
pub mod render;
pub mod router;
pub mod server;
pub mod urlpath;

pub use router::Router;
pub use server::ShelfServer;

/// Isoshelf server version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Isoshelf - browse and download files inside disk images over HTTP.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use isoshelf_server::args::Args;
use isoshelf_server::server::ShelfServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = args.into_config();

    tracing::info!(
        version = isoshelf_server::VERSION,
        tool = %config.tool.display(),
        scratch_dir = %config.scratch_dir.display(),
        "Starting isoshelf"
    );

    ShelfServer::new(Arc::new(config)).serve().await
}

//! HTTP server setup.
//!
//! Binds the configured address and serves the [`Router`] until Ctrl-C.

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::Context;
use hyper::service::{make_service_fn, service_fn};
use hyper::Server;

use isoshelf_core::ShelfConfig;
use isoshelf_runtime::Shelf;

use crate::router::Router;

/// The isoshelf HTTP server.
pub struct ShelfServer {
    config: Arc<ShelfConfig>,
    router: Router,
}

impl ShelfServer {
    /// Create a server backed by the configured 7-Zip tool.
    pub fn new(config: Arc<ShelfConfig>) -> Self {
        let shelf = Arc::new(Shelf::from_config(&config));
        Self::with_shelf(config, shelf)
    }

    /// Create a server around an existing engine.
    pub fn with_shelf(config: Arc<ShelfConfig>, shelf: Arc<Shelf>) -> Self {
        let router = Router::new(shelf, &config.url_prefix);
        Self { config, router }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Serve requests until Ctrl-C.
    pub async fn serve(self) -> anyhow::Result<()> {
        self.config.validate()?;

        std::fs::create_dir_all(&self.config.scratch_dir).with_context(|| {
            format!(
                "Failed to create scratch directory {}",
                self.config.scratch_dir.display()
            )
        })?;
        if !self.config.image_dir.is_dir() {
            tracing::warn!(
                image_dir = %self.config.image_dir.display(),
                "Image directory does not exist; inventory requests will fail"
            );
        }

        let router = self.router;
        let make_service = make_service_fn(move |_conn| {
            let router = router.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    let router = router.clone();
                    async move { Ok::<_, Infallible>(router.handle(req).await) }
                }))
            }
        });

        let server = Server::try_bind(&self.config.listen)
            .with_context(|| format!("Failed to bind {}", self.config.listen))?
            .serve(make_service);

        tracing::info!(
            listen = %self.config.listen,
            image_dir = %self.config.image_dir.display(),
            url_prefix = %self.config.url_prefix,
            "Isoshelf server listening"
        );

        server.with_graceful_shutdown(shutdown_signal()).await?;

        tracing::info!("Isoshelf server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

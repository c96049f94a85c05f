//! Proxy server using Axum

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tokio::sync::watch;
use tracing::{info, instrument};

use crate::config::ServerConfig;
use crate::error::{MirageError, Result};
use crate::fetch::{AssetFetcher, FetchController};
use crate::store::AssetCache;

use super::routes;

/// Shared state for request handlers
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<FetchController>,
    pub assets: Arc<AssetCache>,
    pub asset_fetcher: Arc<dyn AssetFetcher>,
    /// Scheme for rewritten URLs when the client sends no X-Forwarded-Proto
    pub public_scheme: String,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        controller: Arc<FetchController>,
        assets: Arc<AssetCache>,
        asset_fetcher: Arc<dyn AssetFetcher>,
        public_scheme: impl Into<String>,
    ) -> Self {
        Self {
            controller,
            assets,
            asset_fetcher,
            public_scheme: public_scheme.into(),
            started_at: Instant::now(),
        }
    }
}

/// HTTP front of the proxy
pub struct ProxyServer {
    config: ServerConfig,
    state: AppState,
}

impl ProxyServer {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    fn build_router(&self) -> Router {
        routes::create_router(self.state.clone())
    }

    /// Serve until `shutdown` flips
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| MirageError::InvalidConfig(format!("invalid listen address: {}", e)))?;

        let router = self.build_router();

        info!("Proxy server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await
            .map_err(|e| MirageError::Internal(e.to_string()))?;

        info!("Proxy server shut down");
        Ok(())
    }
}

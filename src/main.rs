//! Mirage Proxy Server - Entry Point
//!
//! Wires the renderer, stores and fetchers together and serves until
//! Ctrl+C or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mirage::api::{AppState, ProxyServer};
use mirage::config::{Config, LogConfig};
use mirage::fetch::{FetchController, HttpAssetFetcher, SessionPool};
use mirage::render::{CdpRenderer, Renderer};
use mirage::store::{AssetCache, CookieJar};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    init_tracing(&config.log);

    info!("Starting Mirage Proxy Server");

    let renderer: Arc<dyn Renderer> = Arc::new(CdpRenderer::new(config.renderer.remote_url.clone()));
    match &config.renderer.remote_url {
        Some(url) => info!("Using remote renderer at {}", url),
        None => info!("Using local headless browser"),
    }

    let pool = SessionPool::new(
        config.renderer.max_sessions,
        Duration::from_secs(config.renderer.queue_timeout),
    );
    info!("Session pool capacity: {}", pool.capacity());

    let controller = Arc::new(FetchController::new(
        renderer,
        Arc::new(CookieJar::new()),
        pool,
        config.fetch.clone(),
    ));

    let assets = Arc::new(AssetCache::new(Duration::from_secs(config.asset.cache_ttl)));
    let asset_fetcher =
        Arc::new(HttpAssetFetcher::new(&config.asset).context("Failed to build asset client")?);

    let state = AppState::new(
        controller,
        assets,
        asset_fetcher,
        config.server.public_scheme.clone(),
    );
    let server = ProxyServer::new(config.server.clone(), state);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server_task = tokio::spawn(async move {
        if let Err(e) = server.run(shutdown_rx).await {
            error!("Proxy server error: {}", e);
        }
    });

    info!("Server started on {}", config.server_addr());

    shutdown_signal().await;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    let _ = server_task.await;

    info!("Mirage Proxy Server stopped");
    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("mirage={},tower_http=debug", log.level).into());

    let registry = tracing_subscriber::registry().with(filter);

    if log.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

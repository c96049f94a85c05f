//! Route definitions

use axum::middleware::map_response;
use axum::routing::{any, get};
use axum::Router;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::middleware::{cors_layer, strip_security_headers};
use super::server::AppState;
use crate::rewrite::{ASSET_PATH, PAGE_PATH};

/// Create the router with all routes and layers
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Page relay answers every method so non-GET gets a JSON 405
        .route(PAGE_PATH, any(handlers::page::proxy_page))
        .route(ASSET_PATH, get(handlers::asset::proxy_asset))
        .route("/health", get(handlers::health::health_check))
        .layer(map_response(strip_security_headers))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

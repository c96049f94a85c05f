//! CORS middleware configuration
//!
//! Proxied pages run under the proxy's origin but script requests may come
//! from anywhere, so the request origin is mirrored back with credentials
//! allowed. A literal `*` cannot be combined with credentials.

use axum::http::Method;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

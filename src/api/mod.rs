//! HTTP surface of the proxy
//!
//! `GET /?url=` relays a rendered, rewritten page; `GET /asset?url=` relays
//! raw sub-resource bytes.

pub mod handlers;
pub mod middleware;
pub mod proxy_base;
pub mod routes;
pub mod server;

pub use proxy_base::ProxyBase;
pub use server::{AppState, ProxyServer};

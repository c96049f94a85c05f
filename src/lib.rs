//! Mirage - Rendering Forward Proxy
//!
//! Loads pages in a headless browser and relays them with every URL
//! rewritten to point back through the proxy, so follow-up navigation,
//! stylesheets, scripts and images keep flowing through it.
//!
//! ## Features
//!
//! - Retrying page fetches with challenge-page detection
//! - Per-host cookie persistence between fetches
//! - HTML, CSS and JavaScript URL rewriting plus a client-side request interceptor
//! - Raw asset relay with a TTL cache
//! - Bounded rendering session pool with backpressure

pub mod api;
pub mod config;
pub mod error;
pub mod fetch;
pub mod render;
pub mod rewrite;
pub mod store;

pub use config::Config;
pub use error::{MirageError, Result};

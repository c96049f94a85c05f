//! Response middleware

mod cors;
mod security_headers;

pub use cors::cors_layer;
pub use security_headers::{strip_security_headers, STRIPPED_HEADERS};

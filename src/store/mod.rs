//! Process-wide shared state
//!
//! Both stores are owned by the application state and handed to the
//! components that need them; nothing here is a global.

pub mod assets;
pub mod cookies;

pub use assets::{AssetCache, CachedAsset};
pub use cookies::CookieJar;

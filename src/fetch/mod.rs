//! Page and asset acquisition
//!
//! Pages are loaded through the rendering engine with retries; assets are
//! plain HTTP requests.

pub mod asset;
pub mod challenge;
pub mod controller;
pub mod headers;
pub mod pool;

pub use asset::{AssetFetcher, FetchedAsset, HttpAssetFetcher};
pub use controller::{FetchController, FetchState, LoadedPage};
pub use pool::SessionPool;

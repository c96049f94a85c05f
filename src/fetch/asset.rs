//! Raw sub-resource downloads
//!
//! Assets bypass the rendering engine: they are fetched as bytes and relayed
//! untouched.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, ORIGIN, REFERER};
use reqwest::{redirect, Client};
use tracing::{debug, instrument};
use url::Url;

use super::headers::random_user_agent;
use crate::config::AssetConfig;
use crate::error::{MirageError, Result};
use crate::rewrite::url::origin_of;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Downloaded asset
#[derive(Debug, Clone)]
pub struct FetchedAsset {
    pub body: Bytes,
    pub content_type: String,
}

/// Source of asset bytes
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedAsset>;
}

/// Asset fetcher over plain HTTP
pub struct HttpAssetFetcher {
    client: Client,
}

impl HttpAssetFetcher {
    pub fn new(config: &AssetConfig) -> Result<Self> {
        let client = Client::builder()
            .redirect(redirect::Policy::limited(config.max_redirects))
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(random_user_agent())
            .build()
            .map_err(|e| MirageError::Internal(format!("asset client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    #[instrument(skip(self, url), fields(url = %url))]
    async fn fetch(&self, url: &Url) -> Result<FetchedAsset> {
        let origin = origin_of(url);

        let response = self
            .client
            .get(url.clone())
            .header(REFERER, format!("{}/", origin))
            .header(ORIGIN, origin)
            .send()
            .await?
            .error_for_status()?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or(FALLBACK_CONTENT_TYPE)
            .to_string();

        let body = response.bytes().await?;
        debug!(bytes = body.len(), content_type = %content_type, "Asset fetched");

        Ok(FetchedAsset { body, content_type })
    }
}

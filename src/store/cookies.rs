//! Per-host cookie persistence across rendering sessions

use dashmap::DashMap;
use tracing::debug;
use url::Url;

use crate::error::Result;
use crate::render::{CookieRecord, RenderSession};

/// Cookies captured after successful fetches, keyed by host
///
/// Every save replaces the host's entry wholesale. The last writer wins when
/// two fetches for the same host finish together.
#[derive(Debug, Default)]
pub struct CookieJar {
    entries: DashMap<String, Vec<CookieRecord>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture every cookie visible to the session under the URL's host
    pub async fn save(&self, session: &dyn RenderSession, url: &Url) -> Result<()> {
        let Some(host) = url.host_str() else {
            return Ok(());
        };

        let cookies = session.cookies().await?;
        debug!(host = host, count = cookies.len(), "Saving cookies");
        self.entries.insert(host.to_string(), cookies);
        Ok(())
    }

    /// Replay the host's saved cookies into the session, if any
    pub async fn apply(&self, session: &dyn RenderSession, url: &Url) -> Result<()> {
        let Some(cookies) = self.get(url) else {
            return Ok(());
        };
        if cookies.is_empty() {
            return Ok(());
        }

        debug!(host = url.host_str(), count = cookies.len(), "Applying cookies");
        session.set_cookies(&cookies).await
    }

    /// Saved cookies for the URL's host
    pub fn get(&self, url: &Url) -> Option<Vec<CookieRecord>> {
        let host = url.host_str()?;
        // Clone out so the shard lock is released before any await.
        self.entries.get(host).map(|entry| entry.value().clone())
    }

    /// Number of hosts with saved cookies
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

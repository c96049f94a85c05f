//! Rendering engine boundary
//!
//! The proxy never talks to origins for pages itself; it drives a headless
//! browser through these traits. One `Renderer` is shared by the whole
//! process and hands out an isolated `RenderSession` (a tab) per attempt.

#[cfg(feature = "browser")]
pub mod cdp;
#[cfg(any(feature = "browser", test))]
pub mod slot;
#[cfg(test)]
pub mod stub;

use async_trait::async_trait;
use url::Url;

use crate::error::Result;

#[cfg(feature = "browser")]
pub use cdp::CdpRenderer;

/// Cookie as captured from, and replayed into, a rendering session
#[derive(Debug, Clone, PartialEq)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    /// Seconds since the epoch; `None` for session cookies
    pub expires: Option<f64>,
}

/// Outbound request headers applied to a session before navigation
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderSet {
    pub user_agent: String,
    /// Additional headers in send order
    pub extra: Vec<(String, String)>,
}

/// Process-wide rendering engine
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Open a fresh, isolated session
    async fn open_session(&self) -> Result<Box<dyn RenderSession>>;
}

/// One isolated page in the rendering engine
///
/// Implementations do not apply timeouts themselves; callers bound every
/// await.
#[async_trait]
pub trait RenderSession: Send + Sync {
    async fn set_headers(&self, headers: &HeaderSet) -> Result<()>;

    async fn set_cookies(&self, cookies: &[CookieRecord]) -> Result<()>;

    /// All cookies visible to the session
    async fn cookies(&self) -> Result<Vec<CookieRecord>>;

    /// Navigate and resolve once the DOM is ready
    async fn navigate(&self, url: &Url) -> Result<()>;

    /// Resolve once network activity has settled
    async fn wait_for_network_idle(&self) -> Result<()>;

    /// Current document as text (markup for HTML, raw text otherwise)
    async fn content(&self) -> Result<String>;

    /// Media type of the current document
    async fn content_type(&self) -> Result<String>;

    /// URL of the current document after redirects
    async fn current_url(&self) -> Result<String>;

    async fn close(&self) -> Result<()>;
}

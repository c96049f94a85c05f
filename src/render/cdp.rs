//! Chrome DevTools Protocol renderer
//!
//! Connects to an external headless browser (or launches a local one) the
//! first time a session is requested, then reuses it until the connection
//! drops, after which the next session reconnects. Each session is a
//! separate tab.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, Headers, SetExtraHttpHeadersParams, SetUserAgentOverrideParams, TimeSinceEpoch,
};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::{Browser, BrowserConfig, Handler, Page};
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use super::slot::{BrowserSlot, Liveness};
use super::{CookieRecord, HeaderSet, RenderSession, Renderer};
use crate::error::{MirageError, Result};
use crate::rewrite::ContentKind;

const DOM_READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'interactive' || document.readyState === 'complete') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
        }
    })
"#;

// Settled = load complete and no new resource entries for two 250ms ticks.
const NETWORK_IDLE_SCRIPT: &str = r#"
    new Promise((resolve) => {
        let last = performance.getEntriesByType('resource').length;
        let quiet = 0;
        const tick = () => {
            const now = performance.getEntriesByType('resource').length;
            if (now === last && document.readyState === 'complete') {
                quiet += 1;
                if (quiet >= 2) { resolve(true); return; }
            } else {
                quiet = 0;
                last = now;
            }
            setTimeout(tick, 250);
        };
        tick();
    })
"#;

const TEXT_CONTENT_SCRIPT: &str = "document.body ? document.body.innerText : ''";

/// Renderer backed by a Chromium instance
pub struct CdpRenderer {
    remote_url: Option<String>,
    browser: BrowserSlot<Mutex<Browser>>,
}

impl CdpRenderer {
    /// `remote_url` is a DevTools endpoint (`ws://` debugger URL or the
    /// `http://host:9222` discovery address); `None` launches Chromium locally.
    pub fn new(remote_url: Option<String>) -> Self {
        Self {
            remote_url,
            browser: BrowserSlot::new(),
        }
    }

    async fn browser(&self) -> Result<Arc<Mutex<Browser>>> {
        self.browser
            .get_or_start(|liveness| async move {
                let browser = match &self.remote_url {
                    Some(url) => Self::connect(url, liveness).await?,
                    None => Self::launch(liveness).await?,
                };
                Ok(Mutex::new(browser))
            })
            .await
    }

    async fn launch(liveness: Liveness) -> Result<Browser> {
        info!("Launching local headless browser");

        let config = BrowserConfig::builder()
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .build()
            .map_err(|e| MirageError::Render(format!("invalid browser config: {}", e)))?;

        let (browser, handler) = Browser::launch(config).await.map_err(cdp_error)?;
        drive(handler, liveness);

        Ok(browser)
    }

    async fn connect(url: &str, liveness: Liveness) -> Result<Browser> {
        let ws_url = if url.starts_with("ws://") || url.starts_with("wss://") {
            url.to_string()
        } else {
            Self::discover_ws_url(url).await?
        };

        info!("Connecting to remote browser at {}", ws_url);

        let (browser, handler) = Browser::connect(ws_url).await.map_err(cdp_error)?;
        drive(handler, liveness);

        Ok(browser)
    }

    /// Resolve the debugger WebSocket URL from `/json/version`
    async fn discover_ws_url(http_url: &str) -> Result<String> {
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let info: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| MirageError::Render(format!("renderer discovery failed: {}", e)))?
            .json()
            .await
            .map_err(|e| MirageError::Render(format!("renderer discovery failed: {}", e)))?;

        info.get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| MirageError::Render("no webSocketDebuggerUrl in /json/version".into()))
    }
}

#[async_trait]
impl Renderer for CdpRenderer {
    async fn open_session(&self) -> Result<Box<dyn RenderSession>> {
        let browser = self.browser().await?;
        let opened = browser.lock().await.new_page("about:blank").await;

        match opened {
            Ok(page) => Ok(Box::new(CdpSession { page })),
            Err(e) => {
                // A browser that cannot open tabs is not worth keeping.
                self.browser.reset().await;
                Err(cdp_error(e))
            }
        }
    }
}

/// Pump CDP events until the connection closes. Individual event errors
/// (including messages this client does not recognize) are not fatal.
fn drive(mut handler: Handler, liveness: Liveness) {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                debug!("Browser event error: {}", e);
            }
        }
        liveness.mark_dead();
        warn!("Browser connection closed");
    });
}

struct CdpSession {
    page: Page,
}

#[async_trait]
impl RenderSession for CdpSession {
    async fn set_headers(&self, headers: &HeaderSet) -> Result<()> {
        self.page
            .execute(SetUserAgentOverrideParams::new(headers.user_agent.clone()))
            .await
            .map_err(cdp_error)?;

        let extra: serde_json::Map<String, serde_json::Value> = headers
            .extra
            .iter()
            .map(|(name, value)| (name.clone(), serde_json::Value::String(value.clone())))
            .collect();

        self.page
            .execute(SetExtraHttpHeadersParams::new(Headers::new(
                serde_json::Value::Object(extra),
            )))
            .await
            .map_err(cdp_error)?;

        Ok(())
    }

    async fn set_cookies(&self, cookies: &[CookieRecord]) -> Result<()> {
        let mut params = Vec::with_capacity(cookies.len());
        for cookie in cookies {
            match cookie_param(cookie) {
                Ok(param) => params.push(param),
                Err(e) => warn!(name = %cookie.name, "Skipping unbuildable cookie: {}", e),
            }
        }

        self.page.set_cookies(params).await.map_err(cdp_error)?;
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<CookieRecord>> {
        let cookies = self.page.get_cookies().await.map_err(cdp_error)?;
        Ok(cookies
            .into_iter()
            .map(|c| CookieRecord {
                expires: (!c.session).then_some(c.expires),
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                secure: c.secure,
                http_only: c.http_only,
            })
            .collect())
    }

    async fn navigate(&self, url: &Url) -> Result<()> {
        let params = NavigateParams::builder()
            .url(url.as_str())
            .build()
            .map_err(|e| MirageError::Fetch(format!("invalid navigation: {}", e)))?;

        let response = self.page.execute(params).await.map_err(cdp_error)?;
        if let Some(error) = response.result.error_text.clone() {
            return Err(MirageError::Fetch(format!("navigation to {} failed: {}", url, error)));
        }

        let state: String = self
            .page
            .evaluate(DOM_READY_SCRIPT)
            .await
            .map_err(cdp_error)?
            .into_value()
            .unwrap_or_else(|_| "unknown".to_string());
        debug!(url = %url, state = %state, "Document ready");

        Ok(())
    }

    async fn wait_for_network_idle(&self) -> Result<()> {
        self.page
            .evaluate(NETWORK_IDLE_SCRIPT)
            .await
            .map_err(cdp_error)?;
        Ok(())
    }

    async fn content(&self) -> Result<String> {
        let content_type = self.content_type().await?;
        if ContentKind::from_mime(&content_type) == ContentKind::Html {
            return self.page.content().await.map_err(cdp_error);
        }

        // Chromium wraps plain-text documents in a <pre>; read the text back out.
        self.page
            .evaluate(TEXT_CONTENT_SCRIPT)
            .await
            .map_err(cdp_error)?
            .into_value::<String>()
            .map_err(cdp_error)
    }

    async fn content_type(&self) -> Result<String> {
        self.page
            .evaluate("document.contentType")
            .await
            .map_err(cdp_error)?
            .into_value::<String>()
            .map_err(cdp_error)
    }

    async fn current_url(&self) -> Result<String> {
        self.page
            .url()
            .await
            .map_err(cdp_error)?
            .ok_or_else(|| MirageError::Render("page has no URL".into()))
    }

    async fn close(&self) -> Result<()> {
        self.page.clone().close().await.map_err(cdp_error)
    }
}

/// Persistent cookies keep their expiry; session cookies stay session-only.
fn cookie_param(cookie: &CookieRecord) -> std::result::Result<CookieParam, String> {
    let mut builder = CookieParam::builder()
        .name(cookie.name.clone())
        .value(cookie.value.clone())
        .domain(cookie.domain.clone())
        .path(cookie.path.clone())
        .secure(cookie.secure)
        .http_only(cookie.http_only);
    if let Some(expires) = cookie.expires {
        builder = builder.expires(TimeSinceEpoch::new(expires));
    }
    builder.build()
}

fn cdp_error(err: impl std::fmt::Display) -> MirageError {
    MirageError::Render(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::stub::cookie;

    #[test]
    fn test_persistent_cookie_keeps_expiry() {
        let record = CookieRecord {
            expires: Some(1_900_000_000.0),
            ..cookie("cf_clearance", "token", ".example.com")
        };

        let param = cookie_param(&record).unwrap();
        assert_eq!(param.name, "cf_clearance");
        assert_eq!(param.domain.as_deref(), Some(".example.com"));
        assert_eq!(param.expires, Some(TimeSinceEpoch::new(1_900_000_000.0)));
    }

    #[test]
    fn test_session_cookie_has_no_expiry() {
        let param = cookie_param(&cookie("sid", "abc", "example.com")).unwrap();
        assert_eq!(param.expires, None);
        assert_eq!(param.secure, Some(true));
    }
}

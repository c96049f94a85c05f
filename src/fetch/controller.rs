//! Page fetch controller
//!
//! Drives one rendering session per attempt through headers, cookies,
//! navigation, settling and (when needed) a challenge wait. Failed attempts
//! are closed and retried after an exponential backoff until the attempt
//! budget runs out.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OwnedSemaphorePermit;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use super::challenge;
use super::pool::SessionPool;
use crate::config::FetchConfig;
use crate::error::{MirageError, Result};
use crate::render::{HeaderSet, RenderSession, Renderer};
use crate::store::CookieJar;

const DEFAULT_CONTENT_TYPE: &str = "text/html";

/// Steps of a single fetch, logged as they happen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Starting,
    HeadersApplied,
    CookiesApplied,
    Navigated,
    ChallengeCheck,
    ChallengeWait,
    Settled,
    CookiesSaved,
    Success,
    Failed(u32),
    BackoffWait,
    Exhausted,
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchState::Starting => write!(f, "starting"),
            FetchState::HeadersApplied => write!(f, "headers_applied"),
            FetchState::CookiesApplied => write!(f, "cookies_applied"),
            FetchState::Navigated => write!(f, "navigated"),
            FetchState::ChallengeCheck => write!(f, "challenge_check"),
            FetchState::ChallengeWait => write!(f, "challenge_wait"),
            FetchState::Settled => write!(f, "settled"),
            FetchState::CookiesSaved => write!(f, "cookies_saved"),
            FetchState::Success => write!(f, "success"),
            FetchState::Failed(attempt) => write!(f, "failed({})", attempt),
            FetchState::BackoffWait => write!(f, "backoff_wait"),
            FetchState::Exhausted => write!(f, "exhausted"),
        }
    }
}

fn transition(attempt: u32, state: FetchState) {
    debug!(attempt = attempt, state = %state, "Fetch state");
}

/// Closes the session when dropped without an explicit `close`
struct SessionGuard {
    session: Arc<dyn RenderSession>,
    closed: bool,
}

impl SessionGuard {
    fn new(session: Box<dyn RenderSession>) -> Self {
        Self {
            session: Arc::from(session),
            closed: false,
        }
    }

    fn session(&self) -> &dyn RenderSession {
        self.session.as_ref()
    }

    async fn close(mut self) {
        self.closed = true;
        if let Err(e) = self.session.close().await {
            debug!("Session close failed: {}", e);
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        let session = self.session.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = session.close().await {
                    debug!("Abandoned session close failed: {}", e);
                }
            });
        }
    }
}

/// A successfully loaded page, still open in its rendering session
///
/// Holds a session pool slot until closed or dropped.
pub struct LoadedPage {
    session: SessionGuard,
    /// URL of the document after redirects
    pub final_url: Url,
    /// Attempts it took, 1-based
    pub attempts: u32,
    _permit: OwnedSemaphorePermit,
}

impl LoadedPage {
    pub async fn content(&self) -> Result<String> {
        self.session.session().content().await
    }

    /// Reported media type, `text/html` when the renderer cannot say
    pub async fn content_type(&self) -> String {
        match self.session.session().content_type().await {
            Ok(content_type) if !content_type.trim().is_empty() => content_type,
            Ok(_) => DEFAULT_CONTENT_TYPE.to_string(),
            Err(e) => {
                debug!("Content type unavailable, assuming HTML: {}", e);
                DEFAULT_CONTENT_TYPE.to_string()
            }
        }
    }

    pub async fn close(self) {
        self.session.close().await;
    }
}

/// Fetches pages through the rendering engine with bounded retries
pub struct FetchController {
    renderer: Arc<dyn Renderer>,
    cookies: Arc<CookieJar>,
    pool: SessionPool,
    config: FetchConfig,
}

impl FetchController {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        cookies: Arc<CookieJar>,
        pool: SessionPool,
        config: FetchConfig,
    ) -> Self {
        Self {
            renderer,
            cookies,
            pool,
            config,
        }
    }

    pub fn pool(&self) -> &SessionPool {
        &self.pool
    }

    /// Load `url` in a fresh session, retrying failed attempts
    #[instrument(skip(self, url), fields(fetch_id = %Uuid::new_v4(), url = %url))]
    pub async fn fetch(&self, url: &Url) -> Result<LoadedPage> {
        match self.config.deadline() {
            Some(limit) => timeout(limit, self.run(url)).await.map_err(|_| {
                warn!("Fetch abandoned after {:?}", limit);
                MirageError::DeadlineExceeded {
                    secs: limit.as_secs(),
                }
            })?,
            None => self.run(url).await,
        }
    }

    async fn run(&self, url: &Url) -> Result<LoadedPage> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            transition(attempt, FetchState::Starting);

            match self.attempt(url, attempt).await {
                Ok((session, permit, final_url)) => {
                    transition(attempt, FetchState::Success);
                    info!(attempt = attempt, final_url = %final_url, "Page loaded");
                    return Ok(LoadedPage {
                        session,
                        final_url,
                        attempts: attempt,
                        _permit: permit,
                    });
                }
                // Backpressure is not a page failure.
                Err(e @ MirageError::Overloaded { .. }) => return Err(e),
                Err(e) => {
                    transition(attempt, FetchState::Failed(attempt));
                    warn!(attempt = attempt, url = %url, error = %e, "Fetch attempt failed");

                    if attempt >= max_attempts {
                        transition(attempt, FetchState::Exhausted);
                        return Err(MirageError::FetchExhausted {
                            attempts: attempt,
                            message: e.to_string(),
                        });
                    }

                    let delay = self.backoff_for(attempt);
                    transition(attempt, FetchState::BackoffWait);
                    debug!(attempt = attempt, "Retrying in {:?}", delay);
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(
        &self,
        url: &Url,
        attempt: u32,
    ) -> Result<(SessionGuard, OwnedSemaphorePermit, Url)> {
        let permit = self.pool.acquire().await?;
        let session = SessionGuard::new(self.renderer.open_session().await?);

        match self.drive(session.session(), url, attempt).await {
            Ok(final_url) => Ok((session, permit, final_url)),
            Err(e) => {
                session.close().await;
                Err(e)
            }
        }
    }

    async fn drive(&self, session: &dyn RenderSession, url: &Url, attempt: u32) -> Result<Url> {
        session.set_headers(&HeaderSet::browser_like()).await?;
        transition(attempt, FetchState::HeadersApplied);

        self.cookies.apply(session, url).await?;
        transition(attempt, FetchState::CookiesApplied);

        let navigation_timeout = Duration::from_secs(self.config.navigation_timeout);
        timeout(navigation_timeout, session.navigate(url))
            .await
            .map_err(|_| {
                MirageError::Fetch(format!(
                    "navigation to {} timed out after {}s",
                    url, self.config.navigation_timeout
                ))
            })??;
        transition(attempt, FetchState::Navigated);

        settle(session, Duration::from_secs(self.config.idle_timeout)).await;

        transition(attempt, FetchState::ChallengeCheck);
        let content = session.content().await?;
        if challenge::is_challenge(&content) {
            transition(attempt, FetchState::ChallengeWait);
            info!(
                attempt = attempt,
                "Challenge page detected, waiting {}s", self.config.challenge_delay
            );
            sleep(Duration::from_secs(self.config.challenge_delay)).await;
            settle(
                session,
                Duration::from_secs(self.config.challenge_idle_timeout),
            )
            .await;
        }
        transition(attempt, FetchState::Settled);

        let final_url = final_url(session, url).await;
        if let Err(e) = self.cookies.save(session, &final_url).await {
            warn!(url = %final_url, "Failed to save cookies: {}", e);
        }
        transition(attempt, FetchState::CookiesSaved);

        Ok(final_url)
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.config.backoff().saturating_mul(factor)
    }
}

// Network-idle is best effort; a page that never settles is still usable.
async fn settle(session: &dyn RenderSession, limit: Duration) {
    match timeout(limit, session.wait_for_network_idle()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("Network idle wait failed: {}", e),
        Err(_) => debug!("Network did not go idle within {:?}", limit),
    }
}

/// Post-redirect URL, falling back to the requested one
async fn final_url(session: &dyn RenderSession, requested: &Url) -> Url {
    session
        .current_url()
        .await
        .ok()
        .and_then(|raw| Url::parse(&raw).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or_else(|| requested.clone())
}

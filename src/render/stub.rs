//! Scripted in-memory renderer for tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use url::Url;

use super::{CookieRecord, HeaderSet, RenderSession, Renderer};
use crate::error::{MirageError, Result};

/// How one scripted session behaves
#[derive(Debug, Clone)]
pub struct SessionScript {
    pub fail_navigation: Option<String>,
    pub hang_network_idle: bool,
    pub content: String,
    pub content_type: String,
    /// `None` reports the navigated URL
    pub final_url: Option<String>,
    pub cookies: Vec<CookieRecord>,
}

impl SessionScript {
    pub fn html(content: &str) -> Self {
        Self {
            fail_navigation: None,
            hang_network_idle: false,
            content: content.to_string(),
            content_type: "text/html".to_string(),
            final_url: None,
            cookies: Vec::new(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_navigation: Some(message.to_string()),
            ..Self::html("")
        }
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.to_string();
        self
    }

    pub fn with_final_url(mut self, url: &str) -> Self {
        self.final_url = Some(url.to_string());
        self
    }

    pub fn with_cookies(mut self, cookies: Vec<CookieRecord>) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn hanging_idle(mut self) -> Self {
        self.hang_network_idle = true;
        self
    }
}

/// Everything the stub sessions observed
#[derive(Debug, Default)]
pub struct Journal {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub navigations: Mutex<Vec<String>>,
    /// When each navigation started, in order
    pub navigated_at: Mutex<Vec<Instant>>,
    pub headers: Mutex<Vec<HeaderSet>>,
    pub injected_cookies: Mutex<Vec<Vec<CookieRecord>>>,
    pub idle_waits: AtomicUsize,
}

/// Renderer that plays back scripts in order; the last one repeats.
pub struct StubRenderer {
    scripts: Mutex<VecDeque<SessionScript>>,
    pub journal: Arc<Journal>,
}

impl StubRenderer {
    pub fn new(scripts: Vec<SessionScript>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            journal: Arc::new(Journal::default()),
        }
    }

    pub fn serving(html: &str) -> Self {
        Self::new(vec![SessionScript::html(html)])
    }

    pub fn opened(&self) -> usize {
        self.journal.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.journal.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renderer for StubRenderer {
    async fn open_session(&self) -> Result<Box<dyn RenderSession>> {
        let script = {
            let mut scripts = self.scripts.lock();
            if scripts.len() > 1 {
                scripts.pop_front()
            } else {
                scripts.front().cloned()
            }
        }
        .ok_or_else(|| MirageError::Render("no scripted session".into()))?;

        self.journal.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubSession {
            script,
            journal: self.journal.clone(),
            navigated: Mutex::new(None),
        }))
    }
}

struct StubSession {
    script: SessionScript,
    journal: Arc<Journal>,
    navigated: Mutex<Option<String>>,
}

#[async_trait]
impl RenderSession for StubSession {
    async fn set_headers(&self, headers: &HeaderSet) -> Result<()> {
        self.journal.headers.lock().push(headers.clone());
        Ok(())
    }

    async fn set_cookies(&self, cookies: &[CookieRecord]) -> Result<()> {
        self.journal.injected_cookies.lock().push(cookies.to_vec());
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<CookieRecord>> {
        Ok(self.script.cookies.clone())
    }

    async fn navigate(&self, url: &Url) -> Result<()> {
        self.journal.navigations.lock().push(url.to_string());
        self.journal.navigated_at.lock().push(Instant::now());
        if let Some(message) = &self.script.fail_navigation {
            return Err(MirageError::Fetch(message.clone()));
        }
        *self.navigated.lock() = Some(url.to_string());
        Ok(())
    }

    async fn wait_for_network_idle(&self) -> Result<()> {
        self.journal.idle_waits.fetch_add(1, Ordering::SeqCst);
        if self.script.hang_network_idle {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn content(&self) -> Result<String> {
        Ok(self.script.content.clone())
    }

    async fn content_type(&self) -> Result<String> {
        Ok(self.script.content_type.clone())
    }

    async fn current_url(&self) -> Result<String> {
        self.script
            .final_url
            .clone()
            .or_else(|| self.navigated.lock().clone())
            .ok_or_else(|| MirageError::Render("session never navigated".into()))
    }

    async fn close(&self) -> Result<()> {
        self.journal.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn cookie(name: &str, value: &str, domain: &str) -> CookieRecord {
    CookieRecord {
        name: name.to_string(),
        value: value.to_string(),
        domain: domain.to_string(),
        path: "/".to_string(),
        secure: true,
        http_only: false,
        expires: None,
    }
}

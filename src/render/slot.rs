//! Restartable holder for the long-lived browser connection

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;

use crate::error::Result;

/// Shared flag the connection's event loop clears when it exits
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn mark_dead(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Lazily started value that is started again once its liveness flag drops
pub struct BrowserSlot<T> {
    current: Mutex<Option<(Arc<T>, Liveness)>>,
}

impl<T> BrowserSlot<T> {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    /// Return the live value, starting a new one if there is none or the
    /// previous one has died. Concurrent callers wait for a single start.
    pub async fn get_or_start<F, Fut>(&self, start: F) -> Result<Arc<T>>
    where
        F: FnOnce(Liveness) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut current = self.current.lock().await;

        if let Some((value, liveness)) = current.as_ref() {
            if liveness.is_alive() {
                return Ok(value.clone());
            }
            warn!("Browser connection was lost, starting a new one");
        }

        let liveness = Liveness::new();
        let value = Arc::new(start(liveness.clone()).await?);
        *current = Some((value.clone(), liveness));
        Ok(value)
    }

    /// Drop the current value so the next call starts a fresh one
    pub async fn reset(&self) {
        self.current.lock().await.take();
    }
}

impl<T> Default for BrowserSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

//! Admission control for rendering sessions

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::warn;

use crate::error::{MirageError, Result};

/// Bounded pool of session slots
///
/// Callers beyond the limit queue for up to `queue_timeout`, then get
/// `Overloaded`.
#[derive(Debug, Clone)]
pub struct SessionPool {
    slots: Arc<Semaphore>,
    capacity: usize,
    queue_timeout: Duration,
}

impl SessionPool {
    pub fn new(capacity: usize, queue_timeout: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
            queue_timeout,
        }
    }

    /// Wait for a free slot; the slot is held until the permit drops
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        match tokio::time::timeout(self.queue_timeout, self.slots.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(MirageError::Internal("session pool closed".into())),
            Err(_) => {
                warn!(
                    capacity = self.capacity,
                    "No rendering session freed within {:?}", self.queue_timeout
                );
                Err(MirageError::Overloaded {
                    secs: self.queue_timeout.as_secs(),
                })
            }
        }
    }

    /// Free slots right now
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

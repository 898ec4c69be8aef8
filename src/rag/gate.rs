//! Admission control for generation.
//!
//! The model server handles one completion at a time, so generations queue
//! behind a semaphore. The queue is bounded: once `max_pending` requests are
//! waiting, new ones are rejected instead of piling up.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use super::error::RagError;

pub struct GenerationGate {
    permits: Arc<Semaphore>,
    waiting: Arc<AtomicUsize>,
    max_pending: usize,
    timeout: Duration,
}

struct WaitingGuard(Arc<AtomicUsize>);

impl Drop for WaitingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl GenerationGate {
    pub fn new(max_concurrent: usize, max_pending: usize, timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            waiting: Arc::new(AtomicUsize::new(0)),
            max_pending,
            timeout,
        }
    }

    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    async fn admit(&self) -> Result<OwnedSemaphorePermit, RagError> {
        match self.permits.clone().try_acquire_owned() {
            Ok(permit) => return Ok(permit),
            Err(TryAcquireError::Closed) => {
                return Err(RagError::Generation("generation gate closed".to_string()))
            }
            Err(TryAcquireError::NoPermits) => {}
        }

        let previously_waiting = self.waiting.fetch_add(1, Ordering::SeqCst);
        let _guard = WaitingGuard(self.waiting.clone());
        if previously_waiting >= self.max_pending {
            tracing::warn!(
                "Rejecting generation request: {} already waiting",
                previously_waiting
            );
            return Err(RagError::Overloaded(previously_waiting));
        }

        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(RagError::generation)
    }

    /// Runs `work` once a slot is free, bounded by the configured timeout.
    pub async fn run<F, T>(&self, work: F) -> Result<T, RagError>
    where
        F: Future<Output = Result<T, RagError>>,
    {
        let _permit = self.admit().await?;
        match tokio::time::timeout(self.timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(RagError::Timeout(self.timeout)),
        }
    }
}

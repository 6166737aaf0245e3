//! Concurrency gate bounding how many members are extracted at once.

use crate::error::ExtractError;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// Hands out at most `limit` slots at a time. A limit of 0 means unlimited.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Option<Arc<Semaphore>>,
    limit: usize,
}

/// A slot held by one member task; dropping it returns the slot.
#[derive(Debug)]
pub struct GatePermit {
    _permit: Option<OwnedSemaphorePermit>,
}

impl ConcurrencyGate {
    /// Create a gate with `limit` slots (0 = unlimited).
    pub fn new(limit: usize) -> Self {
        let semaphore = (limit > 0).then(|| {
            let permits = limit.min(Semaphore::MAX_PERMITS);
            Arc::new(Semaphore::new(permits))
        });
        Self { semaphore, limit }
    }

    /// Configured limit (0 = unlimited).
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of slots currently free, or `None` when unlimited.
    pub fn available(&self) -> Option<usize> {
        self.semaphore.as_ref().map(|s| s.available_permits())
    }

    /// Wait for a free slot.
    ///
    /// Fails with [`ExtractError::Cancelled`] if `cancel` fires first, or if it
    /// has already fired, even when a slot is free. This holds for an
    /// unlimited gate too: it never waits, but an already-cancelled token
    /// still refuses, so a cancelled run admits nothing whatever the limit.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<GatePermit, ExtractError> {
        if cancel.is_cancelled() {
            return Err(ExtractError::Cancelled);
        }
        let Some(semaphore) = &self.semaphore else {
            return Ok(GatePermit { _permit: None });
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ExtractError::Cancelled),
            permit = semaphore.clone().acquire_owned() => {
                // the semaphore is never closed
                let permit = permit.map_err(|_| ExtractError::Cancelled)?;
                Ok(GatePermit { _permit: Some(permit) })
            }
        }
    }
}

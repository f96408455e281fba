//! Job slot accounting.
//!
//! Bounds how many scan jobs run concurrently across the process. A slot is
//! an RAII guard over a semaphore permit, so a held slot is always returned
//! whatever exit path the holder takes.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

/// Fixed-size pool of scan job slots.
#[derive(Debug)]
pub struct JobSlots {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// A held slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct JobSlot {
    _permit: OwnedSemaphorePermit,
}

/// Errors from slot acquisition.
#[derive(Debug, PartialEq, Eq)]
pub enum SlotError {
    /// The pool is closed and admits no new scans.
    Closed,
    /// Every slot is in use right now (`try_acquire` only).
    Exhausted,
}

impl std::fmt::Display for SlotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotError::Closed => f.write_str("job slot pool is closed"),
            SlotError::Exhausted => f.write_str("all job slots are in use"),
        }
    }
}

impl std::error::Error for SlotError {}

impl JobSlots {
    /// Create a pool with the given capacity (at least one slot).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently held.
    pub fn active(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    /// Acquire a slot, waiting until one frees up. Fails only once the pool
    /// is closed.
    pub async fn acquire(&self) -> Result<JobSlot, SlotError> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map(|permit| JobSlot { _permit: permit })
            .map_err(|_| SlotError::Closed)
    }

    /// Acquire a slot without waiting.
    pub fn try_acquire(&self) -> Result<JobSlot, SlotError> {
        match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => Ok(JobSlot { _permit: permit }),
            Err(TryAcquireError::Closed) => Err(SlotError::Closed),
            Err(TryAcquireError::NoPermits) => Err(SlotError::Exhausted),
        }
    }

    /// Stop admitting new scans. Held slots drain normally.
    pub fn close(&self) {
        self.semaphore.close();
    }
}

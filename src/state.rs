//! Shared state for one running scan job.
//!
//! One `ScanContext` per job, shared between the scan engine and its
//! watchdog. The engine feeds heartbeats in, callers may request a stop,
//! and the watchdog alone declares a job dead from inactivity.

use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

// Terminal flags live in a single cell so the first writer wins and a job
// can never be both stopped and aborted.
const RUNNING: u8 = 0;
const STOPPED: u8 = 1;
const ABORTED: u8 = 2;

/// Mutable state a scan job and its watchdog agree on.
#[derive(Debug)]
pub struct ScanContext {
    scan_id: String,
    activity: Notify,
    outcome: AtomicU8,
    cancellation: CancellationToken,
}

impl ScanContext {
    /// Create state for a new job. The cancellation token is inherited from
    /// the caller's scope and may fire independently of any stop request.
    pub fn new(scan_id: impl Into<String>, cancellation: CancellationToken) -> Self {
        Self {
            scan_id: scan_id.into(),
            activity: Notify::new(),
            outcome: AtomicU8::new(RUNNING),
            cancellation,
        }
    }

    /// Identifier assigned at creation; the join key between heartbeats,
    /// log records, and external consumers.
    pub fn scan_id(&self) -> &str {
        &self.scan_id
    }

    /// Signal that the job made progress. Only arrival matters; rapid
    /// heartbeats coalesce.
    pub fn heartbeat(&self) {
        self.activity.notify_one();
    }

    /// Wait for the next heartbeat. A heartbeat that arrived while nobody
    /// was waiting is not lost; the next call returns immediately.
    pub async fn heartbeat_received(&self) {
        self.activity.notified().await;
    }

    /// Request cooperative cancellation. Returns `false` if the job already
    /// carries a terminal flag; the stop is observed on the watchdog's next
    /// tick, so latency is bounded by the tick period.
    pub fn request_stop(&self) -> bool {
        self.outcome
            .compare_exchange(RUNNING, STOPPED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Declare the job dead from inactivity. Watchdog-only; loses to an
    /// earlier stop request.
    pub(crate) fn mark_aborted(&self) -> bool {
        self.outcome
            .compare_exchange(RUNNING, ABORTED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// True once a stop was requested.
    pub fn is_stopped(&self) -> bool {
        self.outcome.load(Ordering::Acquire) == STOPPED
    }

    /// True once the watchdog declared the job dead.
    pub fn is_aborted(&self) -> bool {
        self.outcome.load(Ordering::Acquire) == ABORTED
    }

    /// Token cancelled by an ancestor scope (e.g. process shutdown).
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

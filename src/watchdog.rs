//! Liveness watchdog for scan jobs.
//!
//! One watchdog task per job. It multiplexes the completion channel, the
//! cancellation token, the heartbeat signal, and a one-second ticker;
//! classifies the job's terminal outcome; and writes exactly one terminal
//! record to the status log before its job slot frees.

use crate::session::Session;
use crate::state::ScanContext;
use crate::status::{ScanStatus, StatusRecord};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Cadence of the liveness check and of `IN_PROGRESS` pulses. Stop and
/// timeout detection latency are both bounded by one tick.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Failure captured by the watchdog while supervising a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanJobError {
    /// No heartbeat within the inactivity threshold.
    Inactive,
    /// The parent cancellation token fired before the job finished.
    Shutdown,
    /// The scan engine reported a failure of its own.
    Engine { message: String },
}

impl std::fmt::Display for ScanJobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanJobError::Inactive => f.write_str("Scan job aborted due to inactivity"),
            ScanJobError::Shutdown => f.write_str("Scan interrupted by shutdown"),
            ScanJobError::Engine { message } => f.write_str(message),
        }
    }
}

impl std::error::Error for ScanJobError {}

/// Caller-side handle to a running watchdog.
///
/// `complete` and `fail` feed the completion channel; dropping the handle
/// without calling either leaves the watchdog to end the job through its
/// stop, cancellation, or inactivity paths.
#[derive(Debug)]
pub struct WatchdogHandle {
    completion: Option<oneshot::Sender<Result<(), ScanJobError>>>,
    task: JoinHandle<()>,
}

impl WatchdogHandle {
    /// Announce successful completion; the watchdog writes `COMPLETE` and
    /// exits. No effect after the first completion signal.
    pub fn complete(&mut self) {
        if let Some(tx) = self.completion.take() {
            let _ = tx.send(Ok(()));
        }
    }

    /// Report a failure from the scan engine; the watchdog writes `ERROR`
    /// with this message and exits.
    pub fn fail(&mut self, message: impl Into<String>) {
        if let Some(tx) = self.completion.take() {
            let _ = tx.send(Err(ScanJobError::Engine {
                message: message.into(),
            }));
        }
    }

    /// Wait for the watchdog task to finish.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Start supervising one scan job.
///
/// The spawned task acquires a job slot, then loops until the job completes,
/// is stopped by a user, is cancelled from above, or goes silent past the
/// session's inactivity threshold. Whichever terminal condition is observed
/// first wins; exactly one terminal record is written for the job's scan id,
/// and the slot is released on every exit path.
pub fn start(session: Arc<Session>, ctx: Arc<ScanContext>) -> WatchdogHandle {
    let (tx, rx) = oneshot::channel();
    let task = tokio::spawn(supervise(session, ctx, rx));
    WatchdogHandle {
        completion: Some(tx),
        task,
    }
}

async fn supervise(
    session: Arc<Session>,
    ctx: Arc<ScanContext>,
    mut completion: oneshot::Receiver<Result<(), ScanJobError>>,
) {
    let scan_id = ctx.scan_id().to_owned();

    let slot = match session.slots().acquire().await {
        Ok(slot) => slot,
        Err(e) => {
            tracing::error!(scan_id = %scan_id, error = %e, "could not acquire a job slot");
            let record =
                StatusRecord::new(&scan_id, ScanStatus::Error, format!("Scan not started: {e}"));
            if let Err(e) = session.status_log().append(&record) {
                tracing::warn!(scan_id = %scan_id, error = %e, "failed to write status record");
            }
            return;
        }
    };

    let threshold = session.inactivity_threshold();
    let start = Instant::now();
    let mut last_activity = start;
    let mut ticker = time::interval_at(start + TICK_INTERVAL, TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut error: Option<ScanJobError> = None;
    let mut completion_open = true;

    tracing::info!(
        scan_id = %scan_id,
        threshold_secs = threshold.as_secs(),
        "watchdog started"
    );

    loop {
        tokio::select! {
            // A completion signal outranks anything else that is ready.
            biased;

            res = &mut completion, if completion_open => match res {
                Ok(Ok(())) => break,
                Ok(Err(e)) => {
                    error = Some(e);
                    break;
                }
                // Handle dropped without a verdict; the stop flag, the
                // token, and the inactivity check still end the job.
                Err(_) => completion_open = false,
            },
            _ = ctx.cancellation().cancelled() => {
                error = Some(ScanJobError::Shutdown);
                break;
            }
            _ = ctx.heartbeat_received() => last_activity = Instant::now(),
            _ = ticker.tick() => {
                if ctx.is_stopped() {
                    tracing::info!(scan_id = %scan_id, "scan stopped by user");
                    break;
                }
                let idle = last_activity.elapsed();
                if idle > threshold {
                    ctx.mark_aborted();
                    error = Some(ScanJobError::Inactive);
                    tracing::warn!(
                        scan_id = %scan_id,
                        idle_secs = idle.as_secs(),
                        "scan aborted due to inactivity"
                    );
                    break;
                }
                let pulse = StatusRecord::new(&scan_id, ScanStatus::InProgress, "");
                if let Err(e) = session.status_log().append(&pulse) {
                    // Lost pulse; the next tick gets another chance.
                    tracing::warn!(scan_id = %scan_id, error = %e, "failed to write liveness pulse");
                }
            }
        }
    }

    // Classified once, stop request first: a user stop is a cancellation,
    // never an error, even when the timeout raced it.
    let record = if ctx.is_stopped() {
        StatusRecord::new(&scan_id, ScanStatus::Cancelled, "Scan stopped by user")
    } else if let Some(error) = error {
        StatusRecord::new(&scan_id, ScanStatus::Error, error.to_string())
    } else {
        StatusRecord::new(&scan_id, ScanStatus::Complete, "")
    };
    if let Err(e) = session.status_log().append(&record) {
        tracing::warn!(scan_id = %scan_id, error = %e, "failed to write terminal status record");
    }

    tracing::info!(scan_id = %scan_id, "watchdog stopped");
    // The terminal record is on disk (or given up on) before the slot frees.
    drop(slot);
}

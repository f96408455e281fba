use crate::config::ScanwardConfig;
use crate::slots::JobSlots;
use crate::status::StatusLog;
use std::sync::Arc;
use std::time::Duration;

/// Process-wide handle bundling configuration and shared services.
///
/// Built once at startup and passed explicitly to every watchdog; nothing
/// here is a global. Diagnostic logging rides on the `tracing` dispatcher
/// the binary installs, so the session carries no logger of its own.
#[derive(Debug)]
pub struct Session {
    config: ScanwardConfig,
    slots: Arc<JobSlots>,
    status_log: StatusLog,
}

impl Session {
    /// Build a session; the slot pool is sized from the scheduler config.
    pub fn new(config: ScanwardConfig, status_log: StatusLog) -> Self {
        let slots = Arc::new(JobSlots::new(config.scheduler.max_concurrent_scans));
        Self {
            config,
            slots,
            status_log,
        }
    }

    /// Full configuration.
    pub fn config(&self) -> &ScanwardConfig {
        &self.config
    }

    /// Maximum time a scan may go without a heartbeat.
    pub fn inactivity_threshold(&self) -> Duration {
        self.config.watchdog.inactivity_threshold()
    }

    /// The job slot pool shared by every watchdog in this session.
    pub fn slots(&self) -> &JobSlots {
        &self.slots
    }

    /// The status log every job in this session reports to.
    pub fn status_log(&self) -> &StatusLog {
        &self.status_log
    }
}

//! Liveness supervision for long-running scan jobs.
//!
//! Each job gets a watchdog task that tracks heartbeats from the scan
//! engine, enforces an inactivity timeout, reacts to stop requests and
//! parent-scope cancellation, and durably records the job's outcome in an
//! append-only, line-delimited status log that consumers poll.
//!
//! A typical embedding builds a [`session::Session`] once, creates one
//! [`state::ScanContext`] per job, and hands both to [`watchdog::start`].
//! The scan engine only ever touches the context (heartbeats, stop flag);
//! the watchdog alone writes the job's terminal status record.

pub mod config;
pub mod data_dir;
pub mod session;
pub mod slots;
pub mod state;
pub mod status;
pub mod watchdog;

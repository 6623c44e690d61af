//! Scheduler layer for the daemon
//!
//! This layer owns the per-job monitor tasks: the [`monitor`] state machine
//! that decides what one task does after each probe, and the [`supervisor`]
//! that starts, stops and reclaims tasks as the watch-list changes.

pub mod monitor;
pub mod supervisor;

pub use monitor::{JobMonitor, MonitorConfig, MonitorState, Step, Termination};
pub use supervisor::{ReconcileReport, Supervisor, SupervisorError};

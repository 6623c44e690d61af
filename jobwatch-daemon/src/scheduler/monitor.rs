//! Per-job monitor state machine
//!
//! The monitor decides, from one probe result at a time, whether its task
//! keeps polling (and how long to wait) or terminates. It does no I/O; the
//! supervisor's task loop drives it.

use jobwatch_core::domain::job::{BuildOutcome, JobId, ProbeResult};
use std::time::Duration;
use tracing::{debug, info};

use crate::notify::Notification;

/// Timing knobs shared by all monitor tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Wait after a `Building` probe
    pub poll_interval: Duration,
    /// Wait after a failed probe
    pub retry_interval: Duration,
    /// Bound on waiting for one task to exit during shutdown
    pub shutdown_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            retry_interval: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(2),
        }
    }
}

/// Lifecycle of one monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Running,
    Terminating,
    Terminated,
}

/// Why a monitor stopped on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Completed(BuildOutcome),
    NotFound,
}

impl Termination {
    /// Message the user receives for this termination
    pub fn notification(&self, job: &JobId) -> Notification {
        match self {
            Termination::Completed(outcome) => Notification::completed(job, *outcome),
            Termination::NotFound => Notification::not_found(job),
        }
    }
}

/// What the task loop does next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Wait this long, then probe again
    Wait(Duration),
    /// Notify, remove from the watch-list, and exit
    Finish(Termination),
}

/// State machine for one watched job
#[derive(Debug)]
pub struct JobMonitor {
    job: JobId,
    state: MonitorState,
    last_outcome: Option<BuildOutcome>,
    config: MonitorConfig,
}

impl JobMonitor {
    pub fn new(job: JobId, config: MonitorConfig) -> Self {
        Self {
            job,
            state: MonitorState::Running,
            last_outcome: None,
            config,
        }
    }

    /// Start from an outcome that was already notified for this job
    pub fn with_reported(mut self, outcome: Option<BuildOutcome>) -> Self {
        self.last_outcome = outcome;
        self
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Feed one probe result
    pub fn step(&mut self, result: ProbeResult) -> Step {
        match result {
            ProbeResult::Building => Step::Wait(self.config.poll_interval),
            ProbeResult::TransientError => {
                debug!(job = %self.job, "backing off after failed probe");
                Step::Wait(self.config.retry_interval)
            }
            ProbeResult::NotFound => {
                info!(job = %self.job, "job not found, terminating monitor");
                self.state = MonitorState::Terminating;
                Step::Finish(Termination::NotFound)
            }
            ProbeResult::Completed(outcome) if self.last_outcome == Some(outcome) => {
                Step::Wait(self.config.poll_interval)
            }
            ProbeResult::Completed(outcome) => {
                info!(job = %self.job, %outcome, "job finished");
                self.last_outcome = Some(outcome);
                self.state = MonitorState::Terminating;
                Step::Finish(Termination::Completed(outcome))
            }
        }
    }

    /// External stop request
    pub fn stop(&mut self) {
        if self.state == MonitorState::Running {
            self.state = MonitorState::Terminating;
        }
    }

    /// The task loop has exited
    pub fn mark_terminated(&mut self) {
        self.state = MonitorState::Terminated;
    }
}

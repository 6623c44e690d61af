//! Supervisor
//!
//! Owns the map from job to running monitor task. The map sits behind a single
//! async mutex, and every operation that touches the watch-list holds it:
//!
//! - [`Supervisor::reconcile`] reads the list and diffs it against the map
//! - a task that finished on its own removes its job from the list and its
//!   entry from the map
//! - [`Supervisor::close_if_idle`] decides the daemon has nothing left to do
//!
//! Because these happen under the same lock, a reconcile can never observe a
//! finished job still on the list after its task is gone, so completed jobs
//! are not restarted. Watch-list I/O runs on the blocking pool; a CLI holding
//! the file lock delays the lock holder, never the runtime threads.
//!
//! When a finished job cannot be dropped from the list, its termination is
//! remembered so the restarted task neither reports the same outcome again
//! nor sends a second notification.

use jobwatch_core::domain::job::{JobId, ProbeResult, RunState};
use jobwatch_core::domain::watchlist::WatchList;
use jobwatch_core::dto::control::JobEntry;
use jobwatch_storage::{StoreError, WatchListStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::monitor::{JobMonitor, MonitorConfig, Step, Termination};
use crate::notify::Notifier;
use crate::prober::StatusProber;

/// Errors from supervisor operations
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("daemon is shutting down")]
    ShuttingDown,

    #[error("failed to read the watch-list: {0}")]
    Load(#[from] JoinError),
}

/// Bookkeeping for one running task
struct TaskEntry {
    state: RunState,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    /// Distinguishes a restarted task from the one it replaced
    generation: u64,
    started_at: Instant,
    /// Written by the task after every probe
    last_check_failed: Arc<AtomicBool>,
}

#[derive(Default)]
struct Tasks {
    entries: HashMap<JobId, TaskEntry>,
    /// Terminations already notified for jobs the watch-list still holds
    reported: HashMap<JobId, Termination>,
}

struct Inner {
    store: Arc<dyn WatchListStore>,
    prober: Arc<dyn StatusProber>,
    notifier: Arc<dyn Notifier>,
    config: MonitorConfig,
    tasks: Mutex<Tasks>,
    next_generation: AtomicU64,
    shutting_down: AtomicBool,
}

/// What a spawned task needs besides the shared state
struct Task {
    job: JobId,
    monitor: JobMonitor,
    cancel: CancellationToken,
    generation: u64,
    last_check_failed: Arc<AtomicBool>,
}

/// Outcome of one reconciliation pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Jobs that got a new task
    pub started: Vec<JobId>,
    /// Jobs whose task was asked to stop
    pub stopped: Vec<JobId>,
    /// Size of the watch-list that was read
    pub watched: usize,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.started.is_empty() && self.stopped.is_empty()
    }
}

/// Runs one monitor task per watched job
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    pub fn new(
        store: Arc<dyn WatchListStore>,
        prober: Arc<dyn StatusProber>,
        notifier: Arc<dyn Notifier>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                prober,
                notifier,
                config,
                tasks: Mutex::new(Tasks::default()),
                next_generation: AtomicU64::new(0),
                shutting_down: AtomicBool::new(false),
            }),
        }
    }

    /// Bring running tasks in line with the persisted watch-list
    ///
    /// Starts a task for every listed job without an active one and stops
    /// every active task whose job is no longer listed. Fails with
    /// [`SupervisorError::ShuttingDown`] once the supervisor stopped taking
    /// work.
    pub async fn reconcile(&self) -> Result<ReconcileReport, SupervisorError> {
        let mut tasks = self.inner.tasks.lock().await;
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            return Err(SupervisorError::ShuttingDown);
        }

        let list = self.inner.load().await?;
        let mut report = ReconcileReport {
            watched: list.len(),
            ..Default::default()
        };

        for job in list.iter() {
            let active = tasks
                .entries
                .get(job)
                .is_some_and(|entry| entry.state == RunState::Active);
            if !active {
                self.spawn_locked(&mut tasks, job.clone());
                report.started.push(job.clone());
            }
        }

        for (job, entry) in tasks.entries.iter_mut() {
            if entry.state == RunState::Active && !list.contains(job) {
                entry.state = RunState::Stopping;
                entry.cancel.cancel();
                report.stopped.push(job.clone());
            }
        }

        tasks.reported.retain(|job, _| list.contains(job));

        if !report.is_noop() {
            info!(
                started = report.started.len(),
                stopped = report.stopped.len(),
                watched = report.watched,
                "reconciled watch-list"
            );
        }
        Ok(report)
    }

    /// Stop taking work if the watch-list is empty and no task is active
    ///
    /// Returns `true` when the supervisor is now closed; every later
    /// [`Supervisor::reconcile`] fails with [`SupervisorError::ShuttingDown`].
    pub async fn close_if_idle(&self) -> Result<bool, SupervisorError> {
        let tasks = self.inner.tasks.lock().await;
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            return Ok(true);
        }

        let list = self.inner.load().await?;
        let idle = list.is_empty()
            && tasks
                .entries
                .values()
                .all(|entry| entry.state != RunState::Active);
        if idle {
            self.inner.shutting_down.store(true, Ordering::SeqCst);
            debug!("watch-list empty, supervisor closed");
        }
        Ok(idle)
    }

    /// Ask one task to stop without touching the watch-list
    ///
    /// Returns `false` if no active task exists for `job`.
    pub async fn request_stop(&self, job: &JobId) -> bool {
        let mut tasks = self.inner.tasks.lock().await;
        match tasks.entries.get_mut(job) {
            Some(entry) if entry.state == RunState::Active => {
                entry.state = RunState::Stopping;
                entry.cancel.cancel();
                debug!(job = %job, "stop requested");
                true
            }
            _ => false,
        }
    }

    /// Stop every task, waiting a bounded time for each
    ///
    /// Tasks that do not exit within the per-task timeout are aborted. Safe to
    /// call more than once.
    pub async fn shutdown_all(&self) {
        let pending: Vec<(JobId, JoinHandle<()>)> = {
            let mut tasks = self.inner.tasks.lock().await;
            self.inner.shutting_down.store(true, Ordering::SeqCst);
            tasks
                .entries
                .iter_mut()
                .filter_map(|(job, entry)| {
                    entry.state = RunState::Stopping;
                    entry.cancel.cancel();
                    entry.handle.take().map(|handle| (job.clone(), handle))
                })
                .collect()
        };

        if !pending.is_empty() {
            info!(tasks = pending.len(), "stopping all monitor tasks");
        }

        for (job, mut handle) in pending {
            match tokio::time::timeout(self.inner.config.shutdown_timeout, &mut handle).await {
                Ok(Ok(())) => debug!(job = %job, "task stopped"),
                Ok(Err(e)) => warn!(job = %job, error = %e, "task ended abnormally"),
                Err(_) => {
                    warn!(job = %job, "task did not stop in time, aborting");
                    handle.abort();
                }
            }
        }

        self.inner.tasks.lock().await.entries.clear();
    }

    /// Current tasks, ordered by job
    pub async fn jobs(&self) -> Vec<JobEntry> {
        let tasks = self.inner.tasks.lock().await;
        let mut jobs: Vec<JobEntry> = tasks
            .entries
            .iter()
            .map(|(id, entry)| JobEntry {
                id: id.clone(),
                state: entry.state,
                monitored_secs: entry.started_at.elapsed().as_secs(),
                last_check_failed: entry.last_check_failed.load(Ordering::Relaxed),
            })
            .collect();
        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        jobs
    }

    pub async fn is_tracking(&self, job: &JobId) -> bool {
        self.inner.tasks.lock().await.entries.contains_key(job)
    }

    fn spawn_locked(&self, tasks: &mut Tasks, job: JobId) {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        let last_check_failed = Arc::new(AtomicBool::new(false));

        let reported = match tasks.reported.get(&job) {
            Some(Termination::Completed(outcome)) => Some(*outcome),
            _ => None,
        };
        let monitor = JobMonitor::new(job.clone(), self.inner.config).with_reported(reported);

        let handle = tokio::spawn(run_task(
            Arc::clone(&self.inner),
            Task {
                job: job.clone(),
                monitor,
                cancel: cancel.clone(),
                generation,
                last_check_failed: Arc::clone(&last_check_failed),
            },
        ));

        // Replacing a stopping entry detaches its task; the old task sees the
        // generation mismatch on exit and leaves the new entry alone.
        tasks.entries.insert(
            job,
            TaskEntry {
                state: RunState::Active,
                cancel,
                handle: Some(handle),
                generation,
                started_at: Instant::now(),
                last_check_failed,
            },
        );
    }
}

impl Inner {
    async fn load(&self) -> Result<WatchList, JoinError> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.load()).await
    }

    async fn remove(&self, job: &JobId) -> Result<bool, StoreError> {
        let store = Arc::clone(&self.store);
        let job = job.clone();
        tokio::task::spawn_blocking(move || store.remove(&job))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
    }

    /// Reclaim the task's slot; on self-termination also drop the job from
    /// the watch-list
    ///
    /// Returns `true` if the caller still owned the job and the termination
    /// has not been notified before.
    async fn finish(&self, job: &JobId, generation: u64, termination: Option<Termination>) -> bool {
        let mut tasks = self.tasks.lock().await;
        let owned = tasks
            .entries
            .get(job)
            .is_some_and(|entry| entry.generation == generation);
        if !owned {
            return false;
        }

        let Some(entry) = tasks.entries.remove(job) else {
            return false;
        };
        let Some(termination) = termination else {
            return false;
        };
        if entry.cancel.is_cancelled() {
            return false;
        }

        let already_reported = tasks.reported.get(job) == Some(&termination);
        match self.remove(job).await {
            Ok(_) => {
                tasks.reported.remove(job);
            }
            Err(e) => {
                error!(job = %job, error = %e, "failed to remove finished job from watch-list");
                tasks.reported.insert(job.clone(), termination);
            }
        }
        !already_reported
    }
}

async fn run_task(inner: Arc<Inner>, task: Task) {
    let Task {
        job,
        mut monitor,
        cancel,
        generation,
        last_check_failed,
    } = task;
    debug!(job = %job, "monitor started");

    let termination: Option<Termination> = loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => break None,
            result = inner.prober.probe(&job) => result,
        };
        last_check_failed.store(result == ProbeResult::TransientError, Ordering::Relaxed);

        match monitor.step(result) {
            Step::Wait(wait) => {
                tokio::select! {
                    _ = cancel.cancelled() => break None,
                    _ = tokio::time::sleep(wait) => {}
                }
            }
            Step::Finish(termination) => break Some(termination),
        }
    };

    if termination.is_none() {
        monitor.stop();
    }

    if inner.finish(&job, generation, termination).await {
        if let Some(termination) = termination {
            inner.notifier.notify(termination.notification(&job)).await;
        }
    }

    monitor.mark_terminated();
    debug!(job = %job, "monitor exited");
}

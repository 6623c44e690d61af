//! Desktop notifications
//!
//! Delivery is fire-and-forget: a failed notification is logged and never
//! affects the monitor that sent it.

use async_trait::async_trait;
use jobwatch_core::domain::job::{BuildOutcome, JobId};
use tracing::{debug, info, warn};

/// A user-facing message about one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Opened when the user acts on the notification
    pub link: Option<String>,
}

impl Notification {
    /// Build finished with `outcome`
    pub fn completed(job: &JobId, outcome: BuildOutcome) -> Self {
        let title = if outcome == BuildOutcome::Failure {
            "Jenkins Job Failed"
        } else {
            "Jenkins Job Completed"
        };
        Self {
            title: title.to_string(),
            body: format!("Job: {}\nStatus: {}", job.display_name(), outcome),
            link: Some(job.to_string()),
        }
    }

    /// Job no longer exists remotely
    pub fn not_found(job: &JobId) -> Self {
        Self {
            title: "Jenkins Job Not Found".to_string(),
            body: format!(
                "Job: {}\nURL returned 404. Removing from monitor.",
                job.display_name()
            ),
            link: Some(job.to_string()),
        }
    }
}

/// Sink for [`Notification`]s
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification);
}

/// Desktop notifications through the platform notification service
#[derive(Clone, Copy, Debug, Default)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn notify(&self, notification: Notification) {
        // show() blocks on some platforms; keep it off the runtime threads.
        tokio::task::spawn_blocking(move || {
            let Notification { title, body, link } = notification;
            let body = match link {
                Some(link) => format!("{}\n{}", body, link),
                None => body,
            };
            info!(%title, "sending desktop notification");
            match notify_rust::Notification::new()
                .appname("jobwatch")
                .summary(&title)
                .body(&body)
                .show()
            {
                Ok(_) => debug!(%title, "desktop notification sent"),
                Err(e) => warn!(%title, error = %e, "desktop notification failed"),
            }
        });
    }
}

#[cfg(test)]
mod fake {
    use super::{Notification, Notifier};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records every notification it receives
    #[derive(Clone, Default)]
    pub struct RecordingNotifier {
        calls: Arc<Mutex<Vec<Notification>>>,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<Notification> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, notification: Notification) {
            self.calls.lock().push(notification);
        }
    }
}

#[cfg(test)]
pub use fake::RecordingNotifier;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_text() {
        let job = JobId::new("https://ci.example.com/job/nightly/42/");
        let n = Notification::completed(&job, BuildOutcome::Success);
        assert_eq!(n.title, "Jenkins Job Completed");
        assert_eq!(n.body, "Job: nightly/42\nStatus: SUCCESS");
        assert_eq!(n.link.as_deref(), Some("https://ci.example.com/job/nightly/42/"));
    }

    #[test]
    fn test_failure_title() {
        let job = JobId::new("https://ci/job/a");
        assert_eq!(
            Notification::completed(&job, BuildOutcome::Failure).title,
            "Jenkins Job Failed"
        );
        assert_eq!(
            Notification::completed(&job, BuildOutcome::Aborted).title,
            "Jenkins Job Completed"
        );
    }

    #[test]
    fn test_not_found_text() {
        let n = Notification::not_found(&JobId::new("https://ci/job/gone"));
        assert_eq!(n.title, "Jenkins Job Not Found");
        assert_eq!(n.body, "Job: gone\nURL returned 404. Removing from monitor.");
    }
}

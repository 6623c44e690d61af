//! Status prober
//!
//! Turns one HTTP status request into a [`ProbeResult`]. Failures never escape
//! as errors: anything that is not a clear "job gone" becomes
//! [`ProbeResult::TransientError`] and is retried by the monitor.

use async_trait::async_trait;
use jobwatch_client::{BuildStatus, ClientError, JenkinsClient};
use jobwatch_core::domain::job::{BuildOutcome, JobId, ProbeResult};
use tracing::{debug, warn};

/// One status query per call
#[async_trait]
pub trait StatusProber: Send + Sync {
    async fn probe(&self, job: &JobId) -> ProbeResult;
}

/// [`StatusProber`] backed by the Jenkins JSON API
pub struct HttpStatusProber {
    client: JenkinsClient,
    client_errors_are_terminal: bool,
}

impl HttpStatusProber {
    pub fn new(client: JenkinsClient) -> Self {
        Self {
            client,
            client_errors_are_terminal: false,
        }
    }

    /// Map 4xx responses other than 429 to `NotFound` as well as 404
    pub fn with_client_errors_terminal(mut self, enabled: bool) -> Self {
        self.client_errors_are_terminal = enabled;
        self
    }
}

#[async_trait]
impl StatusProber for HttpStatusProber {
    async fn probe(&self, job: &JobId) -> ProbeResult {
        match self.client.get_job_status(job.as_str()).await {
            Ok(status) => {
                let result = classify(&status);
                debug!(job = %job, ?result, "probe succeeded");
                result
            }
            Err(e) => classify_error(job, &e, self.client_errors_are_terminal),
        }
    }
}

fn classify(status: &BuildStatus) -> ProbeResult {
    if status.building {
        ProbeResult::Building
    } else {
        ProbeResult::Completed(BuildOutcome::from_result(status.result.as_deref()))
    }
}

fn classify_error(
    job: &JobId,
    error: &ClientError,
    client_errors_are_terminal: bool,
) -> ProbeResult {
    if error.is_not_found() {
        return ProbeResult::NotFound;
    }
    if client_errors_are_terminal && error.is_client_error() && error.status() != Some(429) {
        warn!(job = %job, error = %error, "client error treated as job not found");
        return ProbeResult::NotFound;
    }
    warn!(job = %job, error = %error, "probe failed, will retry");
    ProbeResult::TransientError
}

//! Job status endpoint

use crate::JenkinsClient;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Subset of the Jenkins build JSON the monitor cares about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStatus {
    /// Whether a build is currently running
    #[serde(default)]
    pub building: bool,
    /// `SUCCESS`, `FAILURE`, ... once finished; `null` while building
    #[serde(default)]
    pub result: Option<String>,
    /// Build start time in epoch milliseconds
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl JenkinsClient {
    // =============================================================================
    // Job Status
    // =============================================================================

    /// Fetch the current status of a job
    ///
    /// # Arguments
    /// * `job_url` - The job (or build) URL, with or without a trailing slash
    ///
    /// # Returns
    /// The build status; a 404 surfaces as an error for which
    /// [`ClientError::is_not_found`](crate::ClientError::is_not_found) is true
    pub async fn get_job_status(&self, job_url: &str) -> Result<BuildStatus> {
        let url = status_url(job_url);
        debug!(url = %url, "requesting job status");

        let request = self.credentials.apply(self.client.get(&url));
        let response = request.send().await?;

        self.handle_response(response).await
    }
}

/// Builds the JSON API URL for a job
fn status_url(job_url: &str) -> String {
    format!(
        "{}/api/json?tree=building,result,timestamp",
        job_url.trim_end_matches('/')
    )
}

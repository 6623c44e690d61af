//! Job domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a watched job
///
/// An opaque string (the job URL). Equality is exact string match, so the
/// identifier is used verbatim as a map key and on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short human-readable name for notifications and logs
    ///
    /// Takes the part after the last `/job/` segment, e.g.
    /// `https://ci/job/team/job/build/42/` becomes `build/42`.
    pub fn display_name(&self) -> &str {
        let tail = match self.0.rfind("/job/") {
            Some(idx) => &self.0[idx + "/job/".len()..],
            None => self.0.as_str(),
        };
        let trimmed = tail.trim_end_matches('/');
        if trimmed.is_empty() { self.0.as_str() } else { trimmed }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Final result reported by a finished build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildOutcome {
    Success,
    Failure,
    Unstable,
    Aborted,
    Unknown,
}

impl BuildOutcome {
    /// Parses the remote `result` field
    ///
    /// Missing or unrecognised values (including `NOT_BUILT`) map to `Unknown`.
    pub fn from_result(result: Option<&str>) -> Self {
        match result.map(|r| r.trim().to_ascii_uppercase()).as_deref() {
            Some("SUCCESS") => BuildOutcome::Success,
            Some("FAILURE") => BuildOutcome::Failure,
            Some("UNSTABLE") => BuildOutcome::Unstable,
            Some("ABORTED") => BuildOutcome::Aborted,
            _ => BuildOutcome::Unknown,
        }
    }
}

impl fmt::Display for BuildOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildOutcome::Success => write!(f, "SUCCESS"),
            BuildOutcome::Failure => write!(f, "FAILURE"),
            BuildOutcome::Unstable => write!(f, "UNSTABLE"),
            BuildOutcome::Aborted => write!(f, "ABORTED"),
            BuildOutcome::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Result of a single status probe
///
/// Produced fresh on every probe and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// The remote reports a build in progress
    Building,
    /// The build has finished with the given outcome
    Completed(BuildOutcome),
    /// The job no longer exists on the remote
    NotFound,
    /// The probe failed in a way worth retrying
    TransientError,
}

/// Per-job run state tracked by the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Task is polling
    Active,
    /// Stop requested, task has not exited yet
    Stopping,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Active => write!(f, "active"),
            RunState::Stopping => write!(f, "stopping"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_nested_job() {
        let id = JobId::new("https://ci.example.com/job/team/job/build/42/");
        assert_eq!(id.display_name(), "build/42");
    }

    #[test]
    fn test_display_name_without_job_segment() {
        let id = JobId::new("https://ci.example.com/view/all");
        assert_eq!(id.display_name(), "https://ci.example.com/view/all");
    }

    #[test]
    fn test_display_name_trailing_job_segment() {
        let id = JobId::new("https://ci.example.com/job/");
        assert_eq!(id.display_name(), "https://ci.example.com/job/");
    }

    #[test]
    fn test_outcome_parsing() {
        assert_eq!(BuildOutcome::from_result(Some("SUCCESS")), BuildOutcome::Success);
        assert_eq!(BuildOutcome::from_result(Some("failure")), BuildOutcome::Failure);
        assert_eq!(BuildOutcome::from_result(Some("UNSTABLE")), BuildOutcome::Unstable);
        assert_eq!(BuildOutcome::from_result(Some("ABORTED")), BuildOutcome::Aborted);
        assert_eq!(BuildOutcome::from_result(Some("NOT_BUILT")), BuildOutcome::Unknown);
        assert_eq!(BuildOutcome::from_result(None), BuildOutcome::Unknown);
    }

    #[test]
    fn test_job_id_serializes_as_plain_string() {
        let id = JobId::new("https://ci/job/a");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"https://ci/job/a\"");
    }
}

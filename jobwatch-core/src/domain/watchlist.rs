//! Watch-list domain type

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::job::JobId;

/// Set of job identifiers currently being monitored
///
/// Serialized as `{"jobs": [...]}`. Backed by an ordered set so there are no
/// duplicates and the file contents are stable between writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchList {
    #[serde(default)]
    jobs: BTreeSet<JobId>,
}

impl WatchList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a job, returning `false` if it was already present
    pub fn insert(&mut self, id: JobId) -> bool {
        self.jobs.insert(id)
    }

    /// Removes a job, returning `false` if it was not present
    pub fn remove(&mut self, id: &JobId) -> bool {
        self.jobs.remove(id)
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.jobs.contains(id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &JobId> {
        self.jobs.iter()
    }
}

impl FromIterator<JobId> for WatchList {
    fn from_iter<I: IntoIterator<Item = JobId>>(iter: I) -> Self {
        Self {
            jobs: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_collapse_on_deserialize() {
        let list: WatchList =
            serde_json::from_str(r#"{"jobs": ["https://a", "https://b", "https://a"]}"#).unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_missing_jobs_field_is_empty() {
        let list: WatchList = serde_json::from_str("{}").unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn test_insert_reports_existing() {
        let mut list = WatchList::new();
        assert!(list.insert(JobId::new("https://a")));
        assert!(!list.insert(JobId::new("https://a")));
        assert_eq!(list.len(), 1);
    }
}

//! Single-flight registry of running rebuilds.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

/// A rebuild in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildJob {
    pub container_id: String,
    pub container_name: String,
    pub script: String,
    pub started_at: DateTime<Utc>,
}

/// At most one job per container id.
#[derive(Debug, Clone, Default)]
pub struct RebuildRegistry {
    jobs: Arc<Mutex<HashMap<String, RebuildJob>>>,
}

impl RebuildRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `job` unless its container already has one.
    ///
    /// On conflict the running job is returned and nothing changes.
    pub async fn try_begin(&self, job: RebuildJob) -> Result<(), RebuildJob> {
        let mut jobs = self.jobs.lock().await;
        if let Some(existing) = jobs.get(&job.container_id) {
            return Err(existing.clone());
        }
        jobs.insert(job.container_id.clone(), job);
        Ok(())
    }

    /// Remove the job for `container_id`, returning it if there was one.
    pub async fn finish(&self, container_id: &str) -> Option<RebuildJob> {
        self.jobs.lock().await.remove(container_id)
    }

    pub async fn is_running(&self, container_id: &str) -> bool {
        self.jobs.lock().await.contains_key(container_id)
    }

    pub async fn running_ids(&self) -> HashSet<String> {
        self.jobs.lock().await.keys().cloned().collect()
    }

    pub async fn jobs(&self) -> Vec<RebuildJob> {
        let mut jobs: Vec<RebuildJob> = self.jobs.lock().await.values().cloned().collect();
        jobs.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        jobs
    }
}

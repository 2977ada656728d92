//! Job-related models and DTOs

use crate::scheduler::{Job, JobId, JobState, Priority, QueueStats, StateSnapshot, SubmitOptions};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

/// Request to submit a new job
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobRequest {
    #[validate(length(min = 1, max = 256, message = "Job name must be between 1 and 256 characters"))]
    pub name: String,

    #[serde(default)]
    pub pipeline: serde_json::Value,

    #[serde(default)]
    pub input: serde_json::Value,

    #[serde(default)]
    #[validate(custom(function = "validate_priority"))]
    pub priority: Option<String>,

    #[serde(default)]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl SubmitJobRequest {
    /// Split into scheduler options. Call after `validate`.
    pub fn options(&self) -> Result<SubmitOptions, crate::error::SchedulerError> {
        let priority = self
            .priority
            .as_deref()
            .map(str::parse::<Priority>)
            .transpose()?;
        Ok(SubmitOptions {
            priority,
            metadata: self.metadata.clone(),
        })
    }
}

/// Validate a priority name
fn validate_priority(priority: &str) -> Result<(), validator::ValidationError> {
    if priority.parse::<Priority>().is_err() {
        let mut err = validator::ValidationError::new("invalid_priority");
        err.message = Some("Priority must be one of critical, high, normal, low".into());
        return Err(err);
    }
    Ok(())
}

/// Query for the wait endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitQuery {
    pub timeout_ms: Option<u64>,
}

/// Response after submitting a job
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobResponse {
    pub job_id: JobId,
    pub state: JobState,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStateResponse {
    pub state: JobState,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingJobResponse {
    pub job: Job,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelJobResponse {
    pub job_id: JobId,
    pub cancelled: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub stats: QueueStats,
    pub max_concurrent: usize,
    pub queue_length: usize,
    pub total_processed: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    pub removed: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResponse {
    pub snapshot: StateSnapshot,
}

//! Job model
//!
//! Jobs, their priorities, and the lifecycle record the scheduler keeps for
//! each of them once they have been submitted.

use crate::error::SchedulerError;
use crate::scheduler::executor::PipelineResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Error code recorded when the pipeline executor itself errors out
pub const EXECUTION_ERROR: &str = "EXECUTION_ERROR";

/// Error code recorded when the pipeline executor returns a failed result
pub const PIPELINE_FAILED: &str = "PIPELINE_FAILED";

/// Opaque job identity, unique within one scheduler instance
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
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Job priority. Lower rank runs first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Normal,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Normal,
        Priority::Low,
    ];

    /// Numeric ordering key, 0 is the most urgent
    pub fn rank(self) -> u8 {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Normal => 2,
            Priority::Low => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "normal" => Ok(Priority::Normal),
            "low" => Ok(Priority::Low),
            other => Err(SchedulerError::InvalidJob(format!(
                "unknown priority '{}' (expected critical, high, normal or low)",
                other
            ))),
        }
    }
}

/// Lifecycle status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
    Blocked,
}

impl JobStatus {
    /// Terminal statuses have no outgoing transitions
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether the lifecycle state machine permits moving to `next`
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Queued, Running)
                | (Queued, Cancelled)
                | (Queued, Blocked)
                | (Blocked, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Blocked => "blocked",
        };
        f.write_str(s)
    }
}

/// A unit of work. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub priority: Priority,
    /// Pipeline definition, passed to the executor untouched
    pub pipeline: serde_json::Value,
    /// Input payload, passed to the executor untouched
    pub input: serde_json::Value,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// Structured error recorded on failed jobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobError {
    pub code: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl JobError {
    pub fn new(code: impl Into<String>, message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            timestamp,
        }
    }
}

/// The long-lived record of a job. Outlives the job itself once dequeued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobState {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Rejection reason, set when blocked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<PipelineResult>,
}

impl JobState {
    pub fn queued(job_id: JobId) -> Self {
        Self {
            job_id,
            status: JobStatus::Queued,
            started_at: None,
            completed_at: None,
            reason: None,
            error: None,
            result: None,
        }
    }

    pub fn blocked(job_id: JobId, reason: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Blocked,
            reason: Some(reason.into()),
            ..Self::queued(job_id)
        }
    }
}

/// Per-submission options
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Falls back to the scheduler's default priority when unset
    pub priority: Option<Priority>,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl SubmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }
}

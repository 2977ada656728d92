//! Pipeline executor boundary
//!
//! The scheduler never looks inside a pipeline. It hands the definition and
//! input to a [`PipelineExecutor`] and records whatever comes back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Outcome status reported by a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Completed,
    Failed,
}

/// Result of running a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub status: PipelineStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl PipelineResult {
    pub fn completed(output: serde_json::Value) -> Self {
        Self {
            status: PipelineStatus::Completed,
            output: Some(output),
            error: None,
            duration_ms: 0,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: PipelineStatus::Failed,
            output: None,
            error: Some(error.into()),
            duration_ms: 0,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == PipelineStatus::Completed
    }
}

/// Runs a job's pipeline.
///
/// Returning `Ok` with a failed [`PipelineResult`] is a reported failure.
/// Returning `Err` means the executor itself broke; the scheduler records it
/// as an `EXECUTION_ERROR`.
#[async_trait]
pub trait PipelineExecutor: Send + Sync {
    async fn execute(
        &self,
        pipeline: &serde_json::Value,
        input: &serde_json::Value,
    ) -> anyhow::Result<PipelineResult>;
}

/// Completes every job immediately, echoing the pipeline and input back.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunExecutor;

impl DryRunExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PipelineExecutor for DryRunExecutor {
    async fn execute(
        &self,
        pipeline: &serde_json::Value,
        input: &serde_json::Value,
    ) -> anyhow::Result<PipelineResult> {
        let started = Instant::now();
        let output = serde_json::json!({
            "dryRun": true,
            "pipeline": pipeline,
            "input": input,
        });
        tracing::debug!("Dry-run pipeline executed");
        Ok(PipelineResult::completed(output).with_duration_ms(started.elapsed().as_millis() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_dry_run_echoes_pipeline_and_input() {
        let result = DryRunExecutor::new()
            .execute(&json!({"stages": ["render"]}), &json!({"prompt": "hello"}))
            .await
            .unwrap();

        assert!(result.is_success());
        let output = result.output.unwrap();
        assert_eq!(output["dryRun"], true);
        assert_eq!(output["pipeline"]["stages"][0], "render");
        assert_eq!(output["input"]["prompt"], "hello");
    }

    #[test]
    fn test_failed_result_carries_message() {
        let result = PipelineResult::failed("stage 2 exploded");
        assert!(!result.is_success());
        assert_eq!(result.error.as_deref(), Some("stage 2 exploded"));
        assert!(result.output.is_none());
    }
}

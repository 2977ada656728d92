//! Error handling module
//!
//! `SchedulerError` is what the scheduler itself reports. `AppError` is the
//! HTTP-facing error type that turns any failure into a JSON response.

use crate::scheduler::JobId;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Errors surfaced by scheduler operations.
///
/// Policy denials and execution failures are recorded on the job state and
/// never appear here.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Timed out after {timeout_ms}ms waiting for job {job_id}")]
    WaitTimeout { job_id: JobId, timeout_ms: u64 },

    #[error("Invalid job: {0}")]
    InvalidJob(String),
}

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match &self {
            AppError::Scheduler(SchedulerError::NotFound(id)) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Job {} not found", id),
                None,
            ),
            AppError::Scheduler(e @ SchedulerError::WaitTimeout { .. }) => (
                StatusCode::REQUEST_TIMEOUT,
                "WAIT_TIMEOUT",
                e.to_string(),
                None,
            ),
            AppError::Scheduler(SchedulerError::InvalidJob(msg)) => (
                StatusCode::BAD_REQUEST,
                "INVALID_JOB",
                msg.clone(),
                None,
            ),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                None,
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                msg.clone(),
                None,
            ),
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    Some(msg.clone()),
                )
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            message,
            error: details,
            code: Some(error_code.to_string()),
        });

        (status, body).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, AppError>;

/// Helper function to create an internal error
pub fn internal_error(msg: impl Into<String>) -> AppError {
    AppError::Internal(msg.into())
}

/// Helper function to create a validation error
pub fn validation_error(msg: impl Into<String>) -> AppError {
    AppError::Validation(msg.into())
}

/// Helper function to create a not found error
pub fn not_found_error(msg: impl Into<String>) -> AppError {
    AppError::NotFound(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_errors_map_to_status_codes() {
        let cases = [
            (SchedulerError::NotFound(JobId::from("job_1")), StatusCode::NOT_FOUND),
            (
                SchedulerError::WaitTimeout {
                    job_id: JobId::from("job_1"),
                    timeout_ms: 50,
                },
                StatusCode::REQUEST_TIMEOUT,
            ),
            (SchedulerError::InvalidJob("empty name".into()), StatusCode::BAD_REQUEST),
        ];

        for (err, expected) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[tokio::test]
    async fn test_internal_error_hides_details_from_message() {
        let response = internal_error("state store lost job_1").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "INTERNAL_ERROR");
        assert_eq!(body["message"], "An internal error occurred");
        assert_eq!(body["error"], "state store lost job_1");
    }

    #[test]
    fn test_wait_timeout_message() {
        let err = SchedulerError::WaitTimeout {
            job_id: JobId::from("job_abc_2"),
            timeout_ms: 250,
        };
        assert_eq!(err.to_string(), "Timed out after 250ms waiting for job job_abc_2");
    }
}

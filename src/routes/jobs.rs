//! Job route handlers
//!
//! Thin wrappers over the scheduler's public operations.

use crate::error::{internal_error, not_found_error, validation_error, ApiResult};
use crate::models::{
    CancelJobResponse, CleanupResponse, JobStateResponse, PendingJobResponse, SnapshotResponse,
    StatsResponse, SubmitJobRequest, SubmitJobResponse, SuccessResponse, WaitQuery,
};
use crate::scheduler::{JobId, JobStatus};
use crate::state::SharedState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::time::Duration;
use tracing::{debug, info};
use validator::Validate;

/// Submit a job
pub async fn submit_job(
    State(state): State<SharedState>,
    Json(payload): Json<SubmitJobRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<SubmitJobResponse>>)> {
    // Validate input
    payload.validate().map_err(|e| validation_error(e.to_string()))?;
    let options = payload.options()?;

    let job_id = state
        .scheduler
        .submit(payload.name, payload.pipeline, payload.input, options)?;
    let job_state = state
        .scheduler
        .get_state(&job_id)
        .ok_or_else(|| internal_error(format!("Submitted job {} has no state", job_id)))?;

    let message = if job_state.status == JobStatus::Blocked {
        "Job blocked by admission policy"
    } else {
        "Job submitted"
    };
    info!(job_id = %job_id, status = %job_state.status, "Job submitted via API");

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data(
            message,
            SubmitJobResponse {
                job_id,
                state: job_state,
            },
        )),
    ))
}

/// Get the current state of a job
pub async fn get_job_state(
    State(state): State<SharedState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<SuccessResponse<JobStateResponse>>> {
    let job_id = JobId::from(job_id);
    let job_state = state
        .scheduler
        .get_state(&job_id)
        .ok_or_else(|| not_found_error(format!("Job {} not found", job_id)))?;

    Ok(Json(SuccessResponse::with_data(
        "Job state retrieved",
        JobStateResponse { state: job_state },
    )))
}

/// Get the submitted job while it is still pending
pub async fn get_pending_job(
    State(state): State<SharedState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<SuccessResponse<PendingJobResponse>>> {
    let job_id = JobId::from(job_id);
    let job = state
        .scheduler
        .get_job(&job_id)
        .ok_or_else(|| not_found_error(format!("Job {} is not pending", job_id)))?;

    Ok(Json(SuccessResponse::with_data(
        "Pending job retrieved",
        PendingJobResponse { job },
    )))
}

/// Cancel a queued or blocked job
pub async fn cancel_job(
    State(state): State<SharedState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<SuccessResponse<CancelJobResponse>>> {
    let job_id = JobId::from(job_id);
    let cancelled = state.scheduler.cancel(&job_id);

    let message = if cancelled {
        "Job cancelled"
    } else {
        "Job could not be cancelled"
    };

    Ok(Json(SuccessResponse::with_data(
        message,
        CancelJobResponse { job_id, cancelled },
    )))
}

/// Block until the job finishes or the timeout elapses
pub async fn wait_for_job(
    State(state): State<SharedState>,
    Path(job_id): Path<String>,
    Query(query): Query<WaitQuery>,
) -> ApiResult<Json<SuccessResponse<JobStateResponse>>> {
    let job_id = JobId::from(job_id);
    let timeout = query
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(state.max_wait)
        .min(state.max_wait);
    debug!(job_id = %job_id, timeout_ms = timeout.as_millis() as u64, "Waiting for job");

    let job_state = state.scheduler.wait_for(&job_id, timeout).await?;

    Ok(Json(SuccessResponse::with_data(
        "Job finished",
        JobStateResponse { state: job_state },
    )))
}

/// Per-status job counts
pub async fn get_stats(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<StatsResponse>>> {
    let scheduler = &state.scheduler;
    Ok(Json(SuccessResponse::with_data(
        "Scheduler stats retrieved",
        StatsResponse {
            stats: scheduler.get_stats(),
            max_concurrent: scheduler.max_concurrent(),
            queue_length: scheduler.queue_len(),
            total_processed: scheduler.total_processed(),
        },
    )))
}

/// Purge finished job states
pub async fn cleanup_jobs(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<CleanupResponse>>> {
    let removed = state.scheduler.cleanup();
    Ok(Json(SuccessResponse::with_data(
        format!("Removed {} finished jobs", removed),
        CleanupResponse { removed },
    )))
}

/// Snapshot of every job state with its checksum
pub async fn get_snapshot(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<SnapshotResponse>>> {
    Ok(Json(SuccessResponse::with_data(
        "Snapshot captured",
        SnapshotResponse {
            snapshot: state.scheduler.snapshot(),
        },
    )))
}

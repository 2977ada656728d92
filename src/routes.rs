//! Route definitions and router setup
//!
//! Configures all API routes and middleware.

mod jobs;

use crate::config::Settings;
use crate::state::SharedState;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState, settings: &Settings) -> Router {
    // Build CORS layer
    let cors = build_cors_layer(settings);

    // Build tracing/logging layer
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Build middleware stack
    let middleware = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id();

    // Build the router
    Router::new()
        // Health check
        .route("/health", get(health_check))

        // Job routes
        .route("/api/jobs", post(jobs::submit_job))
        .route("/api/jobs/cleanup", post(jobs::cleanup_jobs))
        .route("/api/jobs/{id}", get(jobs::get_job_state))
        .route("/api/jobs/{id}/job", get(jobs::get_pending_job))
        .route("/api/jobs/{id}/cancel", post(jobs::cancel_job))
        .route("/api/jobs/{id}/wait", get(jobs::wait_for_job))

        // Scheduler routes
        .route("/api/stats", get(jobs::get_stats))
        .route("/api/snapshot", get(jobs::get_snapshot))

        // Apply middleware and state
        .layer(middleware)
        .with_state(state)
}

/// Build CORS layer from settings
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .cors
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let layer = if origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        CorsLayer::new().allow_origin(origins)
    };

    layer
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}

/// Health check endpoint
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "success": true,
        "message": "Scheduler is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerSettings;
    use crate::scheduler::{DryRunExecutor, Scheduler};
    use crate::state::AppState;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let settings = Settings::default();
        let scheduler = Scheduler::new(
            settings.scheduler.to_scheduler_config(),
            Arc::new(DryRunExecutor::new()),
        );
        let state = Arc::new(AppState::new(scheduler, &SchedulerSettings::default()));
        create_router(state, &settings)
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_submit_and_wait() {
        let app = app();

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/jobs",
                serde_json::json!({"name": "render", "input": {"prompt": "hi"}, "priority": "high"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        let job_id = body["jobId"].as_str().unwrap().to_string();
        assert_eq!(body["state"]["status"], "queued");

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/jobs/{}/wait?timeoutMs=1000", job_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["state"]["status"], "completed");
        assert_eq!(body["state"]["result"]["output"]["input"]["prompt"], "hi");
    }

    #[tokio::test]
    async fn test_unknown_job_is_404() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/jobs/job_missing_1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_invalid_submit_is_400() {
        let response = app()
            .oneshot(post_json("/api/jobs", serde_json::json!({"name": "x", "priority": "asap"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

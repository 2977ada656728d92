//! Pipeline Scheduler service
//!
//! Runs the job scheduler behind a small HTTP control surface:
//! submit, inspect, cancel, wait for, and clean up jobs.

use pipeline_scheduler::config::Settings;
use pipeline_scheduler::routes::create_router;
use pipeline_scheduler::scheduler::{DryRunExecutor, Scheduler};
use pipeline_scheduler::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("🚀 Starting Pipeline Scheduler...");

    // Load configuration
    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");

    let scheduler_config = settings.scheduler.to_scheduler_config();
    info!(
        max_concurrent = scheduler_config.max_concurrent,
        default_priority = %scheduler_config.default_priority,
        policies = ?scheduler_config.policies,
        "⚙️  Scheduler configured"
    );

    let scheduler = Scheduler::new(scheduler_config, Arc::new(DryRunExecutor::new()));
    let state = Arc::new(AppState::new(scheduler, &settings.scheduler));

    // Build the router
    let app = create_router(state, &settings);

    // Create socket address
    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📚 API Endpoints:");
    info!("   POST /api/jobs               - Submit a job");
    info!("   GET  /api/jobs/:id           - Get job state");
    info!("   GET  /api/jobs/:id/job       - Get pending job");
    info!("   POST /api/jobs/:id/cancel    - Cancel a queued or blocked job");
    info!("   GET  /api/jobs/:id/wait      - Wait for a job to finish");
    info!("   POST /api/jobs/cleanup       - Purge finished jobs");
    info!("   GET  /api/stats              - Job counts by status");
    info!("   GET  /api/snapshot           - State snapshot with checksum");
    info!("");

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pipeline_scheduler=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}

//! Pipeline Scheduler - priority job scheduling for governed content pipelines
//!
//! Jobs are admitted through an ordered policy chain, queued by priority,
//! and handed to a pipeline executor under a concurrency bound.
//!
//! ```no_run
//! use pipeline_scheduler::scheduler::{
//!     DryRunExecutor, Priority, Scheduler, SchedulerConfig, SubmitOptions,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let scheduler = Scheduler::new(
//!     SchedulerConfig::new().with_max_concurrent(2),
//!     Arc::new(DryRunExecutor::new()),
//! );
//! let id = scheduler.submit(
//!     "render-batch",
//!     serde_json::json!({"stages": ["generate", "validate"]}),
//!     serde_json::json!({"prompt": "hello"}),
//!     SubmitOptions::new().with_priority(Priority::High),
//! )?;
//! let state = scheduler.wait_for(&id, Duration::from_secs(5)).await?;
//! println!("{} finished as {}", id, state.status);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod scheduler;
pub mod state;

pub use error::{AppError, SchedulerError};
pub use scheduler::Scheduler;

//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::config::SchedulerSettings;
use crate::scheduler::Scheduler;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across all handlers
pub struct AppState {
    /// The job scheduler (has internal locking)
    pub scheduler: Scheduler,

    /// Upper bound on wait timeouts accepted from clients
    pub max_wait: Duration,
}

impl AppState {
    pub fn new(scheduler: Scheduler, settings: &SchedulerSettings) -> Self {
        Self {
            scheduler,
            max_wait: Duration::from_millis(settings.max_wait_ms),
        }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;

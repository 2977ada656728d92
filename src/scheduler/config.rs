//! Scheduler configuration

use crate::scheduler::clock::{Clock, SystemClock};
use crate::scheduler::job::{JobState, Priority};
use crate::scheduler::policy::{Policy, PolicyChain};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Observability hook fired on terminal execution outcomes
pub type JobCallback = Arc<dyn Fn(&JobState) + Send + Sync>;

/// Polling interval used by `wait_for`
pub const DEFAULT_WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Clone)]
pub struct SchedulerConfig {
    /// Concurrency bound (minimum 1)
    pub max_concurrent: usize,
    /// Used when a submission omits a priority
    pub default_priority: Priority,
    pub policies: PolicyChain,
    pub wait_poll_interval: Duration,
    pub on_job_complete: Option<JobCallback>,
    pub on_job_error: Option<JobCallback>,
    pub clock: Arc<dyn Clock>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 1,
            default_priority: Priority::Normal,
            policies: PolicyChain::new(),
            wait_poll_interval: DEFAULT_WAIT_POLL_INTERVAL,
            on_job_complete: None,
            on_job_error: None,
            clock: Arc::new(SystemClock),
        }
    }
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_default_priority(mut self, priority: Priority) -> Self {
        self.default_priority = priority;
        self
    }

    /// Append a policy to the end of the chain
    pub fn with_policy(mut self, policy: impl Policy + 'static) -> Self {
        self.policies.push(Arc::new(policy));
        self
    }

    pub fn with_policies(mut self, policies: PolicyChain) -> Self {
        self.policies = policies;
        self
    }

    pub fn with_wait_poll_interval(mut self, interval: Duration) -> Self {
        self.wait_poll_interval = interval;
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn on_job_complete(mut self, callback: impl Fn(&JobState) + Send + Sync + 'static) -> Self {
        self.on_job_complete = Some(Arc::new(callback));
        self
    }

    pub fn on_job_error(mut self, callback: impl Fn(&JobState) + Send + Sync + 'static) -> Self {
        self.on_job_error = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for SchedulerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerConfig")
            .field("max_concurrent", &self.max_concurrent)
            .field("default_priority", &self.default_priority)
            .field("policies", &self.policies)
            .field("wait_poll_interval", &self.wait_poll_interval)
            .field("on_job_complete", &self.on_job_complete.is_some())
            .field("on_job_error", &self.on_job_error.is_some())
            .field("clock", &self.clock)
            .finish()
    }
}

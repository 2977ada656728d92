//! Job Scheduler
//!
//! Priority-ordered admission and execution engine for pipeline jobs:
//!
//! 1. **Admission**: `submit` runs the policy chain once. Denied jobs are
//!    recorded as `blocked` and never queued; everything else is queued.
//! 2. **Execution loop**: a single pump re-checks policy, dequeues in
//!    priority order, and starts jobs up to the concurrency bound.
//! 3. **Execution**: each job runs on its own task. Finishing frees the slot
//!    and re-pumps the queue.
//!
//! All mutable state sits behind one mutex that is never held across an
//! `.await`. Operations that start work must be called inside a Tokio runtime.

pub mod clock;
pub mod config;
pub mod executor;
pub mod job;
pub mod limiter;
pub mod policy;
pub mod queue;
pub mod store;

pub use clock::{Clock, FixedClock, JobIdGenerator, SystemClock};
pub use config::{JobCallback, SchedulerConfig};
pub use executor::{DryRunExecutor, PipelineExecutor, PipelineResult, PipelineStatus};
pub use job::{Job, JobError, JobId, JobState, JobStatus, Priority, SubmitOptions};
pub use policy::{Policy, PolicyChain, PolicyContext, PolicyDecision, QueueDepthPolicy};
pub use store::{QueueStats, StateSnapshot};

use crate::error::SchedulerError;
use crate::scheduler::job::{EXECUTION_ERROR, PIPELINE_FAILED};
use crate::scheduler::limiter::ConcurrencyLimiter;
use crate::scheduler::queue::PriorityQueue;
use crate::scheduler::store::JobStateStore;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Longest accepted job name
pub const MAX_JOB_NAME_LEN: usize = 256;

/// Handle to a scheduler instance. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

struct Inner {
    core: Mutex<Core>,
    policies: PolicyChain,
    executor: Arc<dyn PipelineExecutor>,
    clock: Arc<dyn Clock>,
    default_priority: Priority,
    wait_poll_interval: Duration,
    on_job_complete: Option<JobCallback>,
    on_job_error: Option<JobCallback>,
}

struct Core {
    queue: PriorityQueue,
    states: JobStateStore,
    limiter: ConcurrencyLimiter,
    ids: JobIdGenerator,
    total_processed: u64,
    /// Held by the active pump, including while it waits out a deferral
    pumping: bool,
}

impl Core {
    fn context(&self, now: DateTime<Utc>) -> PolicyContext {
        PolicyContext {
            now,
            queue_length: self.queue.len(),
            running_count: self.limiter.running_count(),
            total_processed: self.total_processed,
        }
    }
}

enum PumpStep {
    /// Queue empty or concurrency bound reached; the pump has stopped
    Idle,
    /// Job denied on re-check and dropped
    Dropped,
    /// Job requeued at the tail; resume after the delay
    Deferred(Duration),
    Start(Job),
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, executor: Arc<dyn PipelineExecutor>) -> Self {
        info!(
            max_concurrent = config.max_concurrent,
            default_priority = %config.default_priority,
            policies = ?config.policies,
            "Scheduler initialized"
        );

        let core = Core {
            queue: PriorityQueue::new(),
            states: JobStateStore::new(),
            limiter: ConcurrencyLimiter::new(config.max_concurrent),
            ids: JobIdGenerator::new(),
            total_processed: 0,
            pumping: false,
        };

        Self {
            inner: Arc::new(Inner {
                core: Mutex::new(core),
                policies: config.policies,
                executor,
                clock: config.clock,
                default_priority: config.default_priority,
                wait_poll_interval: config.wait_poll_interval,
                on_job_complete: config.on_job_complete,
                on_job_error: config.on_job_error,
            }),
        }
    }

    // =========================================================================
    // ADMISSION
    // =========================================================================

    /// Submit a job and return its identity without waiting for it to run.
    ///
    /// A policy denial is not an error: the job is recorded as `blocked` and
    /// its id returned. Only a malformed name is rejected.
    pub fn submit(
        &self,
        name: impl Into<String>,
        pipeline: serde_json::Value,
        input: serde_json::Value,
        options: SubmitOptions,
    ) -> Result<JobId, SchedulerError> {
        let name = name.into();
        validate_job_name(&name)?;

        let now = self.inner.clock.now();
        let priority = options.priority.unwrap_or(self.inner.default_priority);

        let mut core = self.inner.lock();
        let id = core.ids.next_id(now);
        let job = Job {
            id: id.clone(),
            name,
            priority,
            pipeline,
            input,
            created_at: now,
            metadata: options.metadata,
        };

        let context = core.context(now);
        match self.inner.evaluate(&job, &context) {
            PolicyDecision::Deny { reason } => {
                info!(job_id = %id, name = %job.name, reason = %reason, "Job blocked at admission");
                core.states.insert(JobState::blocked(id.clone(), reason));
                Ok(id)
            }
            PolicyDecision::Defer { delay_ms } => {
                debug!(job_id = %id, name = %job.name, delay_ms, "Job admitted with deferral");
                core.states.insert(JobState::queued(id.clone()));
                core.queue.push_back(job);
                drop(core);
                self.inner.trigger_after(Duration::from_millis(delay_ms));
                Ok(id)
            }
            PolicyDecision::Allow => {
                debug!(job_id = %id, name = %job.name, priority = %priority, "Job queued");
                core.states.insert(JobState::queued(id.clone()));
                core.queue.insert(job);
                drop(core);
                self.inner.trigger();
                Ok(id)
            }
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    pub fn get_state(&self, id: &JobId) -> Option<JobState> {
        self.inner.lock().states.get(id).cloned()
    }

    /// The submitted job, only while it is still waiting in the queue.
    /// Once dequeued for execution the job value is no longer retained.
    pub fn get_job(&self, id: &JobId) -> Option<Job> {
        self.inner.lock().queue.get(id).cloned()
    }

    pub fn get_stats(&self) -> QueueStats {
        self.inner.lock().states.stats()
    }

    /// Every job state in submission order, with a content checksum
    pub fn snapshot(&self) -> StateSnapshot {
        let states = self.inner.lock().states.states();
        StateSnapshot::new(states, self.inner.clock.now())
    }

    pub fn queue_len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn running_count(&self) -> usize {
        self.inner.lock().limiter.running_count()
    }

    pub fn max_concurrent(&self) -> usize {
        self.inner.lock().limiter.max_concurrent()
    }

    pub fn total_processed(&self) -> u64 {
        self.inner.lock().total_processed
    }

    // =========================================================================
    // CONTROL
    // =========================================================================

    /// Cancel a queued or blocked job. Running jobs are never preempted.
    pub fn cancel(&self, id: &JobId) -> bool {
        let now = self.inner.clock.now();
        let mut core = self.inner.lock();

        match core.states.status(id) {
            Some(JobStatus::Queued) | Some(JobStatus::Blocked) => {}
            Some(status) => {
                debug!(job_id = %id, status = %status, "Cancel ignored");
                return false;
            }
            None => return false,
        }

        core.queue.remove(id);
        match core.states.transition(id, JobStatus::Cancelled) {
            Some(state) => {
                state.completed_at = Some(now);
                info!(job_id = %id, "Job cancelled");
                true
            }
            None => false,
        }
    }

    /// Poll until the job reaches a terminal status or `timeout` elapses.
    pub async fn wait_for(&self, id: &JobId, timeout: Duration) -> Result<JobState, SchedulerError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.get_state(id) {
                None => return Err(SchedulerError::NotFound(id.clone())),
                Some(state) if state.status.is_terminal() => return Ok(state),
                Some(_) => {}
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(SchedulerError::WaitTimeout {
                    job_id: id.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(self.inner.wait_poll_interval).await;
        }
    }

    /// Purge terminal states, returning how many were removed
    pub fn cleanup(&self) -> usize {
        let removed = self.inner.lock().states.cleanup();
        if removed > 0 {
            info!(removed, "Cleaned up finished jobs");
        }
        removed
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run the policy chain. A panicking policy denies the job instead of
    /// unwinding through the pump.
    fn evaluate(&self, job: &Job, context: &PolicyContext) -> PolicyDecision {
        guarded(|| self.policies.evaluate(job, context)).unwrap_or_else(|message| {
            error!(job_id = %job.id, name = %job.name, panic = %message, "Admission policy panicked");
            PolicyDecision::deny(format!("admission policy panicked: {}", message))
        })
    }

    /// Start the pump on its own task; `submit` never waits for it
    fn trigger(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move { inner.pump() });
    }

    fn trigger_after(self: &Arc<Self>, delay: Duration) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.pump();
        });
    }

    /// Enter the execution loop unless another pump already owns it
    fn pump(self: &Arc<Self>) {
        {
            let mut core = self.lock();
            if core.pumping {
                return;
            }
            core.pumping = true;
        }
        self.drain();
    }

    fn drain(self: &Arc<Self>) {
        loop {
            match self.next_step() {
                PumpStep::Idle => return,
                PumpStep::Dropped => continue,
                PumpStep::Deferred(delay) => {
                    // keep ownership of the pump and resume once the delay is over;
                    // running jobs are unaffected
                    let inner = Arc::clone(self);
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        inner.drain();
                    });
                    return;
                }
                PumpStep::Start(job) => self.spawn_execution(job),
            }
        }
    }

    fn next_step(&self) -> PumpStep {
        let now = self.clock.now();
        let mut core = self.lock();

        if !core.limiter.has_capacity() {
            core.pumping = false;
            return PumpStep::Idle;
        }
        let Some(job) = core.queue.pop_front() else {
            core.pumping = false;
            return PumpStep::Idle;
        };

        let context = core.context(now);
        match self.evaluate(&job, &context) {
            PolicyDecision::Allow => {
                match core.states.transition(&job.id, JobStatus::Running) {
                    Some(state) => state.started_at = Some(now),
                    None => return PumpStep::Dropped,
                }
                let acquired = core.limiter.acquire(&job.id);
                debug_assert!(acquired, "capacity is checked before dequeue");
                info!(
                    job_id = %job.id,
                    name = %job.name,
                    priority = %job.priority,
                    running = core.limiter.running_count(),
                    "Job started"
                );
                PumpStep::Start(job)
            }
            PolicyDecision::Deny { reason } => {
                info!(job_id = %job.id, name = %job.name, reason = %reason, "Job blocked on re-check");
                if let Some(state) = core.states.transition(&job.id, JobStatus::Blocked) {
                    state.reason = Some(reason);
                }
                PumpStep::Dropped
            }
            PolicyDecision::Defer { delay_ms } => {
                debug!(job_id = %job.id, name = %job.name, delay_ms, "Job deferred to queue tail");
                core.queue.push_back(job);
                PumpStep::Deferred(Duration::from_millis(delay_ms))
            }
        }
    }

    fn spawn_execution(self: &Arc<Self>, job: Job) {
        let inner = Arc::clone(self);
        tokio::spawn(async move { inner.execute_job(job).await });
    }

    async fn execute_job(self: Arc<Self>, job: Job) {
        let Job {
            id, pipeline, input, ..
        } = job;

        // run on a separate task so a panicking executor still frees the slot
        let executor = Arc::clone(&self.executor);
        let outcome = tokio::spawn(async move { executor.execute(&pipeline, &input).await })
            .await
            .unwrap_or_else(|e| Err(anyhow::anyhow!("pipeline executor task failed: {}", e)));

        if let Some(state) = self.finish(&id, outcome) {
            self.notify(&state);
        }
        self.pump();
    }

    /// Record the outcome, free the slot, and return the terminal state
    fn finish(&self, id: &JobId, outcome: anyhow::Result<PipelineResult>) -> Option<JobState> {
        let now = self.clock.now();
        let mut core = self.lock();
        core.limiter.release(id);
        core.total_processed += 1;

        let (status, error, result) = match outcome {
            Ok(result) if result.is_success() => (JobStatus::Completed, None, Some(result)),
            Ok(result) => {
                let message = result
                    .error
                    .clone()
                    .unwrap_or_else(|| "pipeline reported failure".to_string());
                (
                    JobStatus::Failed,
                    Some(JobError::new(PIPELINE_FAILED, message, now)),
                    Some(result),
                )
            }
            Err(e) => (
                JobStatus::Failed,
                Some(JobError::new(EXECUTION_ERROR, format!("{:#}", e), now)),
                None,
            ),
        };

        let Some(state) = core.states.transition(id, status) else {
            warn!(job_id = %id, "Finished job has no running state");
            return None;
        };
        state.completed_at = Some(now);
        state.error = error;
        state.result = result;

        match &state.error {
            None => info!(job_id = %id, "Job completed"),
            Some(err) => warn!(job_id = %id, code = %err.code, error = %err.message, "Job failed"),
        }
        Some(state.clone())
    }

    fn notify(&self, state: &JobState) {
        let callback = match state.status {
            JobStatus::Completed => self.on_job_complete.as_ref(),
            _ => self.on_job_error.as_ref(),
        };
        if let Some(callback) = callback {
            if let Err(message) = guarded(|| callback(state)) {
                error!(job_id = %state.job_id, status = %state.status, panic = %message, "Job callback panicked");
            }
        }
    }
}

/// Run a user-supplied hook, turning a panic into its message
fn guarded<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn validate_job_name(name: &str) -> Result<(), SchedulerError> {
    if name.trim().is_empty() {
        return Err(SchedulerError::InvalidJob("job name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_JOB_NAME_LEN {
        return Err(SchedulerError::InvalidJob(format!(
            "job name must be at most {} characters",
            MAX_JOB_NAME_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Semaphore;
    use tokio_test::{assert_err, assert_ok};

    /// Holds every job until a permit is released
    struct GatedExecutor {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl PipelineExecutor for GatedExecutor {
        async fn execute(
            &self,
            _pipeline: &serde_json::Value,
            input: &serde_json::Value,
        ) -> anyhow::Result<PipelineResult> {
            let permit = self.gate.acquire().await?;
            permit.forget();
            Ok(PipelineResult::completed(input.clone()))
        }
    }

    fn gated(max_concurrent: usize) -> (Scheduler, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let scheduler = Scheduler::new(
            SchedulerConfig::new().with_max_concurrent(max_concurrent),
            Arc::new(GatedExecutor { gate: gate.clone() }),
        );
        (scheduler, gate)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[test]
    fn test_validate_job_name() {
        assert_ok!(validate_job_name("render-thumbnails"));
        assert_err!(validate_job_name("   "));
        assert_err!(validate_job_name(&"x".repeat(MAX_JOB_NAME_LEN + 1)));
    }

    #[tokio::test]
    async fn test_submit_rejects_empty_name() {
        let (scheduler, _gate) = gated(1);
        let result = scheduler.submit("", json!({}), json!({}), SubmitOptions::new());
        assert!(matches!(result, Err(SchedulerError::InvalidJob(_))));
        assert_eq!(scheduler.get_stats().total, 0);
    }

    #[tokio::test]
    async fn test_get_job_only_while_queued() {
        let (scheduler, gate) = gated(1);
        let id = scheduler
            .submit("first", json!({"stages": []}), json!({"n": 1}), SubmitOptions::new())
            .unwrap();

        // pump has not run yet
        let job = scheduler.get_job(&id).unwrap();
        assert_eq!(job.name, "first");
        assert_eq!(job.priority, Priority::Normal);

        settle().await;
        assert_eq!(scheduler.get_state(&id).unwrap().status, JobStatus::Running);
        assert!(scheduler.get_job(&id).is_none());

        gate.add_permits(1);
        let state = scheduler.wait_for(&id, Duration::from_secs(1)).await.unwrap();
        assert_eq!(state.status, JobStatus::Completed);
        assert!(scheduler.get_job(&id).is_none());
    }

    #[tokio::test]
    async fn test_cancel_running_job_is_noop() {
        let (scheduler, gate) = gated(1);
        let id = scheduler
            .submit("long", json!({}), json!({}), SubmitOptions::new())
            .unwrap();
        settle().await;

        assert!(!scheduler.cancel(&id));
        assert_eq!(scheduler.get_state(&id).unwrap().status, JobStatus::Running);

        gate.add_permits(1);
        let state = scheduler.wait_for(&id, Duration::from_secs(1)).await.unwrap();
        assert_eq!(state.status, JobStatus::Completed);
        assert!(!scheduler.cancel(&id));
    }

    #[tokio::test]
    async fn test_cancel_queued_job_never_runs() {
        let (scheduler, gate) = gated(1);
        let blocker = scheduler
            .submit("blocker", json!({}), json!({}), SubmitOptions::new())
            .unwrap();
        let queued = scheduler
            .submit("queued", json!({}), json!({}), SubmitOptions::new())
            .unwrap();
        settle().await;

        assert!(scheduler.cancel(&queued));
        assert!(scheduler.get_job(&queued).is_none());
        let state = scheduler.get_state(&queued).unwrap();
        assert_eq!(state.status, JobStatus::Cancelled);
        assert!(state.completed_at.is_some());
        assert!(state.started_at.is_none());

        gate.add_permits(2);
        assert_ok!(scheduler.wait_for(&blocker, Duration::from_secs(1)).await);
        settle().await;
        assert_eq!(scheduler.get_state(&queued).unwrap().status, JobStatus::Cancelled);
        assert_eq!(scheduler.total_processed(), 1);
    }

    #[tokio::test]
    async fn test_cancel_unknown_job() {
        let (scheduler, _gate) = gated(1);
        assert!(!scheduler.cancel(&JobId::from("job_missing_1")));
    }
}

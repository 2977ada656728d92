//! Admission policies
//!
//! An ordered chain of [`Policy`] checks decides whether a job may enter, or
//! stay in, the queue. Evaluation stops at the first non-allow decision.

use crate::scheduler::job::Job;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Read-only view of the scheduler handed to policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyContext {
    pub now: DateTime<Utc>,
    pub queue_length: usize,
    pub running_count: usize,
    /// Jobs that have finished executing over the scheduler's lifetime
    pub total_processed: u64,
}

/// Decision produced by a policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum PolicyDecision {
    Allow,
    Deny { reason: String },
    Defer {
        #[serde(rename = "deferMs")]
        delay_ms: u64,
    },
}

impl PolicyDecision {
    pub fn deny(reason: impl Into<String>) -> Self {
        PolicyDecision::Deny {
            reason: reason.into(),
        }
    }

    pub fn defer(delay: Duration) -> Self {
        PolicyDecision::Defer {
            delay_ms: delay.as_millis() as u64,
        }
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, PolicyDecision::Allow)
    }
}

/// A named admission check.
///
/// Implementations must be pure with respect to the scheduler: they see only
/// the job and the context snapshot.
pub trait Policy: Send + Sync {
    fn name(&self) -> &str;

    fn check(&self, job: &Job, context: &PolicyContext) -> PolicyDecision;
}

/// Ordered, short-circuiting list of policies. Empty means always allow.
#[derive(Clone, Default)]
pub struct PolicyChain {
    policies: Vec<Arc<dyn Policy>>,
}

impl PolicyChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, policy: impl Policy + 'static) -> Self {
        self.push(Arc::new(policy));
        self
    }

    pub fn push(&mut self, policy: Arc<dyn Policy>) {
        self.policies.push(policy);
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.policies.iter().map(|p| p.name()).collect()
    }

    /// Evaluate in order, returning the first non-allow decision
    pub fn evaluate(&self, job: &Job, context: &PolicyContext) -> PolicyDecision {
        for policy in &self.policies {
            let decision = policy.check(job, context);
            if !decision.is_allow() {
                tracing::debug!(
                    job_id = %job.id,
                    policy = policy.name(),
                    decision = ?decision,
                    "Policy did not allow job"
                );
                return decision;
            }
        }
        PolicyDecision::Allow
    }
}

impl fmt::Debug for PolicyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Denies admission once the pending queue reaches `max_depth`
#[derive(Debug, Clone)]
pub struct QueueDepthPolicy {
    max_depth: usize,
}

impl QueueDepthPolicy {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }
}

impl Policy for QueueDepthPolicy {
    fn name(&self) -> &str {
        "queue-depth"
    }

    fn check(&self, _job: &Job, context: &PolicyContext) -> PolicyDecision {
        if context.queue_length >= self.max_depth {
            PolicyDecision::deny(format!("queue depth limit reached ({})", self.max_depth))
        } else {
            PolicyDecision::Allow
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::job::{JobId, Priority};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn job(name: &str) -> Job {
        Job {
            id: JobId::from("job_test"),
            name: name.to_string(),
            priority: Priority::Normal,
            pipeline: serde_json::Value::Null,
            input: serde_json::Value::Null,
            created_at: Utc::now(),
            metadata: None,
        }
    }

    fn context(queue_length: usize) -> PolicyContext {
        PolicyContext {
            now: Utc::now(),
            queue_length,
            running_count: 0,
            total_processed: 0,
        }
    }

    struct Fixed {
        name: &'static str,
        decision: PolicyDecision,
        calls: Arc<AtomicUsize>,
    }

    impl Policy for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn check(&self, _job: &Job, _context: &PolicyContext) -> PolicyDecision {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.decision.clone()
        }
    }

    #[test]
    fn test_empty_chain_allows() {
        let chain = PolicyChain::new();
        assert!(chain.is_empty());
        assert_eq!(chain.evaluate(&job("a"), &context(0)), PolicyDecision::Allow);
    }

    #[test]
    fn test_chain_short_circuits_on_first_non_allow() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = PolicyChain::new()
            .with(Fixed {
                name: "quota",
                decision: PolicyDecision::Allow,
                calls: calls.clone(),
            })
            .with(Fixed {
                name: "blackout",
                decision: PolicyDecision::deny("blackout window"),
                calls: calls.clone(),
            })
            .with(Fixed {
                name: "rate",
                decision: PolicyDecision::Defer { delay_ms: 10 },
                calls: calls.clone(),
            });

        assert_eq!(chain.names(), vec!["quota", "blackout", "rate"]);
        assert_eq!(
            chain.evaluate(&job("a"), &context(0)),
            PolicyDecision::deny("blackout window")
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_queue_depth_policy() {
        let policy = QueueDepthPolicy::new(2);
        assert!(policy.check(&job("a"), &context(1)).is_allow());
        assert_eq!(
            policy.check(&job("a"), &context(2)),
            PolicyDecision::deny("queue depth limit reached (2)")
        );
    }

    #[test]
    fn test_decision_wire_format() {
        let json = serde_json::to_value(PolicyDecision::defer(Duration::from_millis(50))).unwrap();
        assert_eq!(json, serde_json::json!({"decision": "defer", "deferMs": 50}));
    }
}

//! Concurrency limiter
//!
//! Tracks which jobs are executing and caps how many may run at once.

use crate::scheduler::job::JobId;
use std::collections::HashSet;

#[derive(Debug)]
pub struct ConcurrencyLimiter {
    max_concurrent: usize,
    running: HashSet<JobId>,
}

impl ConcurrencyLimiter {
    /// A bound of zero is raised to one so the scheduler can always progress
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            running: HashSet::new(),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn has_capacity(&self) -> bool {
        self.running.len() < self.max_concurrent
    }

    /// Claim a slot. Fails when full or when the job already holds one.
    pub fn acquire(&mut self, id: &JobId) -> bool {
        if !self.has_capacity() || self.running.contains(id) {
            return false;
        }
        self.running.insert(id.clone())
    }

    pub fn release(&mut self, id: &JobId) -> bool {
        self.running.remove(id)
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_respects_bound() {
        let mut limiter = ConcurrencyLimiter::new(2);
        assert!(limiter.acquire(&JobId::from("a")));
        assert!(!limiter.acquire(&JobId::from("a")));
        assert!(limiter.acquire(&JobId::from("b")));
        assert!(!limiter.has_capacity());
        assert!(!limiter.acquire(&JobId::from("c")));
        assert_eq!(limiter.running_count(), 2);

        assert!(limiter.release(&JobId::from("a")));
        assert!(!limiter.release(&JobId::from("a")));
        assert!(limiter.acquire(&JobId::from("c")));
        assert!(limiter.running.contains(&JobId::from("c")));
    }

    #[test]
    fn test_zero_bound_is_raised_to_one() {
        let limiter = ConcurrencyLimiter::new(0);
        assert_eq!(limiter.max_concurrent(), 1);
        assert!(limiter.has_capacity());
    }
}

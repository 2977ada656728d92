//! Pending job queue
//!
//! Priority-major, FIFO-minor ordering. A new job is inserted just before the
//! first entry with a less urgent rank. Deferred jobs go back on the tail.

use crate::scheduler::job::{Job, JobId};
use std::collections::VecDeque;

/// Jobs admitted but not yet running
#[derive(Debug, Default)]
pub struct PriorityQueue {
    entries: VecDeque<Job>,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert in priority order, after every entry of equal or higher urgency
    pub fn insert(&mut self, job: Job) {
        let rank = job.priority.rank();
        match self.entries.iter().position(|e| e.priority.rank() > rank) {
            Some(index) => self.entries.insert(index, job),
            None => self.entries.push_back(job),
        }
    }

    /// Requeue at the tail regardless of priority
    pub fn push_back(&mut self, job: Job) {
        self.entries.push_back(job);
    }

    pub fn pop_front(&mut self) -> Option<Job> {
        self.entries.pop_front()
    }

    pub fn get(&self, id: &JobId) -> Option<&Job> {
        self.entries.iter().find(|j| &j.id == id)
    }

    pub fn remove(&mut self, id: &JobId) -> Option<Job> {
        let index = self.entries.iter().position(|j| &j.id == id)?;
        self.entries.remove(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

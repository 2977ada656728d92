//! Job State Store
//!
//! Maps job identity to lifecycle state, independent of queue membership.
//! Every status change goes through [`JobStateStore::transition`], which
//! refuses moves the lifecycle does not allow.

use crate::scheduler::job::{JobId, JobState, JobStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Per-status job counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub blocked: usize,
    pub total: usize,
}

impl QueueStats {
    fn record(&mut self, status: JobStatus) {
        match status {
            JobStatus::Queued => self.queued += 1,
            JobStatus::Running => self.running += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Cancelled => self.cancelled += 1,
            JobStatus::Blocked => self.blocked += 1,
        }
        self.total += 1;
    }
}

/// Point-in-time copy of every job state, in submission order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub captured_at: DateTime<Utc>,
    pub states: Vec<JobState>,
    pub checksum: String,
}

impl StateSnapshot {
    pub fn new(states: Vec<JobState>, captured_at: DateTime<Utc>) -> Self {
        let checksum = Self::compute_checksum(&states);
        Self {
            captured_at,
            states,
            checksum,
        }
    }

    /// SHA-256 over the canonical JSON of each state, in order
    pub fn compute_checksum(states: &[JobState]) -> String {
        let mut hasher = Sha256::new();
        for state in states {
            // JobState only holds JSON-safe data, serialization cannot fail
            let encoded = serde_json::to_vec(state).unwrap_or_default();
            hasher.update(&encoded);
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }
}

#[derive(Debug)]
struct Entry {
    sequence: u64,
    state: JobState,
}

/// In-memory job state store
#[derive(Debug, Default)]
pub struct JobStateStore {
    entries: HashMap<JobId, Entry>,
    next_sequence: u64,
}

impl JobStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the initial state of a newly submitted job.
    /// Returns false if the identity is already present.
    pub fn insert(&mut self, state: JobState) -> bool {
        if self.entries.contains_key(&state.job_id) {
            return false;
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries
            .insert(state.job_id.clone(), Entry { sequence, state });
        true
    }

    pub fn get(&self, id: &JobId) -> Option<&JobState> {
        self.entries.get(id).map(|e| &e.state)
    }

    pub fn status(&self, id: &JobId) -> Option<JobStatus> {
        self.get(id).map(|s| s.status)
    }

    /// Move a job to `next`, returning the state for the caller to fill in.
    /// Returns None for unknown ids and illegal transitions.
    pub fn transition(&mut self, id: &JobId, next: JobStatus) -> Option<&mut JobState> {
        let state = &mut self.entries.get_mut(id)?.state;
        if !state.status.can_transition_to(next) {
            tracing::warn!(
                job_id = %id,
                from = %state.status,
                to = %next,
                "Rejected illegal job state transition"
            );
            return None;
        }
        state.status = next;
        Some(state)
    }

    /// Drop every terminal entry, returning how many were removed
    pub fn cleanup(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.state.status.is_terminal());
        before - self.entries.len()
    }

    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats::default();
        for entry in self.entries.values() {
            stats.record(entry.state.status);
        }
        stats
    }

    /// All states ordered by submission
    pub fn states(&self) -> Vec<JobState> {
        let mut entries: Vec<&Entry> = self.entries.values().collect();
        entries.sort_by_key(|e| e.sequence);
        entries.into_iter().map(|e| e.state.clone()).collect()
    }
}

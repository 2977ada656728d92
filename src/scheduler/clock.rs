//! Time source and job identity generation

use crate::scheduler::job::JobId;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

/// Source of "now" for timestamps and policy contexts
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant. Used for reproducible runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Builds `job_<millis base36>_<counter>` identities.
///
/// The counter never repeats within one generator, which is enough for
/// uniqueness inside a single scheduler.
#[derive(Debug, Default)]
pub struct JobIdGenerator {
    counter: u64,
}

impl JobIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self, now: DateTime<Utc>) -> JobId {
        self.counter += 1;
        let millis = now.timestamp_millis().max(0) as u64;
        JobId::new(format!("job_{}_{}", to_base36(millis), self.counter))
    }
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn test_ids_unique_under_fixed_clock() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let mut ids = JobIdGenerator::new();
        let generated: HashSet<JobId> = (0..1000).map(|_| ids.next_id(clock.now())).collect();
        assert_eq!(generated.len(), 1000);
    }

    #[test]
    fn test_id_format_is_reproducible() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let first = JobIdGenerator::new().next_id(at);
        let second = JobIdGenerator::new().next_id(at);
        assert_eq!(first, second);
        assert!(first.as_str().starts_with("job_"));
        assert!(first.as_str().ends_with("_1"));
    }
}

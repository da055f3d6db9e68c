//! Session ID generation
//!
//! IDs are the creation time in milliseconds since the Unix epoch, rendered
//! as a decimal string. Two sessions created within the same millisecond get
//! consecutive values.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tracing::debug;

/// Issues strictly increasing timestamp IDs
#[derive(Debug, Default)]
pub struct SessionIdGenerator {
    last: AtomicU64,
}

impl SessionIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next ID: `max(now_ms, last + 1)`
    pub fn next_id(&self) -> String {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        self.next_after(now).to_string()
    }

    fn next_after(&self, now: u64) -> u64 {
        let mut prev = self.last.load(Ordering::SeqCst);
        loop {
            let candidate = now.max(prev + 1);
            match self
                .last
                .compare_exchange_weak(prev, candidate, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => {
                    debug!(%candidate, "SessionIdGenerator::next_after: issued");
                    return candidate;
                }
                Err(actual) => prev = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_same_millisecond_is_bumped() {
        let ids = SessionIdGenerator::new();
        assert_eq!(ids.next_after(1000), 1000);
        assert_eq!(ids.next_after(1000), 1001);
        assert_eq!(ids.next_after(1000), 1002);
        // Clock catches up
        assert_eq!(ids.next_after(5000), 5000);
    }

    #[test]
    fn test_clock_going_backwards_stays_monotonic() {
        let ids = SessionIdGenerator::new();
        assert_eq!(ids.next_after(2000), 2000);
        assert_eq!(ids.next_after(1500), 2001);
    }

    #[test]
    fn test_ids_are_numeric_timestamps() {
        let before = Utc::now().timestamp_millis() as u64;
        let id: u64 = SessionIdGenerator::new().next_id().parse().unwrap();
        assert!(id >= before);
    }

    #[test]
    fn test_concurrent_ids_are_unique() {
        let ids = Arc::new(SessionIdGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || (0..200).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id issued");
            }
        }
        assert_eq!(seen.len(), 1600);
    }
}

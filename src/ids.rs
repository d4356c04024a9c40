//! Message Identifiers
//!
//! Store entries are keyed by millisecond timestamp strings. Two appends in
//! the same millisecond would collide, so the generator bumps past the last
//! id it handed out.

use std::sync::atomic::{AtomicI64, Ordering};

/// Strictly increasing timestamp-shaped id source
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicI64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id: the current unix time in ms, or last + 1 if the clock has not advanced
    pub fn next_id(&self) -> String {
        self.next_at(chrono::Utc::now().timestamp_millis()).to_string()
    }

    fn next_at(&self, now_ms: i64) -> i64 {
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now_ms.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
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
    fn test_same_millisecond_does_not_collide() {
        let ids = IdGenerator::new();
        assert_eq!(ids.next_at(1000), 1000);
        assert_eq!(ids.next_at(1000), 1001);
        assert_eq!(ids.next_at(1000), 1002);
        // clock catches up
        assert_eq!(ids.next_at(5000), 5000);
    }

    #[test]
    fn test_clock_going_backwards() {
        let ids = IdGenerator::new();
        ids.next_at(2000);
        assert_eq!(ids.next_at(1500), 2001);
    }

    #[test]
    fn test_unique_across_threads() {
        let ids = Arc::new(IdGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..250).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id");
            }
        }
        assert_eq!(seen.len(), 1000);
    }
}

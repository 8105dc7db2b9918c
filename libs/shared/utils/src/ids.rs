use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Timestamp-based record ids. Values are strictly increasing within a
/// generator, so two calls in the same millisecond still differ.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicI64,
}

impl IdGenerator {
    pub const fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    pub fn next_id(&self) -> String {
        let now = Utc::now().timestamp_millis();
        let mut previous = self.last.load(Ordering::Acquire);

        loop {
            let candidate = if now > previous { now } else { previous + 1 };
            match self.last.compare_exchange_weak(
                previous,
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return candidate.to_string(),
                Err(actual) => previous = actual,
            }
        }
    }

    /// Moves the floor past an id that already exists in storage, so a clock
    /// that went backwards cannot reissue it. Non-numeric ids are ignored.
    pub fn observe(&self, id: &str) {
        if let Ok(value) = id.parse::<i64>() {
            self.last.fetch_max(value, Ordering::AcqRel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_pairwise_distinct() {
        let ids = IdGenerator::new();
        let generated: HashSet<String> = (0..1000).map(|_| ids.next_id()).collect();

        assert_eq!(generated.len(), 1000);
    }

    #[test]
    fn test_observed_ids_are_never_reissued() {
        let ids = IdGenerator::new();
        let future = (Utc::now().timestamp_millis() + 60_000).to_string();
        ids.observe(&future);
        ids.observe("not-a-number");

        let next: i64 = ids.next_id().parse().unwrap();
        assert!(next > future.parse::<i64>().unwrap());
    }
}

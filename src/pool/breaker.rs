use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared count of permanent failures for one run.
///
/// Workers consult the breaker before starting a new item; once the count
/// exceeds the ceiling they discard instead of attempting. Items already
/// underway run to completion.
#[derive(Debug)]
pub struct FailureBreaker {
    ceiling: usize,
    failures: AtomicUsize,
}

impl FailureBreaker {
    pub fn new(ceiling: usize) -> Self {
        Self {
            ceiling,
            failures: AtomicUsize::new(0),
        }
    }

    /// Record one permanent failure, returning the running total.
    pub fn record_failure(&self) -> usize {
        self.failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    /// True once failures exceed the ceiling.
    pub fn is_open(&self) -> bool {
        self.failures() > self.ceiling
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_closed_at_the_ceiling() {
        let breaker = FailureBreaker::new(2);
        assert!(!breaker.is_open());
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.failures(), 2);
        assert!(!breaker.is_open());
    }

    #[test]
    fn opens_past_the_ceiling() {
        let breaker = FailureBreaker::new(2);
        for _ in 0..3 {
            breaker.record_failure();
        }
        assert!(breaker.is_open());
    }

    #[test]
    fn zero_ceiling_opens_on_first_failure() {
        let breaker = FailureBreaker::new(0);
        assert!(!breaker.is_open());
        assert_eq!(breaker.record_failure(), 1);
        assert!(breaker.is_open());
    }
}

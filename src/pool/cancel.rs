use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Cloneable cancellation flag shared between a signal handler and the
/// pool's worker threads.
///
/// Cancellation is cooperative: workers stop picking up new items and cut
/// retry waits short, but an attempt already in progress runs to its end.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Sleep in short slices so a cancel lands promptly. Returns false when
    /// the token fired before the full delay elapsed.
    pub fn sleep_unless_cancelled(&self, delay: Duration) -> bool {
        const SLICE: Duration = Duration::from_millis(200);

        let deadline = Instant::now() + delay;
        let mut remaining = delay;
        while !remaining.is_zero() {
            if self.is_cancelled() {
                return false;
            }
            std::thread::sleep(remaining.min(SLICE));
            remaining = deadline.saturating_duration_since(Instant::now());
        }
        !self.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn sleep_completes_when_not_cancelled() {
        let token = CancelToken::new();
        assert!(token.sleep_unless_cancelled(Duration::from_millis(10)));
    }

    #[test]
    fn sleep_reports_a_pending_cancel() {
        let token = CancelToken::new();
        token.cancel();
        assert!(!token.sleep_unless_cancelled(Duration::from_secs(5)));
    }
}

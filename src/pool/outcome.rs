use std::time::Duration;

/// How a successful application left its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The operation changed something.
    Applied,
    /// The target was already in the requested state.
    Unchanged,
}

/// An item that landed, with the number of attempts it took.
#[derive(Debug)]
pub struct Succeeded<T> {
    pub item: T,
    pub attempts: usize,
    pub disposition: Disposition,
}

/// An item that exhausted its attempts (or hit a fatal error).
#[derive(Debug)]
pub struct Failed<T> {
    pub item: T,
    pub attempts: usize,
    pub error: anyhow::Error,
}

/// Everything a pool run did. Each input item appears in exactly one of
/// the three sets; within each set, items keep their input order.
#[derive(Debug)]
pub struct RunReport<T> {
    pub succeeded: Vec<Succeeded<T>>,
    pub failed: Vec<Failed<T>>,
    /// Items never attempted because the failure ceiling was exceeded or
    /// the run was cancelled before they started.
    pub discarded: Vec<T>,
    pub elapsed: Duration,
}

impl<T> RunReport<T> {
    pub fn empty(elapsed: Duration) -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
            discarded: Vec::new(),
            elapsed,
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.discarded.len()
    }

    pub fn applied(&self) -> usize {
        self.succeeded
            .iter()
            .filter(|done| done.disposition == Disposition::Applied)
            .count()
    }

    pub fn unchanged(&self) -> usize {
        self.succeeded
            .iter()
            .filter(|done| done.disposition == Disposition::Unchanged)
            .count()
    }

    /// True when nothing failed and nothing was discarded.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.discarded.is_empty()
    }
}

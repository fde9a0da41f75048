use std::time::Duration;

/// Delay policy between attempts on the same item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// The same delay before every retry. A zero delay retries immediately.
    Fixed { delay: Duration },
    /// Delay doubles with each failed attempt, starting at `initial` and
    /// never exceeding `cap`.
    Exponential { initial: Duration, cap: Duration },
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Fixed {
            delay: Duration::from_secs(1),
        }
    }
}

impl Backoff {
    /// Delay before the next attempt, given how many attempts on this item
    /// have already failed (starting at 1).
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        match *self {
            Backoff::Fixed { delay } => delay,
            Backoff::Exponential { initial, cap } => {
                let factor = 2u32.saturating_pow(failed_attempts.saturating_sub(1));
                initial.saturating_mul(factor).min(cap)
            }
        }
    }
}

/// Whether a failed attempt is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Might clear on a later attempt (rate limits, transport hiccups).
    Transient,
    /// Will not clear; spend no further attempts on this item.
    Fatal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_delay_is_constant() {
        let backoff = Backoff::Fixed {
            delay: Duration::from_secs(2),
        };
        assert_eq!(backoff.delay_for(1), Duration::from_secs(2));
        assert_eq!(backoff.delay_for(7), Duration::from_secs(2));
    }

    #[test]
    fn zero_fixed_delay_retries_immediately() {
        let backoff = Backoff::Fixed {
            delay: Duration::ZERO,
        };
        assert_eq!(backoff.delay_for(3), Duration::ZERO);
    }

    #[test]
    fn exponential_doubles_until_the_cap() {
        let backoff = Backoff::Exponential {
            initial: Duration::from_secs(1),
            cap: Duration::from_secs(8),
        };
        assert_eq!(backoff.delay_for(1), Duration::from_secs(1));
        assert_eq!(backoff.delay_for(2), Duration::from_secs(2));
        assert_eq!(backoff.delay_for(3), Duration::from_secs(4));
        assert_eq!(backoff.delay_for(4), Duration::from_secs(8));
        assert_eq!(backoff.delay_for(5), Duration::from_secs(8));
    }

    #[test]
    fn exponential_survives_absurd_attempt_counts() {
        let backoff = Backoff::Exponential {
            initial: Duration::from_secs(1),
            cap: Duration::from_secs(30),
        };
        assert_eq!(backoff.delay_for(1000), Duration::from_secs(30));
    }
}

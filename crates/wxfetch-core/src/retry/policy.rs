use rand::Rng;
use std::time::Duration;

use crate::config::RetryConfig;

/// High-level classification of a failed fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Upstream asked us to slow down (HTTP 429), possibly with a delay.
    Throttled { retry_after: Option<Duration> },
    /// Retryable upstream server failure (5xx).
    Server(u32),
    /// Timed out: upstream I/O or local rate limiter admission.
    Timeout,
    /// Network-level failure (DNS, reset, garbled response).
    Network,
    /// Upstream rejected the request (4xx other than 429). Never retried.
    Client(u32),
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry; the window fails.
    GiveUp,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Exponential backoff with jitter, bounded attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(cfg: RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(cfg.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(cfg.max_delay_secs),
        }
    }
}

impl RetryPolicy {
    /// Decide what to do after attempt number `attempt` (1-based) failed
    /// with `kind`.
    ///
    /// A throttled attempt waits at least the server's `Retry-After`, even
    /// when that exceeds the backoff ceiling.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if let ErrorKind::Client(_) = kind {
            return RetryDecision::GiveUp;
        }
        if attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }

        let backoff = self.backoff_delay(attempt);
        match kind {
            ErrorKind::Throttled {
                retry_after: Some(after),
            } => RetryDecision::RetryAfter(after.max(backoff)),
            _ => RetryDecision::RetryAfter(backoff),
        }
    }

    /// `base * 2^(attempt-1)` with ±25% jitter, capped at `max_delay`.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = 1u32 << attempt.saturating_sub(1).min(8);
        let raw = self.base_delay.saturating_mul(exp).min(self.max_delay);
        let jittered = raw.mul_f64(rand::thread_rng().gen_range(0.75..=1.25));
        jittered.min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delay(decision: RetryDecision) -> Duration {
        match decision {
            RetryDecision::RetryAfter(d) => d,
            RetryDecision::GiveUp => panic!("expected retry"),
        }
    }

    #[test]
    fn client_errors_give_up_immediately() {
        let p = RetryPolicy::default();
        assert_eq!(p.decide(1, ErrorKind::Client(404)), RetryDecision::GiveUp);
        assert_eq!(p.decide(1, ErrorKind::Client(403)), RetryDecision::GiveUp);
    }

    #[test]
    fn transient_kinds_retry_until_attempts_exhaust() {
        let mut p = RetryPolicy::default();
        p.max_attempts = 3;
        for kind in [
            ErrorKind::Server(500),
            ErrorKind::Timeout,
            ErrorKind::Network,
            ErrorKind::Throttled { retry_after: None },
        ] {
            assert!(matches!(p.decide(1, kind), RetryDecision::RetryAfter(_)));
            assert!(matches!(p.decide(2, kind), RetryDecision::RetryAfter(_)));
            assert_eq!(p.decide(3, kind), RetryDecision::GiveUp);
        }
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let mut p = RetryPolicy::default();
        p.max_attempts = 20;
        p.base_delay = Duration::from_millis(100);
        p.max_delay = Duration::from_secs(60);

        // Jitter is ±25%, so compare against the envelope rather than
        // exact doubling.
        let d1 = delay(p.decide(1, ErrorKind::Server(500)));
        assert!(d1 >= Duration::from_millis(75) && d1 <= Duration::from_millis(125));

        let d4 = delay(p.decide(4, ErrorKind::Server(500)));
        assert!(d4 >= Duration::from_millis(600) && d4 <= Duration::from_millis(1000));

        let d_high = delay(p.decide(15, ErrorKind::Timeout));
        assert!(d_high <= p.max_delay);
    }

    #[test]
    fn throttled_waits_at_least_the_retry_after_header() {
        let p = RetryPolicy::default();
        let kind = ErrorKind::Throttled {
            retry_after: Some(Duration::from_secs(120)),
        };
        // 120s exceeds the 60s backoff ceiling and must still be honored.
        assert_eq!(
            p.decide(1, kind),
            RetryDecision::RetryAfter(Duration::from_secs(120))
        );
    }

    #[test]
    fn policy_from_config() {
        let p: RetryPolicy = RetryConfig {
            max_attempts: 7,
            base_delay_secs: 0.5,
            max_delay_secs: 10,
        }
        .into();
        assert_eq!(p.max_attempts, 7);
        assert_eq!(p.base_delay, Duration::from_millis(500));
        assert_eq!(p.max_delay, Duration::from_secs(10));
    }
}

//! Per-station admission control.
//!
//! Each station gets an independent token bucket so a burst against one
//! station never starves another. Every outbound upstream call must be
//! admitted here first; the bucket is the single arbiter of call admission
//! for a station across all jobs in the process.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Admission wait exceeded the caller's timeout. Transient: the retry policy
/// treats it like any other timeout.
#[derive(Debug, Clone, thiserror::Error)]
#[error("rate limiter admission for station {station} timed out after {waited:?}")]
pub struct RateLimitTimeoutError {
    pub station: String,
    pub waited: Duration,
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
        }
    }

    /// Refill from elapsed time, then take one token if available. Returns
    /// None on success, or the wait until the next token accrues.
    fn try_take(&mut self, now: Instant, capacity: f64, refill_per_sec: f64) -> Option<Duration> {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * refill_per_sec).min(capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            None
        } else {
            Some(Duration::from_secs_f64((1.0 - self.tokens) / refill_per_sec))
        }
    }
}

/// Token buckets keyed by station id, shared by every job in the process.
#[derive(Debug)]
pub struct StationLimiter {
    capacity: f64,
    refill_per_sec: f64,
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl StationLimiter {
    /// `capacity` bounds the burst, `refill_per_sec` the sustained rate.
    pub fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self {
            capacity: capacity.max(1.0),
            refill_per_sec: refill_per_sec.max(1e-6),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Wait until a token for `station` is available, or until `timeout`
    /// elapses. The wait is a cancellable sleep, not a busy loop.
    pub async fn admit(
        &self,
        station: &str,
        timeout: Duration,
    ) -> Result<(), RateLimitTimeoutError> {
        let deadline = Instant::now() + timeout;
        loop {
            let wait = {
                let now = Instant::now();
                let mut buckets = self.buckets.lock().unwrap();
                let bucket = buckets
                    .entry(station.to_string())
                    .or_insert_with(|| TokenBucket::new(self.capacity, now));
                bucket.try_take(now, self.capacity, self.refill_per_sec)
            };

            let Some(wait) = wait else {
                return Ok(());
            };

            if Instant::now() + wait > deadline {
                return Err(RateLimitTimeoutError {
                    station: station.to_string(),
                    waited: timeout,
                });
            }
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn burst_up_to_capacity_is_admitted_immediately() {
        let limiter = StationLimiter::new(3.0, 1.0);
        let t0 = Instant::now();
        for _ in 0..3 {
            limiter.admit("89064", Duration::from_secs(10)).await.unwrap();
        }
        assert_eq!(Instant::now(), t0, "burst within capacity must not wait");
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_bucket_waits_for_refill() {
        let limiter = StationLimiter::new(1.0, 1.0);
        limiter.admit("89064", Duration::from_secs(10)).await.unwrap();

        let t0 = Instant::now();
        limiter.admit("89064", Duration::from_secs(10)).await.unwrap();
        assert!(
            Instant::now() - t0 >= Duration::from_millis(900),
            "second call should wait about one refill interval"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn admission_times_out_when_saturated() {
        let limiter = StationLimiter::new(1.0, 0.001);
        limiter.admit("89064", Duration::from_secs(5)).await.unwrap();

        let err = limiter
            .admit("89064", Duration::from_secs(5))
            .await
            .expect_err("bucket refills far too slowly for this timeout");
        assert_eq!(err.station, "89064");
    }

    #[tokio::test(start_paused = true)]
    async fn stations_have_independent_buckets() {
        let limiter = StationLimiter::new(1.0, 0.001);
        limiter.admit("89064", Duration::from_secs(1)).await.unwrap();

        // 89064 is drained; 89070 must still be admitted instantly.
        let t0 = Instant::now();
        limiter.admit("89070", Duration::from_secs(1)).await.unwrap();
        assert_eq!(Instant::now(), t0);
    }
}

//! Token-bucket rate limiting for NETWORK-permission tools.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Configuration for a [`TokenBucket`].
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Sustained request rate.
    pub requests_per_minute: u32,
    /// Burst capacity; also the bucket's maximum token count.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { requests_per_minute: 60, burst_size: 10 }
    }
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Thread-safe token-bucket limiter. One bucket per rate-limited
/// resource (typically one per NETWORK tool, or shared across all of
/// them depending on configuration).
pub struct TokenBucket {
    config: RateLimitConfig,
    rate_per_sec: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Construct a bucket starting full.
    pub fn new(config: RateLimitConfig) -> Self {
        let rate_per_sec = config.requests_per_minute as f64 / 60.0;
        Self {
            config,
            rate_per_sec,
            state: Mutex::new(BucketState { tokens: config.burst_size as f64, last_refill: Instant::now() }),
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.last_refill = now;
        state.tokens = (state.tokens + elapsed * self.rate_per_sec).min(self.config.burst_size as f64);
    }

    /// Take a token without blocking. Returns `false` if none are
    /// available right now.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().expect("rate limiter poisoned");
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Wait until a token is available or `timeout` elapses, whichever
    /// comes first. Returns `false` on timeout.
    pub async fn acquire(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.try_acquire() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Current available token count, after applying any owed refill.
    pub fn available_tokens(&self) -> f64 {
        let mut state = self.state.lock().expect("rate limiter poisoned");
        self.refill(&mut state);
        state.tokens
    }

    /// Reset to a full bucket.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("rate limiter poisoned");
        state.tokens = self.config.burst_size as f64;
        state.last_refill = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_capacity_is_immediately_available() {
        let bucket = TokenBucket::new(RateLimitConfig { requests_per_minute: 60, burst_size: 3 });
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn reset_refills_to_full() {
        let bucket = TokenBucket::new(RateLimitConfig { requests_per_minute: 60, burst_size: 1 });
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
        bucket.reset();
        assert!(bucket.try_acquire());
    }

    #[tokio::test]
    async fn acquire_times_out_when_bucket_stays_empty() {
        let bucket = TokenBucket::new(RateLimitConfig { requests_per_minute: 1, burst_size: 1 });
        assert!(bucket.try_acquire());
        let acquired = bucket.acquire(Duration::from_millis(150)).await;
        assert!(!acquired);
    }
}

#![deny(missing_docs)]
//! # jarvis-circuit — Circuit Breaker Registry
//!
//! One breaker per tool name, created lazily on first reference and never
//! removed. Breaker state reads/writes are mutually exclusive per-breaker;
//! the registry itself only ever adds entries, never removes them, so a
//! read lock on the map suffices for lookups once a breaker exists.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use thiserror::Error;

/// Default failure threshold before a breaker opens.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
/// Default recovery timeout in seconds before an open breaker allows a
/// half-open probe.
pub const DEFAULT_RECOVERY_TIMEOUT_SECS: i64 = 30;
/// Default number of consecutive half-open successes required to close.
pub const DEFAULT_SUCCESS_THRESHOLD: u32 = 2;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation; failures are counted but calls proceed.
    Closed,
    /// Rejecting calls until the recovery timeout elapses.
    Open,
    /// Probing recovery with limited calls.
    HalfOpen,
}

/// Raised when a call is rejected because its breaker is open.
#[derive(Debug, Error)]
#[error("circuit '{tool_name}' is open, retry in {remaining_secs:.1}s")]
pub struct CircuitOpenError {
    /// The tool whose breaker rejected the call.
    pub tool_name: String,
    /// Seconds remaining before a recovery probe is allowed.
    pub remaining_secs: f64,
}

struct Breaker {
    failure_threshold: u32,
    recovery_timeout_secs: i64,
    success_threshold: u32,
    state: Mutex<BreakerState>,
}

struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<chrono::DateTime<chrono::Utc>>,
}

impl Breaker {
    fn new(failure_threshold: u32, recovery_timeout_secs: i64, success_threshold: u32) -> Self {
        Self {
            failure_threshold,
            recovery_timeout_secs,
            success_threshold,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_time: None,
            }),
        }
    }

    fn should_attempt_recovery(inner: &BreakerState, recovery_timeout_secs: i64) -> bool {
        match inner.last_failure_time {
            None => true,
            Some(last) => {
                let elapsed = chrono::Utc::now() - last;
                elapsed >= chrono::Duration::seconds(recovery_timeout_secs)
            }
        }
    }

    /// Current state, resolving an OPEN -> HALF_OPEN transition if the
    /// recovery timeout has elapsed.
    fn state(&self, tool_name: &str) -> CircuitState {
        let mut inner = self.state.lock().expect("breaker mutex poisoned");
        if inner.state == CircuitState::Open
            && Self::should_attempt_recovery(&inner, self.recovery_timeout_secs)
        {
            inner.state = CircuitState::HalfOpen;
            inner.success_count = 0;
            tracing::info!(tool = tool_name, "circuit OPEN -> HALF_OPEN");
        }
        inner.state
    }

    fn remaining_secs(&self) -> f64 {
        let inner = self.state.lock().expect("breaker mutex poisoned");
        match inner.last_failure_time {
            None => 0.0,
            Some(last) => {
                let elapsed = (chrono::Utc::now() - last).num_milliseconds() as f64 / 1000.0;
                (self.recovery_timeout_secs as f64 - elapsed).max(0.0)
            }
        }
    }

    fn record_success(&self, tool_name: &str) {
        let mut inner = self.state.lock().expect("breaker mutex poisoned");
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    tracing::info!(tool = tool_name, "circuit HALF_OPEN -> CLOSED");
                }
            }
            CircuitState::Open => {}
        }
    }

    fn record_failure(&self, tool_name: &str) {
        let mut inner = self.state.lock().expect("breaker mutex poisoned");
        inner.last_failure_time = Some(chrono::Utc::now());
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.failure_threshold {
                    inner.state = CircuitState::Open;
                    tracing::warn!(tool = tool_name, "circuit CLOSED -> OPEN");
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.success_count = 0;
                tracing::warn!(tool = tool_name, "circuit HALF_OPEN -> OPEN");
            }
            CircuitState::Open => {}
        }
    }
}

/// Registry of per-tool circuit breakers.
///
/// Breakers are created lazily on first reference to a tool name and are
/// never removed.
pub struct CircuitBreakerRegistry {
    breakers: RwLock<HashMap<String, Breaker>>,
    failure_threshold: u32,
    recovery_timeout_secs: i64,
    success_threshold: u32,
}

impl CircuitBreakerRegistry {
    /// Construct a registry using the default thresholds
    /// (failure_threshold=5, recovery_timeout=30s, success_threshold=2).
    pub fn new() -> Self {
        Self::with_thresholds(
            DEFAULT_FAILURE_THRESHOLD,
            DEFAULT_RECOVERY_TIMEOUT_SECS,
            DEFAULT_SUCCESS_THRESHOLD,
        )
    }

    /// Construct a registry with explicit thresholds, applied uniformly
    /// to every breaker it creates.
    pub fn with_thresholds(
        failure_threshold: u32,
        recovery_timeout_secs: i64,
        success_threshold: u32,
    ) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            failure_threshold,
            recovery_timeout_secs,
            success_threshold,
        }
    }

    fn ensure_breaker(&self, tool_name: &str) {
        if self.breakers.read().expect("registry poisoned").contains_key(tool_name) {
            return;
        }
        let mut write = self.breakers.write().expect("registry poisoned");
        write.entry(tool_name.to_string()).or_insert_with(|| {
            Breaker::new(
                self.failure_threshold,
                self.recovery_timeout_secs,
                self.success_threshold,
            )
        });
    }

    /// The current state of `tool_name`'s breaker (creating it if absent).
    pub fn state(&self, tool_name: &str) -> CircuitState {
        self.ensure_breaker(tool_name);
        let read = self.breakers.read().expect("registry poisoned");
        read.get(tool_name).expect("just ensured").state(tool_name)
    }

    /// The gate used by the executor before invoking a tool: `Err` if the
    /// breaker is open.
    pub fn gate(&self, tool_name: &str) -> Result<(), CircuitOpenError> {
        self.ensure_breaker(tool_name);
        let read = self.breakers.read().expect("registry poisoned");
        let breaker = read.get(tool_name).expect("just ensured");
        match breaker.state(tool_name) {
            CircuitState::Open => Err(CircuitOpenError {
                tool_name: tool_name.to_string(),
                remaining_secs: breaker.remaining_secs(),
            }),
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
        }
    }

    /// Record a successful call outcome for `tool_name`.
    pub fn record_success(&self, tool_name: &str) {
        self.ensure_breaker(tool_name);
        let read = self.breakers.read().expect("registry poisoned");
        read.get(tool_name).expect("just ensured").record_success(tool_name);
    }

    /// Record a failed call outcome for `tool_name`.
    pub fn record_failure(&self, tool_name: &str) {
        self.ensure_breaker(tool_name);
        let read = self.breakers.read().expect("registry poisoned");
        read.get(tool_name).expect("just ensured").record_failure(tool_name);
    }

    /// Convenience that combines the gate, an async call, and
    /// success/failure recording.
    pub async fn call<F, Fut, T, E>(&self, tool_name: &str, f: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        self.gate(tool_name).map_err(CallError::Open)?;
        match f().await {
            Ok(value) => {
                self.record_success(tool_name);
                Ok(value)
            }
            Err(e) => {
                self.record_failure(tool_name);
                Err(CallError::Inner(e))
            }
        }
    }
}

/// The error shape returned by [`CircuitBreakerRegistry::call`].
#[derive(Debug, Error)]
pub enum CallError<E> {
    /// The breaker rejected the call before it ran.
    #[error(transparent)]
    Open(CircuitOpenError),
    /// The call ran and failed on its own terms.
    #[error("call failed")]
    Inner(E),
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_exactly_at_failure_threshold() {
        let reg = CircuitBreakerRegistry::with_thresholds(3, 30, 2);
        reg.record_failure("flaky");
        assert_eq!(reg.state("flaky"), CircuitState::Closed);
        reg.record_failure("flaky");
        assert_eq!(reg.state("flaky"), CircuitState::Closed);
        reg.record_failure("flaky");
        assert_eq!(reg.state("flaky"), CircuitState::Open);
    }

    #[test]
    fn open_breaker_rejects_calls() {
        let reg = CircuitBreakerRegistry::with_thresholds(1, 30, 2);
        reg.record_failure("flaky");
        assert!(reg.gate("flaky").is_err());
    }

    #[test]
    fn open_breaker_recovers_to_half_open_after_timeout() {
        let reg = CircuitBreakerRegistry::with_thresholds(1, 0, 2);
        reg.record_failure("flaky");
        assert_eq!(reg.state("flaky"), CircuitState::Open);
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert_eq!(reg.state("flaky"), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_failure_reopens() {
        let reg = CircuitBreakerRegistry::with_thresholds(1, 0, 2);
        reg.record_failure("flaky");
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert_eq!(reg.state("flaky"), CircuitState::HalfOpen);
        reg.record_failure("flaky");
        assert_eq!(reg.state("flaky"), CircuitState::Open);
    }

    #[test]
    fn half_open_closes_after_success_threshold() {
        let reg = CircuitBreakerRegistry::with_thresholds(1, 0, 2);
        reg.record_failure("flaky");
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert_eq!(reg.state("flaky"), CircuitState::HalfOpen);
        reg.record_success("flaky");
        assert_eq!(reg.state("flaky"), CircuitState::HalfOpen);
        reg.record_success("flaky");
        assert_eq!(reg.state("flaky"), CircuitState::Closed);
    }

    #[test]
    fn success_resets_consecutive_failures_in_closed_state() {
        let reg = CircuitBreakerRegistry::with_thresholds(3, 30, 2);
        reg.record_failure("flaky");
        reg.record_failure("flaky");
        reg.record_success("flaky");
        reg.record_failure("flaky");
        reg.record_failure("flaky");
        assert_eq!(reg.state("flaky"), CircuitState::Closed);
    }

    #[tokio::test]
    async fn call_skips_invocation_when_open() {
        let reg = CircuitBreakerRegistry::with_thresholds(1, 30, 2);
        reg.record_failure("flaky");
        let mut invoked = false;
        let result: Result<(), CallError<()>> = reg
            .call("flaky", || {
                invoked = true;
                async { Ok(()) }
            })
            .await;
        assert!(matches!(result, Err(CallError::Open(_))));
        assert!(!invoked);
    }

    proptest::proptest! {
        #[test]
        fn never_opens_before_threshold(n_failures in 0u32..4) {
            let reg = CircuitBreakerRegistry::with_thresholds(5, 30, 2);
            for _ in 0..n_failures {
                reg.record_failure("t");
            }
            prop_assert_eq!(reg.state("t"), CircuitState::Closed);
        }
    }
}

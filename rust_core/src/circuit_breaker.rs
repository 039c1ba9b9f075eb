//! Circuit breaker for collaborator HTTP calls.
//!
//! Closed: calls pass. Open: calls are refused until `recovery_timeout`
//! has elapsed since the last failure. HalfOpen: calls pass as trials;
//! `success_threshold` trial successes close the circuit and any trial
//! failure re-opens it.

use anyhow::{anyhow, Result};
use parking_lot::RwLock;
use serde::Serialize;
use std::env;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiCircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    /// Half-open successes needed to close again
    pub success_threshold: u32,
}

impl Default for ApiCircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 1,
        }
    }
}

impl ApiCircuitBreakerConfig {
    /// `CB_FAILURE_THRESHOLD`, `CB_RECOVERY_TIMEOUT_SECS`, `CB_SUCCESS_THRESHOLD`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            failure_threshold: env::var("CB_FAILURE_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.failure_threshold),
            recovery_timeout: env::var("CB_RECOVERY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.recovery_timeout),
            success_threshold: env::var("CB_SUCCESS_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.success_threshold),
        }
    }
}

pub struct ApiCircuitBreaker {
    name: String,
    config: ApiCircuitBreakerConfig,
    state: RwLock<ApiCircuitState>,
    failures: AtomicU32,
    trial_successes: AtomicU32,
    last_failure: RwLock<Option<Instant>>,
}

impl ApiCircuitBreaker {
    pub fn new(name: &str, config: ApiCircuitBreakerConfig) -> Self {
        Self {
            name: name.to_string(),
            config,
            state: RwLock::new(ApiCircuitState::Closed),
            failures: AtomicU32::new(0),
            trial_successes: AtomicU32::new(0),
            last_failure: RwLock::new(None),
        }
    }

    pub fn with_defaults(name: &str) -> Self {
        Self::new(name, ApiCircuitBreakerConfig::default())
    }

    /// Whether a call may go out now. Moves Open to HalfOpen once the timeout has passed.
    pub fn is_available(&self) -> bool {
        let mut state = self.state.write();
        match *state {
            ApiCircuitState::Closed | ApiCircuitState::HalfOpen => true,
            ApiCircuitState::Open => {
                let recovered = self
                    .last_failure
                    .read()
                    .map(|t| t.elapsed() >= self.config.recovery_timeout)
                    .unwrap_or(true);
                if recovered {
                    *state = ApiCircuitState::HalfOpen;
                    self.trial_successes.store(0, Ordering::SeqCst);
                }
                recovered
            }
        }
    }

    pub fn record_success(&self) {
        self.failures.store(0, Ordering::SeqCst);
        let mut state = self.state.write();
        if *state != ApiCircuitState::HalfOpen {
            *state = ApiCircuitState::Closed;
            return;
        }
        let successes = self.trial_successes.fetch_add(1, Ordering::SeqCst) + 1;
        if successes >= self.config.success_threshold {
            *state = ApiCircuitState::Closed;
            info!("{} circuit closed after {} trial(s)", self.name, successes);
        }
    }

    pub fn record_failure(&self) {
        let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_failure.write() = Some(Instant::now());

        let mut state = self.state.write();
        match *state {
            ApiCircuitState::Closed if failures >= self.config.failure_threshold => {
                *state = ApiCircuitState::Open;
                warn!("{} circuit opened after {} failures", self.name, failures);
            }
            ApiCircuitState::HalfOpen => {
                *state = ApiCircuitState::Open;
                warn!("{} trial call failed, circuit open again", self.name);
            }
            _ => {}
        }
    }

    /// Run `call` through the breaker, recording its outcome
    pub async fn call<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if !self.is_available() {
            return Err(anyhow!("{} is unavailable (circuit open)", self.name));
        }
        match call.await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(e)
            }
        }
    }

    pub fn state(&self) -> ApiCircuitState {
        *self.state.read()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn failure_count(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        *self.state.write() = ApiCircuitState::Closed;
        self.failures.store(0, Ordering::SeqCst);
        self.trial_successes.store(0, Ordering::SeqCst);
        *self.last_failure.write() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failure_threshold: u32, success_threshold: u32) -> ApiCircuitBreaker {
        ApiCircuitBreaker::new(
            "fact_check",
            ApiCircuitBreakerConfig {
                failure_threshold,
                recovery_timeout: Duration::from_millis(10),
                success_threshold,
            },
        )
    }

    #[test]
    fn test_opens_after_threshold() {
        let cb = breaker(3, 1);
        cb.record_failure();
        cb.record_failure();
        assert!(cb.is_available());
        cb.record_failure();
        assert_eq!(cb.state(), ApiCircuitState::Open);
        assert!(!cb.is_available());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = breaker(2, 1);
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        assert_eq!(cb.state(), ApiCircuitState::Closed);
        assert_eq!(cb.failure_count(), 1);
    }

    #[test]
    fn test_half_open_trial_closes() {
        let cb = breaker(1, 2);
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(20));
        assert!(cb.is_available());
        assert_eq!(cb.state(), ApiCircuitState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state(), ApiCircuitState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state(), ApiCircuitState::Closed);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let cb = breaker(1, 1);
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(20));
        assert!(cb.is_available());
        cb.record_failure();
        assert_eq!(cb.state(), ApiCircuitState::Open);
    }

    #[tokio::test]
    async fn test_call_refused_while_open() {
        let cb = ApiCircuitBreaker::new(
            "news",
            ApiCircuitBreakerConfig {
                failure_threshold: 1,
                recovery_timeout: Duration::from_secs(60),
                success_threshold: 1,
            },
        );
        let failed: Result<()> = cb.call(async { Err(anyhow!("boom")) }).await;
        assert!(failed.is_err());

        let refused = cb.call(async { Ok(42) }).await;
        assert!(refused.unwrap_err().to_string().contains("circuit open"));

        cb.reset();
        assert_eq!(cb.call(async { Ok(42) }).await.unwrap(), 42);
    }
}

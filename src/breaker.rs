//! Per-upstream circuit breakers.
//!
//! A breaker trips to OPEN after `failure_threshold` consecutive failures,
//! rejects traffic until `reset_timeout` elapses, then admits probes in
//! HALF_OPEN and closes again after `success_threshold` consecutive
//! successes. Breakers are created lazily by name; `"api"` and
//! `"edgeFunctions"` carry preconfigured defaults (the functions domain
//! recovers more slowly, so it trips earlier and stays open longer).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::GatewayError;

pub const API_BREAKER: &str = "api";
pub const EDGE_FUNCTIONS_BREAKER: &str = "edgeFunctions";

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

impl BreakerConfig {
    /// Defaults for a named upstream.
    fn for_upstream(name: &str) -> Self {
        match name {
            EDGE_FUNCTIONS_BREAKER => Self {
                failure_threshold: 3,
                reset_timeout: Duration::from_secs(45),
                success_threshold: 2,
            },
            _ => Self::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    /// Gauge value for Prometheus exposition.
    pub fn gauge(self) -> u8 {
        match self {
            Self::Closed => 0,
            Self::HalfOpen => 1,
            Self::Open => 2,
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    total_failures: u64,
    total_successes: u64,
    last_failure: Option<Instant>,
    last_success: Option<Instant>,
    next_attempt: Option<Instant>,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            total_failures: 0,
            total_successes: 0,
            last_failure: None,
            last_success: None,
            next_attempt: None,
        }
    }
}

/// Point-in-time view for health and metrics.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: BreakerState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub total_failures: u64,
    pub total_successes: u64,
    pub last_failure_age_ms: Option<u64>,
    pub last_success_age_ms: Option<u64>,
    pub next_attempt_in_ms: Option<u64>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gate a call. While OPEN and before the next-attempt deadline this
    /// rejects with [`GatewayError::CircuitOpen`] without invoking anything;
    /// at or past the deadline the breaker moves to HALF_OPEN and the call
    /// proceeds as a probe.
    pub fn admit(&self) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => Ok(()),
            BreakerState::Open => {
                let now = Instant::now();
                match inner.next_attempt {
                    Some(deadline) if now < deadline => {
                        let remaining = deadline - now;
                        Err(GatewayError::CircuitOpen {
                            upstream: self.name.clone(),
                            retry_at: retry_at(remaining),
                        })
                    }
                    _ => {
                        inner.state = BreakerState::HalfOpen;
                        inner.consecutive_successes = 0;
                        tracing::info!(
                            component = "circuit_breaker",
                            upstream = %self.name,
                            "reset timeout elapsed, probing (HALF_OPEN)"
                        );
                        Ok(())
                    }
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.total_successes += 1;
        inner.last_success = Some(Instant::now());
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures = 0;
            }
            BreakerState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    inner.state = BreakerState::Closed;
                    inner.consecutive_failures = 0;
                    inner.consecutive_successes = 0;
                    inner.next_attempt = None;
                    tracing::info!(
                        component = "circuit_breaker",
                        upstream = %self.name,
                        "recovered, circuit CLOSED"
                    );
                }
            }
            // A success while OPEN comes from a call admitted before the
            // trip; it does not reopen traffic early.
            BreakerState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.total_failures += 1;
        inner.last_failure = Some(Instant::now());
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                inner.consecutive_successes = 0;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    self.trip(&mut inner);
                }
            }
            BreakerState::HalfOpen => {
                // The probe failed; go straight back to OPEN.
                self.trip(&mut inner);
            }
            BreakerState::Open => {}
        }
    }

    fn trip(&self, inner: &mut BreakerInner) {
        inner.state = BreakerState::Open;
        inner.next_attempt = Some(Instant::now() + self.config.reset_timeout);
        tracing::warn!(
            component = "circuit_breaker",
            upstream = %self.name,
            consecutive_failures = inner.consecutive_failures,
            reset_timeout_ms = self.config.reset_timeout.as_millis() as u64,
            "circuit OPEN"
        );
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        *inner = BreakerInner::new();
        tracing::info!(
            component = "circuit_breaker",
            upstream = %self.name,
            "manually reset to CLOSED"
        );
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().expect("breaker lock poisoned").state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock().expect("breaker lock poisoned");
        let now = Instant::now();
        let age = |at: Option<Instant>| at.map(|t| now.duration_since(t).as_millis() as u64);
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            consecutive_successes: inner.consecutive_successes,
            total_failures: inner.total_failures,
            total_successes: inner.total_successes,
            last_failure_age_ms: age(inner.last_failure),
            last_success_age_ms: age(inner.last_success),
            next_attempt_in_ms: inner
                .next_attempt
                .and_then(|d| d.checked_duration_since(now))
                .map(|d| d.as_millis() as u64),
        }
    }
}

fn retry_at(remaining: Duration) -> DateTime<Utc> {
    Utc::now() + chrono::Duration::from_std(remaining).unwrap_or_else(|_| chrono::Duration::zero())
}

// ── Registry ────────────────────────────────────────────────────────────

/// Named breakers, created lazily on first use.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    /// Registry with the two upstream breakers preconfigured.
    pub fn with_defaults() -> Self {
        let registry = Self::default();
        registry.get(API_BREAKER);
        registry.get(EDGE_FUNCTIONS_BREAKER);
        registry
    }

    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().expect("breaker registry lock poisoned");
        breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(name, BreakerConfig::for_upstream(name)))
            })
            .clone()
    }

    pub fn reset_all(&self) -> usize {
        let breakers = self.breakers.lock().expect("breaker registry lock poisoned");
        for breaker in breakers.values() {
            breaker.reset();
        }
        breakers.len()
    }

    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let breakers = self.breakers.lock().expect("breaker registry lock poisoned");
        let mut snapshots: Vec<_> = breakers.values().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_breaker(reset_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            BreakerConfig {
                failure_threshold: 3,
                reset_timeout: Duration::from_millis(reset_ms),
                success_threshold: 2,
            },
        )
    }

    #[test]
    fn opens_after_threshold_and_rejects() {
        let breaker = fast_breaker(10_000);
        for _ in 0..3 {
            breaker.admit().expect("closed breaker admits");
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), BreakerState::Open);
        let err = breaker.admit().expect_err("open breaker rejects");
        assert_eq!(err.code(), "CIRCUIT_OPEN");
        assert!(err.retryable());
    }

    #[test]
    fn success_in_closed_resets_failure_count() {
        let breaker = fast_breaker(10_000);
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_probe_then_recovery() {
        let breaker = fast_breaker(10);
        for _ in 0..3 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), BreakerState::Open);

        std::thread::sleep(Duration::from_millis(20));
        breaker.admit().expect("deadline passed, probe admitted");
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let breaker = fast_breaker(10);
        for _ in 0..3 {
            breaker.record_failure();
        }
        std::thread::sleep(Duration::from_millis(20));
        breaker.admit().expect("probe admitted");
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(breaker.admit().is_err());
    }

    #[test]
    fn registry_preconfigures_both_upstreams() {
        let registry = BreakerRegistry::with_defaults();
        let snapshots = registry.snapshots();
        let names: Vec<_> = snapshots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec![API_BREAKER, EDGE_FUNCTIONS_BREAKER]);
    }

    #[test]
    fn reset_all_closes_everything() {
        let registry = BreakerRegistry::with_defaults();
        let api = registry.get(API_BREAKER);
        for _ in 0..5 {
            api.record_failure();
        }
        assert_eq!(api.state(), BreakerState::Open);
        registry.reset_all();
        assert_eq!(api.state(), BreakerState::Closed);
    }
}

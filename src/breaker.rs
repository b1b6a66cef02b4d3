//! Circuit breaker state machine.
//!
//! One breaker guards each downstream service. After `failure_threshold`
//! recorded transport failures the circuit opens and callers are refused
//! without a network attempt. Once `timeout_seconds` elapse the next
//! `can_attempt` moves the circuit to half-open and admits a probe; a
//! recorded success closes the circuit, a recorded failure re-opens it.
//!
//! While half-open, every caller is admitted until an outcome resolves the
//! state. That matches the admission policy this gateway ships with; callers
//! needing strict single-probe recovery would gate the open-to-half-open
//! transition on a compare-and-swap instead.
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};
use crate::settings::BreakerSettings;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, requests pass through
    Closed,
    /// Failures exceeded the threshold, requests fail fast
    Open,
    /// Cool-down elapsed, probing whether the service recovered
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

#[derive(Clone, Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<i64>,
}

/// Snapshot of a breaker for health/diagnostic endpoints
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BreakerStatus {
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure_time: Option<i64>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    settings: BreakerSettings,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            settings,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_time: None,
            }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BreakerInner>> {
        self.inner.lock().map_err(|e| {
            GatewayError::Concurrency(format!("Failed to acquire breaker lock: {}", e))
        })
    }

    /// Record a successful backend call. Resets the failure count and closes
    /// a half-open circuit.
    pub fn record_success(&self) -> Result<()> {
        let mut inner = self.lock()?;
        inner.failure_count = 0;
        if inner.state == CircuitState::HalfOpen {
            inner.state = CircuitState::Closed;
        }
        Ok(())
    }

    /// Record a transport failure. Opens the circuit from any state once the
    /// failure threshold is reached.
    pub fn record_failure(&self) -> Result<()> {
        let mut inner = self.lock()?;
        inner.failure_count += 1;
        inner.last_failure_time = Some(chrono::Utc::now().timestamp_millis());
        if inner.failure_count >= self.settings.failure_threshold {
            inner.state = CircuitState::Open;
        }
        Ok(())
    }

    /// Whether a call may be attempted right now. An open circuit whose
    /// cool-down has elapsed transitions to half-open as a side effect and
    /// admits the caller as a probe.
    pub fn can_attempt(&self) -> Result<bool> {
        let mut inner = self.lock()?;
        match inner.state {
            CircuitState::Closed => Ok(true),
            CircuitState::Open => {
                if let Some(last_failure) = inner.last_failure_time {
                    let elapsed = chrono::Utc::now().timestamp_millis() - last_failure;
                    if elapsed >= self.settings.timeout_millis() {
                        inner.state = CircuitState::HalfOpen;
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            // A single outcome (success or failure) resolves half-open
            CircuitState::HalfOpen => Ok(true),
        }
    }

    pub fn state(&self) -> Result<CircuitState> {
        Ok(self.lock()?.state)
    }

    pub fn status(&self) -> Result<BreakerStatus> {
        let inner = self.lock()?;
        Ok(BreakerStatus {
            state: inner.state,
            failure_count: inner.failure_count,
            last_failure_time: inner.last_failure_time,
        })
    }
}

//! Circuit breaker guarding one upstream provider.
//!
//! ```text
//! Closed   -> Open      consecutive failed calls reach the threshold
//! Open     -> HalfOpen  first call after the cooldown becomes the probe
//! HalfOpen -> Closed    probe succeeds
//! HalfOpen -> Open      probe fails (cooldown restarts)
//! ```
//!
//! While half-open, every call other than the probe is rejected.

use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

const CLOSED: u8 = 0;
const OPEN: u8 = 1;
const HALF_OPEN: u8 = 2;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            OPEN => CircuitState::Open,
            HALF_OPEN => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failed calls before opening.
    pub failure_threshold: u32,
    /// Time the circuit stays open before admitting a probe.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Rejection returned while the circuit is open or a probe is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitOpen {
    /// Remaining cooldown, `None` while a probe is in flight.
    pub retry_after: Option<Duration>,
}

/// Consecutive-failure circuit breaker.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    /// Held across every transition into or out of `Open`.
    opened_at: Mutex<Option<Instant>>,
    times_opened: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: AtomicU8::new(CLOSED),
            consecutive_failures: AtomicU32::new(0),
            opened_at: Mutex::new(None),
            times_opened: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state. An open circuit whose cooldown has elapsed still
    /// reports `Open` until a caller claims the probe.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_raw(self.state.load(Ordering::Acquire))
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    /// How many times the circuit has tripped.
    pub fn times_opened(&self) -> u64 {
        self.times_opened.load(Ordering::Relaxed)
    }

    /// Ask permission to call upstream.
    ///
    /// The returned permit must be resolved with [`CircuitPermit::succeed`]
    /// or [`CircuitPermit::fail`]. Dropping an unresolved probe permit counts
    /// as a failed probe.
    pub fn try_acquire(&self) -> Result<CircuitPermit<'_>, CircuitOpen> {
        loop {
            match self.state.load(Ordering::Acquire) {
                CLOSED => return Ok(CircuitPermit::new(self, false)),
                HALF_OPEN => return Err(CircuitOpen { retry_after: None }),
                _ => {
                    let opened_at = self.opened_at.lock();
                    if self.state.load(Ordering::Acquire) != OPEN {
                        continue;
                    }

                    let elapsed = opened_at
                        .map(|at| at.elapsed())
                        .unwrap_or(self.config.cooldown);
                    if elapsed < self.config.cooldown {
                        return Err(CircuitOpen {
                            retry_after: Some(self.config.cooldown - elapsed),
                        });
                    }

                    if self
                        .state
                        .compare_exchange(OPEN, HALF_OPEN, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        info!(
                            circuit_breaker = %self.name,
                            "Circuit breaker: Open -> HalfOpen, admitting probe"
                        );
                        return Ok(CircuitPermit::new(self, true));
                    }
                }
            }
        }
    }

    /// Force the circuit closed and clear the failure count.
    pub fn reset(&self) {
        let mut opened_at = self.opened_at.lock();
        self.state.store(CLOSED, Ordering::Release);
        self.consecutive_failures.store(0, Ordering::Release);
        *opened_at = None;
        info!(circuit_breaker = %self.name, "Circuit breaker reset");
    }

    fn on_success(&self, probe: bool) {
        self.consecutive_failures.store(0, Ordering::Release);
        if !probe {
            return;
        }

        let mut opened_at = self.opened_at.lock();
        if self
            .state
            .compare_exchange(HALF_OPEN, CLOSED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            *opened_at = None;
            info!(
                circuit_breaker = %self.name,
                "Circuit breaker: HalfOpen -> Closed, upstream recovered"
            );
        }
    }

    fn on_failure(&self, probe: bool) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
        if probe {
            self.trip(HALF_OPEN, failures);
        } else if failures >= self.config.failure_threshold {
            self.trip(CLOSED, failures);
        }
    }

    fn trip(&self, from: u8, failures: u32) {
        let mut opened_at = self.opened_at.lock();
        if self
            .state
            .compare_exchange(from, OPEN, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            *opened_at = Some(Instant::now());
            self.times_opened.fetch_add(1, Ordering::Relaxed);
            warn!(
                circuit_breaker = %self.name,
                from = %CircuitState::from_raw(from),
                failures,
                cooldown_secs = self.config.cooldown.as_secs(),
                "Circuit breaker opened"
            );
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("consecutive_failures", &self.consecutive_failures())
            .finish()
    }
}

/// Permission for one logical upstream call.
#[must_use = "an unresolved probe permit is recorded as a failure when dropped"]
pub struct CircuitPermit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    resolved: bool,
}

impl<'a> CircuitPermit<'a> {
    fn new(breaker: &'a CircuitBreaker, probe: bool) -> Self {
        Self {
            breaker,
            probe,
            resolved: false,
        }
    }

    /// Whether this call is the half-open probe.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    /// Record that the call reached upstream and got a usable answer.
    pub fn succeed(mut self) {
        self.resolved = true;
        self.breaker.on_success(self.probe);
    }

    /// Record that the call failed.
    pub fn fail(mut self) {
        self.resolved = true;
        self.breaker.on_failure(self.probe);
    }
}

impl Drop for CircuitPermit<'_> {
    fn drop(&mut self) {
        if self.probe && !self.resolved {
            warn!(
                circuit_breaker = %self.breaker.name,
                "Probe abandoned before completion, reopening circuit"
            );
            self.breaker.on_failure(true);
        }
    }
}

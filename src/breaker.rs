//! Circuit breaker state machine.
//!
//! Three states: Closed (normal operation), Open (fail fast until the
//! recovery delay elapses), Half-Open (exactly one probe call in flight).
//! A probe failure reopens the circuit regardless of the threshold.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::BreakerSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open { opened_at: Instant },
    HalfOpen,
}

/// Snapshot of the breaker state, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation; calls pass through.
    Closed,
    /// Failing fast; calls are rejected until the recovery delay elapses.
    Open,
    /// A single trial call is allowed to test recovery.
    HalfOpen,
}

/// Admission decision made before the first invocation of an execute call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// Circuit closed or breaking disabled; invoke normally.
    Proceed,
    /// The recovery delay elapsed; this call is the probe.
    Probe,
    /// Fail fast, carrying the wait remaining until a probe is allowed.
    Reject(Duration),
}

#[derive(Debug)]
pub(crate) struct CircuitBreaker {
    settings: Option<BreakerSettings>,
    state: State,
    consecutive_failures: u32,
}

impl CircuitBreaker {
    pub(crate) fn new(settings: Option<BreakerSettings>) -> Self {
        Self {
            settings,
            state: State::Closed,
            consecutive_failures: 0,
        }
    }

    pub(crate) fn snapshot(&self) -> CircuitState {
        match self.state {
            State::Closed => CircuitState::Closed,
            State::Open { .. } => CircuitState::Open,
            State::HalfOpen => CircuitState::HalfOpen,
        }
    }

    pub(crate) fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Decides whether the next execute call may invoke the unit of work.
    ///
    /// Called once per top-level execute, before the first invocation.
    pub(crate) fn admit(&mut self) -> Admission {
        let Some(settings) = self.settings else {
            return Admission::Proceed;
        };

        match self.state {
            State::Closed => Admission::Proceed,
            State::HalfOpen => Admission::Probe,
            State::Open { opened_at } => {
                let elapsed = opened_at.elapsed();
                if elapsed >= settings.recovery_delay {
                    debug!("recovery delay elapsed, admitting probe");
                    self.state = State::HalfOpen;
                    Admission::Probe
                } else {
                    Admission::Reject(settings.recovery_delay - elapsed)
                }
            }
        }
    }

    /// Clears the failure streak; a successful probe closes the circuit.
    pub(crate) fn record_success(&mut self) {
        self.consecutive_failures = 0;
        if self.state == State::HalfOpen {
            debug!("probe succeeded, closing circuit");
            self.state = State::Closed;
        }
    }

    /// Counts a handled failure and returns the updated streak length.
    ///
    /// The streak is tracked even with breaking disabled; it feeds the
    /// retry observer's cumulative count.
    pub(crate) fn record_failure(&mut self) -> u32 {
        self.consecutive_failures += 1;

        if self.state == State::HalfOpen {
            // The probe exists to test recovery with minimal risk; any
            // failure reopens immediately, independent of the threshold.
            warn!("probe failed, reopening circuit");
            self.state = State::Open {
                opened_at: Instant::now(),
            };
            return self.consecutive_failures;
        }

        if let Some(settings) = self.settings {
            if self.consecutive_failures >= settings.failure_threshold {
                if matches!(self.state, State::Closed) {
                    warn!(
                        "{} consecutive failures, opening circuit",
                        self.consecutive_failures
                    );
                }
                // Failures past the threshold restart the recovery window.
                self.state = State::Open {
                    opened_at: Instant::now(),
                };
            }
        }

        self.consecutive_failures
    }
}

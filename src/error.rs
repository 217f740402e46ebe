//! Error types for policy construction and execution.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for policy execution.
pub type PolicyResult<T, E> = std::result::Result<T, PolicyError<E>>;

/// Invalid policy configuration, reported by `build()` rather than at
/// execute time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The retry count must be a positive integer.
    #[error("retry count must be positive")]
    InvalidRetryCount,

    /// The circuit breaker failure threshold must be a positive integer.
    #[error("circuit breaker threshold must be positive")]
    InvalidBreakerThreshold,
}

/// Raised by the policy itself when the circuit is open: the unit of work is
/// never invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("circuit open; next attempt allowed in {retry_after:?}")]
pub struct BrokenCircuitError {
    /// Time remaining until the breaker admits a probe call.
    pub retry_after: Duration,
}

/// Error surfaced by `execute`: either the unit of work's own error, passed
/// through unchanged, or a fail-fast rejection from the circuit breaker.
#[derive(Debug, Error)]
pub enum PolicyError<E> {
    /// The unit of work failed. Carries the original error value.
    #[error("{0}")]
    Inner(E),

    /// The circuit breaker rejected the call before the work was invoked.
    #[error(transparent)]
    Broken(#[from] BrokenCircuitError),
}

impl<E> PolicyError<E> {
    /// Returns the unit of work's own error, if that is what this holds.
    pub fn into_inner(self) -> Option<E> {
        match self {
            PolicyError::Inner(e) => Some(e),
            PolicyError::Broken(_) => None,
        }
    }

    /// True when the call was rejected without invoking the work.
    pub fn is_broken_circuit(&self) -> bool {
        matches!(self, PolicyError::Broken(_))
    }
}

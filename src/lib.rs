//! # backstop
//!
//! Retry and circuit-breaker policies for fallible operations.
//!
//! A [`Policy`] wraps an arbitrary unit of work with configurable resilience
//! behavior: it transparently re-invokes the work when it fails with a
//! recognized error, and refuses to invoke it at all once repeated failures
//! have tripped the circuit breaker. Application code gets a robust
//! operation without hand-writing retry loops.
//!
//! ## Core concepts
//!
//! - **Classification**: the policy only intervenes on errors its
//!   [`Classify`] classifier recognizes (a closure predicate or a
//!   [`KindSet`] of discriminant tags). Everything else propagates
//!   untouched on first occurrence.
//! - **Retry budget**: a fixed number of additional attempts, or unbounded,
//!   with an optional [`Backoff`] delay between attempts and an optional
//!   observer callback per retry.
//! - **Circuit breaker**: after a threshold of consecutive handled failures
//!   the circuit opens and calls fail fast with [`BrokenCircuitError`];
//!   after the recovery delay a single probe call decides whether it closes
//!   again.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use backstop::Policy;
//!
//! #[derive(Debug, PartialEq)]
//! enum StoreError {
//!     Conflict,
//!     Corrupt,
//! }
//!
//! impl std::fmt::Display for StoreError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         match self {
//!             StoreError::Conflict => write!(f, "conflict"),
//!             StoreError::Corrupt => write!(f, "corrupt record"),
//!         }
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = Policy::builder()
//!     .on(|e: &StoreError| *e == StoreError::Conflict)
//!     .retry(3)
//!     .after_waiting(Duration::from_millis(1))
//!     .break_circuit(5, Duration::from_secs(30))
//!     .build()?;
//!
//! let mut attempts = 0;
//! let token = policy.execute(|| {
//!     attempts += 1;
//!     if attempts < 2 {
//!         Err(StoreError::Conflict)
//!     } else {
//!         Ok(42)
//!     }
//! })?;
//!
//! assert_eq!(token, 42);
//! # Ok(())
//! # }
//! ```
//!
//! Async units of work go through [`Policy::execute_async`], and a shared
//! policy can guard every call through a `tower` service via [`PolicyLayer`].

pub mod backoff;
pub mod breaker;
pub mod classify;
pub mod config;
pub mod error;
pub mod layer;
pub mod policy;

pub use backoff::Backoff;
pub use breaker::CircuitState;
pub use classify::{Classify, KindSet, Kinded};
pub use config::{BreakerSettings, PolicyBuilder, RetryBudget};
pub use error::{BrokenCircuitError, ConfigError, PolicyError, PolicyResult};
pub use layer::{PolicyLayer, PolicyService};
pub use policy::Policy;

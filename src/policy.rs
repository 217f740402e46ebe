//! The policy object: the retry loop and its circuit-breaker bookkeeping.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::breaker::{Admission, CircuitBreaker, CircuitState};
use crate::config::{PolicyBuilder, PolicyConfig, RetryBudget};
use crate::error::{BrokenCircuitError, PolicyError, PolicyResult};

/// A configured combination of retry and circuit-breaker behavior wrapping a
/// unit of work.
///
/// A policy is built once and reused across calls; the circuit breaker's
/// memory spans every `execute` on the same instance, so call sites that
/// should share failure history share the policy (typically behind an
/// `Arc`). Breaker state is mutex-protected, making a shared policy safe to
/// call from multiple threads; under concurrent calls the admission check
/// and the final bookkeeping of each call may interleave, so an exact
/// consecutive-failure count assumes sequential use.
///
/// `E` is the error type produced by the unit of work; `C` is the caller
/// context forwarded to the retry observer.
pub struct Policy<E, C = ()> {
    config: PolicyConfig<E, C>,
    breaker: Mutex<CircuitBreaker>,
}

/// Per-call copy of the retry budget.
enum Remaining {
    NoRetry,
    Limited(u32),
    Unbounded,
}

struct FailureOutcome {
    /// Wait to apply before the next step, retry or not.
    delay: Option<Duration>,
    /// False means propagate after any delay.
    retry: bool,
    /// Cumulative handled-failure count, for the observer.
    failures: u32,
}

impl<E> Policy<E, ()> {
    /// Starts configuring a policy with no caller context.
    pub fn builder() -> PolicyBuilder<E, ()> {
        PolicyBuilder::new()
    }
}

impl<E, C> Policy<E, C> {
    /// Starts configuring a policy whose retry observer receives `context`
    /// on every invocation.
    pub fn builder_with_context(context: C) -> PolicyBuilder<E, C> {
        PolicyBuilder::with_context(context)
    }

    pub(crate) fn from_config(config: PolicyConfig<E, C>) -> Self {
        let breaker = Mutex::new(CircuitBreaker::new(config.breaker));
        Self { config, breaker }
    }

    /// Current circuit state, for diagnostics.
    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.lock().snapshot()
    }

    /// Length of the current consecutive handled-failure streak.
    pub fn consecutive_failures(&self) -> u32 {
        self.breaker.lock().consecutive_failures()
    }

    /// The caller context forwarded to the retry observer.
    pub fn context(&self) -> &C {
        &self.config.context
    }

    fn handles(&self, error: &E) -> bool {
        self.config
            .classifier
            .as_ref()
            .is_some_and(|c| c.handles(error))
    }

    fn admit(&self) -> Result<(), BrokenCircuitError> {
        match self.breaker.lock().admit() {
            Admission::Proceed | Admission::Probe => Ok(()),
            Admission::Reject(retry_after) => {
                warn!("circuit open, failing fast; retry in {:?}", retry_after);
                Err(BrokenCircuitError { retry_after })
            }
        }
    }

    fn remaining_budget(&self) -> Remaining {
        match self.config.retry {
            None => Remaining::NoRetry,
            Some(RetryBudget::Limited(n)) => Remaining::Limited(n),
            Some(RetryBudget::Unbounded) => Remaining::Unbounded,
        }
    }

    /// Failure bookkeeping shared by both execute flavors: count the failure
    /// against the breaker, then decide delay and retry-or-give-up from the
    /// remaining budget.
    fn note_failure(&self, remaining: &mut Remaining, retry_index: usize) -> FailureOutcome {
        let failures = self.breaker.lock().record_failure();

        let retry = match remaining {
            Remaining::NoRetry => {
                return FailureOutcome {
                    delay: None,
                    retry: false,
                    failures,
                }
            }
            Remaining::Unbounded => true,
            Remaining::Limited(n) => {
                if *n > 0 {
                    *n -= 1;
                    true
                } else {
                    false
                }
            }
        };

        // With a budget configured the wait applies before the retry and
        // before the final propagation alike.
        let delay = self
            .config
            .backoff
            .map(|b| b.delay_for_attempt(retry_index));

        FailureOutcome {
            delay,
            retry,
            failures,
        }
    }

    fn observe_retry(&self, error: &E, failures: u32) {
        if let Some(on_retry) = &self.config.on_retry {
            on_retry(error, failures, &self.config.context);
        }
    }

    /// Invokes `work`, retrying handled failures within the configured
    /// budget and honoring the circuit breaker.
    ///
    /// Admission is checked once per call, before the first invocation;
    /// retries within the call re-invoke the work directly. Inter-retry
    /// delays block the calling thread. Errors outside the handled kinds
    /// propagate on first occurrence with no bookkeeping.
    pub fn execute<T, W>(&self, mut work: W) -> PolicyResult<T, E>
    where
        W: FnMut() -> Result<T, E>,
        E: Display,
    {
        self.admit()?;

        let mut remaining = self.remaining_budget();
        let mut retry_index = 0;

        loop {
            match work() {
                Ok(value) => {
                    self.breaker.lock().record_success();
                    if retry_index > 0 {
                        debug!("operation succeeded after {} attempts", retry_index + 1);
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if !self.handles(&error) {
                        debug!("unhandled error, propagating: {}", error);
                        return Err(PolicyError::Inner(error));
                    }

                    let outcome = self.note_failure(&mut remaining, retry_index);
                    if let Some(delay) = outcome.delay {
                        std::thread::sleep(delay);
                    }
                    if !outcome.retry {
                        warn!(
                            "giving up after {} consecutive failures: {}",
                            outcome.failures, error
                        );
                        return Err(PolicyError::Inner(error));
                    }

                    warn!("attempt failed ({}), retrying: {}", outcome.failures, error);
                    self.observe_retry(&error, outcome.failures);
                    retry_index += 1;
                }
            }
        }
    }

    /// Asynchronous flavor of [`Policy::execute`]; inter-retry delays await
    /// instead of blocking.
    pub async fn execute_async<T, W, Fut>(&self, mut work: W) -> PolicyResult<T, E>
    where
        W: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.admit()?;

        let mut remaining = self.remaining_budget();
        let mut retry_index = 0;

        loop {
            match work().await {
                Ok(value) => {
                    self.breaker.lock().record_success();
                    if retry_index > 0 {
                        debug!("operation succeeded after {} attempts", retry_index + 1);
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if !self.handles(&error) {
                        debug!("unhandled error, propagating: {}", error);
                        return Err(PolicyError::Inner(error));
                    }

                    let outcome = self.note_failure(&mut remaining, retry_index);
                    if let Some(delay) = outcome.delay {
                        tokio::time::sleep(delay).await;
                    }
                    if !outcome.retry {
                        warn!(
                            "giving up after {} consecutive failures: {}",
                            outcome.failures, error
                        );
                        return Err(PolicyError::Inner(error));
                    }

                    warn!("attempt failed ({}), retrying: {}", outcome.failures, error);
                    self.observe_retry(&error, outcome.failures);
                    retry_index += 1;
                }
            }
        }
    }
}

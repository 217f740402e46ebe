//! Policy configuration and its builder.
//!
//! The builder exposes three declarations, each overwriting any earlier call:
//! `on` (which errors are handled), the `retry` family (budget, delay,
//! observer), and `break_circuit` (threshold plus recovery delay). Retrying
//! and circuit-breaking are independent; either, both, or neither may be
//! configured.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::Backoff;
use crate::classify::{Classify, KindSet, Kinded};
use crate::error::ConfigError;
use crate::policy::Policy;

/// How many retries an execute call may spend after the initial attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryBudget {
    /// A fixed number of additional attempts.
    Limited(u32),
    /// Retry until success or an unhandled error.
    Unbounded,
}

/// Circuit breaker thresholds. Both fields are required together; a policy
/// without these settings never breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerSettings {
    /// Consecutive handled failures that open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before admitting a probe.
    pub recovery_delay: Duration,
}

pub(crate) type OnRetry<E, C> = Box<dyn Fn(&E, u32, &C) + Send + Sync>;

/// Immutable configuration produced by [`PolicyBuilder::build`].
pub(crate) struct PolicyConfig<E, C = ()> {
    pub(crate) classifier: Option<Box<dyn Classify<E>>>,
    pub(crate) retry: Option<RetryBudget>,
    pub(crate) backoff: Option<Backoff>,
    pub(crate) on_retry: Option<OnRetry<E, C>>,
    pub(crate) breaker: Option<BreakerSettings>,
    pub(crate) context: C,
}

/// Configures a [`Policy`].
///
/// With no declarations at all, `build` produces a policy that passes every
/// call straight through: no error is handled, nothing is retried, the
/// circuit never breaks.
pub struct PolicyBuilder<E, C = ()> {
    classifier: Option<Box<dyn Classify<E>>>,
    retry: Option<RetryBudget>,
    backoff: Option<Backoff>,
    on_retry: Option<OnRetry<E, C>>,
    breaker: Option<(u32, Duration)>,
    context: C,
}

impl<E> PolicyBuilder<E, ()> {
    pub(crate) fn new() -> Self {
        Self::with_context(())
    }
}

impl<E, C> PolicyBuilder<E, C> {
    pub(crate) fn with_context(context: C) -> Self {
        Self {
            classifier: None,
            retry: None,
            backoff: None,
            on_retry: None,
            breaker: None,
            context,
        }
    }

    /// Registers the classifier deciding which errors this policy handles.
    ///
    /// Without a classifier no error is ever intervened on, so the retry and
    /// circuit-breaker declarations have no effect.
    pub fn on(mut self, classifier: impl Classify<E> + 'static) -> Self {
        self.classifier = Some(Box::new(classifier));
        self
    }

    /// Handles exactly these error kinds, by set membership.
    pub fn on_kinds<K>(self, kinds: impl IntoIterator<Item = K>) -> Self
    where
        E: Kinded<Kind = K>,
        K: PartialEq + Send + Sync + 'static,
    {
        self.on(KindSet::new(kinds))
    }

    /// Permits up to `count` retries after the initial attempt.
    ///
    /// `count` must be positive; zero is rejected by [`PolicyBuilder::build`].
    pub fn retry(mut self, count: u32) -> Self {
        self.retry = Some(RetryBudget::Limited(count));
        self
    }

    /// Retries until success or an unhandled error.
    pub fn retry_forever(mut self) -> Self {
        self.retry = Some(RetryBudget::Unbounded);
        self
    }

    /// Waits according to `backoff` before every retry. A plain `Duration`
    /// gives a fixed delay.
    pub fn after_waiting(mut self, backoff: impl Into<Backoff>) -> Self {
        self.backoff = Some(backoff.into());
        self
    }

    /// Observer invoked with the error, the cumulative failure count, and
    /// the caller context on every retry. Purely a side effect; it cannot
    /// alter the retry decision.
    pub fn on_retry(mut self, callback: impl Fn(&E, u32, &C) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Box::new(callback));
        self
    }

    /// Opens the circuit after `failure_threshold` consecutive handled
    /// failures and keeps it open for `recovery_delay` before a probe.
    pub fn break_circuit(mut self, failure_threshold: u32, recovery_delay: Duration) -> Self {
        self.breaker = Some((failure_threshold, recovery_delay));
        self
    }

    /// Validates the declarations and produces the policy.
    pub fn build(self) -> Result<Policy<E, C>, ConfigError> {
        if self.retry == Some(RetryBudget::Limited(0)) {
            return Err(ConfigError::InvalidRetryCount);
        }

        let breaker = match self.breaker {
            Some((0, _)) => return Err(ConfigError::InvalidBreakerThreshold),
            Some((threshold, delay)) => Some(BreakerSettings {
                failure_threshold: threshold,
                recovery_delay: delay,
            }),
            None => None,
        };

        Ok(Policy::from_config(PolicyConfig {
            classifier: self.classifier,
            retry: self.retry,
            backoff: self.backoff,
            on_retry: self.on_retry,
            breaker,
            context: self.context,
        }))
    }
}

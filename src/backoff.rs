//! Inter-retry delay schedules.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum BackoffKind {
    Fixed,
    Exponential,
}

/// Delay applied before each retry attempt.
///
/// A plain `Duration` converts into a fixed schedule, so callers that just
/// want "wait this long between attempts" never name this type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Backoff {
    kind: BackoffKind,
    initial: Duration,
    factor: f32,
    max: Duration,
    jitter: bool,
}

impl Backoff {
    /// The same delay before every retry.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            kind: BackoffKind::Fixed,
            initial: delay,
            factor: 1.0,
            max: delay,
            jitter: false,
        }
    }

    /// Delay growing by `factor` per attempt, capped at `max`.
    pub fn exponential(initial: Duration, factor: f32, max: Duration) -> Self {
        Self {
            kind: BackoffKind::Exponential,
            initial,
            factor,
            max,
            jitter: false,
        }
    }

    /// Adds up to 30% random jitter to every delay.
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    /// Delay before retry `attempt` (zero-based).
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let base = match self.kind {
            BackoffKind::Fixed => self.initial,
            BackoffKind::Exponential => {
                let mult = self.factor.powi(attempt as i32);
                let d = self.initial.mul_f32(mult);
                if d > self.max {
                    self.max
                } else {
                    d
                }
            }
        };

        if self.jitter {
            use rand::Rng;
            let fraction = rand::thread_rng().gen_range(0.0..0.3);
            base + base.mul_f64(fraction)
        } else {
            base
        }
    }
}

impl From<Duration> for Backoff {
    fn from(delay: Duration) -> Self {
        Backoff::fixed(delay)
    }
}

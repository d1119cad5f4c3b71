//! Bounded retry with back-off, expressed as an explicit state machine.
//!
//! Each item moves `Pending -> (Retrying -> Pending)* -> Succeeded | Failed`.
//! Waiting happens only in the `Retrying` state and goes through the
//! injected [`Clock`], so the schedule can be checked without real delays.

use std::error::Error;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Classify, FailureKind, RetryError};
use crate::traits::Clock;

/// Retry budget and delays for one kind of external call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts for transient failures, the first one included.
    pub max_attempts: u32,
    /// Delay after failed attempt `k` is `k * backoff_step_ms`.
    pub backoff_step_ms: u64,
    /// Fixed cooldown after a rate-limit answer.
    pub rate_limit_delay_ms: u64,
    /// Cooldowns allowed before giving up on a rate-limited item.
    pub max_rate_limited: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step_ms: 5_000,
            rate_limit_delay_ms: 5_000,
            max_rate_limited: 3,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_step_ms.saturating_mul(u64::from(attempt)))
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }
}

/// Where a single item is in its retry lifecycle.
#[derive(Debug)]
pub enum RetryState<T, E: Error + 'static> {
    /// Ready to make `attempt` (1-based).
    Pending { attempt: u32, rate_limited: u32 },
    /// Waiting for `next_eligible` before making `attempt`.
    Retrying {
        attempt: u32,
        rate_limited: u32,
        next_eligible: DateTime<Utc>,
    },
    Succeeded(T),
    Failed(RetryError<E>),
}

impl<T, E: Error + Classify + 'static> RetryState<T, E> {
    pub fn start() -> Self {
        Self::Pending {
            attempt: 1,
            rate_limited: 0,
        }
    }

    /// Transition out of `Pending` given the outcome of the attempt.
    pub fn after_attempt(
        attempt: u32,
        rate_limited: u32,
        result: Result<T, E>,
        policy: &RetryPolicy,
        now: DateTime<Utc>,
    ) -> Self {
        let err = match result {
            Ok(value) => return Self::Succeeded(value),
            Err(err) => err,
        };

        match err.kind() {
            FailureKind::RateLimited => {
                if rate_limited >= policy.max_rate_limited {
                    return Self::Failed(RetryError::RateLimited {
                        waits: rate_limited,
                    });
                }
                let delay = policy.rate_limit_delay();
                warn!(attempt, ?delay, "rate limited, cooling down");
                Self::Retrying {
                    attempt,
                    rate_limited: rate_limited + 1,
                    next_eligible: later(now, delay),
                }
            }
            FailureKind::Transient => {
                if attempt >= policy.max_attempts {
                    return Self::Failed(RetryError::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
                let delay = policy.backoff(attempt);
                warn!(attempt, ?delay, error = %err, "attempt failed, backing off");
                Self::Retrying {
                    attempt: attempt + 1,
                    rate_limited,
                    next_eligible: later(now, delay),
                }
            }
            FailureKind::Permanent => Self::Failed(RetryError::Permanent(err)),
        }
    }
}

/// Drive `op` through the retry state machine until it succeeds or fails.
///
/// `op` receives the 1-based attempt number.
pub fn run<T, E, F>(
    policy: &RetryPolicy,
    clock: &dyn Clock,
    label: &str,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: Error + Classify + 'static,
    F: FnMut(u32) -> Result<T, E>,
{
    let mut state = RetryState::start();
    loop {
        state = match state {
            RetryState::Pending {
                attempt,
                rate_limited,
            } => {
                debug!(label, attempt, "attempting");
                let result = op(attempt);
                RetryState::after_attempt(attempt, rate_limited, result, policy, clock.now())
            }
            RetryState::Retrying {
                attempt,
                rate_limited,
                next_eligible,
            } => {
                clock.sleep_until(next_eligible);
                RetryState::Pending {
                    attempt,
                    rate_limited,
                }
            }
            RetryState::Succeeded(value) => return Ok(value),
            RetryState::Failed(err) => {
                warn!(label, error = %err, "giving up");
                return Err(err);
            }
        };
    }
}

fn later(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(delay)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(now)
}

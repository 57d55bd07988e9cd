//! Generic retry wrapper with linear backoff.
//!
//! The wrapper knows nothing about HTTP: callers supply the operation and a
//! predicate deciding which errors are worth another attempt.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::core::budget::remaining_budget;

/// Attempt ceiling and linear backoff unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay before the attempt following `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Why a retried operation gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryFailure<E> {
    /// The predicate rejected the error; no further attempts were made.
    Terminal { attempt: u32, error: E },
    /// Every attempt failed with a retryable error.
    Exhausted { attempts: u32, error: E },
    /// The next backoff would end past the deadline; `error` is the last failure.
    OutOfTime { attempts: u32, error: E },
}

impl<E> RetryFailure<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Terminal { attempt, .. } => *attempt,
            Self::Exhausted { attempts, .. } | Self::OutOfTime { attempts, .. } => *attempts,
        }
    }
}

/// Run `op` until it succeeds, fails terminally, or the ceiling is reached.
///
/// `op` receives the 1-based attempt number. Between attempts the wrapper
/// sleeps `policy.delay_for(attempt)`. With a `deadline`, a backoff that would
/// not leave time for another attempt ends the loop with the last error
/// instead of sleeping.
pub fn retry<T, E, F, P>(
    policy: &RetryPolicy,
    deadline: Option<Instant>,
    is_retryable: P,
    mut op: F,
) -> Result<T, RetryFailure<E>>
where
    F: FnMut(u32) -> Result<T, E>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(error) if !is_retryable(&error) => {
                debug!(attempt, %error, "terminal error");
                return Err(RetryFailure::Terminal { attempt, error });
            }
            Err(error) if attempt >= policy.max_attempts => {
                warn!(attempts = attempt, %error, "retry ceiling reached");
                return Err(RetryFailure::Exhausted {
                    attempts: attempt,
                    error,
                });
            }
            Err(error) => {
                let delay = policy.delay_for(attempt);
                if let Some(deadline) = deadline
                    && remaining_budget(deadline).is_none_or(|left| delay >= left)
                {
                    warn!(
                        attempts = attempt,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "no time left to retry"
                    );
                    return Err(RetryFailure::OutOfTime {
                        attempts: attempt,
                        error,
                    });
                }
                warn!(attempt, delay_ms = delay.as_millis() as u64, %error, "retrying");
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
                attempt += 1;
            }
        }
    }
}

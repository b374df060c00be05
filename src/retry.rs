//! Bounded retry for flaky automation steps.
//!
//! [`RetryExecutor::run`] takes the operation as a closure and returns either
//! its value or a [`RetryError`]. `Exhausted` is distinct from `Aborted` so
//! callers can tell "this already spent its own retries" apart from a
//! failure that was never retried.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, warn};

use crate::driver::DriverError;
use crate::error::{FailureKind, ScoutError};

/// Errors that know whether repeating the operation in place could help.
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for DriverError {
    fn is_transient(&self) -> bool {
        self.kind == FailureKind::Transient
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RetryError<E> {
    /// Every attempt failed with a transient error; wraps the last one.
    #[error("retry exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    /// A non-transient failure stopped the loop before the budget ran out.
    #[error("{0}")]
    Aborted(E),
}

impl From<RetryError<DriverError>> for ScoutError {
    fn from(err: RetryError<DriverError>) -> Self {
        match err {
            RetryError::Exhausted { attempts, last } => {
                ScoutError::RetryExhausted { attempts, last }
            }
            RetryError::Aborted(e) => ScoutError::Driver(e),
        }
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Fixed pause between attempts, in milliseconds.
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
        }
    }
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Runs fallible async operations under a [`RetryPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Invoke `op` until it succeeds, fails non-transiently, or the attempt
    /// budget is spent. `label` names the step in logs.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(RetryError::Aborted(e)),
                Err(e) if attempt >= max_attempts => {
                    error!(
                        step = label,
                        attempts = attempt,
                        error = %e,
                        "final retry attempt failed"
                    );
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
                Err(e) => {
                    warn!(
                        step = label,
                        attempt,
                        max_attempts,
                        error = %e,
                        "attempt failed, retrying"
                    );
                    sleep(self.policy.delay()).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn executor(max_attempts: u32) -> RetryExecutor {
        RetryExecutor::new(RetryPolicy {
            max_attempts,
            delay_ms: 0,
        })
    }

    #[tokio::test]
    async fn succeeds_first_time() {
        let calls = Cell::new(0);
        let result: Result<u32, RetryError<DriverError>> = executor(3)
            .run("nav", || {
                calls.set(calls.get() + 1);
                async { Ok(7) }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn transient_then_success() {
        let calls = Cell::new(0);
        let result = executor(3)
            .run("nav", || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n < 3 {
                        Err(DriverError::transient("timeout"))
                    } else {
                        Ok("loaded")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "loaded");
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn exhausted_wraps_last_cause() {
        let calls = Cell::new(0);
        let result: Result<(), _> = executor(3)
            .run("nav", || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move { Err(DriverError::transient(format!("timeout #{n}"))) }
            })
            .await;
        assert_eq!(
            result.unwrap_err(),
            RetryError::Exhausted {
                attempts: 3,
                last: DriverError::transient("timeout #3"),
            }
        );
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn non_transient_aborts_immediately() {
        let calls = Cell::new(0);
        let result: Result<(), _> = executor(5)
            .run("nav", || {
                calls.set(calls.get() + 1);
                async { Err(DriverError::crash("invalid session id")) }
            })
            .await;
        assert_eq!(
            result.unwrap_err(),
            RetryError::Aborted(DriverError::crash("invalid session id"))
        );
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn exhausted_maps_to_crash_shaped_scout_error() {
        let err: ScoutError = RetryError::Exhausted {
            attempts: 3,
            last: DriverError::transient("timeout"),
        }
        .into();
        assert_eq!(err.failure_kind(), FailureKind::CrashShaped);

        let err: ScoutError = RetryError::Aborted(DriverError::logical("bad url")).into();
        assert_eq!(err.failure_kind(), FailureKind::Logical);
    }

    #[test]
    fn default_policy_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay(), Duration::from_secs(1));
    }
}

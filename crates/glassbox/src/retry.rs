//! Retry policies for transient failures.
//!
//! [`retry`] and [`retry_async`] run a fallible operation up to a policy's
//! attempt budget, sleeping between tries. Errors opt in to retrying through
//! the [`Transient`] trait; anything non-transient is returned on the first
//! failure. Every retry is logged with the attempts remaining, and giving up
//! is logged as an error.
//!
//! [`FlakyEndpoint`] is a stand-in remote endpoint for exercising the
//! combinators against scripted connection failures.

use std::fmt;
use std::future::Future;
use std::thread;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, warn};

/// How often and how patiently an operation is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum calls to the operation, counting the first.
    pub max_attempts: u32,
    /// Pause between consecutive attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Create a policy from an attempt budget and a fixed delay.
    #[must_use]
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

impl Default for RetryPolicy {
    /// Three attempts, one second apart.
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "up to {} attempts, {:?} apart",
            self.max_attempts, self.delay
        )
    }
}

/// Classifies whether an error is worth retrying.
pub trait Transient {
    /// True when a later attempt could plausibly succeed.
    fn is_transient(&self) -> bool;
}

/// A successful operation together with what the retrying cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome<T> {
    /// The value the operation finally produced.
    pub value: T,
    /// Attempts made, counting the successful one.
    pub attempts: u32,
    /// Total time spent sleeping between attempts.
    pub slept: Duration,
}

/// Run `op` until it succeeds or the policy's attempts are exhausted.
///
/// The operation receives the 1-based attempt number. A policy with a zero
/// attempt budget still makes one call.
///
/// # Errors
///
/// Returns the last error once the budget is spent, or the first error that
/// is not [`Transient`].
pub fn retry<T, E, F>(policy: &RetryPolicy, mut op: F) -> Result<RetryOutcome<T>, E>
where
    E: Transient + fmt::Display,
    F: FnMut(u32) -> Result<T, E>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut slept = Duration::ZERO;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op(attempt) {
            Ok(value) => {
                return Ok(RetryOutcome {
                    value,
                    attempts: attempt,
                    slept,
                });
            }
            Err(err) if !err.is_transient() => {
                debug!("attempt {attempt} failed with a non-transient error: {err}");
                return Err(err);
            }
            Err(err) if attempt >= max_attempts => {
                error!("giving up after {attempt} attempts: {err}");
                return Err(err);
            }
            Err(err) => {
                let attempts_left = max_attempts - attempt;
                warn!(
                    "attempt {attempt} failed: {err}; retrying in {:?} ({attempts_left} attempts left)",
                    policy.delay
                );
                thread::sleep(policy.delay);
                slept += policy.delay;
            }
        }
    }
}

/// Async twin of [`retry`], sleeping on the tokio timer between attempts.
///
/// # Errors
///
/// Returns the last error once the budget is spent, or the first error that
/// is not [`Transient`].
pub async fn retry_async<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut op: F,
) -> Result<RetryOutcome<T>, E>
where
    E: Transient + fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut slept = Duration::ZERO;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op(attempt).await {
            Ok(value) => {
                return Ok(RetryOutcome {
                    value,
                    attempts: attempt,
                    slept,
                });
            }
            Err(err) if !err.is_transient() => {
                debug!("attempt {attempt} failed with a non-transient error: {err}");
                return Err(err);
            }
            Err(err) if attempt >= max_attempts => {
                error!("giving up after {attempt} attempts: {err}");
                return Err(err);
            }
            Err(err) => {
                let attempts_left = max_attempts - attempt;
                warn!(
                    "attempt {attempt} failed: {err}; retrying in {:?} ({attempts_left} attempts left)",
                    policy.delay
                );
                tokio::time::sleep(policy.delay).await;
                slept += policy.delay;
            }
        }
    }
}

// === Demo Endpoint ===

/// Failures an endpoint call can produce.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    /// The connection dropped before a response arrived. Retryable.
    #[error("connection lost on attempt {attempt}")]
    ConnectionLost {
        /// Which call the connection failed on.
        attempt: u32,
    },

    /// The endpoint refused the request. Retrying will not change its mind.
    #[error("request rejected: {reason}")]
    Rejected {
        /// The endpoint's stated reason.
        reason: String,
    },
}

impl Transient for EndpointError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionLost { .. })
    }
}

/// A stand-in endpoint that drops a scripted number of connections.
#[derive(Debug, Clone)]
pub struct FlakyEndpoint {
    failures_before_success: u32,
    reject: bool,
    calls: u32,
}

impl FlakyEndpoint {
    /// An endpoint that loses the first `failures` connections, then answers.
    #[must_use]
    pub fn new(failures: u32) -> Self {
        Self {
            failures_before_success: failures,
            reject: false,
            calls: 0,
        }
    }

    /// An endpoint that refuses every request outright.
    #[must_use]
    pub fn rejecting() -> Self {
        Self {
            failures_before_success: 0,
            reject: true,
            calls: 0,
        }
    }

    /// Calls made so far.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls
    }

    /// Attempt to fetch the payload.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::ConnectionLost`] while the scripted failure
    /// budget lasts, or [`EndpointError::Rejected`] from a rejecting endpoint.
    pub fn fetch(&mut self) -> Result<String, EndpointError> {
        self.calls += 1;
        if self.reject {
            return Err(EndpointError::Rejected {
                reason: "endpoint refused the request".to_string(),
            });
        }
        if self.calls <= self.failures_before_success {
            return Err(EndpointError::ConnectionLost {
                attempt: self.calls,
            });
        }
        Ok(format!("connected on attempt {}", self.calls))
    }
}

/// How a scripted endpoint run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RetryDemo {
    /// The endpoint answered within the attempt budget.
    Recovered {
        /// The payload the endpoint finally returned.
        payload: String,
        /// Attempts made, counting the successful one.
        attempts: u32,
        /// Total milliseconds slept between attempts.
        slept_ms: u64,
    },
    /// Every allowed attempt failed.
    GaveUp {
        /// Attempts made before giving up.
        attempts: u32,
        /// The final error.
        error: String,
    },
}

/// Run a [`FlakyEndpoint`] with `failures` scripted drops under `policy`.
#[must_use]
pub fn run_flaky_demo(policy: &RetryPolicy, failures: u32) -> RetryDemo {
    let mut endpoint = FlakyEndpoint::new(failures);
    match retry(policy, |_| endpoint.fetch()) {
        Ok(outcome) => RetryDemo::Recovered {
            payload: outcome.value,
            attempts: outcome.attempts,
            slept_ms: u64::try_from(outcome.slept.as_millis()).unwrap_or(u64::MAX),
        },
        Err(err) => RetryDemo::GaveUp {
            attempts: endpoint.calls(),
            error: err.to_string(),
        },
    }
}

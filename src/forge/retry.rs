//! Bounded retry with exponential backoff for capability calls.
//!
//! [`RetryingCaller`] wraps one asynchronous operation, re-invoking it until
//! it succeeds or the attempt budget of its [`RetryPolicy`] is spent. Before
//! attempt `k + 1` it waits `initial_delay * 2^(k-1)`; with the defaults the
//! waits are 2s and 4s. The last error is returned unchanged.
//!
//! ```ignore
//! use std::sync::Arc;
//! use ps_forge::forge::{RetryPolicy, RetryingCaller, TracingSink};
//!
//! let caller = RetryingCaller::new(RetryPolicy::default(), Arc::new(TracingSink));
//! let statement = caller
//!     .call("Problem Statement", |cfg| service.generate_statement(cfg), config)
//!     .await?;
//! ```

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::events::{EventSink, FailureNotice, ForgeEvent, ProgressMessage, Severity};

/// Default attempt budget per call.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default wait before the first retry.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(2000);

/// Attempt budget and backoff base for a retried call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: DEFAULT_INITIAL_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy. `max_retries` counts total attempts and is raised to 1 if zero.
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            initial_delay,
        }
    }

    /// Sets the attempt budget (at least 1).
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Sets the wait before the first retry.
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Total number of attempts a call may make.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Wait after `failed_attempts` consecutive failures, before the next attempt.
    pub fn delay_after(&self, failed_attempts: u32) -> Duration {
        if failed_attempts == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32
            .checked_shl(failed_attempts - 1)
            .unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor)
    }

    /// Waits before attempts `2..=max_retries`, in order.
    pub fn backoff_schedule(&self) -> Vec<Duration> {
        (1..self.max_retries).map(|k| self.delay_after(k)).collect()
    }

    /// Sum of all waits of a call that fails every attempt.
    pub fn worst_case_wait(&self) -> Duration {
        self.backoff_schedule()
            .into_iter()
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

/// Executes operations with bounded retry, reporting each attempt to a sink.
///
/// The caller is stateless between calls, so clones can drive independent
/// calls concurrently; each call has its own attempt counter and timers.
#[derive(Clone)]
pub struct RetryingCaller {
    policy: RetryPolicy,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for RetryingCaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingCaller")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RetryingCaller {
    /// Creates a caller with the given policy and event sink.
    pub fn new(policy: RetryPolicy, sink: Arc<dyn EventSink>) -> Self {
        Self { policy, sink }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Runs `op(input)` until it succeeds or the attempt budget is spent.
    ///
    /// Each attempt receives a fresh clone of `input`. The output is returned
    /// exactly as produced.
    ///
    /// # Errors
    ///
    /// Returns the error of the final attempt once all attempts have failed.
    pub async fn call<I, O, E, F, Fut>(&self, operation: &str, op: F, input: I) -> Result<O, E>
    where
        I: Clone,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<O, E>>,
        E: Display,
    {
        let max_attempts = self.policy.max_retries;
        let mut attempt = 1u32;

        loop {
            self.sink.emit(ForgeEvent::progress(
                operation,
                ProgressMessage::for_attempt(attempt),
            ));

            let err = match op(input.clone()).await {
                Ok(output) => {
                    if attempt > 1 {
                        tracing::debug!(operation, attempt, "Call succeeded after retry");
                    }
                    return Ok(output);
                }
                Err(err) => err,
            };

            let final_attempt = attempt >= max_attempts;
            self.sink.emit(ForgeEvent::attempt_failed(FailureNotice {
                operation: operation.to_string(),
                attempt,
                max_attempts,
                final_attempt,
                severity: if final_attempt {
                    Severity::Fatal
                } else {
                    Severity::Warning
                },
                error: err.to_string(),
            }));

            if final_attempt {
                return Err(err);
            }

            let wait = self.policy.delay_after(attempt);
            self.sink.emit(ForgeEvent::progress(
                operation,
                ProgressMessage::Backoff {
                    failed_attempt: attempt,
                    wait_ms: u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                },
            ));
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }
}

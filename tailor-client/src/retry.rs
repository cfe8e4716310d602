//! Retrying call invocation
//!
//! [`RetryingInvoker`] runs a call up to a fixed number of attempts. Only
//! failures that are structured [`RpcError`](tailor_core::RpcError)s
//! carrying a non-empty `retryable` metadata value are retried; success,
//! plain errors and non-retryable structured errors end the loop at once.
//! When attempts run out the last error is returned unchanged.
//!
//! By default attempts follow each other without delay. A [`Backoff`]
//! policy can be configured to wait between them.
//!
//! # Examples
//!
//! ```rust
//! use tailor_client::RetryingInvoker;
//! use tailor_core::{ErrorCode, RpcError};
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let calls = AtomicU32::new(0);
//! let invoker = RetryingInvoker::new();
//!
//! let result = invoker
//!     .invoke(|| async {
//!         if calls.fetch_add(1, Ordering::SeqCst) < 2 {
//!             Err(RpcError::retryable(ErrorCode::Unavailable, "busy"))
//!         } else {
//!             Ok(42)
//!         }
//!     })
//!     .await;
//!
//! assert_eq!(result.unwrap(), 42);
//! assert_eq!(calls.load(Ordering::SeqCst), 3);
//! # }
//! ```

use crate::metrics::ClientMetrics;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tailor_core::AsRpcError;

/// Attempts made by a default [`RetryingInvoker`]
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Delay policy between attempts
///
/// `attempt` is the 0-based index of the attempt that just failed.
pub trait Backoff: Send + Sync {
    /// How long to wait before the next attempt
    fn delay(&self, attempt: u32) -> Duration;
}

/// Retry immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackoff;

impl Backoff for NoBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        Duration::ZERO
    }
}

/// Wait the same amount before every retry
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    /// Create a fixed delay policy
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Backoff for FixedDelay {
    fn delay(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

/// Exponentially growing delay with optional jitter
///
/// The delay after attempt `n` is `min_delay * 2^n`, capped at `max_delay`.
/// With jitter a random 0-25% is added on top.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    min_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl ExponentialBackoff {
    /// Create an exponential policy without jitter
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay,
            jitter: false,
        }
    }

    /// Add up to 25% random jitter to each delay
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(50), Duration::from_secs(2)).with_jitter()
    }
}

impl Backoff for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let base_ms = (self.min_delay.as_millis() as u64)
            .saturating_mul(2u64.saturating_pow(attempt));
        let delay_ms = std::cmp::min(base_ms, self.max_delay.as_millis() as u64);

        if self.jitter && delay_ms > 0 {
            use rand::Rng;
            let jitter_ms = rand::thread_rng().gen_range(0..=(delay_ms / 4));
            Duration::from_millis(delay_ms + jitter_ms)
        } else {
            Duration::from_millis(delay_ms)
        }
    }
}

/// How one attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The call succeeded
    Success,
    /// The call failed with a retryable error and will be retried
    Retryable,
    /// The call failed with a retryable error but no attempts are left
    Exhausted,
    /// The call failed with an error that ends the loop
    Fatal,
}

impl AttemptOutcome {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::Retryable => "retryable",
            AttemptOutcome::Exhausted => "exhausted",
            AttemptOutcome::Fatal => "fatal",
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of one attempt, for logs and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallAttempt {
    /// 0-based attempt index
    pub index: u32,
    /// Time spent in the call
    pub elapsed: Duration,
    /// How the attempt ended
    pub outcome: AttemptOutcome,
}

/// Runs a call until it succeeds, fails fatally or runs out of attempts
#[derive(Clone)]
pub struct RetryingInvoker {
    max_attempts: u32,
    backoff: Arc<dyn Backoff>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl fmt::Debug for RetryingInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryingInvoker")
            .field("max_attempts", &self.max_attempts)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl Default for RetryingInvoker {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryingInvoker {
    /// Five attempts, no delay, no metrics
    pub fn new() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Arc::new(NoBackoff),
            metrics: None,
        }
    }

    /// Set the attempt cap; values below 1 are raised to 1
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Wait between attempts according to `backoff`
    pub fn with_backoff(mut self, backoff: impl Backoff + 'static) -> Self {
        self.backoff = Arc::new(backoff);
        self
    }

    /// Record every attempt in `metrics`
    pub fn with_metrics(mut self, metrics: Arc<ClientMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The attempt cap
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `call` until it succeeds or stops being retryable
    ///
    /// Returns the first success, the first non-retryable error, or the
    /// error of the last attempt once the cap is reached. Each retried
    /// failure is logged once at warn level.
    pub async fn invoke<T, E, F, Fut>(&self, mut call: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: AsRpcError + fmt::Display,
    {
        let mut attempt: u32 = 0;
        loop {
            let started = Instant::now();
            let result = call().await;
            let elapsed = started.elapsed();

            let err = match result {
                Ok(value) => {
                    self.record(CallAttempt {
                        index: attempt,
                        elapsed,
                        outcome: AttemptOutcome::Success,
                    });
                    return Ok(value);
                }
                Err(err) => err,
            };

            let retryable = err
                .as_rpc_error()
                .is_some_and(|rpc| rpc.is_retryable());
            let last = attempt + 1 >= self.max_attempts;

            if !retryable {
                self.record(CallAttempt {
                    index: attempt,
                    elapsed,
                    outcome: AttemptOutcome::Fatal,
                });
                tracing::debug!(attempt, error = %err, "Call failed with non-retryable error");
                return Err(err);
            }

            self.record(CallAttempt {
                index: attempt,
                elapsed,
                outcome: if last {
                    AttemptOutcome::Exhausted
                } else {
                    AttemptOutcome::Retryable
                },
            });

            if last {
                tracing::warn!(
                    attempt,
                    max_attempts = self.max_attempts,
                    error = %err,
                    "Giving up after retryable error"
                );
                return Err(err);
            }

            tracing::warn!(attempt, error = %err, "Retrying after error");

            let delay = self.backoff.delay(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }

    fn record(&self, attempt: CallAttempt) {
        if let Some(metrics) = &self.metrics {
            metrics.record_attempt(&attempt);
        }
    }
}

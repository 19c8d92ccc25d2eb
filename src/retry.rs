//! Bounded retry and polling primitives.
//!
//! [`retry`] drives an async attempt with exponential backoff until it
//! succeeds, fails permanently, the deadline passes or the context is
//! cancelled. [`Ticker`] is the fixed-period variant used by delete loops.
//!
//! # Example
//!
//! ```ignore
//! let health = retry(&ctx, timeout, &settings, "cluster health", || async {
//!     client.cluster_health(project, id).await.map_err(RetryError::classify)
//! })
//! .await?;
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::context::OperationContext;
use crate::error::{MetaKubeError, Result};

/// Outcome of a failed attempt.
#[derive(Debug)]
pub enum RetryError {
    /// Try again after the next backoff interval.
    Retryable(MetaKubeError),
    /// Stop and return the error unchanged.
    Permanent(MetaKubeError),
}

/// Result of a single attempt.
pub type RetryResult<T> = std::result::Result<T, RetryError>;

impl RetryError {
    /// Marks an error as retryable.
    pub fn retryable(error: impl Into<MetaKubeError>) -> Self {
        Self::Retryable(error.into())
    }

    /// Marks an error as permanent.
    pub fn permanent(error: impl Into<MetaKubeError>) -> Self {
        Self::Permanent(error.into())
    }

    /// Retries server errors and transport failures, fails on anything else.
    #[must_use]
    pub fn classify(error: MetaKubeError) -> Self {
        if error.is_transient() {
            Self::Retryable(error)
        } else {
            Self::Permanent(error)
        }
    }
}

/// Polling cadence shared by every wait in the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// First backoff interval.
    pub initial_interval: Duration,
    /// Backoff cap.
    pub max_interval: Duration,
    /// Fixed period of delete loops.
    pub delete_tick: Duration,
    /// Sleep between patch attempts rejected with a conflict.
    pub conflict_sleep: Duration,
    /// Upper bound of the patch conflict loop.
    pub conflict_window: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
            delete_tick: Duration::from_secs(5),
            conflict_sleep: Duration::from_secs(5),
            conflict_window: Duration::from_secs(20 * 60),
        }
    }
}

impl PollSettings {
    /// Uses one interval for every cadence, keeping the default conflict window.
    #[must_use]
    pub fn uniform(interval: Duration) -> Self {
        Self {
            initial_interval: interval,
            max_interval: interval,
            delete_tick: interval,
            conflict_sleep: interval,
            ..Self::default()
        }
    }
}

/// Retries `attempt` with exponential backoff.
///
/// The wait is bounded by `min(timeout, ctx deadline)`. Cancellation is
/// observed between attempts.
///
/// # Errors
///
/// Returns the permanent error unchanged, [`MetaKubeError::Timeout`] wrapping
/// the last retryable error once the deadline passes, or
/// [`MetaKubeError::Cancelled`] when the context is cancelled.
pub async fn retry<T, F, Fut>(
    ctx: &OperationContext,
    timeout: Duration,
    settings: &PollSettings,
    operation: &str,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RetryResult<T>>,
{
    let deadline = ctx.deadline_within(timeout);
    let mut interval = settings.initial_interval;
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        let cause = match attempt().await {
            Ok(value) => return Ok(value),
            Err(RetryError::Permanent(error)) => return Err(error),
            Err(RetryError::Retryable(error)) => error,
        };

        let now = Instant::now();
        if now >= deadline {
            debug!("{operation}: giving up after {attempts} attempts: {cause}");
            return Err(MetaKubeError::Timeout {
                cause: Box::new(cause),
            });
        }

        let delay = interval.min(deadline - now);
        debug!(
            "{operation}: attempt {attempts} not done ({cause}), retrying in {}ms",
            delay.as_millis()
        );

        tokio::select! {
            biased;
            () = ctx.cancelled() => {
                return Err(MetaKubeError::Cancelled {
                    cause: Box::new(cause),
                });
            }
            () = tokio::time::sleep(delay) => {}
        }

        interval = interval.saturating_mul(2).min(settings.max_interval);
    }
}

/// Outcome of waiting for the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The period elapsed; run the next iteration.
    Continue,
    /// The deadline has passed.
    Expired,
    /// The context was cancelled.
    Cancelled,
}

/// Fixed-period ticker bounded by a deadline and the context.
#[derive(Debug)]
pub struct Ticker<'a> {
    ctx: &'a OperationContext,
    deadline: Instant,
    period: Duration,
}

impl<'a> Ticker<'a> {
    /// Creates a ticker expiring after `min(timeout, ctx deadline)`.
    #[must_use]
    pub fn new(ctx: &'a OperationContext, timeout: Duration, period: Duration) -> Self {
        Self {
            ctx,
            deadline: ctx.deadline_within(timeout),
            period,
        }
    }

    /// Returns the deadline.
    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Waits for the next tick.
    pub async fn tick(&self) -> Tick {
        let now = Instant::now();
        if now >= self.deadline {
            return Tick::Expired;
        }

        let delay = self.period.min(self.deadline - now);
        tokio::select! {
            biased;
            () = self.ctx.cancelled() => Tick::Cancelled,
            () = tokio::time::sleep(delay) => Tick::Continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> PollSettings {
        PollSettings::uniform(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_retryable_errors() {
        let count = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&count);

        let result = retry(
            &OperationContext::new(),
            Duration::from_secs(5),
            &fast(),
            "op",
            || {
                let c = Arc::clone(&c);
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(RetryError::retryable(MetaKubeError::not_ready("not yet")))
                    } else {
                        Ok(42)
                    }
                }
            },
        )
        .await;

        assert_eq!(result.expect("should succeed"), 42);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_returns_permanent_error_unchanged() {
        let result: Result<()> = retry(
            &OperationContext::new(),
            Duration::from_secs(5),
            &fast(),
            "op",
            || async { Err(RetryError::permanent(MetaKubeError::internal("boom"))) },
        )
        .await;

        assert_eq!(
            result.expect_err("should fail").to_string(),
            "Internal error: boom"
        );
    }

    #[tokio::test]
    async fn test_retry_wraps_last_error_on_timeout() {
        let result: Result<()> = retry(
            &OperationContext::new(),
            Duration::from_millis(30),
            &fast(),
            "op",
            || async { Err(RetryError::retryable(MetaKubeError::not_ready("etcd down"))) },
        )
        .await;

        assert_eq!(
            result.expect_err("should time out").to_string(),
            "timeout while waiting: etcd down"
        );
    }

    #[tokio::test]
    async fn test_retry_honors_context_deadline() {
        let ctx = OperationContext::new().with_timeout(Duration::from_millis(20));
        let started = Instant::now();

        let result: Result<()> = retry(&ctx, Duration::from_secs(60), &fast(), "op", || async {
            Err(RetryError::retryable(MetaKubeError::not_ready("pending")))
        })
        .await;

        assert!(matches!(result, Err(MetaKubeError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_retry_stops_on_cancel_between_polls() {
        let ctx = OperationContext::new();
        let canceller = ctx.clone();
        let settings = PollSettings::uniform(Duration::from_secs(30));

        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result: Result<()> = retry(&ctx, Duration::from_secs(60), &settings, "op", || async {
            Err(RetryError::retryable(MetaKubeError::not_ready("pending")))
        })
        .await;
        handle.await.expect("canceller should finish");

        assert_eq!(
            result.expect_err("should be cancelled").to_string(),
            "context canceled: pending"
        );
    }

    #[test]
    fn test_classify_retries_only_transient_errors() {
        let server = MetaKubeError::Api(crate::error::ApiError::from_response(
            "get",
            502,
            String::new(),
        ));
        let missing = MetaKubeError::Api(crate::error::ApiError::from_response(
            "get",
            404,
            String::new(),
        ));

        assert!(matches!(RetryError::classify(server), RetryError::Retryable(_)));
        assert!(matches!(RetryError::classify(missing), RetryError::Permanent(_)));
    }

    #[tokio::test]
    async fn test_ticker_expires_at_deadline() {
        let ctx = OperationContext::new();
        let ticker = Ticker::new(&ctx, Duration::from_millis(15), Duration::from_millis(10));

        let mut ticks = 0;
        while ticker.tick().await == Tick::Continue {
            ticks += 1;
            assert!(ticks < 100, "ticker never expired");
        }
        assert!(ticks >= 1);
    }

    #[tokio::test]
    async fn test_ticker_reports_cancellation() {
        let ctx = OperationContext::new();
        ctx.cancel();
        let ticker = Ticker::new(&ctx, Duration::from_secs(60), Duration::from_secs(5));

        assert_eq!(ticker.tick().await, Tick::Cancelled);
    }
}

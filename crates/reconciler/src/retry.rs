//! Bounded retry with a fixed delay.
//!
//! Two shapes are needed: polling a condition until it holds (the primary
//! election wait), and repeating a fallible call while it fails with a
//! retryable error (the shell transport). Neither backs off or adds jitter.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Configuration for a bounded, fixed-delay retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Total number of attempts (at least one is always made).
    pub max_attempts: u32,
    /// Delay after each unsuccessful attempt.
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_secs(3),
        }
    }
}

impl PollConfig {
    /// Create a poll config.
    #[must_use]
    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    const fn attempts(&self) -> u32 {
        if self.max_attempts == 0 {
            1
        } else {
            self.max_attempts
        }
    }
}

/// Outcome of a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    /// Whether the condition was observed to hold.
    pub satisfied: bool,
    /// Number of checks made.
    pub attempts: u32,
}

/// Check `condition` until it returns `true` or the attempts run out.
///
/// Sleeps `interval` after every negative reading, including the last one.
///
/// # Errors
///
/// An error from `condition` ends the poll and is returned as is.
pub async fn poll_until<F, Fut>(config: &PollConfig, mut condition: F) -> Result<PollOutcome>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    for attempt in 1..=config.attempts() {
        if condition(attempt).await? {
            return Ok(PollOutcome {
                satisfied: true,
                attempts: attempt,
            });
        }
        debug!(attempt, max_attempts = config.attempts(), "Condition not met yet");
        tokio::time::sleep(config.interval).await;
    }

    Ok(PollOutcome {
        satisfied: false,
        attempts: config.attempts(),
    })
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the attempts run out.
///
/// # Errors
///
/// Returns the last error encountered.
pub async fn with_retry<T, F, Fut>(config: &PollConfig, mut operation: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = config.attempts();
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < attempts => {
                debug!(attempt, error = %e, "Retrying after delay");
                tokio::time::sleep(config.interval).await;
                attempt = attempt.saturating_add(1);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::error::Error;

    fn instant(attempts: u32) -> PollConfig {
        PollConfig::new(attempts, Duration::ZERO)
    }

    #[test]
    fn test_default_budget() {
        let config = PollConfig::default();
        assert_eq!(config.max_attempts, 10);
        assert_eq!(config.interval, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_poll_stops_at_first_positive() -> Result<()> {
        let outcome = poll_until(&instant(10), |attempt| async move { Ok(attempt == 3) }).await?;

        assert!(outcome.satisfied);
        assert_eq!(outcome.attempts, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_poll_exhausts_budget() -> Result<()> {
        let calls = Cell::new(0);
        let outcome = poll_until(&instant(4), |_| {
            calls.set(calls.get() + 1);
            async { Ok(false) }
        })
        .await?;

        assert!(!outcome.satisfied);
        assert_eq!(outcome.attempts, 4);
        assert_eq!(calls.get(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_poll_propagates_error() {
        let result = poll_until(&instant(5), |_| async {
            Err(Error::invalid_response("garbage"))
        })
        .await;
        assert!(matches!(result, Err(Error::InvalidResponse { .. })));
    }

    #[tokio::test]
    async fn test_zero_attempts_still_checks_once() -> Result<()> {
        let outcome = poll_until(&instant(0), |_| async { Ok(true) }).await?;
        assert_eq!(outcome.attempts, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_retry_recovers_from_connection_failure() -> Result<()> {
        let value = with_retry(&instant(4), |attempt| async move {
            if attempt < 3 {
                Err(Error::connection_failed("a:27017", "refused"))
            } else {
                Ok(attempt)
            }
        })
        .await?;

        assert_eq!(value, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_budget() {
        let calls = Cell::new(0);
        let result: Result<()> = with_retry(&instant(4), |_| {
            calls.set(calls.get() + 1);
            async { Err(Error::connection_failed("a:27017", "refused")) }
        })
        .await;

        assert!(matches!(result, Err(Error::ConnectionFailed { .. })));
        assert_eq!(calls.get(), 4);
    }

    #[tokio::test]
    async fn test_retry_does_not_repeat_fatal_errors() {
        let calls = Cell::new(0);
        let result: Result<()> = with_retry(&instant(4), |_| {
            calls.set(calls.get() + 1);
            async { Err(Error::invalid_response("garbage")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}

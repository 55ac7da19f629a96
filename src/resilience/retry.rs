//! Bounded retry-until-timeout driver.
//!
//! The operation closure returns a typed [`Outcome`] instead of compressing
//! "stop" and "result" into a `(bool, error)` pair: `Success` carries the
//! value, `Retry` asks for another attempt after the interval, and `Fatal`
//! aborts immediately. Running out of the time budget converts to
//! [`PoolError::Exhausted`].

use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{PoolError, Result};

/// Result of one attempt inside the retry driver.
#[derive(Debug)]
pub enum Outcome<T> {
    Success(T),
    Retry,
    Fatal(PoolError),
}

impl<T> Outcome<T> {
    /// Lift an ordinary result: retryable errors become `Retry`, the rest
    /// become `Fatal`.
    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(v) => Self::Success(v),
            Err(e) if e.is_retryable() => Self::Retry,
            Err(e) => Self::Fatal(e),
        }
    }
}

/// Drive `op` until it settles or `max` elapses, sleeping `interval`
/// between attempts.
pub async fn retry_until<T, F, Fut>(
    name: &str,
    max: Duration,
    interval: Duration,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Outcome<T>>,
{
    let started = Instant::now();
    let mut attempts: u32 = 0;
    loop {
        attempts += 1;
        match op().await {
            Outcome::Success(v) => return Ok(v),
            Outcome::Fatal(e) => return Err(e),
            Outcome::Retry => {
                if started.elapsed() + interval >= max {
                    debug!(operation = name, attempts, "retry budget exhausted");
                    return Err(PoolError::Exhausted(name.to_string()));
                }
                tokio::time::sleep(interval).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_success_on_later_attempt() {
        let calls = AtomicU32::new(0);
        let value = retry_until(
            "flaky",
            Duration::from_secs(1),
            Duration::from_millis(1),
            || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Outcome::Retry
                } else {
                    Outcome::Success(7)
                }
            },
        )
        .await
        .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_stops_immediately() {
        let calls = AtomicU32::new(0);
        let err = retry_until::<u32, _, _>(
            "broken",
            Duration::from_secs(1),
            Duration::from_millis(1),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Outcome::Fatal(PoolError::Validation("bad input".into()))
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PoolError::Validation(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_converts_to_exhausted() {
        let err = retry_until::<u32, _, _>(
            "stuck",
            Duration::from_millis(10),
            Duration::from_millis(3),
            || async { Outcome::Retry },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PoolError::Exhausted(_)));
    }

    #[tokio::test]
    async fn test_from_result_classification() {
        assert!(matches!(
            Outcome::from_result(Ok(1)),
            Outcome::Success(1)
        ));
        assert!(matches!(
            Outcome::<u32>::from_result(Err(PoolError::adapter("x", "n"))),
            Outcome::Retry
        ));
        assert!(matches!(
            Outcome::<u32>::from_result(Err(PoolError::Precondition("p".into()))),
            Outcome::Fatal(_)
        ));
    }
}

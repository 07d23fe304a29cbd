//! Bounded exponential backoff around fallible async operations.
//!
//! Whether a failure is retried is decided by its [`ErrorKind`], never by
//! inspecting the message.
//!
//! [`ErrorKind`]: crate::error::ErrorKind

use std::future::Future;

use tracing::debug;

use crate::config::RetryPolicy;
use crate::error::FetchError;

/// Run `op` until it succeeds, fails permanently, or exhausts its retry budget.
///
/// `op` receives the 0-based attempt number. The delay before retry `n + 1`
/// is `base_delay * backoff_multiplier ^ n`. Permanent failures are returned
/// immediately and unchanged; a transient failure that runs out of retries is
/// returned wrapped in [`FetchError::RetriesExhausted`] with the attempt count.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0u32;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => {
                if attempt >= err.retry_budget(policy.max_retries) {
                    return Err(FetchError::RetriesExhausted {
                        attempts: attempt + 1,
                        source: Box::new(err),
                    });
                }

                let delay = policy.delay_for(attempt);
                debug!(
                    "Attempt {} failed ({}), retrying in {:?}",
                    attempt + 1,
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;
    use crate::models::Channel;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay_ms: 100,
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = with_retry(&policy(3), move |_| {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(FetchError::Network("connection reset".to_string()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_delays_accumulate() {
        let start = Instant::now();
        let result: Result<(), _> = with_retry(&policy(2), |_| async {
            Err(FetchError::Status {
                status: 503,
                url: "https://example.com".to_string(),
            })
        })
        .await;

        // 100ms + 200ms of backoff before the final attempt.
        assert!(start.elapsed() >= Duration::from_millis(300));
        let err = result.unwrap_err();
        assert_eq!(err.attempts(), 3);
        assert!(matches!(err.root(), FetchError::Status { status: 503, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = with_retry(&policy(5), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async {
                Err(FetchError::InvalidListingUrl {
                    channel: Channel::Vrbo,
                    url: "https://vrbo.com/nothing".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(
            result.unwrap_err(),
            FetchError::InvalidListingUrl { .. }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_pricing_gets_one_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = with_retry(&policy(5), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::NoPricingDataFound("blank".to_string())) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(result.unwrap_err().attempts(), 2);
    }
}

use backoff::{future::retry, ExponentialBackoff};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Errors that know whether another attempt can succeed
pub trait Retryable {
    fn is_retryable(&self) -> bool;

    /// Delay requested by the remote side before the next attempt
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Exponential backoff used for provisioning calls
fn create_backoff() -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(500),
        max_interval: Duration::from_secs(10),
        max_elapsed_time: Some(Duration::from_secs(30)),
        multiplier: 2.0,
        ..Default::default()
    }
}

/// Run `operation`, retrying transient errors with exponential backoff
///
/// Permanent errors are returned on the first attempt. A requested
/// `retry_after` replaces the computed delay for that attempt.
pub async fn with_retry<F, Fut, T, E>(operation: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let operation = &operation;

    retry(create_backoff(), move || async move {
        operation().await.map_err(|e| {
            if !e.is_retryable() {
                tracing::debug!(error = %e, "Permanent error, not retrying");
                return backoff::Error::permanent(e);
            }
            match e.retry_after() {
                Some(delay) => {
                    tracing::warn!(error = %e, ?delay, "Rate limited, retrying after requested delay");
                    backoff::Error::retry_after(e, delay)
                }
                None => {
                    tracing::warn!(error = %e, "Retryable error, will retry...");
                    backoff::Error::transient(e)
                }
            }
        })
    })
    .await
}

//! Bounded retry with exponential backoff for page loads and HTTP fetches.
//!
//! Transient failures (network errors, 429, 5xx, navigation failures and
//! timeouts) are retried; everything else is returned immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::ScraperError;

/// Returns `true` if `err` represents a transient condition that should be
/// retried after a backoff delay.
fn is_retriable(err: &ScraperError) -> bool {
    match err {
        ScraperError::Http(_)
        | ScraperError::RateLimited { .. }
        | ScraperError::Navigation { .. }
        | ScraperError::Timeout { .. } => true,
        ScraperError::UnexpectedStatus { status, .. } => *status >= 500,
        _ => false,
    }
}

/// Executes `operation` up to `max_attempts` times.
///
/// After failed attempt `n` (1-based) the function sleeps
/// `backoff_base_ms * 2^n` milliseconds when another attempt remains. If every
/// attempt fails the error from the last one is returned. Non-retriable errors
/// are returned immediately.
///
/// | Failed attempt | Sleep before next (`backoff_base_ms = 1000`) |
/// |---|---|
/// | 1 | 2 s |
/// | 2 | 4 s |
/// | 3 (of 3) | none, error surfaced |
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_attempts: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1u32;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !is_retriable(&err) || attempt >= max_attempts {
            return Err(err);
        }

        let delay_ms = backoff_base_ms.saturating_mul(1u64 << attempt.min(62));
        tracing::warn!(
            attempt,
            max_attempts,
            delay_ms,
            error = %err,
            "transient fetch error, retrying after backoff"
        );
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        attempt += 1;
    }
}

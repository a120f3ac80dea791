//! Bounded retry around one logical call attempt.
//!
//! Each retry re-runs the entire attempt — config resolution through
//! normalization — never a partial step. Only kinds the error type marks
//! retryable are re-attempted; everything else would fail identically and
//! returns immediately. Exhausted retries surface the last typed failure.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::{GatewayError, Result};

/// Base delay for exponential backoff between attempts (milliseconds).
const BASE_DELAY_MS: u64 = 500;

/// Run `attempt` up to `max_retries + 1` times.
///
/// The closure receives the attempt index (0-based) so it can re-resolve
/// configuration fresh each time.
pub async fn with_retries<T, F, Fut>(max_retries: u32, mut attempt: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error: Option<GatewayError> = None;

    for index in 0..=max_retries {
        if index > 0 {
            let delay = BASE_DELAY_MS * 2u64.pow(index - 1);
            warn!(attempt = index, delay_ms = delay, "Retrying gateway call");
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        match attempt(index).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => {
                warn!(attempt = index, error = %e, "Attempt failed");
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error
        .unwrap_or_else(|| GatewayError::Network("call failed with no recorded error".into())))
}

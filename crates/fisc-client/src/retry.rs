//! Connect-phase retry for authority HTTP calls.
//!
//! Only errors raised before a connection was established are retried: the
//! request cannot have reached the authority, so resending cannot produce a
//! duplicate fiscal document. Timeouts and anything after connect are
//! returned immediately and left to the engine's retry policy.

use std::time::Duration;

/// Maximum number of retry attempts after the initial request.
const MAX_RETRIES: u32 = 3;

/// Base delay between retries (doubles each attempt: 200ms, 400ms, 800ms).
const BASE_DELAY_MS: u64 = 200;

/// Send a request, retrying connect failures with exponential backoff.
pub(crate) async fn retry_connect<F, Fut>(f: F) -> Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    for attempt in 0..MAX_RETRIES {
        match f().await {
            Err(e) if e.is_connect() && !e.is_timeout() => {
                let delay = Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt));
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries = MAX_RETRIES,
                    "authority connection failed, retrying in {delay:?}: {e}"
                );
                tokio::time::sleep(delay).await;
            }
            other => return other,
        }
    }
    f().await
}

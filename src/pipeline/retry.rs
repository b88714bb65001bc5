//! Bounded fetch retry with independent budgets per failure kind.
//!
//! The loop carries explicit attempt counters instead of recursing: a
//! rate-limit signal sleeps for the provider's resume delay (or the
//! configured default) and retries; a transient failure sleeps with
//! exponential backoff and retries; a permanent failure returns immediately.

use tracing::warn;

use crate::config::RetryPolicy;
use crate::models::candle::RawCandle;
use crate::providers::{FetchError, FetchRequest, Fetcher};

pub(crate) async fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    instrument_key: &str,
    request: &FetchRequest,
    policy: &RetryPolicy,
) -> Result<Vec<RawCandle>, FetchError> {
    let mut rate_limit_attempts: u32 = 0;
    let mut transient_attempts: u32 = 0;

    loop {
        match fetcher.fetch(instrument_key, request).await {
            Ok(rows) => return Ok(rows),
            Err(FetchError::RateLimited { retry_after }) => {
                rate_limit_attempts += 1;
                if rate_limit_attempts > policy.max_rate_limit_retries {
                    return Err(FetchError::RateLimited { retry_after });
                }
                let delay = retry_after.unwrap_or_else(|| policy.default_rate_limit_delay());
                warn!(
                    instrument_key,
                    attempt = rate_limit_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(FetchError::Transient(message)) => {
                transient_attempts += 1;
                if transient_attempts > policy.max_transient_retries {
                    return Err(FetchError::Transient(message));
                }
                let delay = policy.transient_backoff() * 2u32.pow(transient_attempts - 1);
                warn!(
                    instrument_key,
                    attempt = transient_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %message,
                    "transient fetch failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err @ FetchError::Permanent(_)) => return Err(err),
        }
    }
}

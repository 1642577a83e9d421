use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::cli::config::RetrySettings;
use crate::error::FetchError;

/// Run `operation`, retrying transient failures with exponential backoff.
///
/// Non-retryable errors and the error after the last attempt are returned
/// unchanged.
pub async fn with_retry<F, Fut, T>(settings: &RetrySettings, mut operation: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0;
    let mut delay = settings.initial_delay();

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(attempts = attempt + 1, "Request succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < settings.max_attempts => {
                attempt += 1;
                warn!(
                    error = %e,
                    attempt,
                    max_attempts = settings.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Request failed, retrying"
                );

                let wait = if settings.jitter { add_jitter(delay) } else { delay };
                tokio::time::sleep(wait).await;

                let max_delay = settings.max_delay();
                let next = Duration::try_from_secs_f64(delay.as_secs_f64() * settings.backoff_multiplier)
                    .unwrap_or(max_delay);
                delay = next.min(max_delay);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Stretch `delay` by a random factor in `[1, 2]`
fn add_jitter(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + factor))
}

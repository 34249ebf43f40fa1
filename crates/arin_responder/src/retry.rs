//! Retry logic with exponential backoff for responder calls.
//!
//! Retries on transient errors (408, 429, 5xx, network failures).
//! Does NOT retry on other client errors (400, 401, 403, 404).

use arin_core::config::ResponderConfig;
use arin_core::TransportError;
use rand::Rng;
use reqwest::{Response, StatusCode};
use std::time::Duration;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Initial delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for each subsequent delay.
    pub backoff_factor: f64,
    /// Upper bound of the random jitter added to each delay.
    pub max_jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
            max_jitter: Duration::from_millis(250),
        }
    }
}

impl From<&ResponderConfig> for RetryConfig {
    fn from(config: &ResponderConfig) -> Self {
        let initial_delay = Duration::from_millis(config.initial_backoff_ms);
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay,
            max_delay: Duration::from_millis(config.max_backoff_ms).max(initial_delay),
            // jitter scales with the base delay so tiny test delays stay tiny
            max_jitter: initial_delay / 2,
            ..Self::default()
        }
    }
}

/// Determine if a status code is retryable.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS         // 429
        || status == StatusCode::REQUEST_TIMEOUT    // 408
        || status.is_server_error()
}

/// Execute an HTTP operation with retry logic.
///
/// Returns the first successful `Response`, or the error of the last attempt
/// once a non-retryable status is seen or `max_attempts` is exhausted.
pub async fn with_retry<F, Fut>(config: &RetryConfig, operation: F) -> Result<Response, TransportError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<Response, reqwest::Error>>,
{
    let attempts = config.max_attempts.max(1);
    let mut delay = config.initial_delay;
    let mut last_error = TransportError::Network("no attempt made".to_string());

    for attempt in 1..=attempts {
        match operation().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    if attempt > 1 {
                        tracing::info!("Responder succeeded on attempt {}", attempt);
                    }
                    return Ok(response);
                }

                let error = TransportError::Status {
                    status: status.as_u16(),
                };
                if !is_retryable_status(status) {
                    return Err(error);
                }

                tracing::warn!(
                    "Responder returned {} on attempt {}/{}",
                    status,
                    attempt,
                    attempts
                );
                last_error = error;
            }
            Err(e) => {
                // Network error (timeout, DNS failure, connection refused)
                tracing::warn!(
                    "Responder network error on attempt {}/{}: {}",
                    attempt,
                    attempts,
                    e
                );
                last_error = TransportError::Network(e.to_string());
            }
        }

        if attempt < attempts {
            let sleep_time = delay + jitter(config.max_jitter);
            tracing::info!(
                "Retrying responder in {:.2}s (attempt {}/{})",
                sleep_time.as_secs_f64(),
                attempt + 1,
                attempts
            );
            tokio::time::sleep(sleep_time).await;

            delay = Duration::from_secs_f64(
                (delay.as_secs_f64() * config.backoff_factor).min(config.max_delay.as_secs_f64()),
            );
        }
    }

    Err(last_error)
}

fn jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
}

//! Retry loop shared by the provider clients.

use std::future::Future;
use std::time::Instant;

use super::error::{LlmError, RetryConfig};

/// Run `request` until it succeeds, fails permanently, or the retry budget
/// in `config` is spent.
pub(crate) async fn execute_with_retry<F, Fut, T>(
    config: &RetryConfig,
    provider: &str,
    mut request: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let start = Instant::now();
    let mut attempt = 0;

    loop {
        let error = match request().await {
            Ok(response) => {
                if attempt > 0 {
                    tracing::info!(
                        "{} request succeeded after {} retries (total time: {:?})",
                        provider,
                        attempt,
                        start.elapsed()
                    );
                }
                return Ok(response);
            }
            Err(error) => error,
        };

        if !config.should_retry(&error) || attempt >= config.max_retries {
            if attempt > 0 {
                tracing::error!(
                    "{} request failed after {} retries (total time: {:?}): {}",
                    provider,
                    attempt,
                    start.elapsed(),
                    error
                );
            } else {
                tracing::error!("{} request failed (non-retryable): {}", provider, error);
            }
            return Err(error);
        }

        let remaining = config.max_retry_duration.saturating_sub(start.elapsed());
        let delay = error.suggested_delay(attempt).min(remaining);
        if delay.is_zero() {
            tracing::warn!(
                "{} retry attempt {} failed, no time remaining: {}",
                provider,
                attempt + 1,
                error
            );
            return Err(error);
        }

        tracing::warn!(
            "{} retry attempt {} failed with {}, retrying in {:?}: {}",
            provider,
            attempt + 1,
            error.kind,
            delay,
            error.message
        );

        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            max_retry_duration: Duration::from_secs(5),
            ..RetryConfig::default()
        }
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = execute_with_retry(&fast_config(2), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(LlmError::rate_limited(
                        "busy".to_string(),
                        Some(Duration::from_millis(1)),
                    ))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = execute_with_retry(&fast_config(3), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::client_error(401, "bad key".to_string())) }
        })
        .await;

        assert_eq!(result.unwrap_err().kind, LlmErrorKind::ClientError);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = execute_with_retry(&fast_config(1), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(LlmError::rate_limited(
                    "busy".to_string(),
                    Some(Duration::from_millis(1)),
                ))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

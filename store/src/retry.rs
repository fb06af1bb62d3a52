use std::time::Duration;
use tokio::time::sleep;
use tracing;

use crate::error::StoreError;

/// Retries `operation` while it fails with a retryable error, doubling the
/// delay between attempts. Non-retryable errors are returned immediately.
pub async fn retry_on_unavailable<F, T>(
    mut operation: F,
    max_retries: usize,
    initial_delay: Duration,
) -> Result<T, StoreError>
where
    F: FnMut() -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<T, StoreError>> + Send>>,
{
    let mut delay = initial_delay;

    for attempt in 0..=max_retries {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                tracing::warn!(
                    "Attempt {} failed: {}. Retrying in {:?}...",
                    attempt + 1,
                    e,
                    delay
                );
                sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }

    unreachable!()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let result = retry_on_unavailable(
            move || {
                let calls = calls_clone.clone();
                Box::pin(async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(StoreError::Unavailable("database is locked".to_string()))
                    } else {
                        Ok(42)
                    }
                })
            },
            5,
            Duration::from_millis(1),
        )
        .await;

        assert_eq!(result.expect("retry should eventually succeed"), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let result: Result<(), StoreError> = retry_on_unavailable(
            move || {
                let calls = calls_clone.clone();
                Box::pin(async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(StoreError::Unavailable("database is locked".to_string()))
                })
            },
            2,
            Duration::from_millis(1),
        )
        .await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_domain_errors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let result: Result<(), StoreError> = retry_on_unavailable(
            move || {
                let calls = calls_clone.clone();
                Box::pin(async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(StoreError::NotFound("game 7".to_string()))
                })
            },
            5,
            Duration::from_millis(1),
        )
        .await;

        assert!(matches!(result, Err(StoreError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

//! Deadlines for external calls.

use crate::{AegisError, AegisResult};
use std::future::Future;
use std::time::Duration;

/// Run `fut` with a deadline, mapping expiry to [`AegisError::Timeout`].
pub async fn with_deadline<T, F>(operation: &str, after: Duration, fut: F) -> AegisResult<T>
where
    F: Future<Output = AegisResult<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(timeout_error(operation, after)),
    }
}

/// Build the timeout error for `operation`.
pub fn timeout_error(operation: &str, after: Duration) -> AegisError {
    AegisError::Timeout {
        operation: operation.to_string(),
        after_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MetricsError;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let result: AegisResult<()> = with_deadline("slow call", Duration::from_secs(2), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;
        assert_eq!(
            result,
            Err(AegisError::Timeout {
                operation: "slow call".to_string(),
                after_ms: 2000
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_passes_through_result() {
        let ok = with_deadline("fast", Duration::from_secs(2), async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));

        let err: AegisResult<u8> = with_deadline("fast", Duration::from_secs(2), async {
            Err(MetricsError::InvalidResponse {
                reason: "x".to_string(),
            }
            .into())
        })
        .await;
        assert!(matches!(err, Err(AegisError::Metrics(_))));
    }
}

/// Per-call deadline for store operations
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Returned when a guarded call outlives its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("deadline of {0:?} exceeded")]
pub struct DeadlineExceeded(pub Duration);

/// Run `future` and give up once `limit` has elapsed.
///
/// The inner future is dropped on expiry, which releases whatever it was holding
/// (a pooled connection, a lock guard) before the caller sees the error.
pub async fn with_deadline<F>(limit: Duration, future: F) -> Result<F::Output, DeadlineExceeded>
where
    F: Future,
{
    timeout(limit, future)
        .await
        .map_err(|_| DeadlineExceeded(limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_within_deadline() {
        let result = with_deadline(Duration::from_secs(1), async { 7 }).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn expires_slow_future() {
        let result = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            7
        })
        .await;

        assert_eq!(result, Err(DeadlineExceeded(Duration::from_millis(10))));
    }

    #[tokio::test]
    async fn inner_error_passes_through_untouched() {
        let result = with_deadline(Duration::from_secs(1), async { Err::<u8, _>("boom") }).await;
        assert_eq!(result, Ok(Err("boom")));
    }
}

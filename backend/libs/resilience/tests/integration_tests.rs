/// Integration tests for resilience library
use resilience::{
    presets, retry_idempotent, with_deadline, BreakerConfig, BreakerError, BreakerState,
    CircuitBreaker, DeadlineExceeded, RetryPolicy,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, PartialEq)]
enum ReadError {
    Timeout,
    Refused,
}

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ==================== Composed guard ====================

#[tokio::test]
async fn test_deadline_inside_retry_recovers_from_one_slow_call() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let policy = RetryPolicy {
        max_retries: 2,
        initial_backoff: Duration::from_millis(5),
        jitter: false,
        ..Default::default()
    };

    let result = retry_idempotent(&policy, |e: &ReadError| *e == ReadError::Timeout, move || {
        let attempt = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            with_deadline(Duration::from_millis(20), async move {
                if attempt == 0 {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
                attempt
            })
            .await
            .map_err(|_: DeadlineExceeded| ReadError::Timeout)
        }
    })
    .await;

    assert_eq!(result, Ok(1));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_breaker_counts_exhausted_retries_once() {
    let cb = CircuitBreaker::new(
        "content",
        BreakerConfig {
            failure_threshold: 2,
            success_threshold: 1,
            cooldown: Duration::from_secs(60),
        },
    );
    let policy = RetryPolicy {
        max_retries: 3,
        initial_backoff: Duration::from_millis(1),
        jitter: false,
        ..Default::default()
    };

    let first = cb
        .call(|| retry_idempotent(&policy, |_| true, || async { Err::<(), _>(ReadError::Refused) }))
        .await;
    assert!(matches!(first, Err(BreakerError::Inner(ReadError::Refused))));
    assert_eq!(cb.state(), BreakerState::Closed);

    let _ = cb
        .call(|| retry_idempotent(&policy, |_| true, || async { Err::<(), _>(ReadError::Refused) }))
        .await;
    assert_eq!(cb.state(), BreakerState::Open);
}

#[tokio::test]
async fn test_half_open_admits_single_probe() {
    let cb = CircuitBreaker::new(
        "score",
        BreakerConfig {
            failure_threshold: 1,
            success_threshold: 1,
            cooldown: Duration::from_millis(10),
        },
    );
    let _ = cb.call(|| async { Err::<(), _>("down") }).await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    let slow_probe = {
        let cb = cb.clone();
        tokio::spawn(async move {
            cb.call(|| async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, &str>(())
            })
            .await
            .is_ok()
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let concurrent = cb.call(|| async { Ok::<_, &str>(()) }).await;
    assert!(matches!(concurrent, Err(BreakerError::Open)));

    assert!(slow_probe.await.unwrap());
    assert_eq!(cb.state(), BreakerState::Closed);
}

#[tokio::test]
async fn test_cancelled_half_open_call_does_not_wedge_circuit() {
    let cb = CircuitBreaker::new(
        "content",
        BreakerConfig {
            failure_threshold: 1,
            success_threshold: 1,
            cooldown: Duration::from_millis(10),
        },
    );
    let _ = cb.call(|| async { Err::<(), _>("down") }).await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    // Admitted as the half-open trial, then its task is aborted mid-flight.
    let trial = {
        let cb = cb.clone();
        tokio::spawn(async move {
            cb.call(|| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, &str>(())
            })
            .await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    let blocked = cb.call(|| async { Ok::<_, &str>(()) }).await;
    assert!(matches!(blocked, Err(BreakerError::Open)));

    trial.abort();
    assert!(trial.await.unwrap_err().is_cancelled());
    assert_eq!(cb.state(), BreakerState::HalfOpen);

    for attempt in 0..3u8 {
        let result = cb.call(|| async move { Ok::<_, &str>(attempt) }).await;
        assert!(matches!(result, Ok(n) if n == attempt));
    }
    assert_eq!(cb.state(), BreakerState::Closed);
}

#[tokio::test]
async fn test_racing_half_open_callers_with_one_cancelled() {
    let cb = CircuitBreaker::new(
        "score",
        BreakerConfig {
            failure_threshold: 1,
            success_threshold: 1,
            cooldown: Duration::from_millis(10),
        },
    );
    let _ = cb.call(|| async { Err::<(), _>("down") }).await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    // Racing callers: exactly one is admitted as the trial and gets dropped
    // by the timeout, the rest are rejected.
    let callers = (0..4).map(|_| {
        tokio::time::timeout(
            Duration::from_millis(20),
            cb.call(|| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, &str>(())
            }),
        )
    });
    let outcomes = futures::future::join_all(callers).await;
    let timed_out = outcomes.iter().filter(|o| o.is_err()).count();
    let rejected = outcomes
        .iter()
        .filter(|o| matches!(o, Ok(Err(BreakerError::Open))))
        .count();
    assert_eq!(timed_out, 1);
    assert_eq!(rejected, 3);

    let recovered = cb.call(|| async { Ok::<_, &str>(()) }).await;
    assert!(recovered.is_ok());
    assert_eq!(cb.state(), BreakerState::Closed);
}

// ==================== Presets ====================

#[test]
fn test_presets_are_bounded() {
    for policy in [presets::score_index(), presets::content_index()] {
        assert!(policy.deadline <= Duration::from_secs(5));
        assert!(policy.retry.max_retries <= 2);
        assert!(policy.breaker.failure_threshold >= 1);
    }
}

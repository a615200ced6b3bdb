/// Preset guard policies for the two backing stores
use crate::breaker::BreakerConfig;
use crate::retry::RetryPolicy;
use std::time::Duration;

/// Deadline, retry and breaker settings applied to one store client.
#[derive(Debug, Clone)]
pub struct GuardPolicy {
    pub deadline: Duration,
    pub retry: RetryPolicy,
    pub breaker: BreakerConfig,
}

impl GuardPolicy {
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }
}

/// Score index (Redis)
///
/// - Deadline: 2s, reads are single round trips or short pipelines
/// - Retry: 1 attempt, 50ms backoff
/// - Breaker: 5 failures, 15s cooldown
pub fn score_index() -> GuardPolicy {
    GuardPolicy {
        deadline: Duration::from_secs(2),
        retry: RetryPolicy {
            max_retries: 1,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            jitter: true,
        },
        breaker: BreakerConfig {
            failure_threshold: 5,
            success_threshold: 1,
            cooldown: Duration::from_secs(15),
        },
    }
}

/// Content index (PostgreSQL)
///
/// - Deadline: 3s, batched lookups fan out into several queries
/// - Retry: 1 attempt, 100ms backoff
/// - Breaker: 5 failures, 30s cooldown
pub fn content_index() -> GuardPolicy {
    GuardPolicy {
        deadline: Duration::from_secs(3),
        retry: RetryPolicy {
            max_retries: 1,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            jitter: true,
        },
        breaker: BreakerConfig {
            failure_threshold: 5,
            success_threshold: 2,
            cooldown: Duration::from_secs(30),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_index_preset() {
        let policy = score_index();
        assert_eq!(policy.deadline, Duration::from_secs(2));
        assert_eq!(policy.retry.max_retries, 1);
    }

    #[test]
    fn test_overrides() {
        let policy = content_index()
            .with_deadline(Duration::from_millis(250))
            .with_retries(0);
        assert_eq!(policy.deadline, Duration::from_millis(250));
        assert_eq!(policy.retry.max_retries, 0);
        assert_eq!(policy.breaker.cooldown, Duration::from_secs(30));
    }
}

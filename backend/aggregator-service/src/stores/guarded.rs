/// Deadline, retry and circuit breaker around any store
///
/// Reads compose as breaker(retry(deadline(call))): every attempt is bounded,
/// only transient failures are re-issued, and the breaker sees one outcome per
/// logical read. Only transient failures count towards tripping the breaker; a
/// malformed record means the store answered. Vote writes skip the retry layer
/// since they are not idempotent.
use async_trait::async_trait;
use resilience::{retry_idempotent, with_deadline, BreakerError, CircuitBreaker, GuardPolicy};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use super::{
    ContentIndex, OrderHint, PageCursor, ScoreIndex, ScoreLedger, ScorePage, StoreError,
    StoreResult,
};
use crate::metrics::aggregator::AGGREGATOR_STORE_ERRORS_TOTAL;
use crate::models::{ContentEntry, GroupLabel, Identifier, ScoreEntry};

#[derive(Clone)]
pub struct StoreGuard {
    store: &'static str,
    policy: GuardPolicy,
    breaker: CircuitBreaker,
}

impl StoreGuard {
    pub fn new(store: &'static str, policy: GuardPolicy) -> Self {
        let breaker = CircuitBreaker::new(store, policy.breaker.clone());
        Self {
            store,
            policy,
            breaker,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Guard an idempotent read.
    pub async fn read<T, F, Fut>(&self, op: F) -> StoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let store = self.store;
        let deadline = self.policy.deadline;
        let op = &op;

        let outcome = self
            .breaker
            .call_with(StoreError::is_transient, || {
                retry_idempotent(&self.policy.retry, StoreError::is_transient, move || async move {
                    bounded(store, deadline, op()).await
                })
            })
            .await;

        self.settle(outcome)
    }

    /// Guard a single-shot write.
    pub async fn write<T, Fut>(&self, op: Fut) -> StoreResult<T>
    where
        Fut: Future<Output = StoreResult<T>>,
    {
        let store = self.store;
        let deadline = self.policy.deadline;

        let outcome = self
            .breaker
            .call_with(StoreError::is_transient, || bounded(store, deadline, op))
            .await;

        self.settle(outcome)
    }

    fn settle<T>(&self, outcome: Result<T, BreakerError<StoreError>>) -> StoreResult<T> {
        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(BreakerError::Open) => StoreError::CircuitOpen { store: self.store },
            Err(BreakerError::Inner(err)) => err,
        };

        AGGREGATOR_STORE_ERRORS_TOTAL
            .with_label_values(&[err.store(), err.kind()])
            .inc();
        warn!(store = self.store, kind = err.kind(), error = %err, "Store call failed");
        Err(err)
    }
}

async fn bounded<T, Fut>(store: &'static str, deadline: Duration, op: Fut) -> StoreResult<T>
where
    Fut: Future<Output = StoreResult<T>>,
{
    match with_deadline(deadline, op).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout {
            store,
            after: deadline,
        }),
    }
}

pub struct GuardedScoreIndex<S> {
    inner: S,
    guard: StoreGuard,
}

impl<S> GuardedScoreIndex<S> {
    pub fn new(inner: S, store: &'static str, policy: GuardPolicy) -> Self {
        Self {
            inner,
            guard: StoreGuard::new(store, policy),
        }
    }

    pub fn guard(&self) -> &StoreGuard {
        &self.guard
    }
}

#[async_trait]
impl<S: ScoreIndex> ScoreIndex for GuardedScoreIndex<S> {
    fn native_order(&self, grouped: bool, order: OrderHint) -> bool {
        self.inner.native_order(grouped, order)
    }

    async fn query_by_group(
        &self,
        group: &GroupLabel,
        page_size: usize,
        order: OrderHint,
        cursor: PageCursor,
    ) -> StoreResult<ScorePage> {
        let inner = &self.inner;
        self.guard
            .read(move || inner.query_by_group(group, page_size, order, cursor))
            .await
    }

    async fn query_all(
        &self,
        page_size: usize,
        order: OrderHint,
        cursor: PageCursor,
    ) -> StoreResult<ScorePage> {
        let inner = &self.inner;
        self.guard
            .read(move || inner.query_all(page_size, order, cursor))
            .await
    }

    async fn get_one(&self, id: &Identifier) -> StoreResult<Option<ScoreEntry>> {
        let inner = &self.inner;
        self.guard.read(move || inner.get_one(id)).await
    }
}

#[async_trait]
impl<S: ScoreIndex + ScoreLedger> ScoreLedger for GuardedScoreIndex<S> {
    async fn apply_vote(&self, id: &Identifier, delta: i64) -> StoreResult<Option<ScoreEntry>> {
        self.guard.write(self.inner.apply_vote(id, delta)).await
    }
}

pub struct GuardedContentIndex<C> {
    inner: C,
    guard: StoreGuard,
}

impl<C> GuardedContentIndex<C> {
    pub fn new(inner: C, store: &'static str, policy: GuardPolicy) -> Self {
        Self {
            inner,
            guard: StoreGuard::new(store, policy),
        }
    }

    pub fn guard(&self) -> &StoreGuard {
        &self.guard
    }
}

#[async_trait]
impl<C: ContentIndex> ContentIndex for GuardedContentIndex<C> {
    fn max_batch(&self) -> usize {
        self.inner.max_batch()
    }

    async fn get_many(&self, ids: &[Identifier]) -> StoreResult<Vec<ContentEntry>> {
        let inner = &self.inner;
        self.guard.read(move || inner.get_many(ids)).await
    }

    async fn get_one(&self, id: &Identifier) -> StoreResult<Option<ContentEntry>> {
        let inner = &self.inner;
        self.guard.read(move || inner.get_one(id)).await
    }
}

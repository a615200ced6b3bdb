#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use aggregator_service::config::LimitsConfig;
use aggregator_service::handlers::AppState;
use aggregator_service::models::{ContentEntry, GroupLabel, Identifier, ScoreEntry};
use aggregator_service::services::{FeedAggregator, JoinStrategy};
use aggregator_service::services::ranking::EPOCH_OFFSET;
use aggregator_service::stores::{
    ContentIndex, MemoryContentIndex, MemoryScoreIndex, OrderHint, PageCursor, ScoreIndex,
    ScorePage, StoreError, StoreResult,
};

pub const LIMITS: LimitsConfig = LimitsConfig {
    default_result_limit: 25,
    max_result_limit: 500,
};

pub fn score(id: &str, group: &str, score: i64, published_at: f64) -> ScoreEntry {
    ScoreEntry {
        id: Identifier::from(id),
        group: GroupLabel::from(group),
        score,
        published_at,
    }
}

pub fn post(id: &str, group: &str) -> ContentEntry {
    ContentEntry {
        id: Identifier::from(id),
        group: GroupLabel::from(group),
        published_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        title: format!("Post {}", id),
        description: Some(format!("Body of {}", id)),
        author: "math_guy_1".to_string(),
        url: Some(format!("https://example.com/{}", id)),
        extra: Default::default(),
    }
}

/// Six items across two groups. Hot order: C, F, A, E, D, B.
///
/// - A: score 10 at the reference instant (hot 1.0)
/// - B: score -5 one decay period later (hot 0.30103)
/// - C: score 0 two decay periods later (hot 2.0)
/// - D: score 3, published like A
/// - E: score 3, ten seconds after A (ties D under score policy), calculus
/// - F: score 1 at 1.5 decay periods (hot 1.5), calculus
pub fn score_fixture() -> Vec<ScoreEntry> {
    vec![
        score("A", "algebra", 10, EPOCH_OFFSET),
        score("B", "algebra", -5, EPOCH_OFFSET + 45_000.0),
        score("C", "algebra", 0, EPOCH_OFFSET + 90_000.0),
        score("D", "algebra", 3, EPOCH_OFFSET),
        score("E", "calculus", 3, EPOCH_OFFSET + 10.0),
        score("F", "calculus", 1, EPOCH_OFFSET + 67_500.0),
    ]
}

pub struct Fixture {
    pub scores: MemoryScoreIndex,
    pub content: MemoryContentIndex,
}

impl Fixture {
    /// Every score entry has matching content.
    pub fn complete() -> Self {
        let entries = score_fixture();
        let content = MemoryContentIndex::new(2);
        for entry in &entries {
            content.insert(post(entry.id.as_str(), entry.group.as_str()));
        }
        Fixture {
            scores: MemoryScoreIndex::with_entries(entries),
            content,
        }
    }

    pub fn aggregator(&self, strategy: JoinStrategy) -> FeedAggregator {
        FeedAggregator::new(
            Arc::new(self.scores.clone()),
            Arc::new(self.content.clone()),
            strategy,
            2,
        )
    }

    pub fn state(&self) -> AppState {
        AppState {
            aggregator: self.aggregator(JoinStrategy::default()),
            scores: Arc::new(self.scores.clone()),
            ledger: Arc::new(self.scores.clone()),
            limits: LIMITS,
        }
    }
}

pub fn batched() -> JoinStrategy {
    JoinStrategy::Batched {
        batch_size: 2,
        max_concurrency: 3,
    }
}

/// Store that refuses every call.
pub struct Unreachable;

fn refused(store: &'static str) -> StoreError {
    StoreError::Unavailable {
        store,
        reason: "connection refused".to_string(),
    }
}

#[async_trait]
impl ScoreIndex for Unreachable {
    fn native_order(&self, _grouped: bool, _order: OrderHint) -> bool {
        false
    }

    async fn query_by_group(
        &self,
        _group: &GroupLabel,
        _page_size: usize,
        _order: OrderHint,
        _cursor: PageCursor,
    ) -> StoreResult<ScorePage> {
        Err(refused("score"))
    }

    async fn query_all(
        &self,
        _page_size: usize,
        _order: OrderHint,
        _cursor: PageCursor,
    ) -> StoreResult<ScorePage> {
        Err(refused("score"))
    }

    async fn get_one(&self, _id: &Identifier) -> StoreResult<Option<ScoreEntry>> {
        Err(refused("score"))
    }
}

#[async_trait]
impl ContentIndex for Unreachable {
    fn max_batch(&self) -> usize {
        25
    }

    async fn get_many(&self, _ids: &[Identifier]) -> StoreResult<Vec<ContentEntry>> {
        Err(refused("content"))
    }

    async fn get_one(&self, _id: &Identifier) -> StoreResult<Option<ContentEntry>> {
        Err(refused("content"))
    }
}

/// Content store that answers correctly, but only after `delay`.
pub struct Slow {
    pub inner: MemoryContentIndex,
    pub delay: Duration,
}

#[async_trait]
impl ContentIndex for Slow {
    fn max_batch(&self) -> usize {
        self.inner.max_batch()
    }

    async fn get_many(&self, ids: &[Identifier]) -> StoreResult<Vec<ContentEntry>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_many(ids).await
    }

    async fn get_one(&self, id: &Identifier) -> StoreResult<Option<ContentEntry>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_one(id).await
    }
}

/// Content store with an outage switch. Answers after `delay` while up.
pub struct Switchable {
    pub inner: MemoryContentIndex,
    pub delay: Duration,
    pub down: Arc<AtomicBool>,
}

impl Switchable {
    pub fn new(inner: MemoryContentIndex, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            down: Arc::new(AtomicBool::new(false)),
        }
    }

    async fn answer(&self) -> StoreResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(refused("content"));
        }
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

#[async_trait]
impl ContentIndex for Switchable {
    fn max_batch(&self) -> usize {
        self.inner.max_batch()
    }

    async fn get_many(&self, ids: &[Identifier]) -> StoreResult<Vec<ContentEntry>> {
        self.answer().await?;
        self.inner.get_many(ids).await
    }

    async fn get_one(&self, id: &Identifier) -> StoreResult<Option<ContentEntry>> {
        self.answer().await?;
        self.inner.get_one(id).await
    }
}

pub fn ids(records: &[aggregator_service::models::RankedRecord]) -> Vec<String> {
    records.iter().map(|r| r.id().to_string()).collect()
}

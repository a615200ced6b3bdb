/// Store boundaries for the aggregation core
///
/// The score index and the content index are independently owned collaborators.
/// The core only reads through these traits; vote writes go through `ScoreLedger`
/// and never happen during ranking or fan-out.
use async_trait::async_trait;
use std::time::Duration;

use crate::models::{ContentEntry, GroupLabel, Identifier, ScoreEntry};

pub mod guarded;
pub mod memory;
pub mod pg_content;
pub mod redis_score;

pub use guarded::{GuardedContentIndex, GuardedScoreIndex, StoreGuard};
pub use memory::{MemoryContentIndex, MemoryScoreIndex, SeedFixture};
pub use pg_content::PgContentIndex;
pub use redis_score::{RedisScoreIndex, ScoreKeys};

pub const SCORE_STORE: &str = "score";
pub const CONTENT_STORE: &str = "content";

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{store} store unavailable: {reason}")]
    Unavailable { store: &'static str, reason: String },

    #[error("{store} store call exceeded {after:?}")]
    Timeout {
        store: &'static str,
        after: Duration,
    },

    #[error("{store} store circuit open")]
    CircuitOpen { store: &'static str },

    #[error("{store} store returned a malformed record: {reason}")]
    Malformed { store: &'static str, reason: String },
}

impl StoreError {
    pub fn store(&self) -> &'static str {
        match self {
            StoreError::Unavailable { store, .. }
            | StoreError::Timeout { store, .. }
            | StoreError::CircuitOpen { store }
            | StoreError::Malformed { store, .. } => store,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Unavailable { .. } => "unavailable",
            StoreError::Timeout { .. } => "timeout",
            StoreError::CircuitOpen { .. } => "circuit_open",
            StoreError::Malformed { .. } => "malformed",
        }
    }

    /// Worth re-issuing the same read.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable { .. } | StoreError::Timeout { .. }
        )
    }
}

/// Ordering a score index may be asked to produce natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderHint {
    Unordered,
    /// Most recently published first
    PublishedDesc,
    /// Highest score first
    ScoreDesc,
}

/// Opaque position in a paged read. Stores decide what the number means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor(pub u64);

impl PageCursor {
    pub fn start() -> Self {
        PageCursor(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScorePage {
    pub entries: Vec<ScoreEntry>,
    /// `None` once the universe is exhausted
    pub next: Option<PageCursor>,
}

#[async_trait]
pub trait ScoreIndex: Send + Sync {
    /// Whether pages come back in `order` for this kind of query.
    fn native_order(&self, grouped: bool, order: OrderHint) -> bool;

    async fn query_by_group(
        &self,
        group: &GroupLabel,
        page_size: usize,
        order: OrderHint,
        cursor: PageCursor,
    ) -> StoreResult<ScorePage>;

    async fn query_all(
        &self,
        page_size: usize,
        order: OrderHint,
        cursor: PageCursor,
    ) -> StoreResult<ScorePage>;

    async fn get_one(&self, id: &Identifier) -> StoreResult<Option<ScoreEntry>>;
}

/// Vote writes. Kept apart from `ScoreIndex` so the read path cannot mutate.
#[async_trait]
pub trait ScoreLedger: Send + Sync {
    /// Add `delta` to the item's score. `None` if the id is unknown.
    async fn apply_vote(&self, id: &Identifier, delta: i64) -> StoreResult<Option<ScoreEntry>>;
}

#[async_trait]
pub trait ContentIndex: Send + Sync {
    /// Largest id list `get_many` accepts in one call.
    fn max_batch(&self) -> usize;

    /// Records for the ids that exist, in any order.
    async fn get_many(&self, ids: &[Identifier]) -> StoreResult<Vec<ContentEntry>>;

    async fn get_one(&self, id: &Identifier) -> StoreResult<Option<ContentEntry>>;
}

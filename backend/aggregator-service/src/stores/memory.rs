/// In-process score and content indexes
///
/// Used for local runs (`STORE_BACKEND=memory`) and as test doubles. Paging and
/// native ordering mirror the Redis adapter, including its habit of returning
/// tied keys in an order the caller must not rely on.
use anyhow::Context;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::{
    ContentIndex, OrderHint, PageCursor, ScoreIndex, ScoreLedger, ScorePage, StoreError,
    StoreResult, CONTENT_STORE,
};
use crate::models::{ContentEntry, GroupLabel, Identifier, ScoreEntry};

pub const DEFAULT_MAX_BATCH: usize = 25;

#[derive(Debug, Default, Clone)]
pub struct MemoryScoreIndex {
    entries: Arc<RwLock<BTreeMap<Identifier, ScoreEntry>>>,
}

impl MemoryScoreIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = ScoreEntry>,
    {
        let index = Self::new();
        for entry in entries {
            index.register(entry);
        }
        index
    }

    /// Insert or replace an entry.
    pub fn register(&self, entry: ScoreEntry) {
        self.entries.write().insert(entry.id.clone(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn page(entries: Vec<ScoreEntry>, page_size: usize, cursor: PageCursor) -> ScorePage {
        let page_size = page_size.max(1);
        let offset = cursor.0 as usize;
        let end = offset.saturating_add(page_size).min(entries.len());
        let page: Vec<ScoreEntry> = entries
            .get(offset..end)
            .map(|slice| slice.to_vec())
            .unwrap_or_default();
        let next = (end < entries.len()).then_some(PageCursor(end as u64));

        ScorePage {
            entries: page,
            next,
        }
    }
}

/// Native order with ties in descending id order, the reverse of canonical.
fn native_cmp(order: OrderHint, a: &ScoreEntry, b: &ScoreEntry) -> Ordering {
    let by_key = match order {
        OrderHint::PublishedDesc => b.published_at.total_cmp(&a.published_at),
        OrderHint::ScoreDesc => b.score.cmp(&a.score),
        OrderHint::Unordered => Ordering::Equal,
    };
    by_key.then_with(|| b.id.cmp(&a.id))
}

#[async_trait]
impl ScoreIndex for MemoryScoreIndex {
    fn native_order(&self, grouped: bool, order: OrderHint) -> bool {
        !grouped && order != OrderHint::Unordered
    }

    async fn query_by_group(
        &self,
        group: &GroupLabel,
        page_size: usize,
        _order: OrderHint,
        cursor: PageCursor,
    ) -> StoreResult<ScorePage> {
        let members: Vec<ScoreEntry> = self
            .entries
            .read()
            .values()
            .filter(|entry| &entry.group == group)
            .cloned()
            .collect();

        Ok(Self::page(members, page_size, cursor))
    }

    async fn query_all(
        &self,
        page_size: usize,
        order: OrderHint,
        cursor: PageCursor,
    ) -> StoreResult<ScorePage> {
        let mut all: Vec<ScoreEntry> = self.entries.read().values().cloned().collect();
        if order != OrderHint::Unordered {
            all.sort_by(|a, b| native_cmp(order, a, b));
        }

        Ok(Self::page(all, page_size, cursor))
    }

    async fn get_one(&self, id: &Identifier) -> StoreResult<Option<ScoreEntry>> {
        Ok(self.entries.read().get(id).cloned())
    }
}

#[async_trait]
impl ScoreLedger for MemoryScoreIndex {
    async fn apply_vote(&self, id: &Identifier, delta: i64) -> StoreResult<Option<ScoreEntry>> {
        let mut entries = self.entries.write();
        Ok(entries.get_mut(id).map(|entry| {
            entry.score = entry.score.saturating_add(delta);
            entry.clone()
        }))
    }
}

#[derive(Debug, Clone)]
pub struct MemoryContentIndex {
    records: Arc<RwLock<BTreeMap<Identifier, ContentEntry>>>,
    max_batch: usize,
}

impl Default for MemoryContentIndex {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BATCH)
    }
}

impl MemoryContentIndex {
    pub fn new(max_batch: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(BTreeMap::new())),
            max_batch: max_batch.max(1),
        }
    }

    pub fn with_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = ContentEntry>,
    {
        let index = Self::default();
        for record in records {
            index.insert(record);
        }
        index
    }

    pub fn insert(&self, record: ContentEntry) {
        self.records.write().insert(record.id.clone(), record);
    }

    pub fn remove(&self, id: &Identifier) -> Option<ContentEntry> {
        self.records.write().remove(id)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl ContentIndex for MemoryContentIndex {
    fn max_batch(&self) -> usize {
        self.max_batch
    }

    /// Matches come back in key order, not request order.
    async fn get_many(&self, ids: &[Identifier]) -> StoreResult<Vec<ContentEntry>> {
        if ids.len() > self.max_batch {
            return Err(StoreError::Unavailable {
                store: CONTENT_STORE,
                reason: format!(
                    "batch of {} ids exceeds the limit of {}",
                    ids.len(),
                    self.max_batch
                ),
            });
        }

        let records = self.records.read();
        let mut found: Vec<ContentEntry> =
            ids.iter().filter_map(|id| records.get(id).cloned()).collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found.dedup_by(|a, b| a.id == b.id);
        Ok(found)
    }

    async fn get_one(&self, id: &Identifier) -> StoreResult<Option<ContentEntry>> {
        Ok(self.records.read().get(id).cloned())
    }
}

/// JSON seed file for the memory backend: `{"scores": [...], "content": [...]}`.
#[derive(Debug, Default, Deserialize)]
pub struct SeedFixture {
    #[serde(default)]
    pub scores: Vec<ScoreEntry>,
    #[serde(default)]
    pub content: Vec<ContentEntry>,
}

impl SeedFixture {
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading seed file {}", path.display()))?;
        let fixture: SeedFixture = serde_json::from_str(&raw)
            .with_context(|| format!("parsing seed file {}", path.display()))?;

        info!(
            path = %path.display(),
            scores = fixture.scores.len(),
            content = fixture.content.len(),
            "Loaded seed fixture"
        );
        Ok(fixture)
    }

    pub fn into_stores(self, max_batch: usize) -> (MemoryScoreIndex, MemoryContentIndex) {
        let scores = MemoryScoreIndex::with_entries(self.scores);
        let content = MemoryContentIndex::new(max_batch);
        for record in self.content {
            content.insert(record);
        }
        (scores, content)
    }
}

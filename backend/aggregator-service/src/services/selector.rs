/// Candidate selection against the score index
///
/// Pages through the score index until the candidate universe is collected,
/// keys every entry with the ranking engine and truncates to the limit. When the
/// store can already deliver the requested order, paging stops as soon as the
/// first `limit` entries are settled instead of scanning everything.
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use super::ranking;
use crate::models::{GroupLabel, Identifier, RankedCandidate, RankingPolicy, ScoreEntry};
use crate::stores::{OrderHint, PageCursor, ScoreIndex, StoreResult};

pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Store-side ordering that matches a policy, if one could exist.
pub fn order_hint(policy: RankingPolicy) -> OrderHint {
    match policy {
        RankingPolicy::Recent => OrderHint::PublishedDesc,
        RankingPolicy::Score => OrderHint::ScoreDesc,
        RankingPolicy::Hot => OrderHint::Unordered,
    }
}

#[derive(Clone)]
pub struct CandidateSelector {
    scores: Arc<dyn ScoreIndex>,
    page_size: usize,
}

impl CandidateSelector {
    pub fn new(scores: Arc<dyn ScoreIndex>, page_size: usize) -> Self {
        Self {
            scores,
            page_size: page_size.max(1),
        }
    }

    /// Ranked candidates for `policy`, at most `limit` of them.
    ///
    /// Any score index failure fails the whole selection.
    pub async fn select(
        &self,
        policy: RankingPolicy,
        group: Option<&GroupLabel>,
        limit: usize,
    ) -> StoreResult<Vec<RankedCandidate>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let order = order_hint(policy);
        let native = order != OrderHint::Unordered && self.scores.native_order(group.is_some(), order);

        let entries = match group {
            Some(group) => self.scan_group(group).await?,
            None if native => self.read_native(policy, order, limit).await?,
            None => self.scan_all().await?,
        };
        let universe = entries.len();

        let mut ranked = ranking::rank(policy, entries);
        ranked.truncate(limit);

        debug!(
            policy = %policy,
            group = group.map(GroupLabel::as_str),
            native,
            universe,
            candidates = ranked.len(),
            "Selected candidates"
        );
        Ok(ranked)
    }

    /// Single-item bypass: no ranking, no limit. `None` if the id is unknown.
    pub async fn select_one(&self, id: &Identifier) -> StoreResult<Option<RankedCandidate>> {
        let entry = self.scores.get_one(id).await?;
        Ok(entry.map(|entry| ranking::candidate(RankingPolicy::Hot, &entry)))
    }

    async fn scan_group(&self, group: &GroupLabel) -> StoreResult<Vec<ScoreEntry>> {
        let mut collected = Collected::default();
        let mut cursor = Some(PageCursor::start());

        while let Some(at) = cursor {
            let page = self
                .scores
                .query_by_group(group, self.page_size, OrderHint::Unordered, at)
                .await?;
            collected.extend(page.entries);
            cursor = page.next;
        }
        Ok(collected.entries)
    }

    async fn scan_all(&self) -> StoreResult<Vec<ScoreEntry>> {
        let mut collected = Collected::default();
        let mut cursor = Some(PageCursor::start());

        while let Some(at) = cursor {
            let page = self
                .scores
                .query_all(self.page_size, OrderHint::Unordered, at)
                .await?;
            collected.extend(page.entries);
            cursor = page.next;
        }
        Ok(collected.entries)
    }

    /// Read natively ordered pages until the entry at position `limit` is settled.
    ///
    /// Keeps paging while the last collected key still ties the boundary key, so
    /// the canonical re-sort can pick tied entries by identifier rather than by
    /// whatever order the store returned them in.
    async fn read_native(
        &self,
        policy: RankingPolicy,
        order: OrderHint,
        limit: usize,
    ) -> StoreResult<Vec<ScoreEntry>> {
        let mut collected = Collected::default();
        let mut cursor = Some(PageCursor::start());

        while let Some(at) = cursor {
            let page = self.scores.query_all(self.page_size, order, at).await?;
            collected.extend(page.entries);
            cursor = page.next;

            if collected.entries.len() >= limit {
                let boundary = ranking::rank_key(policy, &collected.entries[limit - 1]);
                let settled = collected
                    .entries
                    .last()
                    .map(|last| ranking::rank_key(policy, last) < boundary)
                    .unwrap_or(true);
                if settled {
                    break;
                }
            }
        }
        Ok(collected.entries)
    }
}

/// Entries in arrival order, first occurrence of each id wins.
#[derive(Default)]
struct Collected {
    seen: HashSet<Identifier>,
    entries: Vec<ScoreEntry>,
}

impl Collected {
    fn extend(&mut self, page: Vec<ScoreEntry>) {
        for entry in page {
            if self.seen.insert(entry.id.clone()) {
                self.entries.push(entry);
            }
        }
    }
}

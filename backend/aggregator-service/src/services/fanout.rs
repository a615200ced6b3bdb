/// Content hydration for a ranked candidate list
///
/// Both strategies emit records in candidate order and silently drop ids the
/// content index has no record for. Sub-batches may complete in any order; the
/// merge step restores rank order before anything is returned. A failed
/// sub-batch fails the join once every sub-batch already in flight has settled.
use futures::future;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::metrics::aggregator::AGGREGATOR_FANOUT_DROPPED_TOTAL;
use crate::models::{ContentEntry, Identifier, RankedCandidate, RankedRecord};
use crate::stores::{ContentIndex, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStrategy {
    /// One `get_one` per id, in order
    Sequential,
    /// `get_many` over sub-batches issued with bounded concurrency
    Batched {
        batch_size: usize,
        max_concurrency: usize,
    },
}

impl Default for JoinStrategy {
    fn default() -> Self {
        JoinStrategy::Batched {
            batch_size: 25,
            max_concurrency: 4,
        }
    }
}

#[derive(Clone)]
pub struct FanOutJoiner {
    content: Arc<dyn ContentIndex>,
    strategy: JoinStrategy,
}

impl FanOutJoiner {
    pub fn new(content: Arc<dyn ContentIndex>, strategy: JoinStrategy) -> Self {
        Self { content, strategy }
    }

    pub fn strategy(&self) -> JoinStrategy {
        self.strategy
    }

    pub async fn join(&self, candidates: &[RankedCandidate]) -> StoreResult<Vec<RankedRecord>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let records = match self.strategy {
            JoinStrategy::Sequential => self.join_sequential(candidates).await?,
            JoinStrategy::Batched {
                batch_size,
                max_concurrency,
            } => {
                self.join_batched(candidates, batch_size, max_concurrency)
                    .await?
            }
        };

        let dropped = candidates.len() - records.len();
        if dropped > 0 {
            AGGREGATOR_FANOUT_DROPPED_TOTAL.inc_by(dropped as u64);
        }
        debug!(
            requested = candidates.len(),
            hydrated = records.len(),
            dropped,
            "Fan-out complete"
        );
        Ok(records)
    }

    async fn join_sequential(
        &self,
        candidates: &[RankedCandidate],
    ) -> StoreResult<Vec<RankedRecord>> {
        let mut records = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if let Some(content) = self.content.get_one(&candidate.id).await? {
                records.push(RankedRecord::new(content, candidate));
            }
        }
        Ok(records)
    }

    async fn join_batched(
        &self,
        candidates: &[RankedCandidate],
        batch_size: usize,
        max_concurrency: usize,
    ) -> StoreResult<Vec<RankedRecord>> {
        let chunk = batch_size.min(self.content.max_batch()).max(1);
        let ids: Vec<Identifier> = candidates.iter().map(|c| c.id.clone()).collect();

        let failed = AtomicBool::new(false);
        let mut in_flight = stream::iter(ids.chunks(chunk))
            .take_while(|_| future::ready(!failed.load(Ordering::Relaxed)))
            .map(|batch| self.content.get_many(batch))
            .buffer_unordered(max_concurrency.max(1));

        // After a failure no new sub-batch starts, but the ones already issued
        // run to completion so none is abandoned mid-call.
        let mut by_id: HashMap<Identifier, ContentEntry> = HashMap::with_capacity(ids.len());
        let mut first_error = None;
        while let Some(batch) = in_flight.next().await {
            match batch {
                Ok(entries) => {
                    by_id.extend(entries.into_iter().map(|entry| (entry.id.clone(), entry)));
                }
                Err(err) => {
                    failed.store(true, Ordering::Relaxed);
                    first_error.get_or_insert(err);
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        Ok(candidates
            .iter()
            .filter_map(|candidate| {
                by_id
                    .remove(&candidate.id)
                    .map(|content| RankedRecord::new(content, candidate))
            })
            .collect())
    }
}

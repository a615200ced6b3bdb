/// End-to-end feed pipeline
///
/// request → CandidateSelector → FanOutJoiner → ResultAssembler
///
/// Stateless per request. The ranked order produced by the selector is the only
/// ordering decision; later stages filter and clamp but never re-sort.
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::assembler::ResultAssembler;
use super::fanout::{FanOutJoiner, JoinStrategy};
use super::selector::CandidateSelector;
use crate::error::{AppError, Result};
use crate::metrics::aggregator::{
    AGGREGATOR_CANDIDATES, AGGREGATOR_REQUESTS_TOTAL, AGGREGATOR_REQUEST_DURATION_SECONDS,
};
use crate::models::{FeedRequest, GroupLabel, Identifier, RankedRecord, RankingPolicy};
use crate::stores::{ContentIndex, ScoreIndex};

#[derive(Clone)]
pub struct FeedAggregator {
    content: Arc<dyn ContentIndex>,
    selector: CandidateSelector,
    joiner: FanOutJoiner,
}

impl FeedAggregator {
    pub fn new(
        scores: Arc<dyn ScoreIndex>,
        content: Arc<dyn ContentIndex>,
        strategy: JoinStrategy,
        scan_page_size: usize,
    ) -> Self {
        Self {
            selector: CandidateSelector::new(scores, scan_page_size),
            joiner: FanOutJoiner::new(content.clone(), strategy),
            content,
        }
    }

    pub async fn aggregate(&self, request: &FeedRequest) -> Result<Vec<RankedRecord>> {
        let started = Instant::now();
        let policy = request.policy_label();

        let result = match request {
            FeedRequest::Single { id } => self.single(id).await,
            FeedRequest::Ranked {
                policy,
                group,
                limit,
            } => self.ranked(*policy, group.as_ref(), *limit).await,
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => err.kind(),
        };
        AGGREGATOR_REQUESTS_TOTAL
            .with_label_values(&[policy, outcome])
            .inc();
        AGGREGATOR_REQUEST_DURATION_SECONDS
            .with_label_values(&[policy])
            .observe(started.elapsed().as_secs_f64());

        match &result {
            Ok(records) => info!(
                policy,
                returned = records.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Feed aggregated"
            ),
            Err(AppError::NotFoundSingle(reason)) => debug!(policy, reason = %reason, "Item not found"),
            Err(err) => warn!(policy, error = %err, "Feed aggregation failed"),
        }
        result
    }

    async fn ranked(
        &self,
        policy: RankingPolicy,
        group: Option<&GroupLabel>,
        limit: usize,
    ) -> Result<Vec<RankedRecord>> {
        let candidates = self.selector.select(policy, group, limit).await?;
        AGGREGATOR_CANDIDATES
            .with_label_values(&[policy.as_str()])
            .observe(candidates.len() as f64);

        let records = self.joiner.join(&candidates).await?;
        Ok(ResultAssembler::assemble(records, limit))
    }

    /// Both indexes must know the id. A miss in either is `NotFoundSingle`.
    async fn single(&self, id: &Identifier) -> Result<Vec<RankedRecord>> {
        let candidate = self
            .selector
            .select_one(id)
            .await?
            .ok_or_else(|| AppError::NotFoundSingle(format!("no score entry for '{}'", id)))?;

        let content = self
            .content
            .get_one(id)
            .await?
            .ok_or_else(|| AppError::NotFoundSingle(format!("no content for '{}'", id)))?;

        Ok(vec![RankedRecord::new(content, &candidate)])
    }
}

/// Final clamp and hand-off to presentation
use crate::models::{FeedRequest, FeedResponse, GroupLabel, RankedRecord};

pub struct ResultAssembler;

impl ResultAssembler {
    /// Clamp to `limit`. Join-time drops are never backfilled, so this only
    /// ever removes records from the tail.
    pub fn assemble(mut records: Vec<RankedRecord>, limit: usize) -> Vec<RankedRecord> {
        records.truncate(limit);
        records
    }

    pub fn present(records: Vec<RankedRecord>, request: &FeedRequest) -> FeedResponse {
        let group: Option<GroupLabel> = match request {
            FeedRequest::Ranked { group, .. } => group.clone(),
            FeedRequest::Single { .. } => None,
        };

        FeedResponse {
            count: records.len(),
            items: records,
            policy: request.policy_label(),
            group,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentEntry, Identifier, RankedCandidate, RankingPolicy};
    use chrono::Utc;

    fn record(id: &str) -> RankedRecord {
        let content = ContentEntry {
            id: Identifier::from(id),
            group: GroupLabel::from("algebra"),
            published_at: Utc::now(),
            title: id.to_string(),
            description: None,
            author: "math_guy_1".into(),
            url: None,
            extra: Default::default(),
        };
        RankedRecord::new(
            content,
            &RankedCandidate {
                id: Identifier::from(id),
                rank_key: 0.0,
                published_at: 0.0,
                score: 0,
            },
        )
    }

    #[test]
    fn test_assemble_keeps_head() {
        let records = vec![record("a"), record("b"), record("c")];
        let kept = ResultAssembler::assemble(records, 2);
        let ids: Vec<&str> = kept.iter().map(|r| r.id().as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_assemble_zero_limit() {
        assert!(ResultAssembler::assemble(vec![record("a")], 0).is_empty());
    }

    #[test]
    fn test_present_counts_items() {
        let request = FeedRequest::Ranked {
            policy: RankingPolicy::Hot,
            group: Some(GroupLabel::from("algebra")),
            limit: 5,
        };
        let response = ResultAssembler::present(vec![record("a")], &request);
        assert_eq!(response.count, 1);
        assert_eq!(response.policy, "hot");
        assert_eq!(response.group, Some(GroupLabel::from("algebra")));
    }
}

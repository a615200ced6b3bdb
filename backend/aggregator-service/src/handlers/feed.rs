use actix_web::{get, web, HttpResponse};
use serde::Deserialize;
use tracing::debug;

use super::AppState;
use crate::config::LimitsConfig;
use crate::error::{AppError, Result};
use crate::metrics::aggregator::AGGREGATOR_REQUESTS_TOTAL;
use crate::models::{FeedRequest, GroupLabel, Identifier, RankingPolicy};
use crate::services::ResultAssembler;

/// Raw feed query. Every field stays a string until `into_request` validates it,
/// so a bad value surfaces as `InvalidParameter` with a precise message.
#[derive(Debug, Default, Deserialize)]
pub struct FeedQueryParams {
    pub n: Option<String>,
    #[serde(alias = "community_name")]
    pub group: Option<String>,
    pub policy: Option<String>,
    #[serde(alias = "uuid")]
    pub id: Option<String>,
    /// Legacy selector for the score policy
    pub sorted: Option<String>,
    /// Legacy selector for the recency policy
    pub recent: Option<String>,
}

impl FeedQueryParams {
    pub fn into_request(&self, limits: &LimitsConfig) -> Result<FeedRequest> {
        if let Some(id) = non_empty(&self.id) {
            return Ok(FeedRequest::Single {
                id: Identifier::new(id),
            });
        }

        let requested = parse_limit(self.n.as_deref())?;
        let policy = self.policy()?;
        let group = non_empty(&self.group).map(GroupLabel::new);

        Ok(FeedRequest::Ranked {
            policy,
            group,
            limit: limits.resolve(requested),
        })
    }

    /// Resolve `policy`, `sorted` and `recent` into one policy. Defaults to recency.
    fn policy(&self) -> Result<RankingPolicy> {
        let mut selected: Vec<RankingPolicy> = Vec::new();

        if let Some(raw) = non_empty(&self.policy) {
            selected.push(raw.parse().map_err(AppError::InvalidParameter)?);
        }
        if parse_flag("sorted", self.sorted.as_deref())? {
            selected.push(RankingPolicy::Score);
        }
        if parse_flag("recent", self.recent.as_deref())? {
            selected.push(RankingPolicy::Recent);
        }

        match selected.split_first() {
            None => Ok(RankingPolicy::Recent),
            Some((first, rest)) if rest.iter().all(|policy| policy == first) => Ok(*first),
            _ => Err(AppError::InvalidParameter(format!(
                "conflicting policy selectors: {}",
                selected
                    .iter()
                    .map(RankingPolicy::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn parse_limit(raw: Option<&str>) -> Result<Option<usize>> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };

    let n: i64 = raw
        .parse()
        .map_err(|_| AppError::InvalidParameter(format!("n must be an integer, got '{}'", raw)))?;
    if n < 0 {
        return Err(AppError::InvalidParameter(format!(
            "n must be non-negative, got {}",
            n
        )));
    }
    Ok(Some(usize::try_from(n).unwrap_or(usize::MAX)))
}

fn parse_flag(name: &str, raw: Option<&str>) -> Result<bool> {
    match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("false") | Some("0") => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some(other) => Err(AppError::InvalidParameter(format!(
            "{} must be true or false, got '{}'",
            name, other
        ))),
    }
}

/// Ranked feed, or a single item when `id` is given.
///
/// GET /api/v1/feed?n=&group=&policy=&id=
#[get("/feed")]
pub async fn get_feed(
    query: web::Query<FeedQueryParams>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let request = query.into_request(&state.limits).map_err(|err| {
        AGGREGATOR_REQUESTS_TOTAL
            .with_label_values(&["unknown", err.kind()])
            .inc();
        err
    })?;
    debug!(?request, "Feed request");

    let records = state.aggregator.aggregate(&request).await?;
    Ok(HttpResponse::Ok().json(ResultAssembler::present(records, &request)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: LimitsConfig = LimitsConfig {
        default_result_limit: 25,
        max_result_limit: 500,
    };

    fn params(pairs: &[(&str, &str)]) -> FeedQueryParams {
        let query = pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        web::Query::<FeedQueryParams>::from_query(&query)
            .unwrap()
            .into_inner()
    }

    fn ranked(pairs: &[(&str, &str)]) -> (RankingPolicy, Option<GroupLabel>, usize) {
        match params(pairs).into_request(&LIMITS).unwrap() {
            FeedRequest::Ranked {
                policy,
                group,
                limit,
            } => (policy, group, limit),
            other => panic!("expected ranked request, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults_to_recent() {
        assert_eq!(ranked(&[]), (RankingPolicy::Recent, None, 25));
    }

    #[test]
    fn test_legacy_aliases() {
        let (policy, group, limit) =
            ranked(&[("n", "5"), ("community_name", "algebra"), ("sorted", "true")]);
        assert_eq!(policy, RankingPolicy::Score);
        assert_eq!(group, Some(GroupLabel::from("algebra")));
        assert_eq!(limit, 5);

        let request = params(&[("uuid", "A1"), ("n", "0")]).into_request(&LIMITS).unwrap();
        assert_eq!(
            request,
            FeedRequest::Single {
                id: Identifier::from("A1")
            }
        );
    }

    #[test]
    fn test_limit_validation() {
        assert!(params(&[("n", "-1")]).into_request(&LIMITS).is_err());
        assert!(params(&[("n", "ten")]).into_request(&LIMITS).is_err());
        assert!(params(&[("n", "2.5")]).into_request(&LIMITS).is_err());
        assert_eq!(ranked(&[("n", "0")]).2, 0);
        assert_eq!(ranked(&[("n", "99999")]).2, 500);
    }

    #[test]
    fn test_policy_validation() {
        assert_eq!(ranked(&[("policy", "hot")]).0, RankingPolicy::Hot);
        assert_eq!(
            ranked(&[("policy", "score"), ("sorted", "true")]).0,
            RankingPolicy::Score
        );

        let err = params(&[("policy", "trending")]).into_request(&LIMITS).unwrap_err();
        assert_eq!(err.kind(), "invalid_parameter");
        assert!(params(&[("sorted", "yes-please")]).into_request(&LIMITS).is_err());
        assert!(params(&[("policy", "hot"), ("recent", "true")])
            .into_request(&LIMITS)
            .is_err());
    }

    #[test]
    fn test_agreeing_selectors_resolve_to_one_policy() {
        assert_eq!(
            ranked(&[("policy", "recent"), ("recent", "1"), ("sorted", "false")]).0,
            RankingPolicy::Recent
        );
        assert_eq!(
            ranked(&[("recent", "true"), ("sorted", "0"), ("policy", "recent")]).0,
            RankingPolicy::Recent
        );
        assert!(params(&[("policy", "recent"), ("sorted", "true"), ("recent", "true")])
            .into_request(&LIMITS)
            .is_err());
        assert!(params(&[("sorted", "true"), ("recent", "true")])
            .into_request(&LIMITS)
            .is_err());
    }

    #[test]
    fn test_blank_group_is_ignored() {
        assert_eq!(ranked(&[("group", "")]).1, None);
    }
}

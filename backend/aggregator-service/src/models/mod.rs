use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque key shared by the score index and the content index for the same item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Community label used to partition candidates.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupLabel(String);

impl GroupLabel {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupLabel {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Vote state for one item, owned by the score index.
///
/// `published_at` is seconds since the Unix epoch and never changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    #[serde(alias = "uuid")]
    pub id: Identifier,
    #[serde(alias = "community_name")]
    pub group: GroupLabel,
    pub score: i64,
    #[serde(alias = "published")]
    pub published_at: f64,
}

/// Post record owned by the content index.
///
/// Known fields are typed; anything else the store carries lands in `extra`
/// and is passed through to presentation untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub id: Identifier,
    pub group: GroupLabel,
    pub published_at: DateTime<Utc>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub author: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Ordering policy selected by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingPolicy {
    /// Most recently published first
    Recent,
    /// Highest vote score first
    Score,
    /// Log-scaled score plus linear freshness
    Hot,
}

impl RankingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recent => "recent",
            Self::Score => "score",
            Self::Hot => "hot",
        }
    }
}

impl fmt::Display for RankingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RankingPolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "recent" => Ok(Self::Recent),
            "score" => Ok(Self::Score),
            "hot" => Ok(Self::Hot),
            other => Err(format!(
                "unknown policy '{}', expected one of recent, score, hot",
                other
            )),
        }
    }
}

/// Ephemeral ranking output, recomputed per request.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub id: Identifier,
    pub rank_key: f64,
    pub published_at: f64,
    pub score: i64,
}

/// Validated request. Built once at the HTTP boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedRequest {
    /// Single item lookup; every other parameter is ignored.
    Single { id: Identifier },
    Ranked {
        policy: RankingPolicy,
        group: Option<GroupLabel>,
        limit: usize,
    },
}

impl FeedRequest {
    pub fn policy_label(&self) -> &'static str {
        match self {
            Self::Single { .. } => "single",
            Self::Ranked { policy, .. } => policy.as_str(),
        }
    }
}

/// Hydrated record handed to presentation, in rank order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRecord {
    #[serde(flatten)]
    pub content: ContentEntry,
    pub score: i64,
    pub rank_key: f64,
}

impl RankedRecord {
    pub fn new(content: ContentEntry, candidate: &RankedCandidate) -> Self {
        Self {
            content,
            score: candidate.score,
            rank_key: candidate.rank_key,
        }
    }

    pub fn id(&self) -> &Identifier {
        &self.content.id
    }
}

/// Feed response body
#[derive(Debug, Clone, Serialize)]
pub struct FeedResponse {
    pub items: Vec<RankedRecord>,
    pub count: usize,
    pub policy: &'static str,
    pub group: Option<GroupLabel>,
}

/// Ranking keys for the three feed policies
///
/// Pure functions only. Every policy sorts descending by its key and breaks ties
/// by ascending identifier, so equal keys never fall back to store iteration order.
use std::cmp::Ordering;

use crate::models::{RankedCandidate, RankingPolicy, ScoreEntry};

/// Reference instant (epoch seconds) the hot policy measures freshness from.
pub const EPOCH_OFFSET: f64 = 1_134_028_003.0;

/// Seconds of age worth one order of magnitude of score.
pub const DECAY_SECONDS: f64 = 45_000.0;

const ROUNDING_SCALE: f64 = 1e7;

/// Round to 7 decimal digits. Negative zero collapses to zero so it ties with zero.
pub fn round7(value: f64) -> f64 {
    let rounded = (value * ROUNDING_SCALE).round() / ROUNDING_SCALE;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Log-scaled score plus linear freshness.
///
/// `hot(10, EPOCH_OFFSET) == 1.0`, `hot(-5, EPOCH_OFFSET + 45000) == 0.30103`.
pub fn hot_score(score: i64, published_at: f64) -> f64 {
    let magnitude = (score.unsigned_abs().max(1) as f64).log10();
    let sign = match score.cmp(&0) {
        Ordering::Greater => 1.0,
        Ordering::Less => -1.0,
        Ordering::Equal => 0.0,
    };
    let age_term = (published_at - EPOCH_OFFSET) / DECAY_SECONDS;

    round7(sign * magnitude + age_term)
}

pub fn rank_key(policy: RankingPolicy, entry: &ScoreEntry) -> f64 {
    match policy {
        RankingPolicy::Recent => entry.published_at,
        RankingPolicy::Score => entry.score as f64,
        RankingPolicy::Hot => hot_score(entry.score, entry.published_at),
    }
}

pub fn candidate(policy: RankingPolicy, entry: &ScoreEntry) -> RankedCandidate {
    RankedCandidate {
        id: entry.id.clone(),
        rank_key: rank_key(policy, entry),
        published_at: entry.published_at,
        score: entry.score,
    }
}

/// Canonical output order: higher key first, then ascending identifier.
pub fn compare(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    b.rank_key
        .total_cmp(&a.rank_key)
        .then_with(|| a.id.cmp(&b.id))
}

/// Key every entry under `policy` and sort canonically.
pub fn rank<I>(policy: RankingPolicy, entries: I) -> Vec<RankedCandidate>
where
    I: IntoIterator<Item = ScoreEntry>,
{
    let mut ranked: Vec<RankedCandidate> = entries
        .into_iter()
        .map(|entry| candidate(policy, &entry))
        .collect();
    ranked.sort_by(compare);
    ranked
}

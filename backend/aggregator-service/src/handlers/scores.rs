use actix_web::{get, post, web, HttpResponse};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Deserialize;
use std::collections::HashSet;

use super::AppState;
use crate::error::{AppError, Result};
use crate::models::{Identifier, ScoreEntry};

const LOOKUP_CONCURRENCY: usize = 8;

/// GET /api/v1/scores/{id}
#[get("/scores/{id}")]
pub async fn get_score(path: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let id = Identifier::new(path.into_inner());
    let entry = state
        .scores
        .get_one(&id)
        .await?
        .ok_or_else(|| AppError::NotFoundSingle(format!("no score entry for '{}'", id)))?;

    Ok(HttpResponse::Ok().json(entry))
}

#[derive(Debug, Deserialize)]
pub struct BatchScoresRequest {
    #[serde(alias = "uuid")]
    pub ids: Vec<String>,
    /// Sort by score descending, ties by id
    #[serde(default)]
    pub sorted: bool,
    pub n: Option<i64>,
}

/// Score entries for a list of ids. Unknown ids are omitted.
///
/// POST /api/v1/scores/batch
#[post("/scores/batch")]
pub async fn batch_scores(
    body: web::Json<BatchScoresRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let body = body.into_inner();
    let max = state.limits.max_result_limit;

    if body.ids.len() > max {
        return Err(AppError::InvalidParameter(format!(
            "at most {} ids per batch, got {}",
            max,
            body.ids.len()
        )));
    }
    let limit = match body.n {
        Some(n) if n < 0 => {
            return Err(AppError::InvalidParameter(format!(
                "n must be non-negative, got {}",
                n
            )))
        }
        Some(n) => usize::try_from(n).unwrap_or(usize::MAX).min(max),
        None => max,
    };

    let mut seen = HashSet::new();
    let ids: Vec<Identifier> = body
        .ids
        .into_iter()
        .map(Identifier::new)
        .filter(|id| seen.insert(id.clone()))
        .collect();

    let scores = &state.scores;
    let found: Vec<Option<ScoreEntry>> = stream::iter(ids.iter())
        .map(|id| scores.get_one(id))
        .buffered(LOOKUP_CONCURRENCY)
        .try_collect()
        .await?;

    let mut entries: Vec<ScoreEntry> = found.into_iter().flatten().collect();
    if body.sorted {
        entries.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    }
    entries.truncate(limit);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "count": entries.len(),
        "items": entries,
    })))
}

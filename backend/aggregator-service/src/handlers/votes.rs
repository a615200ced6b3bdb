use actix_web::{post, web, HttpResponse};
use tracing::info;

use super::AppState;
use crate::error::{AppError, Result};
use crate::models::Identifier;

async fn vote(state: &AppState, id: String, delta: i64) -> Result<HttpResponse> {
    let id = Identifier::new(id);
    let entry = state
        .ledger
        .apply_vote(&id, delta)
        .await?
        .ok_or_else(|| AppError::NotFoundSingle(format!("no score entry for '{}'", id)))?;

    info!(id = %entry.id, delta, score = entry.score, "Vote recorded");
    Ok(HttpResponse::Ok().json(entry))
}

/// POST /api/v1/votes/{id}/up
#[post("/votes/{id}/up")]
pub async fn upvote(path: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    vote(&state, path.into_inner(), 1).await
}

/// POST /api/v1/votes/{id}/down
#[post("/votes/{id}/down")]
pub async fn downvote(path: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    vote(&state, path.into_inner(), -1).await
}

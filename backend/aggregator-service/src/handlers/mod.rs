//! HTTP surface for the aggregator service

use actix_web::web;
use std::sync::Arc;

use crate::config::LimitsConfig;
use crate::error::AppError;
use crate::metrics::serve_metrics;
use crate::services::FeedAggregator;
use crate::stores::{ScoreIndex, ScoreLedger};

pub mod feed;
pub mod health;
pub mod scores;
pub mod votes;

/// Shared per-worker state. Every store handle is passed in explicitly.
pub struct AppState {
    pub aggregator: FeedAggregator,
    pub scores: Arc<dyn ScoreIndex>,
    pub ledger: Arc<dyn ScoreLedger>,
    pub limits: LimitsConfig,
}

/// Register every route plus extractor error handlers that map malformed
/// input onto `InvalidParameter`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::InvalidParameter(err.to_string()).into()),
    )
    .app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::InvalidParameter(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| AppError::InvalidParameter(err.to_string()).into()),
    )
    .service(
        web::scope("/api/v1")
            .service(feed::get_feed)
            .service(scores::get_score)
            .service(scores::batch_scores)
            .service(votes::upvote)
            .service(votes::downvote),
    )
    .service(health::health)
    .route("/metrics", web::get().to(serve_metrics));
}

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aggregator_service::config::{Config, StoreBackend};
use aggregator_service::handlers::{self, AppState};
use aggregator_service::services::FeedAggregator;
use aggregator_service::stores::{
    ContentIndex, GuardedContentIndex, GuardedScoreIndex, MemoryContentIndex, MemoryScoreIndex,
    PgContentIndex, RedisScoreIndex, ScoreIndex, ScoreLedger, SeedFixture, CONTENT_STORE,
    SCORE_STORE,
};

struct Stores {
    scores: Arc<dyn ScoreIndex>,
    ledger: Arc<dyn ScoreLedger>,
    content: Arc<dyn ContentIndex>,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,actix_web=info".into());
    let pretty = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("pretty"))
        .unwrap_or(false);

    if pretty {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_target(true),
            )
            .init();
    }
}

async fn build_stores(config: &Config) -> anyhow::Result<Stores> {
    match config.store.backend {
        StoreBackend::RedisPostgres => {
            let redis = RedisScoreIndex::connect(&config.redis.url, &config.redis.key_prefix)
                .await
                .context("connecting to the score store")?;
            redis.ping().await.context("pinging the score store")?;

            let postgres =
                PgContentIndex::connect(&config.database.url, config.database.max_connections)
                    .await
                    .context("connecting to the content store")?;
            postgres
                .run_migrations()
                .await
                .context("running content store migrations")?;

            let scores = Arc::new(GuardedScoreIndex::new(
                redis,
                SCORE_STORE,
                config.guards.score_policy(),
            ));
            Ok(Stores {
                scores: scores.clone(),
                ledger: scores,
                content: Arc::new(GuardedContentIndex::new(
                    postgres,
                    CONTENT_STORE,
                    config.guards.content_policy(),
                )),
            })
        }
        StoreBackend::Memory => {
            let (scores, content) = match &config.store.seed_file {
                Some(path) => SeedFixture::from_path(path)?.into_stores(config.fanout.batch_size),
                None => (
                    MemoryScoreIndex::new(),
                    MemoryContentIndex::new(config.fanout.batch_size),
                ),
            };
            let scores = Arc::new(GuardedScoreIndex::new(
                scores,
                SCORE_STORE,
                config.guards.score_policy(),
            ));
            Ok(Stores {
                scores: scores.clone(),
                ledger: scores,
                content: Arc::new(GuardedContentIndex::new(
                    content,
                    CONTENT_STORE,
                    config.guards.content_policy(),
                )),
            })
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("configuration error: {}", e))?;
    info!(
        env = %config.app.env,
        backend = ?config.store.backend,
        fanout = ?config.fanout.strategy(),
        "Starting aggregator-service"
    );

    let stores = build_stores(&config).await?;
    let state = web::Data::new(AppState {
        aggregator: FeedAggregator::new(
            stores.scores.clone(),
            stores.content,
            config.fanout.strategy(),
            config.redis.scan_page_size,
        ),
        scores: stores.scores,
        ledger: stores.ledger,
        limits: config.limits,
    });

    let (host, port) = config.bind_addr();
    info!(host = %host, port, "HTTP server listening");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(handlers::configure)
    })
    .bind((host.as_str(), port))
    .with_context(|| format!("binding {}:{}", host, port))?
    .run()
    .await
    .context("HTTP server terminated")?;

    Ok(())
}

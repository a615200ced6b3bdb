//! PostgreSQL-backed content index
//!
//! Reads the `posts` table. Batched lookups use `post_id = ANY($1)`, which gives
//! no ordering guarantee; the fan-out joiner restores rank order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use std::time::Duration;

use super::{ContentIndex, StoreError, StoreResult, CONTENT_STORE};
use crate::models::{ContentEntry, GroupLabel, Identifier};

/// Upper bound on ids per `ANY($1)` query.
pub const DEFAULT_MAX_BATCH: usize = 100;

#[derive(Debug, sqlx::FromRow)]
struct PostRow {
    post_id: String,
    community_name: String,
    title: String,
    description: Option<String>,
    resource_url: Option<String>,
    username: String,
    published_at: DateTime<Utc>,
    attributes: Json<serde_json::Map<String, serde_json::Value>>,
}

impl From<PostRow> for ContentEntry {
    fn from(row: PostRow) -> Self {
        ContentEntry {
            id: Identifier::new(row.post_id),
            group: GroupLabel::new(row.community_name),
            published_at: row.published_at,
            title: row.title,
            description: row.description,
            author: row.username,
            url: row.resource_url,
            extra: row.attributes.0,
        }
    }
}

#[derive(Clone)]
pub struct PgContentIndex {
    pool: PgPool,
    max_batch: usize,
}

impl PgContentIndex {
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(map_sqlx_error)?;

        Ok(Self::new(pool))
    }

    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            max_batch: DEFAULT_MAX_BATCH,
        }
    }

    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch.max(1);
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ContentIndex for PgContentIndex {
    fn max_batch(&self) -> usize {
        self.max_batch
    }

    async fn get_many(&self, ids: &[Identifier]) -> StoreResult<Vec<ContentEntry>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = ids.iter().map(|id| id.as_str().to_owned()).collect();

        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT post_id, community_name, title, description, resource_url, username,
                   published_at, attributes
            FROM posts
            WHERE post_id = ANY($1)
            "#,
        )
        .bind(&keys)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ContentEntry::from).collect())
    }

    async fn get_one(&self, id: &Identifier) -> StoreResult<Option<ContentEntry>> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT post_id, community_name, title, description, resource_url, username,
                   published_at, attributes
            FROM posts
            WHERE post_id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(ContentEntry::from))
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Malformed {
                store: CONTENT_STORE,
                reason: err.to_string(),
            }
        }
        other => StoreError::Unavailable {
            store: CONTENT_STORE,
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_row_maps_to_entry() {
        let mut attributes = serde_json::Map::new();
        attributes.insert("flair".into(), serde_json::json!("question"));

        let entry = ContentEntry::from(PostRow {
            post_id: "p1".into(),
            community_name: "algebra".into(),
            title: "Ring homomorphisms".into(),
            description: Some("Kernel question".into()),
            resource_url: None,
            username: "math_guy_1".into(),
            published_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            attributes: Json(attributes),
        });

        assert_eq!(entry.id.as_str(), "p1");
        assert_eq!(entry.group.as_str(), "algebra");
        assert_eq!(entry.author, "math_guy_1");
        assert_eq!(entry.extra.get("flair"), Some(&serde_json::json!("question")));
    }

    #[test]
    fn test_error_mapping() {
        let err = map_sqlx_error(sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind(), "unavailable");

        let err = map_sqlx_error(sqlx::Error::ColumnNotFound("attributes".into()));
        assert_eq!(err.kind(), "malformed");
    }
}

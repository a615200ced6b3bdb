//! Redis-backed score index
//!
//! Key layout under a configurable prefix `P`:
//! - `P:item:{id}` → hash with `score`, `published` (epoch seconds) and `group`
//! - `P:group:{group}` → set of ids
//! - `P:by_published` → sorted set, member id, score = published
//! - `P:by_score` → sorted set, member id, score = vote score
//!
//! Ungrouped recency and score reads page the sorted sets natively with
//! `ZREVRANGE`. Everything else walks a server cursor (`ZSCAN`/`SSCAN`), which
//! may repeat members; the selector de-duplicates.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use tracing::debug;

use super::{
    OrderHint, PageCursor, ScoreIndex, ScoreLedger, ScorePage, StoreError, StoreResult,
    SCORE_STORE,
};
use crate::models::{GroupLabel, Identifier, ScoreEntry};

const FIELD_SCORE: &str = "score";
const FIELD_PUBLISHED: &str = "published";
const FIELD_GROUP: &str = "group";

/// Increment the hash score and mirror it into the score zset in one step.
/// Returns nil for unknown ids so votes never create half-formed entries.
const APPLY_VOTE_LUA: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return false
end
local score = redis.call('HINCRBY', KEYS[1], 'score', ARGV[1])
redis.call('ZADD', KEYS[2], score, ARGV[2])
return score
"#;

type HashFields = (Option<String>, Option<String>, Option<String>);

#[derive(Debug, Clone)]
pub struct ScoreKeys {
    prefix: String,
}

impl ScoreKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn item(&self, id: &Identifier) -> String {
        format!("{}:item:{}", self.prefix, id)
    }

    pub fn group(&self, group: &GroupLabel) -> String {
        format!("{}:group:{}", self.prefix, group)
    }

    pub fn by_published(&self) -> String {
        format!("{}:by_published", self.prefix)
    }

    pub fn by_score(&self) -> String {
        format!("{}:by_score", self.prefix)
    }
}

#[derive(Clone)]
pub struct RedisScoreIndex {
    conn: ConnectionManager,
    keys: ScoreKeys,
    vote_script: Script,
}

impl RedisScoreIndex {
    pub async fn connect(redis_url: &str, prefix: &str) -> StoreResult<Self> {
        let client = redis::Client::open(redis_url).map_err(unavailable)?;
        let conn = ConnectionManager::new(client).await.map_err(unavailable)?;

        Ok(Self::new(conn, ScoreKeys::new(prefix)))
    }

    pub fn new(conn: ConnectionManager, keys: ScoreKeys) -> Self {
        Self {
            conn,
            keys,
            vote_script: Script::new(APPLY_VOTE_LUA),
        }
    }

    pub async fn ping(&self) -> StoreResult<()> {
        redis::cmd("PING")
            .query_async::<_, String>(&mut self.conn.clone())
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    /// Load full entries for `ids`, skipping any whose hash has vanished.
    async fn hydrate(&self, ids: Vec<String>) -> StoreResult<Vec<ScoreEntry>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for id in &ids {
            pipe.cmd("HMGET")
                .arg(self.keys.item(&Identifier::new(id.as_str())))
                .arg(FIELD_SCORE)
                .arg(FIELD_PUBLISHED)
                .arg(FIELD_GROUP);
        }
        let rows: Vec<HashFields> = pipe
            .query_async(&mut self.conn.clone())
            .await
            .map_err(unavailable)?;

        let mut entries = Vec::with_capacity(rows.len());
        for (id, fields) in ids.into_iter().zip(rows) {
            if let Some(entry) = decode_entry(Identifier::new(id), fields)? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    async fn native_page(
        &self,
        order: OrderHint,
        page_size: usize,
        cursor: PageCursor,
    ) -> StoreResult<ScorePage> {
        let key = match order {
            OrderHint::ScoreDesc => self.keys.by_score(),
            _ => self.keys.by_published(),
        };
        let start = cursor.0;
        let stop = start + page_size as u64 - 1;

        let ids: Vec<String> = redis::cmd("ZREVRANGE")
            .arg(&key)
            .arg(start)
            .arg(stop)
            .query_async(&mut self.conn.clone())
            .await
            .map_err(unavailable)?;

        let next = (ids.len() == page_size).then_some(PageCursor(start + page_size as u64));
        let entries = self.hydrate(ids).await?;
        Ok(ScorePage { entries, next })
    }

    async fn scan_page(
        &self,
        command: &str,
        key: &str,
        page_size: usize,
        cursor: PageCursor,
    ) -> StoreResult<ScorePage> {
        let (next_cursor, raw): (u64, Vec<String>) = redis::cmd(command)
            .arg(key)
            .arg(cursor.0)
            .arg("COUNT")
            .arg(page_size)
            .query_async(&mut self.conn.clone())
            .await
            .map_err(unavailable)?;

        // ZSCAN interleaves members with their scores
        let ids: Vec<String> = if command == "ZSCAN" {
            raw.into_iter().step_by(2).collect()
        } else {
            raw
        };

        debug!(command, key, returned = ids.len(), next_cursor, "Score index scan page");
        let next = (next_cursor != 0).then_some(PageCursor(next_cursor));
        let entries = self.hydrate(ids).await?;
        Ok(ScorePage { entries, next })
    }
}

#[async_trait]
impl ScoreIndex for RedisScoreIndex {
    fn native_order(&self, grouped: bool, order: OrderHint) -> bool {
        !grouped && order != OrderHint::Unordered
    }

    async fn query_by_group(
        &self,
        group: &GroupLabel,
        page_size: usize,
        _order: OrderHint,
        cursor: PageCursor,
    ) -> StoreResult<ScorePage> {
        let key = self.keys.group(group);
        self.scan_page("SSCAN", &key, page_size.max(1), cursor).await
    }

    async fn query_all(
        &self,
        page_size: usize,
        order: OrderHint,
        cursor: PageCursor,
    ) -> StoreResult<ScorePage> {
        let page_size = page_size.max(1);
        if self.native_order(false, order) {
            self.native_page(order, page_size, cursor).await
        } else {
            let key = self.keys.by_published();
            self.scan_page("ZSCAN", &key, page_size, cursor).await
        }
    }

    async fn get_one(&self, id: &Identifier) -> StoreResult<Option<ScoreEntry>> {
        let fields: HashFields = redis::cmd("HMGET")
            .arg(self.keys.item(id))
            .arg(FIELD_SCORE)
            .arg(FIELD_PUBLISHED)
            .arg(FIELD_GROUP)
            .query_async(&mut self.conn.clone())
            .await
            .map_err(unavailable)?;

        decode_entry(id.clone(), fields)
    }
}

#[async_trait]
impl ScoreLedger for RedisScoreIndex {
    async fn apply_vote(&self, id: &Identifier, delta: i64) -> StoreResult<Option<ScoreEntry>> {
        let updated: Option<i64> = self
            .vote_script
            .key(self.keys.item(id))
            .key(self.keys.by_score())
            .arg(delta)
            .arg(id.as_str())
            .invoke_async(&mut self.conn.clone())
            .await
            .map_err(unavailable)?;

        match updated {
            Some(score) => {
                debug!(id = %id, delta, score, "Vote applied");
                Ok(self.get_one(id).await?.map(|entry| ScoreEntry { score, ..entry }))
            }
            None => Ok(None),
        }
    }
}

fn unavailable(err: redis::RedisError) -> StoreError {
    StoreError::Unavailable {
        store: SCORE_STORE,
        reason: err.to_string(),
    }
}

fn malformed(id: &Identifier, field: &str, value: &str) -> StoreError {
    StoreError::Malformed {
        store: SCORE_STORE,
        reason: format!("item {} has unparseable {} '{}'", id, field, value),
    }
}

/// A hash with no `score` field is treated as absent.
fn decode_entry(id: Identifier, fields: HashFields) -> StoreResult<Option<ScoreEntry>> {
    let (score, published, group) = fields;
    let Some(score) = score else {
        return Ok(None);
    };

    let score = score
        .trim()
        .parse::<i64>()
        .map_err(|_| malformed(&id, FIELD_SCORE, &score))?;
    let published = published.unwrap_or_default();
    let published_at = published
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| malformed(&id, FIELD_PUBLISHED, &published))?;
    let group = group.ok_or_else(|| malformed(&id, FIELD_GROUP, ""))?;

    Ok(Some(ScoreEntry {
        id,
        group: GroupLabel::new(group),
        score,
        published_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(score: Option<&str>, published: Option<&str>, group: Option<&str>) -> HashFields {
        (
            score.map(String::from),
            published.map(String::from),
            group.map(String::from),
        )
    }

    #[test]
    fn test_key_layout() {
        let keys = ScoreKeys::new("votes");
        assert_eq!(keys.item(&Identifier::from("A1")), "votes:item:A1");
        assert_eq!(keys.group(&GroupLabel::from("algebra")), "votes:group:algebra");
        assert_eq!(keys.by_published(), "votes:by_published");
        assert_eq!(keys.by_score(), "votes:by_score");
    }

    #[test]
    fn test_decode_accepts_integer_and_float_timestamps() {
        let id = Identifier::from("A1");
        let entry = decode_entry(id.clone(), fields(Some("-3"), Some("1700000000"), Some("algebra")))
            .unwrap()
            .unwrap();
        assert_eq!(entry.score, -3);
        assert_eq!(entry.published_at, 1_700_000_000.0);

        let entry = decode_entry(id, fields(Some("4"), Some("1700000000.25"), Some("algebra")))
            .unwrap()
            .unwrap();
        assert_eq!(entry.published_at, 1_700_000_000.25);
    }

    #[test]
    fn test_decode_missing_hash_is_absent() {
        let entry = decode_entry(Identifier::from("gone"), fields(None, None, None)).unwrap();
        assert!(entry.is_none());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_entry(
            Identifier::from("A1"),
            fields(Some("lots"), Some("1700000000"), Some("algebra")),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "malformed");

        let err = decode_entry(
            Identifier::from("A1"),
            fields(Some("1"), Some("NaN"), Some("algebra")),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "malformed");
    }
}

/// Configuration management for the aggregator service
///
/// Everything comes from environment variables (optionally seeded from `.env`).
/// A variable that is set but unparseable is a startup error, never a silent default.
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::services::JoinStrategy;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub store: StoreConfig,
    pub redis: RedisConfig,
    pub database: DatabaseConfig,
    pub fanout: FanoutConfig,
    pub limits: LimitsConfig,
    pub guards: GuardsConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Redis score index + PostgreSQL content index
    RedisPostgres,
    /// In-process indexes, optionally seeded from a JSON fixture
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "redis_postgres" => Ok(StoreBackend::RedisPostgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!(
                "STORE_BACKEND must be redis_postgres or memory, got '{}'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// JSON fixture loaded into the memory backend
    pub seed_file: Option<String>,
}

/// Score index (Redis) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub key_prefix: String,
    /// Cursor page size for full scans
    pub scan_page_size: usize,
}

/// Content index (PostgreSQL) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanoutMode {
    Sequential,
    Batched,
}

impl FromStr for FanoutMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(FanoutMode::Sequential),
            "batched" => Ok(FanoutMode::Batched),
            other => Err(format!(
                "FANOUT_STRATEGY must be batched or sequential, got '{}'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanoutConfig {
    pub mode: FanoutMode,
    /// Sub-batch ceiling, 1..=100
    pub batch_size: usize,
    pub max_concurrency: usize,
}

impl FanoutConfig {
    pub fn strategy(&self) -> JoinStrategy {
        match self.mode {
            FanoutMode::Sequential => JoinStrategy::Sequential,
            FanoutMode::Batched => JoinStrategy::Batched {
                batch_size: self.batch_size,
                max_concurrency: self.max_concurrency,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// `n` when the caller omits it
    pub default_result_limit: usize,
    /// Hard ceiling applied to `n`
    pub max_result_limit: usize,
}

impl LimitsConfig {
    pub fn resolve(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_result_limit)
            .min(self.max_result_limit)
    }
}

/// Per-store call guards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardsConfig {
    pub score_timeout_ms: u64,
    pub content_timeout_ms: u64,
    /// Retries for idempotent reads, 0 disables
    pub read_retries: u32,
}

impl GuardsConfig {
    pub fn score_policy(&self) -> resilience::GuardPolicy {
        resilience::score_index()
            .with_deadline(Duration::from_millis(self.score_timeout_ms))
            .with_retries(self.read_retries)
    }

    pub fn content_policy(&self) -> resilience::GuardPolicy {
        resilience::content_index()
            .with_deadline(Duration::from_millis(self.content_timeout_ms))
            .with_retries(self.read_retries)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            app: AppConfig {
                env: "development".to_string(),
                host: "0.0.0.0".to_string(),
                port: 8090,
            },
            store: StoreConfig {
                backend: StoreBackend::RedisPostgres,
                seed_file: None,
            },
            redis: RedisConfig {
                url: "redis://127.0.0.1:6379/1".to_string(),
                key_prefix: "votes".to_string(),
                scan_page_size: 100,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/discussions".to_string(),
                max_connections: 10,
            },
            fanout: FanoutConfig {
                mode: FanoutMode::Batched,
                batch_size: 25,
                max_concurrency: 4,
            },
            limits: LimitsConfig {
                default_result_limit: 25,
                max_result_limit: 500,
            },
            guards: GuardsConfig {
                score_timeout_ms: 2000,
                content_timeout_ms: 3000,
                read_retries: 1,
            },
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let text = |key: &str, default: String| lookup(key).unwrap_or(default);

        let config = Config {
            app: AppConfig {
                env: text("APP_ENV", defaults.app.env),
                host: text("AGGREGATOR_HOST", defaults.app.host),
                port: parsed(&lookup, "AGGREGATOR_PORT", defaults.app.port)?,
            },
            store: StoreConfig {
                backend: parsed(&lookup, "STORE_BACKEND", defaults.store.backend)?,
                seed_file: lookup("SEED_FILE").filter(|path| !path.trim().is_empty()),
            },
            redis: RedisConfig {
                url: text("REDIS_URL", defaults.redis.url),
                key_prefix: text("SCORE_KEY_PREFIX", defaults.redis.key_prefix),
                scan_page_size: parsed(
                    &lookup,
                    "SCORE_SCAN_PAGE_SIZE",
                    defaults.redis.scan_page_size,
                )?,
            },
            database: DatabaseConfig {
                url: text("DATABASE_URL", defaults.database.url),
                max_connections: parsed(
                    &lookup,
                    "DATABASE_MAX_CONNECTIONS",
                    defaults.database.max_connections,
                )?,
            },
            fanout: FanoutConfig {
                mode: parsed(&lookup, "FANOUT_STRATEGY", defaults.fanout.mode)?,
                batch_size: parsed(&lookup, "FANOUT_BATCH_SIZE", defaults.fanout.batch_size)?,
                max_concurrency: parsed(
                    &lookup,
                    "FANOUT_MAX_CONCURRENCY",
                    defaults.fanout.max_concurrency,
                )?,
            },
            limits: LimitsConfig {
                default_result_limit: parsed(
                    &lookup,
                    "DEFAULT_RESULT_LIMIT",
                    defaults.limits.default_result_limit,
                )?,
                max_result_limit: parsed(
                    &lookup,
                    "MAX_RESULT_LIMIT",
                    defaults.limits.max_result_limit,
                )?,
            },
            guards: GuardsConfig {
                score_timeout_ms: parsed(
                    &lookup,
                    "SCORE_STORE_TIMEOUT_MS",
                    defaults.guards.score_timeout_ms,
                )?,
                content_timeout_ms: parsed(
                    &lookup,
                    "CONTENT_STORE_TIMEOUT_MS",
                    defaults.guards.content_timeout_ms,
                )?,
                read_retries: parsed(&lookup, "STORE_READ_RETRIES", defaults.guards.read_retries)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if !(1..=100).contains(&self.fanout.batch_size) {
            return Err(format!(
                "FANOUT_BATCH_SIZE must be between 1 and 100, got {}",
                self.fanout.batch_size
            ));
        }
        if self.fanout.max_concurrency == 0 {
            return Err("FANOUT_MAX_CONCURRENCY must be at least 1".to_string());
        }
        if self.redis.scan_page_size == 0 {
            return Err("SCORE_SCAN_PAGE_SIZE must be at least 1".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("DATABASE_MAX_CONNECTIONS must be at least 1".to_string());
        }
        if self.limits.default_result_limit > self.limits.max_result_limit {
            return Err(format!(
                "DEFAULT_RESULT_LIMIT ({}) exceeds MAX_RESULT_LIMIT ({})",
                self.limits.default_result_limit, self.limits.max_result_limit
            ));
        }
        if self.guards.score_timeout_ms == 0 || self.guards.content_timeout_ms == 0 {
            return Err("store timeouts must be greater than zero".to_string());
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.app.host.clone(), self.app.port)
    }
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> Result<T, String>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| format!("invalid {}='{}': {}", key, raw, e)),
    }
}

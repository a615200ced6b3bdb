/// Aggregator Service Library
///
/// Ranked feed aggregation over two independently owned stores: a score index
/// holding mutable vote state and a content index holding post records.
///
/// # Modules
///
/// - `models`: identifiers, score and content entries, ranking policies
/// - `services`: ranking engine, candidate selection, fan-out join, assembly
/// - `stores`: store traits plus Redis, PostgreSQL, in-memory and guarded adapters
/// - `handlers`: HTTP request handlers
/// - `error`: Error types and handling
/// - `config`: Configuration management
/// - `metrics`: Prometheus collectors
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod services;
pub mod stores;

pub use config::Config;
pub use error::{AppError, Result};

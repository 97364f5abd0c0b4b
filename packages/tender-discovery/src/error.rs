//! Typed errors for the discovery library.
//!
//! Engine operations never surface these to callers: upstream and storage
//! failures are recovered where they happen. They exist so adapters, stores
//! and configuration loading can report precisely what went wrong.

use thiserror::Error;

/// Errors raised while loading configuration or wiring the engine.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Upstream listing source failed
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Durable browsing-state store failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid configuration value
    #[error("config error: {key}: {reason}")]
    Config { key: String, reason: String },

    /// Text did not name a known category
    #[error("unknown category: {0}")]
    UnknownCategory(String),
}

/// Errors from a single Source Adapter call.
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP transport failed
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Upstream answered with a non-success status
    #[error("upstream returned HTTP {0}")]
    Status(u16),

    /// Response could not be parsed into tender rows
    #[error("parse error: {0}")]
    Parse(String),

    /// Call exceeded the configured fetch timeout
    #[error("timeout fetching {date} page {page}")]
    Timeout { date: String, page: u32 },
}

/// Errors from the durable browsing-state store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database driver error
    #[error("database error: {0}")]
    Database(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// State could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored row is not a valid browsing state
    #[error("corrupt state for {consumer_id}: {reason}")]
    Corrupt { consumer_id: String, reason: String },
}

/// Result type alias for configuration and wiring.
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Result type alias for Source Adapter calls.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Result type alias for durable store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(any(feature = "sqlite", feature = "postgres"))]
impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(Box::new(e))
    }
}

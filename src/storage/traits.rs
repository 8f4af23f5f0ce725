//! Storage traits and error types
//!
//! The pipeline only needs two capabilities from storage: asking which
//! detail URLs are already persisted, and persisting new articles.

use crate::model::{Article, SaveMeta};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Existence check used by the dedupe stage
#[async_trait]
pub trait ArticleLookup: Send + Sync {
    /// Returns the subset of `urls` already persisted, in any order
    async fn existing_articles(&self, urls: &[String]) -> StorageResult<Vec<String>>;
}

/// Sink for merged articles
///
/// Saving must be idempotent per detail URL: a pipeline attempt that fails
/// after saving is retried from the top and may hand the same articles over
/// again.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Persists `articles` and returns how many were newly written
    async fn save(&self, articles: &[Article], meta: &SaveMeta) -> StorageResult<usize>;
}

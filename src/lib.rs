//! Crawl-Ingest: a multi-source article ingestion pipeline
//!
//! This crate pulls listing pages from many independently configured sources,
//! drops items already known to storage, fetches and parses the detail page of
//! every new item, and persists the merged records.

pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod storage;

#[cfg(test)]
mod test_support;

use thiserror::Error;

/// Main error type for Crawl-Ingest operations
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Parse error: {0}")]
    Parse(#[from] crawler::ParseError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Correlation error for {id}: {reason}")]
    Correlation {
        id: crawler::CorrelationId,
        reason: String,
    },

    #[error("Giving up after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<IngestError>,
    },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector in config: {0}")]
    InvalidSelector(String),
}

/// Result type alias for Crawl-Ingest operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{GroupOrchestrator, RetryPolicy};
pub use model::{Article, CrawlingTarget, CrawlingTargetGroup, GroupRunResult, TargetSource};

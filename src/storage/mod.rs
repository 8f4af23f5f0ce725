//! Storage module for persisting ingested articles
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Known-article lookups for deduplication
//! - Idempotent article persistence
//! - Group run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{ArticleLookup, ArticleStore, StorageError, StorageResult};

use crate::model::GroupRunResult;
use serde_json::{Map, Value};

/// Represents a persisted article
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleRecord {
    pub id: i64,
    pub detail_url: String,
    pub group_name: String,
    pub target_name: Option<String>,
    pub target_url: String,
    pub fields: Map<String, Value>,
    pub saved_at: String,
}

/// Represents one group run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub group_name: String,
    pub task_id: Option<String>,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub total_saved: u64,
    pub failed_targets: u64,
}

/// Status of a group run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    /// Some targets failed, the rest completed
    Partial,
    /// Every target failed
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "partial" => Some(Self::Partial),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Final status for a finished group run
    pub fn from_result(result: &GroupRunResult) -> Self {
        if result.failures.is_empty() {
            Self::Completed
        } else if result.reports.is_empty() {
            Self::Failed
        } else {
            Self::Partial
        }
    }
}

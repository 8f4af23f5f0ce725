//! SQLite storage implementation
//!
//! This module provides the SQLite backend for article lookups, article
//! persistence and group run tracking.

use crate::model::{Article, GroupRunResult, SaveMeta};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ArticleLookup, ArticleStore, StorageError, StorageResult};
use crate::storage::{ArticleRecord, RunRecord, RunStatus};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Upper bound on bound parameters per lookup query
const LOOKUP_CHUNK: usize = 500;

const RUN_COLUMNS: &str = "id, group_name, task_id, started_at, finished_at, config_hash, status, \
                           total_saved, failed_targets";

/// SQLite storage backend
///
/// The connection sits behind a mutex so one storage instance can be shared
/// by every concurrently running target pipeline.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database, used by dry runs and tests
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    // ===== Run Management =====

    /// Records the start of a group run
    pub fn create_run(&self, group_name: &str, config_hash: &str) -> StorageResult<i64> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO runs (group_name, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![group_name, now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Stores the outcome of a group run
    pub fn finish_run(&self, run_id: i64, result: &GroupRunResult) -> StorageResult<()> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        let updated = conn.execute(
            "UPDATE runs SET task_id = ?1, finished_at = ?2, status = ?3, total_saved = ?4,
             failed_targets = ?5 WHERE id = ?6",
            params![
                result.task_id,
                now,
                RunStatus::from_result(result).to_db_string(),
                result.total_saved as i64,
                result.failures.len() as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    /// Gets a run by ID
    pub fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
            params![run_id],
            run_from_row,
        )
        .optional()?
        .ok_or(StorageError::RunNotFound(run_id))
    }

    /// Most recent runs first
    pub fn latest_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM runs ORDER BY id DESC LIMIT ?1",
            RUN_COLUMNS
        ))?;
        let runs = stmt
            .query_map(params![limit as i64], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    // ===== Articles =====

    /// Looks up a persisted article by its detail URL
    pub fn get_article(&self, detail_url: &str) -> StorageResult<Option<ArticleRecord>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, detail_url, group_name, target_name, target_url, fields, saved_at
                 FROM articles WHERE detail_url = ?1",
                params![detail_url],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, detail_url, group_name, target_name, target_url, fields, saved_at)) = row
        else {
            return Ok(None);
        };

        Ok(Some(ArticleRecord {
            id,
            detail_url,
            group_name,
            target_name,
            target_url,
            fields: serde_json::from_str(&fields)?,
            saved_at,
        }))
    }

    // ===== Statistics =====

    /// Gets total article count
    pub fn count_articles(&self) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Article counts per group
    pub fn count_articles_by_group(&self) -> StorageResult<HashMap<String, u64>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT group_name, COUNT(*) FROM articles GROUP BY group_name")?;
        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(counts)
    }

    /// Article counts per target URL
    pub fn count_articles_by_target(&self) -> StorageResult<HashMap<String, u64>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT target_url, COUNT(*) FROM articles GROUP BY target_url")?;
        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(counts)
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        group_name: row.get(1)?,
        task_id: row.get(2)?,
        started_at: row.get(3)?,
        finished_at: row.get(4)?,
        config_hash: row.get(5)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(6)?).unwrap_or(RunStatus::Failed),
        total_saved: row.get::<_, i64>(7)? as u64,
        failed_targets: row.get::<_, i64>(8)? as u64,
    })
}

#[async_trait]
impl ArticleLookup for SqliteStorage {
    async fn existing_articles(&self, urls: &[String]) -> StorageResult<Vec<String>> {
        let conn = self.conn()?;
        let mut existing = Vec::new();

        for chunk in urls.chunks(LOOKUP_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT detail_url FROM articles WHERE detail_url IN ({})",
                placeholders
            ))?;
            let found = stmt
                .query_map(params_from_iter(chunk.iter()), |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            existing.extend(found);
        }

        Ok(existing)
    }
}

#[async_trait]
impl ArticleStore for SqliteStorage {
    async fn save(&self, articles: &[Article], meta: &SaveMeta) -> StorageResult<usize> {
        let mut conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        let tx = conn.transaction()?;
        let mut inserted = 0;

        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO articles
                 (detail_url, group_name, target_name, target_url, fields, saved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for article in articles {
                let fields = serde_json::to_string(&article.fields)?;
                inserted += stmt.execute(params![
                    article.detail_url,
                    meta.group.name,
                    meta.target.name,
                    meta.target.url,
                    fields,
                    now
                ])?;
            }
        }

        tx.commit()?;
        Ok(inserted)
    }
}

//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Crawl-Ingest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per group invocation
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    group_name TEXT NOT NULL,
    task_id TEXT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    total_saved INTEGER NOT NULL DEFAULT 0,
    failed_targets INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_runs_group ON runs(group_name);

-- Persisted articles, keyed by their detail page
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    detail_url TEXT NOT NULL UNIQUE,
    group_name TEXT NOT NULL,
    target_name TEXT,
    target_url TEXT NOT NULL,
    fields TEXT NOT NULL,
    saved_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_articles_group ON articles(group_name);
CREATE INDEX IF NOT EXISTS idx_articles_target ON articles(target_url);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

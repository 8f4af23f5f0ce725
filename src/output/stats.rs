//! Statistics generation from the article database
//!
//! This module provides functionality for extracting and displaying
//! ingestion statistics from the storage layer.

use crate::storage::{RunRecord, SqliteStorage, StorageResult};
use std::fmt::Write;

/// Number of recent runs shown by `--stats`
const RECENT_RUNS: usize = 10;

/// Ingestion statistics summary
#[derive(Debug, Clone)]
pub struct IngestStatistics {
    /// Total number of persisted articles
    pub total_articles: u64,

    /// Article counts per group, largest first
    pub articles_by_group: Vec<(String, u64)>,

    /// Article counts per target URL, largest first
    pub articles_by_target: Vec<(String, u64)>,

    /// Most recent group runs, newest first
    pub recent_runs: Vec<RunRecord>,
}

fn sorted_counts(counts: impl IntoIterator<Item = (String, u64)>) -> Vec<(String, u64)> {
    let mut counts: Vec<_> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

/// Loads statistics from storage
pub fn load_statistics(storage: &SqliteStorage) -> StorageResult<IngestStatistics> {
    Ok(IngestStatistics {
        total_articles: storage.count_articles()?,
        articles_by_group: sorted_counts(storage.count_articles_by_group()?),
        articles_by_target: sorted_counts(storage.count_articles_by_target()?),
        recent_runs: storage.latest_runs(RECENT_RUNS)?,
    })
}

/// Renders statistics as plain text
pub fn render_statistics(stats: &IngestStatistics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Ingest Statistics ===\n");
    let _ = writeln!(out, "Total articles: {}\n", stats.total_articles);

    let _ = writeln!(out, "Articles by Group:");
    for (group, count) in &stats.articles_by_group {
        let percentage = if stats.total_articles > 0 {
            (*count as f64 / stats.total_articles as f64) * 100.0
        } else {
            0.0
        };
        let _ = writeln!(out, "  {}: {} ({:.1}%)", group, count, percentage);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Articles by Target:");
    for (target, count) in &stats.articles_by_target {
        let _ = writeln!(out, "  {}: {}", target, count);
    }

    if !stats.recent_runs.is_empty() {
        let _ = writeln!(out, "\nRecent Runs:");
        for run in &stats.recent_runs {
            let _ = writeln!(
                out,
                "  #{} {} [{}] saved {}, failed targets {} (started {})",
                run.id,
                run.group_name,
                run.status.to_db_string(),
                run.total_saved,
                run.failed_targets,
                run.started_at
            );
        }
    }

    out
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &IngestStatistics) {
    print!("{}", render_statistics(stats));
}

//! Output module for run reports and statistics
//!
//! This module handles:
//! - Summaries of finished group runs
//! - Dry-run listings of the configured groups
//! - Database statistics for `--stats`

pub mod stats;

pub use stats::{load_statistics, print_statistics, render_statistics, IngestStatistics};

use crate::model::{CrawlingTargetGroup, GroupRunResult};
use std::fmt::Write;

/// Renders one line per target plus a total for each group run
pub fn render_group_results(results: &[GroupRunResult]) -> String {
    let mut out = String::new();

    for result in results {
        let _ = writeln!(
            out,
            "Group {} (task {}): {} article(s) saved",
            result.group, result.task_id, result.total_saved
        );

        for report in &result.reports {
            let _ = writeln!(
                out,
                "  ok     {}: listed {}, new {}, fetch failures {}, parse failures {}, saved {}",
                report.target,
                report.listed,
                report.fresh,
                report.fetch_failures,
                report.parse_failures,
                report.saved
            );
        }

        for failure in &result.failures {
            let _ = writeln!(out, "  FAILED {}: {}", failure.target, failure.error);
        }
    }

    out
}

/// Renders the groups and targets a run would process
pub fn render_dry_run(groups: &[CrawlingTargetGroup]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Crawl-Ingest Dry Run ===\n");

    for group in groups {
        let _ = writeln!(
            out,
            "Group {} ({} targets, concurrency {}):",
            group.name,
            group.targets.len(),
            group.concurrency()
        );
        for source in &group.targets {
            let _ = writeln!(out, "  - {}", source.target);
        }
    }

    let _ = writeln!(
        out,
        "\n✓ Configuration is valid\n✓ Would process {} target(s) in {} group(s)",
        groups.iter().map(|g| g.targets.len()).sum::<usize>(),
        groups.len()
    );
    out
}

//! Group orchestration
//!
//! This module runs every target of a group through its pipeline with a
//! bounded number of pipelines in flight, and drives whole configured
//! ingests:
//! - Building groups and parsers from configuration
//! - Recording one run row per group
//! - Isolating target failures so siblings still complete

use crate::config::Config;
use crate::crawler::events::{EventLevel, EventScope};
use crate::crawler::pipeline::{Collaborators, TargetPipeline};
use crate::crawler::retry::RetryPolicy;
use crate::crawler::{HttpFetcher, SelectorParser, TracingSink};
use crate::model::{
    CrawlingTarget, CrawlingTargetGroup, GroupRunResult, TargetFailure, TargetSource,
};
use crate::storage::SqliteStorage;
use crate::ConfigError;
use futures::stream::{self, StreamExt};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Runs groups of targets against shared collaborators
pub struct GroupOrchestrator {
    collaborators: Collaborators,
    policy: RetryPolicy,
}

impl GroupOrchestrator {
    pub fn new(collaborators: Collaborators, policy: RetryPolicy) -> Self {
        Self {
            collaborators,
            policy,
        }
    }

    /// Runs every target of `group` and sums what they saved
    ///
    /// At most `group.concurrency()` target pipelines are in flight at once.
    /// A target that exhausts its retries is reported in `failures` and
    /// contributes nothing to `total_saved`; it never cancels its siblings.
    pub async fn run_group(&self, group: &CrawlingTargetGroup) -> GroupRunResult {
        let task_id = Uuid::new_v4().to_string();
        let meta = group.meta();
        let descriptor = meta.descriptor();
        let events = EventScope::new(
            self.collaborators.events.as_ref(),
            &task_id,
            "group",
            &descriptor,
        );

        events.emit(
            "group_run.start",
            EventLevel::Info,
            json!({ "targets": group.targets.len() }),
        );

        let pipeline = TargetPipeline::new(&self.collaborators, self.policy, &meta, &task_id);
        let pipeline = &pipeline;

        let mut outcomes: Vec<_> = stream::iter(group.targets.iter().enumerate())
            .map(|(index, source)| async move { (index, source, pipeline.run(source).await) })
            .buffer_unordered(meta.max_concurrency)
            .collect()
            .await;
        outcomes.sort_by_key(|(index, _, _)| *index);

        let mut result = GroupRunResult {
            group: group.name.clone(),
            task_id: task_id.clone(),
            total_saved: 0,
            reports: Vec::new(),
            failures: Vec::new(),
        };

        for (_, source, outcome) in outcomes {
            match outcome {
                Ok(report) => {
                    result.total_saved += report.saved;
                    result.reports.push(report);
                }
                Err(error) => {
                    report_target_failure(&self.collaborators, &task_id, &source.target, &error);
                    result.failures.push(TargetFailure {
                        target: source.target.clone(),
                        error,
                    });
                }
            }
        }

        events.emit(
            "group_run.done",
            EventLevel::Info,
            json!({
                "targets": group.targets.len(),
                "total": result.total_saved,
                "failed": result.failures.len(),
            }),
        );

        result
    }
}

fn report_target_failure(
    collaborators: &Collaborators,
    task_id: &str,
    target: &CrawlingTarget,
    error: &crate::IngestError,
) {
    tracing::error!("Target {} failed: {}", target, error);
    let descriptor = target.descriptor();
    EventScope::new(collaborators.events.as_ref(), task_id, "target", &descriptor).emit(
        "target.failed",
        EventLevel::Error,
        json!({ "error": error.to_string() }),
    );
}

/// Builds runnable groups, compiling every target's selectors
pub fn groups_from_config(config: &Config) -> Result<Vec<CrawlingTargetGroup>, ConfigError> {
    config
        .groups
        .iter()
        .map(|group| {
            let targets = group
                .targets
                .iter()
                .map(|target| {
                    let parser = SelectorParser::from_config(target).map_err(|e| {
                        ConfigError::InvalidSelector(format!("Target '{}': {}", target.url, e))
                    })?;
                    Ok(TargetSource::new(
                        CrawlingTarget::new(target.name.as_deref(), target.url.as_str()),
                        Arc::new(parser),
                    ))
                })
                .collect::<Result<Vec<_>, ConfigError>>()?;

            let mut built = CrawlingTargetGroup::new(group.name.as_str(), targets);
            built.max_concurrency =
                Some(group.max_concurrency.unwrap_or(config.crawler.max_concurrency));
            Ok(built)
        })
        .collect()
}

/// Keeps the groups named in `only`, or every group when `only` is empty
pub fn select_groups(
    groups: Vec<CrawlingTargetGroup>,
    only: &[String],
) -> Result<Vec<CrawlingTargetGroup>, ConfigError> {
    if only.is_empty() {
        return Ok(groups);
    }

    if let Some(unknown) = only
        .iter()
        .find(|name| !groups.iter().any(|group| &group.name == *name))
    {
        return Err(ConfigError::Validation(format!("Unknown group '{}'", unknown)));
    }

    Ok(groups
        .into_iter()
        .filter(|group| only.contains(&group.name))
        .collect())
}

/// Runs the configured groups one after another against the SQLite store
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `config_hash` - Hash recorded with every run row
/// * `only` - Group names to run; empty runs every group
///
/// # Returns
///
/// * `Ok(Vec<GroupRunResult>)` - One result per group that ran
/// * `Err(IngestError)` - Setup or run bookkeeping failed
pub async fn run_ingest(
    config: &Config,
    config_hash: &str,
    only: &[String],
) -> crate::Result<Vec<GroupRunResult>> {
    let groups = select_groups(groups_from_config(config)?, only)?;

    let storage = Arc::new(SqliteStorage::new(Path::new(&config.output.database_path))?);
    let fetcher = HttpFetcher::from_config(
        &config.user_agent,
        Duration::from_secs(config.crawler.request_timeout_secs),
    )?;

    let orchestrator = GroupOrchestrator::new(
        Collaborators {
            fetcher: Arc::new(fetcher),
            lookup: storage.clone(),
            store: storage.clone(),
            events: Arc::new(TracingSink),
        },
        RetryPolicy::from_config(&config.crawler),
    );

    let mut results = Vec::with_capacity(groups.len());
    for group in &groups {
        tracing::info!(
            "Running group {} ({} targets, concurrency {})",
            group.name,
            group.targets.len(),
            group.concurrency()
        );

        let run_id = storage.create_run(&group.name, config_hash)?;
        let result = orchestrator.run_group(group).await;
        storage.finish_run(run_id, &result)?;

        tracing::info!(
            "Group {} saved {} article(s), {} target(s) failed",
            result.group,
            result.total_saved,
            result.failures.len()
        );
        results.push(result);
    }

    Ok(results)
}

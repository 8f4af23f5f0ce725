//! Per-target pipeline
//!
//! Composes the seven stages for one target and wraps the whole sequence in
//! the retry policy. Each attempt builds its own item collections and
//! correlation maps, so a retry re-runs every fetch and lookup from scratch.

use crate::crawler::events::{EventScope, EventSink};
use crate::crawler::retry::{retry, RetryPolicy};
use crate::crawler::stages::{self, StageContext};
use crate::crawler::Fetcher;
use crate::model::{GroupMeta, SaveMeta, TargetReport, TargetSource};
use crate::storage::{ArticleLookup, ArticleStore};
use std::sync::Arc;

/// External collaborators shared by every target pipeline
#[derive(Clone)]
pub struct Collaborators {
    /// Default fetcher, used unless a target carries its own
    pub fetcher: Arc<dyn Fetcher>,
    pub lookup: Arc<dyn ArticleLookup>,
    pub store: Arc<dyn ArticleStore>,
    pub events: Arc<dyn EventSink>,
}

/// Runs targets of one group within one group run
pub struct TargetPipeline<'a> {
    collaborators: &'a Collaborators,
    policy: RetryPolicy,
    group: &'a GroupMeta,
    task_id: &'a str,
}

impl<'a> TargetPipeline<'a> {
    pub fn new(
        collaborators: &'a Collaborators,
        policy: RetryPolicy,
        group: &'a GroupMeta,
        task_id: &'a str,
    ) -> Self {
        Self {
            collaborators,
            policy,
            group,
            task_id,
        }
    }

    /// Runs the full stage sequence for `source`, retrying from the top on error
    pub async fn run(&self, source: &TargetSource) -> crate::Result<TargetReport> {
        let descriptor = source.target.descriptor();
        let save_meta = SaveMeta {
            group: self.group.clone(),
            target: source.target.clone(),
        };
        let fetcher: &dyn Fetcher = match &source.fetcher {
            Some(fetcher) => fetcher.as_ref(),
            None => self.collaborators.fetcher.as_ref(),
        };

        let ctx = StageContext {
            source,
            fetcher,
            lookup: self.collaborators.lookup.as_ref(),
            store: self.collaborators.store.as_ref(),
            events: EventScope::new(
                self.collaborators.events.as_ref(),
                self.task_id,
                "target",
                &descriptor,
            ),
            save_meta: &save_meta,
        };
        let ctx = &ctx;
        let label = source.target.to_string();
        let label = label.as_str();

        retry(self.policy, label, move |attempt| {
            tracing::debug!("Running pipeline for {} (attempt {})", label, attempt);
            run_stages(ctx)
        })
        .await
    }
}

/// One attempt: every stage, in order
async fn run_stages(ctx: &StageContext<'_>) -> crate::Result<TargetReport> {
    let content = stages::list_fetch(ctx).await?;
    let listed = stages::list_parse(ctx, &content).await?;
    let listed_count = listed.len();

    let fresh = stages::dedupe(ctx, listed).await?;
    let fresh_count = fresh.len();

    let fetched = stages::detail_fetch(ctx, fresh).await?;
    let fetch_failures = fetched.failures;

    let parsed = stages::detail_parse(ctx, fetched).await?;
    let parse_failures = parsed.failures;

    let articles = stages::merge(ctx, parsed).await?;
    let merged = articles.len();

    let saved = stages::save(ctx, articles).await?;

    Ok(TargetReport {
        target: ctx.source.target.clone(),
        listed: listed_count,
        fresh: fresh_count,
        fetch_failures,
        parse_failures,
        merged,
        saved,
    })
}

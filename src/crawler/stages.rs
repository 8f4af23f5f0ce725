//! The seven stages of a target pipeline
//!
//! Stages run strictly in order. Only detail fetch and detail parse fan out:
//! one future per item, all joined, no fail-fast. Per-item failures are
//! absorbed and reported as events; anything a stage returns as `Err` aborts
//! the current attempt.

use crate::crawler::correlation::{index_by_id, Correlated};
use crate::crawler::events::{EventScope, Stage};
use crate::crawler::{Fetcher, CorrelationId};
use crate::model::{Article, DetailRecord, ListItem, SaveMeta, TargetSource};
use crate::storage::{ArticleLookup, ArticleStore};
use crate::IngestError;
use futures::future::{self, join_all};
use serde_json::json;
use std::collections::HashSet;

/// Reason recorded when a detail artifact has no surviving list item
pub const MISSING_LIST_ITEM: &str = "missing list item for parsed detail";

/// Everything one pipeline attempt needs, borrowed for its duration
pub struct StageContext<'a> {
    pub source: &'a TargetSource,
    pub fetcher: &'a dyn Fetcher,
    pub lookup: &'a dyn ArticleLookup,
    pub store: &'a dyn ArticleStore,
    pub events: EventScope<'a>,
    pub save_meta: &'a SaveMeta,
}

/// Items that survived detail fetch, with their raw payloads
#[derive(Debug, Default)]
pub struct DetailFetchOutput {
    pub items: Vec<Correlated<ListItem>>,
    pub contents: Vec<Correlated<String>>,
    pub failures: usize,
}

/// Items that survived detail parse, with their parsed details
#[derive(Debug, Default)]
pub struct DetailParseOutput {
    pub items: Vec<Correlated<ListItem>>,
    pub details: Vec<Correlated<DetailRecord>>,
    pub failures: usize,
}

/// Retrieves the listing page; an unreachable listing degrades to empty content
pub async fn list_fetch(ctx: &StageContext<'_>) -> crate::Result<String> {
    let url = ctx.source.target.url.as_str();
    ctx.events
        .observe(
            Stage::ListFetch,
            json!({ "url": url }),
            fetch_listing(ctx, url),
            |content| json!({ "bytes": content.len() }),
        )
        .await
}

async fn fetch_listing(ctx: &StageContext<'_>, url: &str) -> crate::Result<String> {
    match ctx.fetcher.fetch(url).await {
        Ok(content) => Ok(content),
        Err(error) => {
            ctx.events.failed(
                Stage::ListFetch,
                json!({ "url": url, "error": error.to_string() }),
            );
            Ok(String::new())
        }
    }
}

/// Extracts candidates and tags each with a fresh correlation id
pub async fn list_parse(
    ctx: &StageContext<'_>,
    content: &str,
) -> crate::Result<Vec<Correlated<ListItem>>> {
    ctx.events
        .observe(
            Stage::ListParse,
            json!({ "bytes": content.len() }),
            parse_listing(ctx, content),
            |items| json!({ "items": items.len() }),
        )
        .await
}

async fn parse_listing(
    ctx: &StageContext<'_>,
    content: &str,
) -> crate::Result<Vec<Correlated<ListItem>>> {
    if content.is_empty() {
        return Ok(Vec::new());
    }

    match ctx.source.parser.parse_list(content).await {
        Ok(items) => Ok(items.into_iter().map(Correlated::tag).collect()),
        Err(error) => {
            ctx.events.failed(
                Stage::ListParse,
                json!({ "url": ctx.source.target.url, "error": error.to_string() }),
            );
            Ok(Vec::new())
        }
    }
}

/// Drops candidates already known to storage, preserving order
pub async fn dedupe(
    ctx: &StageContext<'_>,
    items: Vec<Correlated<ListItem>>,
) -> crate::Result<Vec<Correlated<ListItem>>> {
    let input = items.len();
    ctx.events
        .observe(
            Stage::Dedupe,
            json!({ "input": input }),
            filter_fresh(ctx, items),
            |fresh| json!({ "output": fresh.len() }),
        )
        .await
}

async fn filter_fresh(
    ctx: &StageContext<'_>,
    items: Vec<Correlated<ListItem>>,
) -> crate::Result<Vec<Correlated<ListItem>>> {
    let input = items.len();
    let mut seen = HashSet::new();
    let unique: Vec<_> = items
        .into_iter()
        .filter(|item| seen.insert(item.value.detail_url.clone()))
        .collect();

    if unique.len() < input {
        tracing::warn!(
            "{} listed {} duplicate detail URL(s); keeping the first of each",
            ctx.source.target,
            input - unique.len()
        );
    }

    if unique.is_empty() {
        return Ok(unique);
    }

    let urls: Vec<String> = unique
        .iter()
        .map(|item| item.value.detail_url.clone())
        .collect();
    let existing: HashSet<String> = ctx.lookup.existing_articles(&urls).await?.into_iter().collect();

    Ok(unique
        .into_iter()
        .filter(|item| !existing.contains(&item.value.detail_url))
        .collect())
}

/// Fetches every candidate's detail page concurrently
pub async fn detail_fetch(
    ctx: &StageContext<'_>,
    items: Vec<Correlated<ListItem>>,
) -> crate::Result<DetailFetchOutput> {
    let input = items.len();
    ctx.events
        .observe(
            Stage::DetailFetch,
            json!({ "input": input }),
            fetch_details(ctx, items),
            |out| json!({ "output": out.items.len(), "failures": out.failures }),
        )
        .await
}

async fn fetch_details(
    ctx: &StageContext<'_>,
    items: Vec<Correlated<ListItem>>,
) -> crate::Result<DetailFetchOutput> {
    let results = join_all(
        items
            .iter()
            .map(|item| ctx.fetcher.fetch(&item.value.detail_url)),
    )
    .await;

    let mut output = DetailFetchOutput::default();
    for (item, result) in items.into_iter().zip(results) {
        match result {
            Ok(content) => {
                output.contents.push(Correlated::with_id(item.id, content));
                output.items.push(item);
            }
            Err(error) => {
                output.failures += 1;
                ctx.events.failed(
                    Stage::DetailFetch,
                    json!({ "detailUrl": item.value.detail_url, "error": error.to_string() }),
                );
            }
        }
    }

    Ok(output)
}

/// Parses every fetched payload concurrently and re-pairs it with its item
pub async fn detail_parse(
    ctx: &StageContext<'_>,
    fetched: DetailFetchOutput,
) -> crate::Result<DetailParseOutput> {
    let input = fetched.contents.len();
    ctx.events
        .observe(
            Stage::DetailParse,
            json!({ "input": input }),
            parse_details(ctx, fetched),
            |out| json!({ "output": out.details.len(), "failures": out.failures }),
        )
        .await
}

async fn parse_details(
    ctx: &StageContext<'_>,
    fetched: DetailFetchOutput,
) -> crate::Result<DetailParseOutput> {
    let DetailFetchOutput {
        items, contents, ..
    } = fetched;

    let results = join_all(
        contents
            .iter()
            .map(|content| ctx.source.parser.parse_detail(&content.value)),
    )
    .await;

    let index = index_by_id(&items);
    let mut matched: HashSet<CorrelationId> = HashSet::new();
    let mut details = Vec::with_capacity(contents.len());
    let mut failures = 0;

    for (content, result) in contents.iter().zip(results) {
        let item = index.get(&content.id).map(|(_, item)| *item);
        match (result, item) {
            (Ok(detail), Some(_)) => {
                matched.insert(content.id);
                details.push(Correlated::with_id(content.id, detail));
            }
            (Ok(_), None) => {
                failures += 1;
                ctx.events.failed(
                    Stage::DetailParse,
                    json!({ "correlationId": content.id, "reason": MISSING_LIST_ITEM }),
                );
            }
            (Err(error), item) => {
                failures += 1;
                ctx.events.failed(
                    Stage::DetailParse,
                    json!({
                        "detailUrl": item.map(|item| item.detail_url.as_str()),
                        "error": error.to_string(),
                    }),
                );
            }
        }
    }

    let items = items
        .into_iter()
        .filter(|item| matched.contains(&item.id))
        .collect();

    Ok(DetailParseOutput {
        items,
        details,
        failures,
    })
}

/// Joins surviving items with their details and drops the correlation ids
pub async fn merge(
    ctx: &StageContext<'_>,
    parsed: DetailParseOutput,
) -> crate::Result<Vec<Article>> {
    let input = parsed.details.len();
    ctx.events
        .observe(
            Stage::Merge,
            json!({ "input": input }),
            future::ready(merge_articles(parsed.items, parsed.details)),
            |articles| json!({ "output": articles.len() }),
        )
        .await
}

/// Pairs details with items by correlation id, in item order
///
/// A detail without a matching item is a defect, not a per-item failure.
pub fn merge_articles(
    items: Vec<Correlated<ListItem>>,
    details: Vec<Correlated<DetailRecord>>,
) -> crate::Result<Vec<Article>> {
    let index = index_by_id(&items);
    let mut merged = Vec::with_capacity(details.len());

    for detail in details {
        let (position, item) =
            index
                .get(&detail.id)
                .copied()
                .ok_or_else(|| IngestError::Correlation {
                    id: detail.id,
                    reason: MISSING_LIST_ITEM.to_string(),
                })?;
        merged.push((position, Article::merge(item.clone(), detail.value)));
    }

    merged.sort_by_key(|(position, _)| *position);
    Ok(merged.into_iter().map(|(_, article)| article).collect())
}

/// Persists merged articles and returns the count storage reports
pub async fn save(ctx: &StageContext<'_>, articles: Vec<Article>) -> crate::Result<usize> {
    ctx.events
        .observe(
            Stage::Save,
            json!({ "input": articles.len() }),
            persist(ctx, &articles),
            |saved| json!({ "saved": saved }),
        )
        .await
}

async fn persist(ctx: &StageContext<'_>, articles: &[Article]) -> crate::Result<usize> {
    if articles.is_empty() {
        return Ok(0);
    }
    Ok(ctx.store.save(articles, ctx.save_meta).await?)
}

//! Data model shared by every stage of the ingestion pipeline
//!
//! Targets and groups are read-only during a run. List items, details and
//! articles are created by the stages and moved downward through the pipeline.

use crate::crawler::{Fetcher, SourceParser};
use crate::IngestError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;

/// Concurrency used for a group that does not configure its own
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Source-specific fields carried by list items, details and articles
pub type Fields = Map<String, Value>;

/// One configured content source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlingTarget {
    /// Optional display name
    pub name: Option<String>,

    /// Listing endpoint
    pub url: String,
}

impl CrawlingTarget {
    pub fn new(name: Option<&str>, url: impl Into<String>) -> Self {
        Self {
            name: name.map(str::to_string),
            url: url.into(),
        }
    }

    /// Structured descriptor attached to every event about this target
    pub fn descriptor(&self) -> Value {
        json!({ "name": self.name, "url": self.url })
    }
}

impl fmt::Display for CrawlingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", name, self.url),
            None => f.write_str(&self.url),
        }
    }
}

/// A target paired with the capabilities that process it
#[derive(Clone)]
pub struct TargetSource {
    pub target: CrawlingTarget,

    /// Source-specific list and detail extraction
    pub parser: Arc<dyn SourceParser>,

    /// Replaces the orchestrator's default fetcher for this target only
    pub fetcher: Option<Arc<dyn Fetcher>>,
}

impl TargetSource {
    pub fn new(target: CrawlingTarget, parser: Arc<dyn SourceParser>) -> Self {
        Self {
            target,
            parser,
            fetcher: None,
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }
}

impl fmt::Debug for TargetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetSource")
            .field("target", &self.target)
            .field("fetch_override", &self.fetcher.is_some())
            .finish()
    }
}

/// A named collection of targets processed together
#[derive(Debug, Clone)]
pub struct CrawlingTargetGroup {
    pub name: String,

    /// Maximum number of target pipelines running at once
    pub max_concurrency: Option<usize>,

    pub targets: Vec<TargetSource>,
}

impl CrawlingTargetGroup {
    pub fn new(name: impl Into<String>, targets: Vec<TargetSource>) -> Self {
        Self {
            name: name.into(),
            max_concurrency: None,
            targets,
        }
    }

    /// Effective concurrency bound, never below one
    pub fn concurrency(&self) -> usize {
        self.max_concurrency
            .unwrap_or(DEFAULT_MAX_CONCURRENCY)
            .max(1)
    }

    /// Group identity without its target list
    pub fn meta(&self) -> GroupMeta {
        GroupMeta {
            name: self.name.clone(),
            max_concurrency: self.concurrency(),
        }
    }
}

/// Group identity handed to storage and events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMeta {
    pub name: String,
    pub max_concurrency: usize,
}

impl GroupMeta {
    pub fn descriptor(&self) -> Value {
        json!({ "name": self.name, "maxConcurrency": self.max_concurrency })
    }
}

/// Run metadata passed along with every save
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveMeta {
    pub group: GroupMeta,
    pub target: CrawlingTarget,
}

/// A candidate extracted from a listing page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    /// Detail endpoint, also the dedupe key
    pub detail_url: String,

    #[serde(default)]
    pub fields: Fields,
}

impl ListItem {
    pub fn new(detail_url: impl Into<String>) -> Self {
        Self {
            detail_url: detail_url.into(),
            fields: Fields::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }
}

/// Structured content extracted from one detail page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailRecord {
    #[serde(default)]
    pub fields: Fields,
}

impl DetailRecord {
    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }
}

/// A list item merged with its detail, ready for persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub detail_url: String,
    pub fields: Fields,
}

impl Article {
    /// Combines item and detail fields; detail fields win on conflicts
    pub fn merge(item: ListItem, detail: DetailRecord) -> Self {
        let mut fields = item.fields;
        fields.extend(detail.fields);
        Self {
            detail_url: item.detail_url,
            fields,
        }
    }
}

/// Stage counts for one successful target pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TargetReport {
    pub target: CrawlingTarget,
    pub listed: usize,
    pub fresh: usize,
    pub fetch_failures: usize,
    pub parse_failures: usize,
    pub merged: usize,
    pub saved: usize,
}

/// A target whose pipeline failed after exhausting its attempt budget
#[derive(Debug)]
pub struct TargetFailure {
    pub target: CrawlingTarget,
    pub error: IngestError,
}

/// Outcome of one group invocation
#[derive(Debug)]
pub struct GroupRunResult {
    pub group: String,

    /// Identifier shared by every event emitted during this run
    pub task_id: String,

    /// Sum of saved counts from targets that completed
    pub total_saved: usize,

    pub reports: Vec<TargetReport>,
    pub failures: Vec<TargetFailure>,
}

impl GroupRunResult {
    /// True when every target completed
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

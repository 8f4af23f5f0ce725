//! Crawler module for multi-stage article ingestion
//!
//! This module contains the core pipeline logic, including:
//! - HTTP fetching behind the `Fetcher` capability
//! - Selector-based list and detail parsing
//! - Correlation ids that pair fan-out results with their list items
//! - The seven pipeline stages and their structured events
//! - Whole-sequence retry and bounded group orchestration

mod coordinator;
mod correlation;
mod events;
mod fetcher;
mod parser;
mod pipeline;
mod retry;
mod stages;

pub use coordinator::{groups_from_config, run_ingest, select_groups, GroupOrchestrator};
pub use correlation::{Correlated, CorrelationId};
pub use events::{EventLevel, EventScope, EventSink, PipelineEvent, Stage, TracingSink};
pub use fetcher::{build_http_client, user_agent_string, FetchError, Fetcher, HttpFetcher};
pub use parser::{ParseError, SelectorParser, SourceParser};
pub use pipeline::{Collaborators, TargetPipeline};
pub use retry::{retry, RetryPolicy};
pub use stages::{merge_articles, MISSING_LIST_ITEM};

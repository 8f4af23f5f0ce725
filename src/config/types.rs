use crate::model::DEFAULT_MAX_CONCURRENCY;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Crawl-Ingest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(rename = "group", default)]
    pub groups: Vec<GroupConfig>,
}

/// Pipeline behavior shared by every group
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Default number of targets run at once within a group
    #[serde(rename = "max-concurrency", default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Attempts per target pipeline, including the first
    #[serde(rename = "retry-attempts", default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Pause between attempts (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Whole-request HTTP timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// A named set of targets run together
#[derive(Debug, Clone, Deserialize)]
pub struct GroupConfig {
    pub name: String,

    /// Overrides `crawler.max-concurrency` for this group
    #[serde(rename = "max-concurrency", default)]
    pub max_concurrency: Option<usize>,

    #[serde(rename = "target", default)]
    pub targets: Vec<TargetConfig>,
}

/// One listing page and the rules for reading it
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub url: String,
    pub list: ListRules,
    pub detail: DetailRules,
}

/// Selectors applied to the listing page
#[derive(Debug, Clone, Deserialize)]
pub struct ListRules {
    /// Selector matching each list entry
    pub item: String,

    /// Selector for the detail link inside an entry
    #[serde(default)]
    pub link: Option<String>,

    /// Field name to selector; `selector@attr` reads an attribute
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

/// Selectors applied to each detail page
#[derive(Debug, Clone, Deserialize)]
pub struct DetailRules {
    #[serde(default)]
    pub fields: BTreeMap<String, String>,

    /// Fields whose absence fails the detail parse
    #[serde(default)]
    pub required: Vec<String>,
}

//! Fakes shared by the unit tests

use crate::crawler::{EventSink, FetchError, Fetcher, ParseError, PipelineEvent, SourceParser};
use crate::model::{Article, DetailRecord, ListItem, SaveMeta};
use crate::storage::{ArticleLookup, ArticleStore, StorageError, StorageResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Keeps every event for later assertions
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn named(&self, name: &str) -> Vec<PipelineEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.event == name)
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn event(&self, event: PipelineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Serves canned bodies; unknown URLs answer 404
#[derive(Default)]
pub struct FakeFetcher {
    pages: HashMap<String, Result<String, FetchError>>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), Ok(body.to_string()));
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            Err(FetchError::Status {
                url: url.to_string(),
                status: 500,
            }),
        );
        self
    }

    pub fn count(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|called| called.as_str() == url)
            .count()
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.pages.get(url).cloned().unwrap_or_else(|| {
            Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        })
    }
}

/// Returns a fixed list; detail bodies starting with "broken" fail to parse
pub struct FakeParser {
    items: Result<Vec<ListItem>, ParseError>,
    list_calls: AtomicUsize,
}

impl FakeParser {
    pub fn with_items(items: Vec<ListItem>) -> Self {
        Self {
            items: Ok(items),
            list_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            items: Err(ParseError::Custom("unexpected listing markup".to_string())),
            list_calls: AtomicUsize::new(0),
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceParser for FakeParser {
    async fn parse_list(&self, _content: &str) -> Result<Vec<ListItem>, ParseError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.items.clone()
    }

    async fn parse_detail(&self, content: &str) -> Result<DetailRecord, ParseError> {
        if content.starts_with("broken") {
            return Err(ParseError::Custom("unparseable detail".to_string()));
        }
        Ok(DetailRecord::default().with_field("body", content))
    }
}

/// In-memory lookup and store; saving makes a URL known
#[derive(Default)]
pub struct MemoryStore {
    known: Mutex<HashSet<String>>,
    saved: Mutex<Vec<(Article, SaveMeta)>>,
    fail_saves: bool,
    lookups: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_known(urls: &[&str]) -> Self {
        let store = Self::default();
        store
            .known
            .lock()
            .unwrap()
            .extend(urls.iter().map(|url| url.to_string()));
        store
    }

    pub fn failing() -> Self {
        Self {
            fail_saves: true,
            ..Self::default()
        }
    }

    pub fn saved(&self) -> Vec<Article> {
        self.saved
            .lock()
            .unwrap()
            .iter()
            .map(|(article, _)| article.clone())
            .collect()
    }

    pub fn saved_meta(&self) -> Vec<SaveMeta> {
        self.saved
            .lock()
            .unwrap()
            .iter()
            .map(|(_, meta)| meta.clone())
            .collect()
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArticleLookup for MemoryStore {
    async fn existing_articles(&self, urls: &[String]) -> StorageResult<Vec<String>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let known = self.known.lock().unwrap();
        Ok(urls.iter().filter(|url| known.contains(*url)).cloned().collect())
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn save(&self, articles: &[Article], meta: &SaveMeta) -> StorageResult<usize> {
        if self.fail_saves {
            return Err(StorageError::Database("write failed".to_string()));
        }

        let mut known = self.known.lock().unwrap();
        let mut saved = self.saved.lock().unwrap();
        let mut count = 0;
        for article in articles {
            if known.insert(article.detail_url.clone()) {
                saved.push((article.clone(), meta.clone()));
                count += 1;
            }
        }
        Ok(count)
    }
}

//! Integration tests for the ingestion pipeline
//!
//! These tests use wiremock to create mock HTTP servers and run whole groups
//! end-to-end through the real fetcher, the selector parser and SQLite.

use crawl_ingest::config::{
    Config, CrawlerConfig, DetailRules, GroupConfig, ListRules, OutputConfig, TargetConfig,
    UserAgentConfig,
};
use crawl_ingest::crawler::{
    groups_from_config, run_ingest, Collaborators, EventSink, GroupOrchestrator, HttpFetcher,
    PipelineEvent, RetryPolicy,
};
use crawl_ingest::storage::{RunStatus, SqliteStorage};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Collects events so tests can inspect them
#[derive(Default)]
struct CollectingSink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl CollectingSink {
    fn named(&self, name: &str) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.event == name)
            .cloned()
            .collect()
    }
}

impl EventSink for CollectingSink {
    fn event(&self, event: PipelineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

fn target(name: &str, url: String) -> TargetConfig {
    TargetConfig {
        name: Some(name.to_string()),
        url,
        list: ListRules {
            item: "article".to_string(),
            link: Some("a.permalink".to_string()),
            fields: BTreeMap::from([("title".to_string(), "h2".to_string())]),
        },
        detail: DetailRules {
            fields: BTreeMap::from([
                ("body".to_string(), ".content".to_string()),
                ("author".to_string(), "meta[name='author']@content".to_string()),
            ]),
            required: vec!["body".to_string()],
        },
    }
}

/// Creates a configuration with one group per (name, targets) entry
fn create_test_config(groups: Vec<(&str, Vec<TargetConfig>)>, db_path: &str) -> Config {
    Config {
        crawler: CrawlerConfig {
            retry_attempts: 2,
            retry_delay_ms: 0,
            request_timeout_secs: 5,
            ..CrawlerConfig::default()
        },
        user_agent: user_agent(),
        output: OutputConfig {
            database_path: db_path.to_string(),
        },
        groups: groups
            .into_iter()
            .map(|(name, targets)| GroupConfig {
                name: name.to_string(),
                max_concurrency: None,
                targets,
            })
            .collect(),
    }
}

fn listing(entries: &[(&str, &str)]) -> String {
    let articles: String = entries
        .iter()
        .map(|(title, href)| {
            format!(
                r#"<article><h2>{}</h2><a class="permalink" href="{}">Read more</a></article>"#,
                title, href
            )
        })
        .collect();
    format!("<html><body>{}</body></html>", articles)
}

fn detail(body: &str) -> String {
    format!(
        r#"<html><head><meta name="author" content="Ada"></head>
        <body><div class="content">{}</div></body></html>"#,
        body
    )
}

async fn mount_page(server: &MockServer, route: &str, status: u16, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(status)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

fn orchestrator(storage: Arc<SqliteStorage>, sink: Arc<CollectingSink>) -> GroupOrchestrator {
    let fetcher = HttpFetcher::from_config(&user_agent(), Duration::from_secs(5)).unwrap();
    GroupOrchestrator::new(
        Collaborators {
            fetcher: Arc::new(fetcher),
            lookup: storage.clone(),
            store: storage,
            events: sink,
        },
        RetryPolicy::new(2, Duration::ZERO),
    )
}

#[tokio::test]
async fn test_group_run_skips_failed_items_and_known_articles() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/blog",
        200,
        listing(&[
            ("First", "/posts/1"),
            ("Second", "/posts/2"),
            ("Third", "/posts/3"),
            ("Mail", "mailto:editor@example.com"),
        ]),
    )
    .await;
    mount_page(&server, "/posts/1", 200, detail("Body one")).await;
    mount_page(&server, "/posts/2", 500, "oops".to_string()).await;
    mount_page(&server, "/posts/3", 200, "<html><body>No content</body></html>".to_string()).await;

    let config = create_test_config(
        vec![("news", vec![target("Blog", format!("{}/blog", base))])],
        ":memory:",
    );
    let groups = groups_from_config(&config).unwrap();
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let sink = Arc::new(CollectingSink::default());
    let orchestrator = orchestrator(storage.clone(), sink.clone());

    let result = orchestrator.run_group(&groups[0]).await;

    assert!(result.is_complete());
    assert_eq!(result.total_saved, 1);
    let report = &result.reports[0];
    assert_eq!(report.listed, 3);
    assert_eq!(report.fetch_failures, 1);
    assert_eq!(report.parse_failures, 1);

    let article = storage
        .get_article(&format!("{}/posts/1", base))
        .unwrap()
        .expect("first post saved");
    assert_eq!(article.fields["title"], "First");
    assert_eq!(article.fields["body"], "Body one");
    assert_eq!(article.fields["author"], "Ada");
    assert_eq!(article.group_name, "news");
    assert_eq!(article.target_name.as_deref(), Some("Blog"));

    assert_eq!(sink.named("detail_fetch.failed").len(), 1);
    assert_eq!(sink.named("detail_parse.failed").len(), 1);
    assert_eq!(sink.named("group_run.done")[0].data["total"], 1);
}

#[tokio::test]
async fn test_second_run_does_not_refetch_saved_articles() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/blog", 200, listing(&[("First", "/posts/1")])).await;
    Mock::given(method("GET"))
        .and(path("/posts/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail("Body one")))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(
        vec![("news", vec![target("Blog", format!("{}/blog", base))])],
        ":memory:",
    );
    let groups = groups_from_config(&config).unwrap();
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let orchestrator = orchestrator(storage.clone(), Arc::new(CollectingSink::default()));

    let first = orchestrator.run_group(&groups[0]).await;
    let second = orchestrator.run_group(&groups[0]).await;

    assert_eq!(first.total_saved, 1);
    assert_eq!(second.total_saved, 0);
    assert_eq!(second.reports[0].fresh, 0);
    assert_eq!(storage.count_articles().unwrap(), 1);
}

#[tokio::test]
async fn test_unreachable_listing_completes_with_nothing_saved() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/gone", 404, String::new()).await;
    mount_page(&server, "/blog", 200, listing(&[("First", "/posts/1")])).await;
    mount_page(&server, "/posts/1", 200, detail("Body one")).await;

    let config = create_test_config(
        vec![(
            "news",
            vec![
                target("Gone", format!("{}/gone", base)),
                target("Blog", format!("{}/blog", base)),
            ],
        )],
        ":memory:",
    );
    let groups = groups_from_config(&config).unwrap();
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let sink = Arc::new(CollectingSink::default());
    let orchestrator = orchestrator(storage, sink.clone());

    let result = orchestrator.run_group(&groups[0]).await;

    assert!(result.is_complete());
    assert_eq!(result.total_saved, 1);
    assert_eq!(result.reports[0].listed, 0);
    assert_eq!(result.reports[1].saved, 1);

    let failed = sink.named("list_fetch.failed");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].data["target"]["name"], "Gone");
}

#[tokio::test]
async fn test_run_ingest_records_runs_per_group() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/news", 200, listing(&[("N1", "/n/1"), ("N2", "/n/2")])).await;
    mount_page(&server, "/n/1", 200, detail("News one")).await;
    mount_page(&server, "/n/2", 200, detail("News two")).await;
    mount_page(&server, "/blogs", 200, listing(&[("B1", "/b/1")])).await;
    mount_page(&server, "/b/1", 200, detail("Blog one")).await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("ingest.db");
    let config = create_test_config(
        vec![
            ("news", vec![target("News", format!("{}/news", base))]),
            ("blogs", vec![target("Blogs", format!("{}/blogs", base))]),
        ],
        db_path.to_str().unwrap(),
    );

    let only_news = run_ingest(&config, "hash-1", &["news".to_string()])
        .await
        .unwrap();
    assert_eq!(only_news.len(), 1);
    assert_eq!(only_news[0].total_saved, 2);

    let everything = run_ingest(&config, "hash-1", &[]).await.unwrap();
    assert_eq!(everything.len(), 2);
    assert_eq!(everything[0].total_saved, 0);
    assert_eq!(everything[1].total_saved, 1);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_articles().unwrap(), 3);

    let runs = storage.latest_runs(10).unwrap();
    assert_eq!(runs.len(), 3);
    assert!(runs.iter().all(|run| run.status == RunStatus::Completed));
    assert!(runs.iter().all(|run| run.config_hash == "hash-1"));
    assert_eq!(runs[0].group_name, "blogs");
    assert_eq!(runs[0].total_saved, 1);
}

#[tokio::test]
async fn test_run_ingest_rejects_unknown_group() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("ingest.db");
    let config = create_test_config(vec![("news", vec![])], db_path.to_str().unwrap());

    let result = run_ingest(&config, "hash", &["sports".to_string()]).await;

    assert!(result.is_err());
}

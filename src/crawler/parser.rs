//! Source-specific list and detail extraction
//!
//! Every target supplies a `SourceParser`. The stock implementation,
//! `SelectorParser`, is driven by CSS selectors from the configuration file:
//! - list pages: one entry per `item` match, detail link from `link` or the entry's own href
//! - detail pages: one field per configured selector
//! - `selector@attr` reads an attribute instead of the element text

use crate::config::TargetConfig;
use crate::model::{DetailRecord, ListItem};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Source-specific extraction failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    #[error("Missing required field '{0}'")]
    MissingField(String),

    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("{0}")]
    Custom(String),
}

/// Extraction capability supplied per target
#[async_trait]
pub trait SourceParser: Send + Sync {
    /// Extracts candidate items from listing content
    ///
    /// Detail URLs must be unique within one result.
    async fn parse_list(&self, content: &str) -> Result<Vec<ListItem>, ParseError>;

    /// Extracts structured fields from one detail payload
    async fn parse_detail(&self, content: &str) -> Result<DetailRecord, ParseError>;
}

/// One named field extracted by selector
#[derive(Debug, Clone)]
struct FieldRule {
    name: String,
    selector: Selector,
    attr: Option<String>,
}

impl FieldRule {
    /// Compiles `selector` or `selector@attr`
    fn compile(name: &str, rule: &str) -> Result<Self, ParseError> {
        let (selector, attr) = match rule.rsplit_once('@') {
            Some((selector, attr)) if is_attr_name(attr) => (selector, Some(attr.to_string())),
            _ => (rule, None),
        };

        Ok(Self {
            name: name.to_string(),
            selector: compile_selector(selector)?,
            attr,
        })
    }

    fn extract(&self, scope: ElementRef<'_>) -> Option<String> {
        let element = scope.select(&self.selector).next()?;
        let value = match &self.attr {
            Some(attr) => element.value().attr(attr)?.trim().to_string(),
            None => element_text(element),
        };
        Some(value).filter(|v| !v.is_empty())
    }
}

/// CSS-selector driven parser configured per target
#[derive(Debug, Clone)]
pub struct SelectorParser {
    base_url: Url,
    item: Selector,
    link: Option<Selector>,
    list_fields: Vec<FieldRule>,
    detail_fields: Vec<FieldRule>,
    required: Vec<String>,
}

impl SelectorParser {
    /// Compiles every selector of a target configuration
    ///
    /// # Returns
    ///
    /// * `Ok(SelectorParser)` - All selectors compiled
    /// * `Err(ParseError)` - A selector or the listing URL is invalid
    pub fn from_config(config: &TargetConfig) -> Result<Self, ParseError> {
        let base_url = Url::parse(&config.url).map_err(|e| ParseError::InvalidUrl {
            url: config.url.clone(),
            message: e.to_string(),
        })?;

        let link = config
            .list
            .link
            .as_deref()
            .map(compile_selector)
            .transpose()?;

        let list_fields = config
            .list
            .fields
            .iter()
            .map(|(name, rule)| FieldRule::compile(name, rule))
            .collect::<Result<Vec<_>, _>>()?;

        let detail_fields = config
            .detail
            .fields
            .iter()
            .map(|(name, rule)| FieldRule::compile(name, rule))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            base_url,
            item: compile_selector(&config.list.item)?,
            link,
            list_fields,
            detail_fields,
            required: config.detail.required.clone(),
        })
    }

    fn extract_list(&self, html: &str) -> Vec<ListItem> {
        let document = Html::parse_document(html);
        let mut items = Vec::new();

        for entry in document.select(&self.item) {
            let href = match &self.link {
                Some(link) => entry.select(link).next().and_then(|a| a.value().attr("href")),
                None => entry.value().attr("href").or_else(|| first_href(entry)),
            };

            let Some(detail_url) = href.and_then(|href| resolve_link(href, &self.base_url)) else {
                tracing::debug!("Skipping list entry without a usable link");
                continue;
            };

            let mut item = ListItem::new(detail_url);
            for rule in &self.list_fields {
                if let Some(value) = rule.extract(entry) {
                    item.fields.insert(rule.name.clone(), Value::String(value));
                }
            }
            items.push(item);
        }

        items
    }

    fn extract_detail(&self, html: &str) -> Result<DetailRecord, ParseError> {
        let document = Html::parse_document(html);
        let root = document.root_element();

        let mut detail = DetailRecord::default();
        for rule in &self.detail_fields {
            if let Some(value) = rule.extract(root) {
                detail.fields.insert(rule.name.clone(), Value::String(value));
            }
        }

        if let Some(missing) = self
            .required
            .iter()
            .find(|name| !detail.fields.contains_key(name.as_str()))
        {
            return Err(ParseError::MissingField(missing.clone()));
        }

        Ok(detail)
    }
}

#[async_trait]
impl SourceParser for SelectorParser {
    async fn parse_list(&self, content: &str) -> Result<Vec<ListItem>, ParseError> {
        Ok(self.extract_list(content))
    }

    async fn parse_detail(&self, content: &str) -> Result<DetailRecord, ParseError> {
        self.extract_detail(content)
    }
}

/// Compiles a CSS selector, keeping the source text in the error
pub fn compile_selector(selector: &str) -> Result<Selector, ParseError> {
    Selector::parse(selector).map_err(|e| ParseError::Selector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

fn is_attr_name(attr: &str) -> bool {
    !attr.is_empty()
        && attr
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':')
}

/// Collapses an element's text nodes into single-spaced text
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_href<'a>(entry: ElementRef<'a>) -> Option<&'a str> {
    let anchor = Selector::parse("a[href]").ok()?;
    entry.select(&anchor).next()?.value().attr("href")
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    match absolute_url.scheme() {
        "http" | "https" => Some(absolute_url.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DetailRules, ListRules};
    use std::collections::BTreeMap;

    fn target_config(link: Option<&str>) -> TargetConfig {
        TargetConfig {
            name: Some("Example".to_string()),
            url: "https://example.com/blog/".to_string(),
            list: ListRules {
                item: "article".to_string(),
                link: link.map(str::to_string),
                fields: BTreeMap::from([("title".to_string(), "h2".to_string())]),
            },
            detail: DetailRules {
                fields: BTreeMap::from([
                    ("body".to_string(), ".content".to_string()),
                    ("image".to_string(), "meta[property='og:image']@content".to_string()),
                ]),
                required: vec!["body".to_string()],
            },
        }
    }

    const LISTING: &str = r#"
        <html><body>
            <article><h2> First   post </h2><a class="more" href="/posts/1">Read</a></article>
            <article><h2>Second post</h2><a class="more" href="posts/2">Read</a></article>
            <article><h2>No link</h2></article>
            <article><h2>Mail</h2><a class="more" href="mailto:a@example.com">Mail</a></article>
        </body></html>
    "#;

    #[tokio::test]
    async fn test_parse_list_resolves_links_and_fields() {
        let parser = SelectorParser::from_config(&target_config(Some("a.more"))).unwrap();
        let items = parser.parse_list(LISTING).await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].detail_url, "https://example.com/posts/1");
        assert_eq!(items[0].fields["title"], "First post");
        assert_eq!(items[1].detail_url, "https://example.com/blog/posts/2");
    }

    #[tokio::test]
    async fn test_parse_list_falls_back_to_first_anchor() {
        let parser = SelectorParser::from_config(&target_config(None)).unwrap();
        let items = parser.parse_list(LISTING).await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].detail_url, "https://example.com/posts/1");
    }

    #[tokio::test]
    async fn test_parse_detail_reads_text_and_attributes() {
        let parser = SelectorParser::from_config(&target_config(None)).unwrap();
        let html = r#"
            <html><head><meta property="og:image" content=" https://cdn.example.com/1.png "></head>
            <body><div class="content"><p>Hello</p>
            <p>world</p></div></body></html>
        "#;

        let detail = parser.parse_detail(html).await.unwrap();

        assert_eq!(detail.fields["body"], "Hello world");
        assert_eq!(detail.fields["image"], "https://cdn.example.com/1.png");
    }

    #[tokio::test]
    async fn test_parse_detail_missing_required_field() {
        let parser = SelectorParser::from_config(&target_config(None)).unwrap();
        let result = parser.parse_detail("<html><body></body></html>").await;

        assert_eq!(result, Err(ParseError::MissingField("body".to_string())));
    }

    #[test]
    fn test_invalid_selector_is_rejected() {
        let mut config = target_config(None);
        config.list.item = "article[".to_string();

        let result = SelectorParser::from_config(&config);
        assert!(matches!(result, Err(ParseError::Selector { .. })));
    }

    #[test]
    fn test_field_rule_without_attribute_suffix() {
        let rule = FieldRule::compile("title", "h2.title").unwrap();
        assert!(rule.attr.is_none());

        let rule = FieldRule::compile("link", "a@href").unwrap();
        assert_eq!(rule.attr.as_deref(), Some("href"));
    }

    #[test]
    fn test_resolve_link_filters_schemes() {
        let base = Url::parse("https://example.com/page").unwrap();

        assert_eq!(
            resolve_link("/other", &base),
            Some("https://example.com/other".to_string())
        );
        assert_eq!(resolve_link("javascript:void(0)", &base), None);
        assert_eq!(resolve_link("tel:+1234567890", &base), None);
        assert_eq!(resolve_link("#section", &base), None);
        assert_eq!(resolve_link("ftp://example.com/file", &base), None);
    }
}

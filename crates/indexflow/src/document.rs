//! Parse followed documents into JSON values merged back into records.
//!
//! [`HtmlDocumentParser`] extracts the useful parts of a page (title, meta
//! tags, headings, links, JSON-LD, text) with `scraper` CSS selectors,
//! without rendering. [`JsonDocumentParser`] is for links that point at JSON.

use crate::error::{Error, Result};
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Map, Value};
use url::Url;

/// Turns a fetched body into a document value.
pub trait DocumentParser: Send + Sync {
    fn parse(&self, body: &str, url: &Url) -> Result<Value>;
}

/// HTML page parser.
///
/// The result is an object with `url`, `title`, `description`, `meta`,
/// `headings`, `links`, `jsonld` and `text` keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlDocumentParser;

impl DocumentParser for HtmlDocumentParser {
    fn parse(&self, body: &str, url: &Url) -> Result<Value> {
        if body.trim().is_empty() {
            return Err(Error::Decoding(format!("empty document at {url}")));
        }
        let document = Html::parse_document(body);

        let meta = extract_meta(&document);
        let description = meta
            .get("description")
            .or_else(|| meta.get("og:description"))
            .cloned()
            .unwrap_or(Value::Null);

        Ok(json!({
            "url": url.as_str(),
            "title": extract_title(&document, &meta),
            "description": description,
            "meta": meta,
            "headings": extract_headings(&document),
            "links": extract_links(&document, url),
            "jsonld": extract_jsonld(&document),
            "text": extract_text(&document),
        }))
    }
}

/// Parses the body as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDocumentParser;

impl DocumentParser for JsonDocumentParser {
    fn parse(&self, body: &str, _url: &Url) -> Result<Value> {
        serde_json::from_str(body).map_err(Error::from)
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn element_text(element: ElementRef<'_>) -> String {
    let raw = element.text().collect::<Vec<_>>().join(" ");
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Title and meta ──────────────────────────────────────────────────────────

fn extract_title(document: &Html, meta: &Map<String, Value>) -> Value {
    let title = selector("title")
        .and_then(|sel| document.select(&sel).next().map(element_text))
        .filter(|t| !t.is_empty());
    match title {
        Some(t) => Value::String(t),
        None => meta.get("og:title").cloned().unwrap_or(Value::Null),
    }
}

/// `<meta name|property="..." content="...">` pairs; the first occurrence wins.
fn extract_meta(document: &Html) -> Map<String, Value> {
    let mut meta = Map::new();
    let Some(sel) = selector("meta[content]") else {
        return meta;
    };
    for element in document.select(&sel) {
        let attrs = element.value();
        let key = attrs.attr("name").or_else(|| attrs.attr("property"));
        if let (Some(key), Some(content)) = (key, attrs.attr("content")) {
            let key = key.trim().to_ascii_lowercase();
            if !key.is_empty() && !meta.contains_key(&key) {
                meta.insert(key, Value::String(content.trim().to_string()));
            }
        }
    }
    meta
}

// ── Headings ────────────────────────────────────────────────────────────────

fn extract_headings(document: &Html) -> Vec<Value> {
    let Some(sel) = selector("h1, h2, h3, h4, h5, h6") else {
        return Vec::new();
    };
    document
        .select(&sel)
        .filter_map(|element| {
            let level = element.value().name()[1..].parse::<u8>().ok()?;
            let text = element_text(element);
            (!text.is_empty()).then(|| json!({ "level": level, "text": text }))
        })
        .collect()
}

// ── Links ───────────────────────────────────────────────────────────────────

fn extract_links(document: &Html, base: &Url) -> Vec<Value> {
    let Some(sel) = selector("a[href]") else {
        return Vec::new();
    };
    let mut links: Vec<Value> = Vec::new();
    for element in document.select(&sel) {
        let href = element.value().attr("href").unwrap_or("").trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            continue;
        }
        if let Ok(resolved) = base.join(href) {
            let resolved = Value::String(resolved.to_string());
            if !links.contains(&resolved) {
                links.push(resolved);
            }
        }
    }
    links
}

// ── JSON-LD ─────────────────────────────────────────────────────────────────

fn extract_jsonld(document: &Html) -> Vec<Value> {
    let Some(sel) = selector(r#"script[type="application/ld+json"]"#) else {
        return Vec::new();
    };
    document
        .select(&sel)
        .filter_map(|element| {
            let text = element.inner_html();
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            // Malformed blocks are common in the wild; skip rather than fail the page.
            serde_json::from_str::<Value>(text).ok()
        })
        .collect()
}

// ── Body text ───────────────────────────────────────────────────────────────

fn extract_text(document: &Html) -> Value {
    let Some(sel) = selector("body") else {
        return Value::Null;
    };
    let Some(body) = document.select(&sel).next() else {
        return Value::Null;
    };
    let skip = selector("script, style, noscript, template");
    let mut words: Vec<&str> = Vec::new();
    for node in body.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let inside_skipped = node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|el| skip.as_ref().is_some_and(|s| s.matches(&el)));
        if !inside_skipped {
            words.extend(text.split_whitespace());
        }
    }
    Value::String(words.join(" "))
}

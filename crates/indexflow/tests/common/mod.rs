//! Stub transports shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use indexflow::{CachePolicy, Error, FetchResponse, Result, Transport};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub const INDEX_URL: &str = "https://x.com/query-index.json";

/// How the stub answers one URL.
#[derive(Clone, Debug)]
pub enum Reply {
    Page { status: u16, body: String, delay_ms: u64 },
    Fail(String),
    Hang,
}

impl Reply {
    pub fn html(body: &str) -> Self {
        Reply::Page {
            status: 200,
            body: body.to_string(),
            delay_ms: 0,
        }
    }

    pub fn slow_html(body: &str, delay_ms: u64) -> Self {
        Reply::Page {
            status: 200,
            body: body.to_string(),
            delay_ms,
        }
    }

    pub fn status(status: u16) -> Self {
        Reply::Page {
            status,
            body: String::new(),
            delay_ms: 0,
        }
    }
}

/// Serves a generated sheet at [`INDEX_URL`] (honouring `offset`/`limit`)
/// and fixed replies for other URLs, keyed by URL without query.
#[derive(Default)]
pub struct StubTransport {
    rows: Vec<Value>,
    index_reply: Option<Reply>,
    routes: HashMap<String, Reply>,
    requests: Mutex<Vec<Url>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// `n` rows shaped `{"id": i, "path": "/page/i"}`.
    pub fn with_rows(mut self, n: usize) -> Self {
        self.rows = (0..n)
            .map(|i| json!({ "id": i, "path": format!("/page/{i}") }))
            .collect();
        self
    }

    pub fn with_raw_rows(mut self, rows: Vec<Value>) -> Self {
        self.rows = rows;
        self
    }

    /// Answer every index request with `reply` instead of the sheet.
    pub fn with_index_reply(mut self, reply: Reply) -> Self {
        self.index_reply = Some(reply);
        self
    }

    pub fn route(mut self, url: &str, reply: Reply) -> Self {
        self.routes.insert(url.to_string(), reply);
        self
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn requests(&self) -> Vec<Url> {
        self.requests.lock().unwrap().clone()
    }

    /// `offset` of every index request, in order.
    pub fn offsets(&self) -> Vec<u64> {
        self.requests()
            .iter()
            .filter(|u| is_index(u))
            .filter_map(|u| query_value(u, "offset"))
            .filter_map(|v| v.parse().ok())
            .collect()
    }

    /// Requests for anything but the index.
    pub fn document_requests(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter(|u| !is_index(u))
            .map(Url::to_string)
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn sheet_page(&self, url: &Url) -> FetchResponse {
        let offset: usize = query_value(url, "offset")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let limit: usize = query_value(url, "limit")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1000);
        let data: Vec<Value> = self.rows.iter().skip(offset).take(limit).cloned().collect();
        FetchResponse::ok(
            json!({
                "total": self.rows.len(),
                "offset": offset,
                "limit": limit,
                "data": data,
                ":type": "sheet"
            })
            .to_string(),
        )
    }

    async fn answer(&self, url: &Url, reply: Reply) -> Result<FetchResponse> {
        match reply {
            Reply::Page {
                status,
                body,
                delay_ms,
            } => {
                if delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Ok(FetchResponse::new(status, body))
            }
            Reply::Fail(description) => Err(Error::Network {
                url: url.to_string(),
                status: None,
                description,
            }),
            Reply::Hang => futures::future::pending().await,
        }
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn fetch(&self, url: &Url, _cache: CachePolicy) -> Result<FetchResponse> {
        self.requests.lock().unwrap().push(url.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let reply = if is_index(url) {
            self.index_reply.clone()
        } else {
            let mut key = url.clone();
            key.set_query(None);
            Some(
                self.routes
                    .get(key.as_str())
                    .cloned()
                    .unwrap_or_else(|| Reply::status(404)),
            )
        };
        let result = match reply {
            Some(reply) => self.answer(url, reply).await,
            None => Ok(self.sheet_page(url)),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Fails the test if it is ever asked to fetch anything.
pub struct ForbiddenTransport;

#[async_trait]
impl Transport for ForbiddenTransport {
    async fn fetch(&self, url: &Url, _cache: CachePolicy) -> Result<FetchResponse> {
        panic!("transport must not be called, but was asked for {url}");
    }
}

fn is_index(url: &Url) -> bool {
    url.path() == "/query-index.json"
}

fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

pub fn html_page(title: &str) -> String {
    format!("<html><head><title>{title}</title></head><body><h1>{title}</h1></body></html>")
}

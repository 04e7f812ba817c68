//! Immutable configuration snapshots.
//!
//! Every `with_*` method returns a new [`Config`]; the receiver is never
//! modified. Collaborators sit behind `Arc`, so clones are cheap.

use crate::allow_list::AllowList;
use crate::cancel::CancelToken;
use crate::document::{DocumentParser, HtmlDocumentParser};
use crate::transport::{HttpTransport, Transport};
use std::sync::Arc;
use tracing::warn;

/// Records requested per index page unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Documents fetched at once while following unless configured otherwise.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// How the transport should treat caches for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CachePolicy {
    /// Whatever the transport does by default.
    #[default]
    Default,
    /// Revalidate with the origin.
    NoCache,
    /// Only answer from cache.
    CacheOnly,
    /// Prefer a cached copy, even stale, and load otherwise.
    CacheElseLoad,
    /// Accept cached copies up to this many seconds old.
    MaxAge(u64),
}

impl CachePolicy {
    /// The `Cache-Control` request directive for this policy.
    pub fn cache_control(&self) -> Option<String> {
        match self {
            CachePolicy::Default => None,
            CachePolicy::NoCache => Some("no-cache".to_string()),
            CachePolicy::CacheOnly => Some("only-if-cached".to_string()),
            CachePolicy::CacheElseLoad => Some("max-stale".to_string()),
            CachePolicy::MaxAge(secs) => Some(format!("max-age={secs}")),
        }
    }
}

/// Settings for one pipeline evaluation.
#[derive(Clone)]
pub struct Config {
    chunk_size: usize,
    sheet: Option<String>,
    concurrency: usize,
    cache_policy: CachePolicy,
    allow_list: AllowList,
    transport: Arc<dyn Transport>,
    parser: Arc<dyn DocumentParser>,
    cancel: CancelToken,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            sheet: None,
            concurrency: DEFAULT_CONCURRENCY,
            cache_policy: CachePolicy::Default,
            allow_list: AllowList::new(),
            transport: Arc::new(HttpTransport::default()),
            parser: Arc::new(HtmlDocumentParser),
            cancel: CancelToken::new(),
        }
    }
}

impl Config {
    /// Same as [`Config::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with `INDEXFLOW_*` environment variables.
    ///
    /// Recognised: `INDEXFLOW_CHUNK_SIZE`, `INDEXFLOW_CONCURRENCY`,
    /// `INDEXFLOW_SHEET`, `INDEXFLOW_ALLOW` (comma-separated) and
    /// `INDEXFLOW_TIMEOUT_MS`. Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(n) = parse_var::<usize>(&lookup, "INDEXFLOW_CHUNK_SIZE") {
            config = config.with_chunk_size(n);
        }
        if let Some(n) = parse_var::<usize>(&lookup, "INDEXFLOW_CONCURRENCY") {
            config = config.with_concurrency(n);
        }
        if let Some(sheet) = lookup("INDEXFLOW_SHEET").filter(|s| !s.trim().is_empty()) {
            config = config.with_sheet(sheet.trim());
        }
        if let Some(hosts) = lookup("INDEXFLOW_ALLOW") {
            let mut allow = config.allow_list.clone();
            hosts.split(',').for_each(|h| allow.insert(h));
            config = config.with_allow_list(allow);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "INDEXFLOW_TIMEOUT_MS") {
            config = config.with_transport(Arc::new(HttpTransport::new(ms)));
        }
        config
    }

    /// Records requested per index page.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Sheet requested from a multi-sheet index, if any.
    pub fn sheet(&self) -> Option<&str> {
        self.sheet.as_deref()
    }

    /// Maximum simultaneous document fetches while following.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Cache policy sent with every request.
    pub fn cache_policy(&self) -> CachePolicy {
        self.cache_policy
    }

    /// Hosts that followed links may target.
    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// Transport used for index pages and documents.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Parser applied to followed documents.
    pub fn parser(&self) -> &Arc<dyn DocumentParser> {
        &self.parser
    }

    /// Token observed by every stage of an evaluation.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Records per index request. Zero is clamped to one.
    pub fn with_chunk_size(&self, chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            ..self.clone()
        }
    }

    /// Copy requesting `sheet` from multi-sheet indexes.
    pub fn with_sheet(&self, sheet: impl Into<String>) -> Self {
        Self {
            sheet: Some(sheet.into()),
            ..self.clone()
        }
    }

    /// Copy with no sheet selection.
    pub fn without_sheet(&self) -> Self {
        Self {
            sheet: None,
            ..self.clone()
        }
    }

    /// Simultaneous document fetches while following. Zero is clamped to one.
    pub fn with_concurrency(&self, concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            ..self.clone()
        }
    }

    /// Copy with a different cache policy.
    pub fn with_cache_policy(&self, cache_policy: CachePolicy) -> Self {
        Self {
            cache_policy,
            ..self.clone()
        }
    }

    /// Copy with `allow_list` replacing the current one.
    pub fn with_allow_list(&self, allow_list: AllowList) -> Self {
        Self {
            allow_list,
            ..self.clone()
        }
    }

    /// Copy with one more allow-list entry (`host`, `host:port` or `*`).
    pub fn with_allowed_host(&self, entry: impl AsRef<str>) -> Self {
        let mut allow_list = self.allow_list.clone();
        allow_list.insert(entry);
        self.with_allow_list(allow_list)
    }

    /// Copy using `transport` for every request.
    pub fn with_transport(&self, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            ..self.clone()
        }
    }

    /// Copy parsing followed documents with `parser`.
    pub fn with_parser(&self, parser: Arc<dyn DocumentParser>) -> Self {
        Self {
            parser,
            ..self.clone()
        }
    }

    /// Copy observing `cancel`.
    pub fn with_cancel_token(&self, cancel: CancelToken) -> Self {
        Self {
            cancel,
            ..self.clone()
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("chunk_size", &self.chunk_size)
            .field("sheet", &self.sheet)
            .field("concurrency", &self.concurrency)
            .field("cache_policy", &self.cache_policy)
            .field("allow_list", &self.allow_list)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable environment value");
            None
        }
    }
}

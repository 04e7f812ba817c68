//! Lazy, chainable record pipelines.
//!
//! A [`Pipeline`] is an immutable value: a configuration snapshot plus a
//! deferred producer that builds a fresh stream each time the pipeline is
//! evaluated. Operators wrap the producer and return a new pipeline; the
//! configuration is handed to the whole chain at evaluation time, so a
//! setting changed downstream (say, the chunk size) still reaches the
//! pagination engine upstream.

use crate::allow_list::AllowList;
use crate::cancel::CancelToken;
use crate::config::{CachePolicy, Config};
use crate::document::DocumentParser;
use crate::error::Result;
use crate::pagination::paginate;
use crate::record::Record;
use crate::transport::Transport;
use futures::future;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use url::Url;

pub(crate) type Producer<T> = Arc<dyn Fn(Config) -> BoxStream<'static, Result<T>> + Send + Sync>;

/// A deferred sequence of `T` with the configuration it will run under.
pub struct Pipeline<T> {
    pub(crate) config: Config,
    pub(crate) origin: Option<Url>,
    pub(crate) producer: Producer<T>,
}

impl<T> Clone for Pipeline<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            origin: self.origin.clone(),
            producer: Arc::clone(&self.producer),
        }
    }
}

impl<T> std::fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("origin", &self.origin.as_ref().map(Url::as_str))
            .finish_non_exhaustive()
    }
}

impl Pipeline<Record> {
    /// Records of the index at `index`, paginated per `config`.
    pub fn from_index(index: Url, config: Config) -> Self {
        let origin = index.clone();
        Self {
            config,
            origin: Some(origin),
            producer: Arc::new(move |config| paginate(index.clone(), config)),
        }
    }

    /// Deserialize every record into `U`. A record that does not fit ends
    /// the stream with a decoding error.
    pub fn decode<U>(&self) -> Pipeline<U>
    where
        U: DeserializeOwned + Send + 'static,
    {
        self.try_map(|record| record.decode::<U>())
    }
}

impl<T: Send + 'static> Pipeline<T> {
    /// A pipeline over in-memory values. It has no origin, so root-relative
    /// links cannot be followed unless one is set with [`with_origin`](Self::with_origin).
    pub fn from_records<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Clone + Sync,
    {
        let items: Arc<Vec<T>> = Arc::new(items.into_iter().collect());
        Self::from_producer(Config::default(), move |_| {
            stream::iter(items.as_ref().clone().into_iter().map(Ok)).boxed()
        })
    }

    /// A pipeline over a custom producer, invoked once per evaluation.
    pub fn from_producer<F>(config: Config, producer: F) -> Self
    where
        F: Fn(Config) -> BoxStream<'static, Result<T>> + Send + Sync + 'static,
    {
        Self {
            config,
            origin: None,
            producer: Arc::new(producer),
        }
    }

    fn derive<U>(&self, producer: Producer<U>) -> Pipeline<U> {
        Pipeline {
            config: self.config.clone(),
            origin: self.origin.clone(),
            producer,
        }
    }

    fn reconfigure(&self, config: Config) -> Self {
        Self {
            config,
            ..self.clone()
        }
    }

    // ── Operators ───────────────────────────────────────────────────────

    /// Apply `f` to every element as it is pulled.
    pub fn map<U, F>(&self, f: F) -> Pipeline<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let upstream = Arc::clone(&self.producer);
        let f = Arc::new(f);
        self.derive(Arc::new(move |config| {
            let f = Arc::clone(&f);
            upstream(config).map_ok(move |item| f(item)).boxed()
        }))
    }

    /// Like [`map`](Self::map), but `f` may fail; a failure ends the stream.
    pub fn try_map<U, F>(&self, f: F) -> Pipeline<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Result<U> + Send + Sync + 'static,
    {
        let upstream = Arc::clone(&self.producer);
        let f = Arc::new(f);
        self.derive(Arc::new(move |config| {
            let f = Arc::clone(&f);
            stop_after_error(
                upstream(config)
                    .and_then(move |item| future::ready(f(item)))
                    .boxed(),
            )
        }))
    }

    /// Forward only the elements for which `predicate` holds.
    pub fn filter<P>(&self, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let upstream = Arc::clone(&self.producer);
        let predicate = Arc::new(predicate);
        self.derive(Arc::new(move |config| {
            let predicate = Arc::clone(&predicate);
            upstream(config)
                .try_filter(move |item| future::ready(predicate(item)))
                .boxed()
        }))
    }

    /// At most `n` elements. Upstream is not polled past the `n`th.
    pub fn limit(&self, n: usize) -> Self {
        let upstream = Arc::clone(&self.producer);
        self.derive(Arc::new(move |config| {
            if n == 0 {
                return stream::empty().boxed();
            }
            upstream(config).take(n).boxed()
        }))
    }

    /// Drop the first `n` elements. Errors are never skipped.
    pub fn skip(&self, n: usize) -> Self {
        let upstream = Arc::clone(&self.producer);
        self.derive(Arc::new(move |config| {
            let mut remaining = n;
            upstream(config)
                .filter(move |item| {
                    let keep = match item {
                        Ok(_) if remaining > 0 => {
                            remaining -= 1;
                            false
                        }
                        _ => true,
                    };
                    future::ready(keep)
                })
                .boxed()
        }))
    }

    /// Elements `start..end`, i.e. `skip(start).limit(end - start)`.
    ///
    /// # Panics
    ///
    /// When `start > end`.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        assert!(start <= end, "slice start {start} is past its end {end}");
        self.skip(start).limit(end - start)
    }

    // ── Configuration ───────────────────────────────────────────────────

    /// The configuration this pipeline evaluates with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The index URL root-relative links resolve against.
    pub fn origin(&self) -> Option<&Url> {
        self.origin.as_ref()
    }

    /// Resolve root-relative links against `origin`.
    pub fn with_origin(&self, origin: Url) -> Self {
        Self {
            origin: Some(origin),
            ..self.clone()
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(&self, config: Config) -> Self {
        self.reconfigure(config)
    }

    /// Records per index page. Zero is clamped to one.
    pub fn chunk_size(&self, chunk_size: usize) -> Self {
        self.reconfigure(self.config.with_chunk_size(chunk_size))
    }

    /// Read `sheet` from a multi-sheet index.
    pub fn sheet(&self, sheet: impl Into<String>) -> Self {
        self.reconfigure(self.config.with_sheet(sheet))
    }

    /// Simultaneous document fetches while following. Zero is clamped to one.
    pub fn concurrency(&self, concurrency: usize) -> Self {
        self.reconfigure(self.config.with_concurrency(concurrency))
    }

    /// Cache policy for index pages and followed documents.
    pub fn cache_policy(&self, cache_policy: CachePolicy) -> Self {
        self.reconfigure(self.config.with_cache_policy(cache_policy))
    }

    /// Permit following links to `entry` (`host`, `host:port` or `*`).
    pub fn allow_host(&self, entry: impl AsRef<str>) -> Self {
        self.reconfigure(self.config.with_allowed_host(entry))
    }

    /// Permit following links to any host.
    pub fn allow_any_host(&self) -> Self {
        self.allow_list(AllowList::any())
    }

    /// Replace the allow-list, dropping any seeded entries.
    pub fn allow_list(&self, allow_list: AllowList) -> Self {
        self.reconfigure(self.config.with_allow_list(allow_list))
    }

    /// Use `transport` for every request.
    pub fn transport(&self, transport: Arc<dyn Transport>) -> Self {
        self.reconfigure(self.config.with_transport(transport))
    }

    /// Parse followed documents with `parser`.
    pub fn parser(&self, parser: Arc<dyn DocumentParser>) -> Self {
        self.reconfigure(self.config.with_parser(parser))
    }

    /// Evaluate under `token`; cancelling it ends the stream with
    /// [`Error::Cancelled`](crate::Error::Cancelled).
    pub fn cancel_token(&self, token: CancelToken) -> Self {
        self.reconfigure(self.config.with_cancel_token(token))
    }

    // ── Terminals ───────────────────────────────────────────────────────

    /// Start an evaluation. Dropping the stream abandons it.
    pub fn stream(&self) -> BoxStream<'static, Result<T>> {
        (self.producer)(self.config.clone())
    }

    /// Every element, or the first error.
    pub async fn collect(&self) -> Result<Vec<T>> {
        self.stream().try_collect().await
    }

    /// The first element; evaluation stops as soon as it arrives.
    pub async fn first(&self) -> Result<Option<T>> {
        self.stream().next().await.transpose()
    }

    /// Number of elements, or the first error.
    pub async fn count(&self) -> Result<usize> {
        self.stream()
            .try_fold(0usize, |n, _| future::ready(Ok(n + 1)))
            .await
    }
}

/// End `stream` right after its first error.
pub(crate) fn stop_after_error<T: Send + 'static>(
    stream: BoxStream<'static, Result<T>>,
) -> BoxStream<'static, Result<T>> {
    let mut failed = false;
    stream
        .take_while(move |item| {
            let keep_going = !failed;
            failed |= item.is_err();
            future::ready(keep_going)
        })
        .boxed()
}

//! Document following: resolve a link field, fetch it, parse it, merge it.
//!
//! Records are taken in groups of at most `concurrency` records. Every
//! record of a group is followed concurrently, the group is awaited as a
//! whole, and its records are emitted in their original order before the
//! next group is pulled. A failure on one record is written onto that
//! record as `{target}: null` plus `{target}_error: <message>` and never
//! affects its siblings or the stream.

use crate::allow_list::authority_key;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::pagination::RecordStream;
use crate::pipeline::Pipeline;
use crate::record::Record;
use crate::resolve::resolve;
use async_stream::try_stream;
use futures::future::join_all;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

impl Pipeline<Record> {
    /// Follow the link in `field` and store the parsed document in the same field.
    pub fn follow(&self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.follow_into(field.clone(), field)
    }

    /// Follow the link in `source` and store the parsed document in `target`.
    pub fn follow_into(&self, source: impl Into<String>, target: impl Into<String>) -> Self {
        let upstream = Arc::clone(&self.producer);
        let origin = self.origin.clone();
        let fields = Arc::new(FollowFields {
            source: source.into(),
            target: target.into(),
        });
        Self {
            config: self.config.clone(),
            origin: self.origin.clone(),
            producer: Arc::new(move |config: Config| -> RecordStream {
                Box::pin(follow_stream(
                    upstream(config.clone()),
                    config,
                    origin.clone(),
                    Arc::clone(&fields),
                ))
            }),
        }
    }
}

struct FollowFields {
    source: String,
    target: String,
}

impl FollowFields {
    fn error_field(&self) -> String {
        format!("{}_error", self.target)
    }
}

fn follow_stream(
    upstream: RecordStream,
    config: Config,
    origin: Option<Url>,
    fields: Arc<FollowFields>,
) -> impl Stream<Item = Result<Record>> + Send {
    try_stream! {
        let mut upstream = upstream;
        let group_size = config.concurrency();
        let cancel = config.cancel_token().clone();
        let mut exhausted = false;
        let mut group_number = 0usize;

        while !exhausted {
            let mut group = Vec::with_capacity(group_size);
            let mut upstream_error = None;
            while group.len() < group_size {
                match upstream.next().await {
                    Some(Ok(record)) => group.push(record),
                    Some(Err(err)) => {
                        upstream_error = Some(err);
                        exhausted = true;
                        break;
                    }
                    None => {
                        exhausted = true;
                        break;
                    }
                }
            }

            if !group.is_empty() {
                debug!(group = group_number, size = group.len(), source = %fields.source, "following group");
                group_number += 1;

                let tasks: Vec<_> = group
                    .into_iter()
                    .map(|record| follow_record(record, &config, origin.as_ref(), &fields))
                    .collect();
                let followed = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(Error::Cancelled),
                    results = join_all(tasks) => results.into_iter().collect::<Result<Vec<_>>>(),
                }
                .inspect_err(|_| debug!("follow cancelled mid-group"))?;

                for record in followed {
                    cancel.check()?;
                    yield record;
                }
            }

            if let Some(err) = upstream_error {
                Err::<(), Error>(err)?;
            }
        }
    }
}

/// Follow one record. Only cancellation escapes as an error; everything
/// else becomes an annotation on the returned copy.
async fn follow_record(
    record: Record,
    config: &Config,
    origin: Option<&Url>,
    fields: &FollowFields,
) -> Result<Record> {
    match fetch_document(&record, config, origin, &fields.source).await {
        Ok(document) => Ok(record.with_field(fields.target.as_str(), document)),
        Err(Error::Cancelled) => Err(Error::Cancelled),
        Err(err) => {
            warn!(field = %fields.source, error = %err, "could not follow record");
            Ok(record
                .with_field(fields.target.as_str(), Value::Null)
                .with_field(fields.error_field(), err.to_string()))
        }
    }
}

async fn fetch_document(
    record: &Record,
    config: &Config,
    origin: Option<&Url>,
    source: &str,
) -> Result<Value> {
    let raw = record.get_str(source).ok_or_else(|| Error::InvalidField {
        field: source.to_string(),
    })?;
    let url = resolve(raw, origin)?;

    if !config.allow_list().permits(&url) {
        return Err(Error::Security {
            authority: authority_key(&url).unwrap_or_else(|| url.to_string()),
        });
    }

    let response = config.transport().fetch(&url, config.cache_policy()).await?;
    Error::ensure_ok(&url, response.status)?;
    config.parser().parse(&response.body, &url)
}

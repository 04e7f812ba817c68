//! Pagination engine: one logical index, many offset/limit requests.
//!
//! Exactly one page request is outstanding at a time. The total record
//! count is taken from the first page and held for the rest of the run;
//! if the index grows or shrinks meanwhile, later pages are requested
//! against the stale total.

use crate::config::Config;
use crate::envelope::ResponseEnvelope;
use crate::error::{Error, Result};
use crate::record::Record;
use async_stream::try_stream;
use futures::stream::{BoxStream, Stream};
use tracing::{debug, info};
use url::Url;

/// A lazy stream of index records.
pub type RecordStream = BoxStream<'static, Result<Record>>;

/// The URL for one page: `index` plus `offset`, `limit` and optional `sheet`
/// query parameters, appended after any query the index URL already has.
pub fn page_url(index: &Url, offset: u64, limit: usize, sheet: Option<&str>) -> Url {
    let mut url = index.clone();
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("offset", &offset.to_string());
        query.append_pair("limit", &limit.to_string());
        if let Some(sheet) = sheet {
            query.append_pair("sheet", sheet);
        }
    }
    url
}

/// Stream every record of the index at `index`.
///
/// Nothing is requested until the stream is polled. Any page failure ends
/// the stream with that error; cancellation surfaces as
/// [`Error::Cancelled`], both between emitted records and while a page
/// request is in flight.
pub fn paginate(index: Url, config: Config) -> RecordStream {
    Box::pin(page_stream(index, config))
}

fn page_stream(index: Url, config: Config) -> impl Stream<Item = Result<Record>> + Send {
    try_stream! {
        let chunk_size = config.chunk_size();
        let step = chunk_size as u64;
        let cancel = config.cancel_token().clone();
        let transport = config.transport().clone();

        let mut offset: u64 = 0;
        let mut total: Option<u64> = None;

        loop {
            if total.is_some_and(|t| offset >= t) {
                break;
            }

            let url = page_url(&index, offset, chunk_size, config.sheet());
            debug!(%url, offset, limit = chunk_size, "requesting index page");

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Error::Cancelled),
                response = transport.fetch(&url, config.cache_policy()) => response,
            }?;
            Error::ensure_ok(&url, response.status)?;

            let envelope = ResponseEnvelope::decode(&response.body, config.sheet())?;
            let known_total = match total {
                Some(t) => t,
                None => {
                    info!(index = %index, total = envelope.total, "index size learned");
                    total = Some(envelope.total);
                    envelope.total
                }
            };

            for record in envelope.records {
                cancel
                    .check()
                    .inspect_err(|_| debug!(offset, "pagination cancelled by consumer"))?;
                yield record;
            }

            if offset + step >= known_total {
                break;
            }
            offset += step;
        }
    }
}

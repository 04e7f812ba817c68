// Copyright 2026 indexflow contributors
// SPDX-License-Identifier: MIT

//! indexflow — lazy, composable streams over paginated JSON content indexes.
//!
//! ```no_run
//! # async fn demo() -> indexflow::Result<()> {
//! let posts = indexflow::index("https://example.com/query-index.json")?
//!     .chunk_size(250)
//!     .filter(|r| r.get_str("path").is_some_and(|p| p.starts_with("/blog/")))
//!     .limit(20)
//!     .follow_into("path", "page")
//!     .collect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod allow_list;
pub mod cancel;
pub mod config;
pub mod document;
pub mod envelope;
pub mod error;
pub mod follow;
pub mod pagination;
pub mod pipeline;
pub mod record;
pub mod resolve;
pub mod transport;

pub use allow_list::AllowList;
pub use cancel::CancelToken;
pub use config::{CachePolicy, Config};
pub use document::{DocumentParser, HtmlDocumentParser, JsonDocumentParser};
pub use envelope::ResponseEnvelope;
pub use error::{Error, Result};
pub use pagination::{page_url, paginate, RecordStream};
pub use pipeline::Pipeline;
pub use record::Record;
pub use transport::{FetchResponse, HttpTransport, Transport};

use url::Url;

/// A pipeline over the index at `url` with default configuration.
///
/// The index's own host is allow-listed for following.
pub fn index(url: &str) -> Result<Pipeline<Record>> {
    index_with_config(url, Config::default())
}

/// Like [`index`], starting from `config`.
pub fn index_with_config(url: &str, config: Config) -> Result<Pipeline<Record>> {
    let index = parse_index_url(url)?;
    let config = match allow_list::authority_key(&index) {
        Some(own) => config.with_allowed_host(own),
        None => config,
    };
    Ok(Pipeline::from_index(index, config))
}

fn parse_index_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| Error::InvalidUrl(format!("{raw}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidUrl(format!(
            "{raw}: index URLs must use http or https"
        )));
    }
    if url.host_str().is_none() {
        return Err(Error::InvalidUrl(format!("{raw}: index URL has no host")));
    }
    Ok(url)
}

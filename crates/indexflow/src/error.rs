//! Error taxonomy for index pagination and document following.
//!
//! Pagination failures are fatal and reach the caller unchanged. Following
//! failures never abort a stream; their `Display` text becomes the
//! `{field}_error` annotation on the affected record.

/// All errors produced by this crate.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A URL could not be parsed or resolved.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The index or a followed document answered 404.
    #[error("HTTP error 404: document not found at {url}")]
    DocumentNotFound { url: String },

    /// Transport failure (`status` is `None`) or an unexpected HTTP status.
    #[error("{}", network_message(.url, .status, .description))]
    Network {
        url: String,
        status: Option<u16>,
        description: String,
    },

    /// The index page or a followed document could not be decoded.
    #[error("parsing error: {0}")]
    Decoding(String),

    /// A followed URL points at a host that is not allow-listed.
    #[error("security error: host `{authority}` is not permitted by the allow-list")]
    Security { authority: String },

    /// The source field of a follow is absent or not a string.
    #[error("field `{field}` is missing or not a string")]
    InvalidField { field: String },

    /// The consumer cancelled the evaluation.
    #[error("cancelled")]
    Cancelled,
}

fn network_message(url: &str, status: &Option<u16>, description: &str) -> String {
    match status {
        Some(code) => format!("HTTP error {code} fetching {url}: {description}"),
        None => format!("network error fetching {url}: {description}"),
    }
}

impl Error {
    /// True for [`Error::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// `Ok` for 200, otherwise the error matching `status`.
    pub(crate) fn ensure_ok(url: &url::Url, status: u16) -> Result<()> {
        if status == 200 {
            Ok(())
        } else {
            Err(Self::from_status(url, status))
        }
    }

    /// Map an HTTP status other than 200 to the matching error.
    pub(crate) fn from_status(url: &url::Url, status: u16) -> Self {
        if status == 404 {
            return Error::DocumentNotFound {
                url: url.to_string(),
            };
        }
        Error::Network {
            url: url.to_string(),
            status: Some(status),
            description: status_description(status).to_string(),
        }
    }
}

fn status_description(status: u16) -> &'static str {
    match status {
        400 => "bad request",
        401 => "unauthorized",
        403 => "forbidden",
        408 => "request timeout",
        410 => "gone",
        429 => "too many requests",
        500 => "internal server error",
        502 => "bad gateway",
        503 => "service unavailable",
        504 => "gateway timeout",
        s if (300..400).contains(&s) => "unexpected redirect",
        s if (200..300).contains(&s) => "unexpected success status",
        s if (400..500).contains(&s) => "client error",
        _ => "server error",
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decoding(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::InvalidUrl(err.to_string())
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, Error>;

//! Turn a raw record field into an absolute URL to follow.
//!
//! Only two shapes are accepted: absolute `http://` / `https://` URLs, and
//! root-relative paths starting with `/`, which are joined onto the index URL.

use crate::error::{Error, Result};
use url::Url;

/// Field values that show up in spreadsheets in place of a link.
const PLACEHOLDERS: &[&str] = &[
    "null",
    "undefined",
    "none",
    "nil",
    "n/a",
    "na",
    "-",
    "#",
    "0",
    "about:blank",
    "tbd",
];

const SCHEME_SEPARATOR: &str = "://";

/// Resolve `raw` against `base`.
///
/// `base` is the index URL; without one, root-relative paths cannot be
/// resolved and are rejected.
pub fn resolve(raw: &str, base: Option<&Url>) -> Result<Url> {
    let candidate = raw.trim();
    if candidate.is_empty() {
        return Err(reject(raw, "value is blank"));
    }
    if candidate.chars().any(char::is_whitespace) {
        return Err(reject(raw, "value contains whitespace"));
    }
    if candidate.starts_with(SCHEME_SEPARATOR) {
        return Err(reject(raw, "value has no scheme"));
    }
    if PLACEHOLDERS
        .iter()
        .any(|p| candidate.eq_ignore_ascii_case(p))
    {
        return Err(reject(raw, "value is a placeholder"));
    }

    if let Some(scheme_len) = http_prefix_len(candidate) {
        // Any further "://" must come after the recognised prefix, never before it.
        let first_separator = candidate.find(SCHEME_SEPARATOR);
        if first_separator != Some(scheme_len - SCHEME_SEPARATOR.len()) {
            return Err(reject(raw, "misplaced scheme separator"));
        }
        let url = Url::parse(candidate).map_err(|e| reject(raw, &e.to_string()))?;
        if url.host_str().map_or(true, str::is_empty) {
            return Err(reject(raw, "absolute URL has no host"));
        }
        return Ok(url);
    }

    if candidate.contains(SCHEME_SEPARATOR) {
        return Err(reject(raw, "unsupported scheme"));
    }

    if candidate.starts_with('/') {
        let base = base.ok_or_else(|| reject(raw, "relative path without a base URL"))?;
        return base.join(candidate).map_err(|e| reject(raw, &e.to_string()));
    }

    Err(reject(raw, "not an absolute http(s) URL or a root-relative path"))
}

/// Length of a leading `http://` or `https://`, matched case-insensitively.
fn http_prefix_len(candidate: &str) -> Option<usize> {
    ["http://", "https://"].into_iter().find_map(|prefix| {
        candidate
            .get(..prefix.len())
            .filter(|head| head.eq_ignore_ascii_case(prefix))
            .map(|_| prefix.len())
    })
}

fn reject(raw: &str, reason: &str) -> Error {
    Error::InvalidUrl(format!("could not resolve \"{raw}\": {reason}"))
}

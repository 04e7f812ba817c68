//! Host allow-list for document following.
//!
//! Entries are bare hostnames, `host:port` pairs, or the wildcard `*`.
//! A URL on its scheme's default port only matches a bare host entry; a URL
//! on any other explicit port only matches the exact `host:port` entry.

use std::collections::BTreeSet;
use url::Url;

/// The wildcard entry that permits every host.
pub const WILDCARD: &str = "*";

/// Hosts (`host` or `host:port`) that followed links may point at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    entries: BTreeSet<String>,
}

impl AllowList {
    /// An empty allow-list; every host is denied.
    pub fn new() -> Self {
        Self::default()
    }

    /// An allow-list containing only the wildcard.
    pub fn any() -> Self {
        let mut list = Self::new();
        list.insert(WILDCARD);
        list
    }

    /// Add an entry. Hostnames are compared case-insensitively.
    pub fn insert(&mut self, entry: impl AsRef<str>) {
        let entry = entry.as_ref().trim();
        if !entry.is_empty() {
            self.entries.insert(entry.to_ascii_lowercase());
        }
    }

    /// Remove an entry. Returns whether it was present.
    pub fn remove(&mut self, entry: &str) -> bool {
        self.entries.remove(&entry.trim().to_ascii_lowercase())
    }

    /// Whether `entry` is listed verbatim (after normalisation).
    pub fn contains(&self, entry: &str) -> bool {
        self.entries.contains(&entry.to_ascii_lowercase())
    }

    /// Whether the wildcard entry is present.
    pub fn is_wildcard(&self) -> bool {
        self.entries.contains(WILDCARD)
    }

    /// Whether no entries are present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Whether following `url` is permitted.
    pub fn permits(&self, url: &Url) -> bool {
        if self.is_wildcard() {
            return true;
        }
        match authority_key(url) {
            Some(key) => self.entries.contains(&key),
            None => false,
        }
    }
}

impl<S: AsRef<str>> FromIterator<S> for AllowList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut list = Self::new();
        for entry in iter {
            list.insert(entry);
        }
        list
    }
}

/// Default port for the schemes this crate follows.
pub fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}

/// The allow-list key a URL must match: `host` when the URL uses its
/// scheme's default port (or none), `host:port` otherwise.
///
/// `None` when the URL has no host.
pub fn authority_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    match url.port() {
        Some(port) if Some(port) != default_port(url.scheme()) => Some(format!("{host}:{port}")),
        _ => Some(host),
    }
}

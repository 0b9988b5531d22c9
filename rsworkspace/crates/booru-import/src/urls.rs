//! URL extraction and normalization.
//!
//! The pattern is permissive on purpose: it accepts `http(s)://` and bare
//! `www.` forms and runs to the next whitespace, so trailing punctuation
//! and the `>` of Discord's `<url>` embed suppression end up in the match.
//! [`normalize_url`] trims those delimiters.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"https?://(?:www\.)?[a-zA-Z0-9][a-zA-Z0-9-]+[a-zA-Z0-9]\.[^\s]{2,}",
        r"|www\.[a-zA-Z0-9][a-zA-Z0-9-]+[a-zA-Z0-9]\.[^\s]{2,}",
        r"|https?://(?:www\.)?[a-zA-Z0-9]+\.[^\s]{2,}",
        r"|www\.[a-zA-Z0-9]+\.[^\s]{2,}",
    ))
    .expect("URL pattern is valid")
});

/// Every URL-shaped substring of `text`, normalized, in text order.
///
/// An empty result means "nothing to do", not an error.
pub fn extract_urls(text: &str, strip_query: bool) -> Vec<String> {
    URL_REGEX
        .find_iter(text)
        .map(|m| normalize_url(m.as_str(), strip_query))
        .collect()
}

/// Trim `<`/`>` delimiters and, when `strip_query` is set, drop the query
/// string. Fragments are kept. Idempotent.
///
/// Absolute URLs come back in the `url` crate's serialization: a bare
/// host gains a trailing `/`, the host is lowercased and `.`/`..` path
/// segments are resolved.
pub fn normalize_url(raw: &str, strip_query: bool) -> String {
    let trimmed = raw.trim().trim_start_matches('<').trim_end_matches('>');
    if !strip_query {
        return trimmed.to_string();
    }

    match Url::parse(trimmed) {
        Ok(mut url) => {
            url.set_query(None);
            url.to_string()
        }
        // Scheme-less `www.` forms are not absolute URLs.
        Err(_) => strip_query_text(trimmed),
    }
}

/// A `?` after the first `#` belongs to the fragment, not the query.
fn strip_query_text(raw: &str) -> String {
    let (head, fragment) = match raw.find('#') {
        Some(i) => raw.split_at(i),
        None => (raw, ""),
    };
    let head = head.split_once('?').map_or(head, |(path, _)| path);
    format!("{head}{fragment}")
}

/// Split a user-supplied link list on commas and line breaks.
pub fn split_links(input: &str) -> Vec<&str> {
    input
        .split([',', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

//! Utility functions and helpers.

pub mod http;

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static STATUS_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/status(?:es)?/(\d+)").expect("status id pattern is valid")
});

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Extract the numeric status id from a permalink such as
/// `/user/status/1234567890#m` or `https://x.com/user/status/123?s=20`.
pub fn extract_status_id(href: &str) -> Option<String> {
    STATUS_ID
        .captures(href)
        .and_then(|caps| caps.get(1))
        .map(|id| id.as_str().to_string())
}

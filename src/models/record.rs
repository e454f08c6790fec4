//! Scraped items and their canonical form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::SourceConfig;

/// One timeline entry as scraped from the source page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPost {
    /// Status identifier, if the markup exposed one
    pub id: Option<String>,

    /// Post body as extracted text
    pub text: String,

    /// Timestamp reported by the source
    pub published_at: Option<DateTime<Utc>>,

    /// Absolute media URLs, in page order
    pub media: Vec<String>,

    /// Pinned to the top of the profile
    pub pinned: bool,

    /// Repost of another account
    pub retweet: bool,

    /// When the fetcher saw the item
    pub observed_at: DateTime<Utc>,
}

/// Normalized, source-agnostic representation of one fetched item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalRecord {
    /// Source-assigned identifier (opaque)
    pub id: String,

    /// Display text (may be empty)
    pub text: String,

    /// Source-reported creation time
    pub created_at: DateTime<Utc>,

    /// Media references, in order
    pub media: Vec<String>,

    /// Handle of the monitored account
    pub author: String,

    /// Link back to the original post
    pub permalink: String,
}

impl CanonicalRecord {
    /// Build a record from a scraped item.
    ///
    /// Fails with [`AppError::MalformedSource`] when the item carries no
    /// usable identifier. Does no I/O and never reads the clock.
    pub fn from_raw(raw: RawPost, source: &SourceConfig) -> Result<Self> {
        let id = raw
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                AppError::MalformedSource(format!(
                    "post without identifier (text: {:?})",
                    preview(&raw.text, 40)
                ))
            })?
            .to_string();

        let author = source.handle().to_string();
        let permalink = format!(
            "{}/{}/status/{}",
            source.permalink_base.trim_end_matches('/'),
            author,
            id
        );

        let mut media: Vec<String> = Vec::with_capacity(raw.media.len());
        for url in raw.media {
            let url = url.trim().to_string();
            if !url.is_empty() && !media.contains(&url) {
                media.push(url);
            }
        }

        Ok(Self {
            id,
            text: normalize_text(&raw.text),
            created_at: raw.published_at.unwrap_or(raw.observed_at),
            media,
            author,
            permalink,
        })
    }

    /// Nothing to publish.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.media.is_empty()
    }
}

/// Collapse whitespace within each line and runs of blank lines, so
/// paragraphs stay one blank line apart.
fn normalize_text(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for line in text.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() && lines.last().is_none_or(|last| last.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|last| last.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// First `max` characters of `text`, for log lines.
pub fn preview(text: &str, max: usize) -> String {
    let mut out: String = text.chars().take(max).collect();
    if text.chars().count() > max {
        out.push('…');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn source() -> SourceConfig {
        SourceConfig {
            username: "rustlang".into(),
            ..SourceConfig::default()
        }
    }

    fn raw(id: Option<&str>, text: &str) -> RawPost {
        RawPost {
            id: id.map(String::from),
            text: text.into(),
            observed_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            ..RawPost::default()
        }
    }

    #[test]
    fn test_builds_record() {
        let record = CanonicalRecord::from_raw(raw(Some("p1"), "hello"), &source()).unwrap();
        assert_eq!(record.id, "p1");
        assert_eq!(record.text, "hello");
        assert_eq!(record.author, "rustlang");
        assert_eq!(record.permalink, "https://x.com/rustlang/status/p1");
        assert!(record.media.is_empty());
    }

    #[test]
    fn test_missing_id_is_malformed() {
        let err = CanonicalRecord::from_raw(raw(None, "hello"), &source()).unwrap_err();
        assert!(matches!(err, AppError::MalformedSource(_)));

        let err = CanonicalRecord::from_raw(raw(Some("  "), "hello"), &source()).unwrap_err();
        assert!(matches!(err, AppError::MalformedSource(_)));
    }

    #[test]
    fn test_created_at_prefers_source_timestamp() {
        let published = Utc.with_ymd_and_hms(2025, 12, 31, 23, 0, 0).unwrap();
        let mut item = raw(Some("p1"), "x");
        item.published_at = Some(published);
        let record = CanonicalRecord::from_raw(item, &source()).unwrap();
        assert_eq!(record.created_at, published);

        let record = CanonicalRecord::from_raw(raw(Some("p1"), "x"), &source()).unwrap();
        assert_eq!(
            record.created_at,
            Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()
        );
    }

    #[test]
    fn test_text_is_normalized() {
        let record = CanonicalRecord::from_raw(
            raw(Some("p1"), "  first   line \n\n\n second\tline  "),
            &source(),
        )
        .unwrap();
        assert_eq!(record.text, "first line\n\nsecond line");
    }

    #[test]
    fn test_paragraphs_keep_one_blank_line() {
        let record = CanonicalRecord::from_raw(
            raw(Some("p1"), "\n\nIntro\n  \n\t\nBody line one\nBody line two\n\n\n"),
            &source(),
        )
        .unwrap();
        assert_eq!(record.text, "Intro\n\nBody line one\nBody line two");
    }

    #[test]
    fn test_media_deduplicated_in_order() {
        let mut item = raw(Some("p1"), "");
        item.media = vec![
            "https://n.example/pic/b.jpg".into(),
            "https://n.example/pic/a.jpg".into(),
            "https://n.example/pic/b.jpg".into(),
            " ".into(),
        ];
        let record = CanonicalRecord::from_raw(item, &source()).unwrap();
        assert_eq!(
            record.media,
            vec!["https://n.example/pic/b.jpg", "https://n.example/pic/a.jpg"]
        );
        assert!(!record.is_empty());
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("hello", 10), "hello");
        assert_eq!(preview("hello world", 5), "hello…");
    }
}

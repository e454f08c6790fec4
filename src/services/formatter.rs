// src/services/formatter.rs

//! Note formatter.
//!
//! Renders a [`CanonicalRecord`] into note content: the configured template,
//! then the media URLs one per line. Only the display text is ever shortened.

use chrono::{DateTime, Utc};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{AppError, Result};
use crate::models::{CanonicalRecord, NoteConfig};

/// Largest note content, in UTF-8 bytes.
pub const MAX_NOTE_BYTES: usize = 4096;

const ELLIPSIS: &str = "…";

/// Rendered payload, ready to be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub content: String,
    pub tags: Vec<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NoteFormatter {
    template: String,
    max_bytes: usize,
}

impl NoteFormatter {
    pub fn new(config: &NoteConfig) -> Self {
        Self {
            template: config.template.clone(),
            max_bytes: MAX_NOTE_BYTES,
        }
    }

    /// Override the size limit.
    pub fn with_limit(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Render a record.
    ///
    /// Fails with [`AppError::Format`] when the record has neither text nor
    /// media.
    pub fn format(&self, record: &CanonicalRecord) -> Result<Note> {
        if record.is_empty() {
            return Err(AppError::format(format!(
                "post {} has neither text nor media",
                record.id
            )));
        }

        let media_suffix = if record.media.is_empty() {
            String::new()
        } else {
            format!("\n\n{}", record.media.join("\n"))
        };

        // The text counts once per `{text}` in the template.
        let copies = self.template.matches("{text}").count().max(1);
        let frame = self.render(record, "").len() + media_suffix.len();
        let text = if frame + copies * record.text.len() <= self.max_bytes {
            record.text.clone()
        } else {
            let budget = self.max_bytes.saturating_sub(frame) / copies;
            let shortened = truncate_words(&record.text, budget);
            log::info!(
                "Shortened text of {} from {} to {} bytes",
                record.id,
                record.text.len(),
                shortened.len()
            );
            shortened
        };

        let content = format!("{}{}", self.render(record, &text), media_suffix);
        if content.len() > self.max_bytes {
            log::warn!(
                "Note for {} is {} bytes even without text (limit {})",
                record.id,
                content.len(),
                self.max_bytes
            );
        }

        Ok(Note {
            content,
            tags: vec![vec!["r".to_string(), record.permalink.clone()]],
            created_at: record.created_at,
        })
    }

    fn render(&self, record: &CanonicalRecord, text: &str) -> String {
        self.template
            .replace("{username}", &record.author)
            .replace("{link}", &record.permalink)
            .replace("{id}", &record.id)
            .replace("{created_at}", &record.created_at.to_rfc3339())
            .replace("{text}", text)
    }
}

/// Longest prefix of whole words that fits `budget` bytes with a trailing `…`.
fn truncate_words(text: &str, budget: usize) -> String {
    if text.len() <= budget {
        return text.to_string();
    }
    let Some(limit) = budget.checked_sub(ELLIPSIS.len()) else {
        return String::new();
    };

    let mut end = 0;
    for (start, segment) in text.split_word_bound_indices() {
        let segment_end = start + segment.len();
        if segment_end > limit {
            break;
        }
        end = segment_end;
    }

    let kept = text[..end].trim_end();
    format!("{kept}{ELLIPSIS}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(text: &str, media: &[&str]) -> CanonicalRecord {
        CanonicalRecord {
            id: "p1".into(),
            text: text.into(),
            created_at: Utc.with_ymd_and_hms(2026, 10, 18, 8, 0, 0).unwrap(),
            media: media.iter().map(|m| m.to_string()).collect(),
            author: "rustlang".into(),
            permalink: "https://x.com/rustlang/status/p1".into(),
        }
    }

    fn formatter(template: &str) -> NoteFormatter {
        NoteFormatter::new(&NoteConfig {
            template: template.into(),
        })
    }

    #[test]
    fn test_default_template() {
        let note = NoteFormatter::new(&NoteConfig::default())
            .format(&record("hello", &[]))
            .unwrap();
        assert_eq!(
            note.content,
            "Quote from @rustlang on X:\n\n> hello\n\nSource:\nhttps://x.com/rustlang/status/p1"
        );
        assert_eq!(
            note.tags,
            vec![vec!["r".to_string(), "https://x.com/rustlang/status/p1".to_string()]]
        );
        assert_eq!(note.created_at, record("", &[]).created_at);
    }

    #[test]
    fn test_media_appended() {
        let note = formatter("{text}")
            .format(&record("look", &["https://n.example/a.jpg", "https://n.example/b.jpg"]))
            .unwrap();
        assert_eq!(
            note.content,
            "look\n\nhttps://n.example/a.jpg\nhttps://n.example/b.jpg"
        );
    }

    #[test]
    fn test_media_only() {
        let note = formatter("{text}")
            .format(&record("", &["https://n.example/a.jpg"]))
            .unwrap();
        assert_eq!(note.content, "\n\nhttps://n.example/a.jpg");
    }

    #[test]
    fn test_empty_record_is_format_error() {
        let err = formatter("{text}").format(&record("", &[])).unwrap_err();
        assert!(matches!(err, AppError::Format(_)));
        assert_eq!(err.exit_code(), 13);
    }

    #[test]
    fn test_truncates_at_word_boundary_and_keeps_media() {
        let text = "The quick brown fox jumps over the lazy dog and keeps running far away";
        let media = ["https://n.example/pic/1.jpg", "https://n.example/pic/2.jpg"];
        let limit = 100;
        let note = formatter("{text}")
            .with_limit(limit)
            .format(&record(text, &media))
            .unwrap();

        assert!(note.content.len() <= limit);
        for url in media {
            assert!(note.content.contains(url));
        }

        let body = note.content.split("\n\n").next().unwrap();
        let kept = body.strip_suffix(ELLIPSIS).expect("ellipsis appended");
        assert!(!kept.is_empty());
        assert!(text.starts_with(kept));
        assert_eq!(text[kept.len()..].chars().next(), Some(' '));
    }

    #[test]
    fn test_repeated_text_placeholder_stays_within_limit() {
        let note = formatter("{text}\n{text}")
            .with_limit(30)
            .format(&record("alpha beta gamma delta epsilon", &[]))
            .unwrap();
        assert!(note.content.len() <= 30);
        assert_eq!(note.content, "alpha beta…\nalpha beta…");
    }

    #[test]
    fn test_fitting_text_is_untouched() {
        let note = formatter("{text}")
            .with_limit(20)
            .format(&record("short words", &[]))
            .unwrap();
        assert_eq!(note.content, "short words");
    }

    #[test]
    fn test_truncate_words() {
        assert_eq!(truncate_words("alpha beta gamma", 100), "alpha beta gamma");
        assert_eq!(truncate_words("alpha beta gamma", 13), "alpha beta…");
        assert_eq!(truncate_words("alpha beta gamma", 9), "alpha…");
        assert_eq!(truncate_words("alpha beta gamma", 2), "");
    }

    #[test]
    fn test_truncate_multibyte() {
        let out = truncate_words("héllo wörld ünïcode", 16);
        assert!(out.len() <= 16);
        assert_eq!(out, "héllo wörld…");
    }
}

//! Change detection.
//!
//! Only the newest fetched item is compared against the watermark. Items
//! posted between two runs collapse to the latest one; the watermark jumps
//! straight to it.

use std::fmt;

use serde::Serialize;

use crate::models::{CanonicalRecord, Watermark};

/// What a run does with the newest record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Decision {
    /// Not posted yet
    Publish { first_run: bool },
    /// Already posted
    Skip,
    /// Nothing fetched
    Empty,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Publish { first_run: true } => f.write_str("publish (first run)"),
            Decision::Publish { first_run: false } => f.write_str("publish"),
            Decision::Skip => f.write_str("skip"),
            Decision::Empty => f.write_str("empty"),
        }
    }
}

/// Compare the newest record against the stored watermark.
pub fn decide(mark: &Watermark, newest: Option<&CanonicalRecord>) -> Decision {
    let Some(record) = newest else {
        return Decision::Empty;
    };
    match mark.last_post_id.as_deref() {
        None => Decision::Publish { first_run: true },
        Some(last) if last == record.id => Decision::Skip,
        Some(_) => Decision::Publish { first_run: false },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: &str) -> CanonicalRecord {
        CanonicalRecord {
            id: id.into(),
            text: "t".into(),
            created_at: Utc::now(),
            media: vec![],
            author: "a".into(),
            permalink: format!("https://x.com/a/status/{id}"),
        }
    }

    fn mark(id: Option<&str>) -> Watermark {
        match id {
            Some(id) => Watermark::new(id, Utc::now()),
            None => Watermark::default(),
        }
    }

    #[test]
    fn test_decision_table() {
        let p1 = record("p1");
        let cases = [
            (None, Some(&p1), Decision::Publish { first_run: true }),
            (None, None, Decision::Empty),
            (Some("p1"), Some(&p1), Decision::Skip),
            (Some("p0"), Some(&p1), Decision::Publish { first_run: false }),
            (Some("p1"), None, Decision::Empty),
        ];
        for (stored, newest, expected) in cases {
            assert_eq!(decide(&mark(stored), newest), expected, "{stored:?} / {newest:?}");
        }
    }

    #[test]
    fn test_decision_is_deterministic() {
        let p2 = record("p2");
        let stored = mark(Some("p1"));
        let first = decide(&stored, Some(&p2));
        for _ in 0..10 {
            assert_eq!(decide(&stored, Some(&p2)), first);
        }
    }

    #[test]
    fn test_identity_comparison_is_exact() {
        assert_eq!(
            decide(&mark(Some("P1")), Some(&record("p1"))),
            Decision::Publish { first_run: false }
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Decision::Skip.to_string(), "skip");
        assert_eq!(
            Decision::Publish { first_run: true }.to_string(),
            "publish (first run)"
        );
    }
}

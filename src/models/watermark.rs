//! Persisted marker of the last published item.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Identifier of the last successfully published item.
///
/// `last_post_id == None` is the first-run state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Watermark {
    #[serde(default)]
    pub last_post_id: Option<String>,

    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Watermark {
    pub fn new(id: impl Into<String>, updated: DateTime<Utc>) -> Self {
        Self {
            last_post_id: Some(id.into()),
            last_updated: Some(updated),
        }
    }

    /// No successful publish recorded yet.
    pub fn is_first_run(&self) -> bool {
        self.last_post_id.is_none()
    }
}

/// RFC 3339, or a naive ISO-8601 timestamp read as UTC.
///
/// Anything else becomes `None`: only the identifier gates publishing.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };

    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Some(naive.and_utc()));
    }

    log::warn!("Ignoring unparsable last_updated value {:?}", raw);
    Ok(None)
}

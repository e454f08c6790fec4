// src/error.rs

//! Unified error handling for the cross-poster.
//!
//! Every variant maps to a stable process exit code (see [`AppError::exit_code`]).
//! Cron wrappers alert on these values, so they must never be renumbered.

use std::fmt;
use std::path::Path;

use thiserror::Error;

/// Result type alias for cross-poster operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Source unreachable, timed out or returned an unusable response
    #[error("Fetch error for {source_url}: {message}")]
    Fetch { source_url: String, message: String },

    /// The configured profile does not exist on the source
    #[error("Source not found: {0}")]
    SourceNotFound(String),

    /// A fetched item had no extractable identifier
    #[error("Malformed source item: {0}")]
    MalformedSource(String),

    /// The record has nothing to publish
    #[error("Format error: {0}")]
    Format(String),

    /// No relay acknowledged the note
    #[error("Publish failed: 0 of {attempted} relays acknowledged ({failures})")]
    PublishFailed { attempted: usize, failures: String },

    /// The watermark could not be read or durably written
    #[error("Persistence error at {path}: {message}")]
    Persistence { path: String, message: String },

    /// Another invocation holds the state lock
    #[error("State store is locked by another run: {0}")]
    StoreLocked(String),

    /// Termination signal received before the watermark was updated
    #[error("Interrupted before completion")]
    Interrupted,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Signing key could not be decoded or used
    #[error("Signing key error: {0}")]
    Key(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },
}

impl AppError {
    /// Create a fetch error for a source URL.
    pub fn fetch(source_url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            source_url: source_url.into(),
            message: message.to_string(),
        }
    }

    /// Create a persistence error for a storage location.
    pub fn persistence(path: impl AsRef<Path>, message: impl fmt::Display) -> Self {
        Self::Persistence {
            path: path.as_ref().display().to_string(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a format error.
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    /// Create a signing key error.
    pub fn key(message: impl fmt::Display) -> Self {
        Self::Key(message.to_string())
    }

    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Process exit code for this error kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Key(_) | Self::Toml(_) => 2,
            Self::Fetch { .. } | Self::Url(_) => 10,
            Self::SourceNotFound(_) => 11,
            Self::MalformedSource(_) | Self::Selector { .. } => 12,
            Self::Format(_) => 13,
            Self::PublishFailed { .. } => 14,
            Self::Persistence { .. } => 15,
            Self::StoreLocked(_) => 16,
            Self::Interrupted => 130,
            Self::Io(_) | Self::Json(_) => 1,
        }
    }

    /// Short operator hint printed next to the diagnostic.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::Fetch { .. } | Self::Url(_) => {
                "source unreachable; retry later or try a different Nitter instance"
            }
            Self::SourceNotFound(_) => "check source.username and source.instance",
            Self::MalformedSource(_) | Self::Selector { .. } => {
                "the instance markup changed; try a different Nitter instance"
            }
            Self::Format(_) => "the newest post has no text or media to publish",
            Self::PublishFailed { .. } => "check the signing key and network access to relays",
            Self::Persistence { .. } => "check storage permissions for the state file",
            Self::StoreLocked(_) => "another run is in progress; remove a stale lock file if none is",
            Self::Interrupted => "run aborted by signal; watermark left unchanged",
            Self::Config(_) | Self::Key(_) | Self::Toml(_) => "fix the configuration file",
            Self::Io(_) | Self::Json(_) => "unexpected internal error",
        }
    }
}

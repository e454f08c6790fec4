//! Application configuration structures.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Environment variable that overrides `publish.secret_key`.
pub const SECRET_KEY_ENV: &str = "CROSSPOST_SECRET_KEY";

/// Root application configuration.
///
/// Built once at process start and passed by reference into the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Monitored profile and HTTP settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Signing credential and relays
    #[serde(default)]
    pub publish: PublishConfig,

    /// Note rendering
    #[serde(default)]
    pub note: NoteConfig,

    /// Watermark persistence
    #[serde(default)]
    pub state: StateConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// Apply environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(SECRET_KEY_ENV) {
            if !key.trim().is_empty() {
                self.publish.secret_key = Credential::new(key.trim());
            }
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.source.username.trim().is_empty() {
            return Err(AppError::config("source.username is empty"));
        }
        url::Url::parse(&self.source.instance)
            .map_err(|e| AppError::config(format!("source.instance is not a URL: {e}")))?;
        if self.source.user_agent.trim().is_empty() {
            return Err(AppError::config("source.user_agent is empty"));
        }
        if self.source.timeout_secs == 0 {
            return Err(AppError::config("source.timeout_secs must be > 0"));
        }
        if self.publish.secret_key.is_placeholder() {
            return Err(AppError::config(format!(
                "publish.secret_key is not set (or set {SECRET_KEY_ENV})"
            )));
        }
        if self.publish.relays.is_empty() {
            return Err(AppError::config("No relays configured"));
        }
        if self.publish.timeout_secs == 0 {
            return Err(AppError::config("publish.timeout_secs must be > 0"));
        }
        if self.publish.max_concurrent == 0 {
            return Err(AppError::config("publish.max_concurrent must be > 0"));
        }
        if !self.note.template.contains("{text}") {
            return Err(AppError::config("note.template must contain {text}"));
        }
        if self.state.path.as_os_str().is_empty() {
            return Err(AppError::config("state.path is empty"));
        }
        Ok(())
    }
}

/// Monitored source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Profile handle, without the leading `@`
    #[serde(default)]
    pub username: String,

    /// Base URL of the Nitter instance
    #[serde(default = "defaults::instance")]
    pub instance: String,

    /// Base URL used to build permalinks in published notes
    #[serde(default = "defaults::permalink_base")]
    pub permalink_base: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Fetch timeout in seconds
    #[serde(default = "defaults::fetch_timeout")]
    pub timeout_secs: u64,

    /// Ignore the pinned post at the top of the timeline
    #[serde(default = "defaults::yes")]
    pub skip_pinned: bool,

    /// Treat reposts of other accounts as new content
    #[serde(default)]
    pub include_retweets: bool,
}

impl SourceConfig {
    /// Profile page URL on the configured instance.
    pub fn profile_url(&self) -> String {
        format!(
            "{}/{}",
            self.instance.trim_end_matches('/'),
            self.username.trim_start_matches('@')
        )
    }

    /// Handle without a leading `@`.
    pub fn handle(&self) -> &str {
        self.username.trim_start_matches('@')
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            instance: defaults::instance(),
            permalink_base: defaults::permalink_base(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::fetch_timeout(),
            skip_pinned: true,
            include_retweets: false,
        }
    }
}

/// Broadcast settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Signing key, `nsec1…` or 64 hex characters
    #[serde(default)]
    pub secret_key: Credential,

    /// Relay URLs, in the order attempts are reported
    #[serde(default)]
    pub relays: Vec<String>,

    /// Per-relay timeout in seconds
    #[serde(default = "defaults::relay_timeout")]
    pub timeout_secs: u64,

    /// Maximum relays contacted at once
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            secret_key: Credential::default(),
            relays: Vec::new(),
            timeout_secs: defaults::relay_timeout(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// Note rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteConfig {
    /// Template with `{username}`, `{text}`, `{link}`, `{id}`, `{created_at}`
    #[serde(default = "defaults::template")]
    pub template: String,
}

impl Default for NoteConfig {
    fn default() -> Self {
        Self {
            template: defaults::template(),
        }
    }
}

/// Watermark persistence settings.
///
/// Each source/destination pair needs its own `path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// State file location
    #[serde(default = "defaults::state_path")]
    pub path: PathBuf,

    /// How long to wait for a concurrent run to release the lock
    #[serde(default = "defaults::lock_wait")]
    pub lock_wait_secs: u64,

    /// Age after which a lock left by a dead run is taken over
    #[serde(default = "defaults::lock_ttl")]
    pub lock_ttl_secs: u64,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: defaults::state_path(),
            lock_wait_secs: defaults::lock_wait(),
            lock_ttl_secs: defaults::lock_ttl(),
        }
    }
}

/// Secret material that never shows up in `Debug` output or logs.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Empty, or still the `nsec...` sample value.
    pub fn is_placeholder(&self) -> bool {
        let value = self.0.trim();
        value.is_empty() || value.starts_with("nsec...")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn instance() -> String {
        "https://nitter.net".into()
    }
    pub fn permalink_base() -> String {
        "https://x.com".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into()
    }
    pub fn fetch_timeout() -> u64 {
        30
    }
    pub fn relay_timeout() -> u64 {
        10
    }
    pub fn max_concurrent() -> usize {
        8
    }
    pub fn yes() -> bool {
        true
    }
    pub fn template() -> String {
        "Quote from @{username} on X:\n\n> {text}\n\nSource:\n{link}".into()
    }
    pub fn state_path() -> PathBuf {
        PathBuf::from("state.json")
    }
    pub fn lock_wait() -> u64 {
        30
    }
    pub fn lock_ttl() -> u64 {
        600
    }
}

//! Local filesystem watermark store.
//!
//! One small JSON file per source/destination pair, replaced atomically
//! (write to temp, fsync, then rename) so a reader never sees a partial
//! write.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{StateConfig, Watermark};
use crate::storage::{StoreLease, WatermarkStore};

/// JSON-file backend.
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
    lock_ttl: Duration,
    lock_wait: Duration,
}

impl LocalStore {
    /// Create a store for the given state file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let defaults = StateConfig::default();
        Self {
            path: path.into(),
            lock_ttl: Duration::from_secs(defaults.lock_ttl_secs),
            lock_wait: Duration::from_secs(defaults.lock_wait_secs),
        }
    }

    /// Create a store from the `[state]` config section.
    pub fn from_config(config: &StateConfig) -> Self {
        Self {
            path: config.path.clone(),
            lock_ttl: Duration::from_secs(config.lock_ttl_secs),
            lock_wait: Duration::from_secs(config.lock_wait_secs),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock file next to the state file.
    pub fn lock_path(&self) -> PathBuf {
        sibling(&self.path, "lock")
    }

    fn tmp_path(&self) -> PathBuf {
        sibling(&self.path, "tmp")
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, fsync, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> std::io::Result<()> {
        self.ensure_dir().await?;

        let tmp = self.tmp_path();
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::persistence(&self.path, e)),
        }
    }
}

#[async_trait]
impl WatermarkStore for LocalStore {
    async fn lock(&self) -> Result<StoreLease> {
        StoreLease::acquire(self.lock_path(), self.lock_ttl, self.lock_wait).await
    }

    async fn load(&self) -> Result<Watermark> {
        let Some(bytes) = self.read_bytes().await? else {
            log::info!("No state at {} (first run)", self.path.display());
            return Ok(Watermark::default());
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            log::warn!("State file {} is empty (first run)", self.path.display());
            return Ok(Watermark::default());
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| AppError::persistence(&self.path, format!("corrupt state: {e}")))
    }

    async fn save(&self, id: &str, updated: DateTime<Utc>) -> Result<()> {
        let mark = Watermark::new(id, updated);
        let bytes = serde_json::to_vec_pretty(&mark)?;
        self.write_bytes(&bytes)
            .await
            .map_err(|e| AppError::persistence(&self.path, e))?;
        log::debug!("Watermark {} written to {}", id, self.path.display());
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// `state.json` -> `state.json.<suffix>`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

//! In-process watermark store.
//!
//! For tests and for embedding the pipeline where another component owns
//! persistence.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::Watermark;
use crate::storage::{StoreLease, WatermarkStore};

#[derive(Debug, Default)]
pub struct MemoryStore {
    mark: Mutex<Watermark>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a watermark.
    pub fn with_watermark(mark: Watermark) -> Self {
        Self {
            mark: Mutex::new(mark),
            ..Self::default()
        }
    }

    /// Make subsequent saves fail with [`AppError::Persistence`].
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Watermark {
        self.mark.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl WatermarkStore for MemoryStore {
    async fn lock(&self) -> Result<StoreLease> {
        Ok(StoreLease::in_process())
    }

    async fn load(&self) -> Result<Watermark> {
        Ok(self.snapshot())
    }

    async fn save(&self, id: &str, updated: DateTime<Utc>) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(AppError::persistence("memory", "save rejected"));
        }
        *self.mark.lock().unwrap_or_else(|e| e.into_inner()) = Watermark::new(id, updated);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_load() {
        let store = MemoryStore::new();
        assert!(store.load().await.unwrap().is_first_run());

        store.save("p1", Utc::now()).await.unwrap();
        assert_eq!(store.load().await.unwrap().last_post_id.as_deref(), Some("p1"));
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_save_keeps_state() {
        let store = MemoryStore::with_watermark(Watermark::new("p1", Utc::now()));
        store.fail_saves(true);

        assert!(store.save("p2", Utc::now()).await.is_err());
        assert_eq!(store.snapshot().last_post_id.as_deref(), Some("p1"));
        assert_eq!(store.save_count(), 0);
    }
}

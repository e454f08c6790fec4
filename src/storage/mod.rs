//! Watermark persistence.
//!
//! The pipeline only talks to [`WatermarkStore`]; backends are injected.
//!
//! ```text
//! {state dir}/
//! ├── state.json        # {"last_post_id": ..., "last_updated": ...}
//! └── state.json.lock   # held for the duration of one run
//! ```

pub mod local;
pub mod lock;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::Watermark;

// Re-export for convenience
pub use local::LocalStore;
pub use lock::{LockInfo, StoreLease};
pub use memory::MemoryStore;

/// Trait for watermark storage backends.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Take the exclusive run lease. Dropping the lease releases it.
    async fn lock(&self) -> Result<StoreLease>;

    /// Read the persisted watermark.
    ///
    /// Absent state is the first-run watermark, not an error.
    async fn load(&self) -> Result<Watermark>;

    /// Atomically replace the watermark.
    ///
    /// On error the previously persisted state is left untouched.
    async fn save(&self, id: &str, updated: DateTime<Utc>) -> Result<()>;

    /// Human-readable location, for logs.
    fn location(&self) -> String;
}

// src/models/mod.rs

//! Domain models for the cross-poster.

mod config;
mod outcome;
mod record;
mod watermark;

// Re-export all public types
pub use config::{
    Config, Credential, NoteConfig, PublishConfig, SECRET_KEY_ENV, SourceConfig, StateConfig,
};
pub use outcome::{BroadcastOutcome, EndpointOutcome};
pub use record::{CanonicalRecord, RawPost, preview};
pub use watermark::Watermark;

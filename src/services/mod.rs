//! Service layer for the cross-poster.
//!
//! This module contains the business logic for:
//! - Profile fetching (`NitterFetcher`)
//! - Note rendering (`NoteFormatter`)
//! - Relay broadcasting (`BroadcastPublisher`)

pub mod fetcher;
pub mod formatter;
pub mod publisher;

pub use fetcher::{NitterFetcher, PostFetcher};
pub use formatter::{MAX_NOTE_BYTES, Note, NoteFormatter};
pub use publisher::BroadcastPublisher;

// src/lib.rs

//! crosspost library
//!
//! Watches one profile and republishes its newest post to Nostr relays,
//! exactly once per post.

pub mod error;
pub mod models;
pub mod nostr;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

//! NIP-01 events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::nostr::keys::SigningKey;

/// Short text note.
pub const KIND_TEXT_NOTE: u16 = 1;

/// Content and tags, before a key is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedEvent {
    pub created_at: i64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
}

impl UnsignedEvent {
    pub fn text_note(content: impl Into<String>, tags: Vec<Vec<String>>, at: DateTime<Utc>) -> Self {
        Self {
            created_at: at.timestamp(),
            kind: KIND_TEXT_NOTE,
            tags,
            content: content.into(),
        }
    }

    /// SHA-256 of `[0, pubkey, created_at, kind, tags, content]`.
    pub fn digest(&self, pubkey_hex: &str) -> [u8; 32] {
        let canonical =
            serde_json::json!([0, pubkey_hex, self.created_at, self.kind, self.tags, self.content]);
        Sha256::digest(canonical.to_string().as_bytes()).into()
    }

    /// Compute the id and sign it.
    pub fn sign(self, key: &SigningKey) -> SignedEvent {
        let pubkey = key.public_key_hex();
        let digest = self.digest(&pubkey);
        let signature = key.sign(digest);
        SignedEvent {
            id: hex::encode(digest),
            pubkey,
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags,
            content: self.content,
            sig: hex::encode(signature.serialize()),
        }
    }
}

/// Event as sent to relays.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignedEvent {
    pub id: String,
    pub pubkey: String,
    pub created_at: i64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub sig: String,
}

impl SignedEvent {
    /// `["EVENT", <event>]` client message.
    pub fn to_client_message(&self) -> String {
        serde_json::json!(["EVENT", self]).to_string()
    }
}

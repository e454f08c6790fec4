//! Nostr protocol pieces: keys, NIP-01 events and the relay transport.

pub mod event;
pub mod keys;
pub mod relay;

pub use event::{KIND_TEXT_NOTE, SignedEvent, UnsignedEvent};
pub use keys::SigningKey;
pub use relay::{RelayError, RelayTransport, WebSocketTransport};

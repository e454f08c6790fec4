//! Relay transport.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::nostr::event::SignedEvent;

/// Why a relay did not acknowledge an event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("invalid relay url: {0}")]
    InvalidUrl(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("connection closed before acknowledgement")]
    Closed,

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Delivers one signed event to one relay.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Resolve once the relay acknowledged the event.
    async fn send_event(&self, relay: &str, event: &SignedEvent) -> Result<(), RelayError>;
}

/// Relay reply relevant to a published event.
#[derive(Debug, PartialEq, Eq)]
enum RelayReply {
    Ok { event_id: String, accepted: bool, message: String },
    Notice(String),
    Other,
}

fn parse_reply(text: &str) -> Result<RelayReply, RelayError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| RelayError::Protocol(e.to_string()))?;
    let Some(frame) = value.as_array() else {
        return Err(RelayError::Protocol(format!("expected array, got {text}")));
    };

    match frame.first().and_then(Value::as_str) {
        Some("OK") => Ok(RelayReply::Ok {
            event_id: frame.get(1).and_then(Value::as_str).unwrap_or("").to_string(),
            accepted: frame.get(2).and_then(Value::as_bool).unwrap_or(false),
            message: frame.get(3).and_then(Value::as_str).unwrap_or("").to_string(),
        }),
        Some("NOTICE") => Ok(RelayReply::Notice(
            frame.get(1).and_then(Value::as_str).unwrap_or("").to_string(),
        )),
        _ => Ok(RelayReply::Other),
    }
}

/// WebSocket transport speaking NIP-01.
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RelayTransport for WebSocketTransport {
    async fn send_event(&self, relay: &str, event: &SignedEvent) -> Result<(), RelayError> {
        let (mut socket, _) = connect_async(relay)
            .await
            .map_err(|e| RelayError::Connect(e.to_string()))?;

        socket
            .send(Message::Text(event.to_client_message().into()))
            .await
            .map_err(|e| RelayError::Connect(e.to_string()))?;

        let result = loop {
            let Some(frame) = socket.next().await else {
                break Err(RelayError::Closed);
            };
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => break Err(RelayError::Connect(e.to_string())),
            };
            match frame {
                Message::Text(text) => match parse_reply(text.as_str()) {
                    Ok(RelayReply::Ok {
                        event_id,
                        accepted,
                        message,
                    }) if event_id == event.id => {
                        break if accepted {
                            Ok(())
                        } else {
                            Err(RelayError::Rejected(message))
                        };
                    }
                    Ok(RelayReply::Notice(message)) => {
                        log::info!("Relay {} notice: {}", relay, message);
                    }
                    Ok(_) => {}
                    Err(e) => break Err(e),
                },
                Message::Close(_) => break Err(RelayError::Closed),
                _ => {}
            }
        };

        let _ = socket.close(None).await;
        result
    }
}

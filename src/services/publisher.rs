// src/services/publisher.rs

//! Broadcast publisher.
//!
//! Signs a note once and offers the same event to every relay. Relays are
//! independent: a timeout or rejection on one never stops attempts on the
//! others, and the verdict waits for every attempt to settle.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};

use crate::error::Result;
use crate::models::{BroadcastOutcome, EndpointOutcome, PublishConfig};
use crate::nostr::{RelayError, RelayTransport, SignedEvent, SigningKey, UnsignedEvent};
use crate::services::formatter::Note;

pub struct BroadcastPublisher {
    transport: Arc<dyn RelayTransport>,
    timeout: Duration,
    max_concurrent: usize,
}

impl BroadcastPublisher {
    pub fn new(transport: Arc<dyn RelayTransport>, config: &PublishConfig) -> Self {
        Self {
            transport,
            timeout: Duration::from_secs(config.timeout_secs),
            max_concurrent: config.max_concurrent.max(1),
        }
    }

    /// Sign `note` and send it to `endpoints`.
    ///
    /// Fails with [`crate::error::AppError::PublishFailed`] when no endpoint
    /// acknowledged.
    pub async fn publish(
        &self,
        note: &Note,
        key: &SigningKey,
        endpoints: &[String],
    ) -> Result<BroadcastOutcome> {
        let event = UnsignedEvent::text_note(note.content.clone(), note.tags.clone(), note.created_at)
            .sign(key);
        log::info!("Signed event {} as {}", event.id, event.pubkey);

        self.broadcast(&event, endpoints).await.into_result()
    }

    /// Offer an already signed event to every endpoint.
    pub async fn broadcast(&self, event: &SignedEvent, endpoints: &[String]) -> BroadcastOutcome {
        let mut unique: Vec<&str> = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints.iter().map(|e| e.trim()) {
            if unique.contains(&endpoint) {
                log::warn!("Duplicate relay {} ignored", endpoint);
            } else {
                unique.push(endpoint);
            }
        }

        let results: Vec<EndpointOutcome> = stream::iter(unique)
            .map(|endpoint| async move {
                match self.attempt(endpoint, event).await {
                    Ok(()) => {
                        log::info!("Relay {} acknowledged {}", endpoint, event.id);
                        EndpointOutcome::acknowledged(endpoint)
                    }
                    Err(error) => {
                        log::warn!("Relay {} failed: {}", endpoint, error);
                        EndpointOutcome::failed(endpoint, error)
                    }
                }
            })
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let outcome = BroadcastOutcome {
            event_id: event.id.clone(),
            endpoints: results,
        };
        log::info!(
            "Broadcast {}: {}/{} relays acknowledged",
            outcome.event_id,
            outcome.acknowledged(),
            outcome.endpoints.len()
        );
        outcome
    }

    async fn attempt(&self, endpoint: &str, event: &SignedEvent) -> std::result::Result<(), RelayError> {
        let scheme_ok = url::Url::parse(endpoint)
            .map(|u| matches!(u.scheme(), "ws" | "wss"))
            .unwrap_or(false);
        if !scheme_ok {
            return Err(RelayError::InvalidUrl(endpoint.to_string()));
        }

        tokio::time::timeout(self.timeout, self.transport.send_event(endpoint, event))
            .await
            .unwrap_or(Err(RelayError::Timeout(self.timeout)))
    }
}

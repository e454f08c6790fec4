//! Broadcast results.

use serde::Serialize;

use crate::error::{AppError, Result};

/// Result of one relay attempt.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EndpointOutcome {
    pub endpoint: String,
    pub success: bool,
    pub error: Option<String>,
}

impl EndpointOutcome {
    pub fn acknowledged(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(endpoint: impl Into<String>, error: impl ToString) -> Self {
        Self {
            endpoint: endpoint.into(),
            success: false,
            error: Some(error.to_string()),
        }
    }
}

/// Per-relay results for one signed note, in configured relay order.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Hex id of the signed event
    pub event_id: String,
    pub endpoints: Vec<EndpointOutcome>,
}

impl BroadcastOutcome {
    /// At least one relay acknowledged.
    pub fn succeeded(&self) -> bool {
        self.endpoints.iter().any(|e| e.success)
    }

    pub fn acknowledged(&self) -> usize {
        self.endpoints.iter().filter(|e| e.success).count()
    }

    /// Failed endpoints, kept for reporting only.
    pub fn failures(&self) -> impl Iterator<Item = &EndpointOutcome> {
        self.endpoints.iter().filter(|e| !e.success)
    }

    /// Turn a zero-acknowledgement outcome into [`AppError::PublishFailed`].
    pub fn into_result(self) -> Result<Self> {
        if self.succeeded() {
            return Ok(self);
        }
        let failures = self
            .failures()
            .map(|f| {
                format!(
                    "{}: {}",
                    f.endpoint,
                    f.error.as_deref().unwrap_or("unknown error")
                )
            })
            .collect::<Vec<_>>()
            .join("; ");
        Err(AppError::PublishFailed {
            attempted: self.endpoints.len(),
            failures,
        })
    }
}

//! Webhook event ledger port.
//!
//! Each billing-provider event id is recorded once; reprocessing a
//! recorded id is a no-op. Racing deliveries of the same event are
//! serialized by the store's primary-key constraint: the first insert
//! wins, the loser observes `AlreadyExists`.

use crate::domain::foundation::{DomainError, Timestamp};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outcome recorded for a processed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// The event mutated local state.
    Processed,
    /// The event was acknowledged without effect.
    Ignored,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Processed => "processed",
            WebhookOutcome::Ignored => "ignored",
        }
    }
}

/// A recorded webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEventRecord {
    /// Provider event id (evt_...). Primary key of the ledger.
    pub event_id: String,

    /// Provider event type string.
    pub event_type: String,

    /// What happened when the event was handled.
    pub outcome: WebhookOutcome,

    /// Reason the event was ignored, if it was.
    pub detail: Option<String>,

    /// Raw event payload, kept for audit.
    pub payload: serde_json::Value,

    /// When the event was handled.
    pub processed_at: Timestamp,
}

impl WebhookEventRecord {
    /// Record for an event that mutated state.
    pub fn processed(
        event_id: &str,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: event_id.to_string(),
            event_type: event_type.to_string(),
            outcome: WebhookOutcome::Processed,
            detail: None,
            payload,
            processed_at: Timestamp::now(),
        }
    }

    /// Record for an event acknowledged without effect.
    pub fn ignored(
        event_id: &str,
        event_type: &str,
        reason: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: event_id.to_string(),
            event_type: event_type.to_string(),
            outcome: WebhookOutcome::Ignored,
            detail: Some(reason.into()),
            payload,
            processed_at: Timestamp::now(),
        }
    }
}

/// Result of saving a record into the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// This process recorded the event first.
    Inserted,
    /// Another delivery of the same event was recorded already.
    AlreadyExists,
}

/// Ledger port for webhook idempotency.
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    /// Look up a recorded event by provider id.
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError>;

    /// Save a record, detecting races on the event id.
    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError>;

    /// Purge records handled before the given time. Returns rows removed.
    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError>;
}

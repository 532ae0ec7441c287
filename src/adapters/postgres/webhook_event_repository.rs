//! PostgreSQL implementation of the webhook event ledger.
//!
//! Idempotency relies on the `webhook_events.event_id` primary key: the
//! insert uses `ON CONFLICT DO NOTHING`, so concurrent deliveries of the
//! same event resolve without an error and exactly one row survives.

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::ports::{SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// PostgreSQL implementation of the WebhookEventRepository port.
pub struct PostgresWebhookEventRepository {
    pool: PgPool,
}

impl PostgresWebhookEventRepository {
    /// Creates a new repository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WebhookEventRow {
    event_id: String,
    event_type: String,
    outcome: String,
    detail: Option<String>,
    payload: serde_json::Value,
    processed_at: DateTime<Utc>,
}

impl TryFrom<WebhookEventRow> for WebhookEventRecord {
    type Error = DomainError;

    fn try_from(row: WebhookEventRow) -> Result<Self, Self::Error> {
        let outcome = match row.outcome.as_str() {
            "processed" => WebhookOutcome::Processed,
            "ignored" => WebhookOutcome::Ignored,
            other => {
                return Err(DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Invalid outcome value: {}", other),
                ))
            }
        };
        Ok(WebhookEventRecord {
            event_id: row.event_id,
            event_type: row.event_type,
            outcome,
            detail: row.detail,
            payload: row.payload,
            processed_at: Timestamp::from_datetime(row.processed_at),
        })
    }
}

#[async_trait]
impl WebhookEventRepository for PostgresWebhookEventRepository {
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        let row: Option<WebhookEventRow> = sqlx::query_as(
            r#"
            SELECT event_id, event_type, outcome, detail, payload, processed_at
            FROM webhook_events
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to find webhook event: {}", e),
            )
        })?;

        row.map(WebhookEventRecord::try_from).transpose()
    }

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO webhook_events (event_id, event_type, outcome, detail, payload, processed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(&record.event_id)
        .bind(&record.event_type)
        .bind(record.outcome.as_str())
        .bind(&record.detail)
        .bind(&record.payload)
        .bind(record.processed_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to save webhook event: {}", e),
            )
        })?;

        if result.rows_affected() == 0 {
            Ok(SaveResult::AlreadyExists)
        } else {
            Ok(SaveResult::Inserted)
        }
    }

    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM webhook_events WHERE processed_at < $1")
            .bind(timestamp.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to purge webhook events: {}", e),
                )
            })?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_with_processed_outcome_converts() {
        let row = WebhookEventRow {
            event_id: "evt_1".to_string(),
            event_type: "checkout.session.completed".to_string(),
            outcome: "processed".to_string(),
            detail: None,
            payload: serde_json::json!({"id": "evt_1"}),
            processed_at: Utc::now(),
        };

        let record = WebhookEventRecord::try_from(row).unwrap();
        assert_eq!(record.outcome, WebhookOutcome::Processed);
    }

    #[test]
    fn row_with_ignored_outcome_keeps_detail() {
        let row = WebhookEventRow {
            event_id: "evt_2".to_string(),
            event_type: "customer.created".to_string(),
            outcome: "ignored".to_string(),
            detail: Some("no handler".to_string()),
            payload: serde_json::json!({}),
            processed_at: Utc::now(),
        };

        let record = WebhookEventRecord::try_from(row).unwrap();
        assert_eq!(record.outcome, WebhookOutcome::Ignored);
        assert_eq!(record.detail.as_deref(), Some("no handler"));
    }

    #[test]
    fn row_with_unknown_outcome_fails() {
        let row = WebhookEventRow {
            event_id: "evt_3".to_string(),
            event_type: "x".to_string(),
            outcome: "exploded".to_string(),
            detail: None,
            payload: serde_json::json!({}),
            processed_at: Utc::now(),
        };

        assert!(WebhookEventRecord::try_from(row).is_err());
    }
}

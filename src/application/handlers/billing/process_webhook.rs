//! ProcessWebhookHandler - Reconciles billing-provider events into the
//! subscription store.
//!
//! ## Processing steps
//!
//! 1. Verify the delivery signature and parse the event
//! 2. Check the event ledger (idempotency): recorded ids are not reprocessed
//! 3. Dispatch on the event kind and mutate the subscription row
//! 4. Record the outcome; losing the insert race means another delivery
//!    of the same event got there first
//!
//! Dispatch failures are returned without recording the event, so the
//! provider's retry can re-attempt the delivery. Events that cannot be
//! correlated (missing user tag, unknown subscription id) are acknowledged
//! and recorded as ignored; retrying them would not change anything.

use std::sync::Arc;

use crate::domain::billing::{BillingError, Subscription, SubscriptionStatus, UpdateOutcome};
use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::{
    PaymentProvider, SaveResult, SubscriptionRepository, WebhookEvent, WebhookEventData,
    WebhookEventRecord, WebhookEventRepository, WebhookEventType,
};

/// Command to process a webhook delivery.
#[derive(Debug, Clone)]
pub struct ProcessWebhookCommand {
    /// Raw request body. Must be the exact bytes the provider signed.
    pub payload: Vec<u8>,
    /// Contents of the `stripe-signature` header.
    pub signature: String,
}

/// Result of webhook processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessWebhookResult {
    /// Checkout completed, subscription row upserted.
    SubscriptionActivated { user_id: String },
    /// Provider status change applied.
    SubscriptionUpdated { user_id: String },
    /// Provider ended the subscription, user is back on the free plan.
    SubscriptionCanceled { user_id: String },
    /// Invoice payment failed, row marked past due.
    PaymentFailureRecorded { subscription_id: String },
    /// A previous delivery already handled this event.
    AlreadyProcessed,
    /// Event acknowledged without effect.
    Acknowledged,
}

/// What a dispatched event did, before it is recorded in the ledger.
enum Disposition {
    Effect(ProcessWebhookResult),
    Ignored(String),
}

/// Handler reconciling provider webhooks into the Subscription Store.
pub struct ProcessWebhookHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    webhook_events: Arc<dyn WebhookEventRepository>,
    payment_provider: Arc<dyn PaymentProvider>,
}

impl ProcessWebhookHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        webhook_events: Arc<dyn WebhookEventRepository>,
        payment_provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        Self {
            subscriptions,
            webhook_events,
            payment_provider,
        }
    }

    pub async fn handle(
        &self,
        cmd: ProcessWebhookCommand,
    ) -> Result<ProcessWebhookResult, BillingError> {
        // 1. Verify signature and parse. No mutation happens before this.
        let event = self
            .payment_provider
            .verify_webhook(&cmd.payload, &cmd.signature)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Webhook signature verification failed");
                BillingError::invalid_webhook_signature()
            })?;

        // 2. Idempotency check.
        if self
            .webhook_events
            .find_by_event_id(&event.id)
            .await
            .map_err(BillingError::from)?
            .is_some()
        {
            tracing::debug!(event_id = %event.id, "Duplicate webhook delivery skipped");
            return Ok(ProcessWebhookResult::AlreadyProcessed);
        }

        // 3. Dispatch. Errors propagate unrecorded so the provider retries.
        let disposition = self.dispatch(&event).await?;

        // 4. Record the outcome; first insert wins under racing deliveries.
        let payload = serde_json::to_value(&event).map_err(|e| {
            BillingError::infrastructure(format!("Failed to serialize event: {}", e))
        })?;
        let record = match &disposition {
            Disposition::Effect(_) => {
                WebhookEventRecord::processed(&event.id, event.event_type.as_str(), payload)
            }
            Disposition::Ignored(reason) => {
                WebhookEventRecord::ignored(&event.id, event.event_type.as_str(), reason, payload)
            }
        };

        match self
            .webhook_events
            .save(record)
            .await
            .map_err(BillingError::from)?
        {
            SaveResult::Inserted => Ok(match disposition {
                Disposition::Effect(result) => result,
                Disposition::Ignored(reason) => {
                    tracing::info!(
                        event_id = %event.id,
                        event_type = %event.event_type.as_str(),
                        reason = %reason,
                        "Webhook event acknowledged without effect"
                    );
                    ProcessWebhookResult::Acknowledged
                }
            }),
            SaveResult::AlreadyExists => Ok(ProcessWebhookResult::AlreadyProcessed),
        }
    }

    async fn dispatch(&self, event: &WebhookEvent) -> Result<Disposition, BillingError> {
        match &event.event_type {
            WebhookEventType::CheckoutSessionCompleted => self.on_checkout_completed(event).await,
            WebhookEventType::SubscriptionUpdated => self.on_subscription_updated(event).await,
            WebhookEventType::SubscriptionDeleted => self.on_subscription_deleted(event).await,
            WebhookEventType::InvoicePaymentFailed => self.on_invoice_payment_failed(event).await,
            WebhookEventType::Unknown(kind) => Ok(Disposition::Ignored(format!(
                "no handler for event type: {}",
                kind
            ))),
        }
    }

    async fn on_checkout_completed(
        &self,
        event: &WebhookEvent,
    ) -> Result<Disposition, BillingError> {
        let (customer_id, subscription_id, user_id) = match &event.data {
            WebhookEventData::Checkout {
                customer_id,
                subscription_id,
                user_id,
                ..
            } => (customer_id.clone(), subscription_id.clone(), user_id.clone()),
            _ => {
                return Err(BillingError::infrastructure(
                    "Unexpected payload for checkout.session.completed",
                ))
            }
        };

        let Some(user_id) = user_id else {
            return Ok(Disposition::Ignored(
                "checkout session carries no user correlation tag".to_string(),
            ));
        };
        let Some(subscription_id) = subscription_id else {
            return Ok(Disposition::Ignored(
                "checkout session created no subscription".to_string(),
            ));
        };
        let user_id = UserId::new(user_id).map_err(|e| {
            BillingError::validation("user_id", e.to_string())
        })?;

        // Read back provider truth rather than trusting the session payload;
        // the subscription may already have converted by delivery time.
        let provider_sub = self
            .payment_provider
            .get_subscription(&subscription_id)
            .await
            .map_err(|e| BillingError::payment_failed(e.to_string()))?;

        let Some(provider_sub) = provider_sub else {
            return Ok(Disposition::Ignored(format!(
                "subscription {} no longer exists at the provider",
                subscription_id
            )));
        };

        let subscription = Subscription::from_checkout(
            user_id.clone(),
            customer_id,
            provider_sub.id,
            &provider_sub.status,
            Timestamp::from_unix_secs(provider_sub.current_period_end),
        );

        self.subscriptions
            .upsert(&subscription)
            .await
            .map_err(BillingError::from)?;

        tracing::info!(
            user_id = %user_id,
            status = subscription.status.as_str(),
            "Subscription activated from checkout"
        );

        Ok(Disposition::Effect(
            ProcessWebhookResult::SubscriptionActivated {
                user_id: user_id.to_string(),
            },
        ))
    }

    async fn on_subscription_updated(
        &self,
        event: &WebhookEvent,
    ) -> Result<Disposition, BillingError> {
        let (status, current_period_end, user_id) = match &event.data {
            WebhookEventData::Subscription {
                status,
                current_period_end,
                user_id,
                ..
            } => (status.clone(), *current_period_end, user_id.clone()),
            _ => {
                return Err(BillingError::infrastructure(
                    "Unexpected payload for customer.subscription.updated",
                ))
            }
        };

        let Some(user_id) = user_id else {
            return Ok(Disposition::Ignored(
                "subscription carries no user correlation tag".to_string(),
            ));
        };
        let user_id = UserId::new(user_id)
            .map_err(|e| BillingError::validation("user_id", e.to_string()))?;

        let Some(mut subscription) = self
            .subscriptions
            .find_by_user_id(&user_id)
            .await
            .map_err(BillingError::from)?
        else {
            return Ok(Disposition::Ignored(format!(
                "no subscription record for user {}",
                user_id
            )));
        };

        let mapped = SubscriptionStatus::from_provider(&status);
        let period_end = Timestamp::from_unix_secs(current_period_end);

        match subscription.apply_provider_update(mapped, period_end) {
            UpdateOutcome::Applied => {
                self.subscriptions
                    .update(&subscription)
                    .await
                    .map_err(BillingError::from)?;
                Ok(Disposition::Effect(
                    ProcessWebhookResult::SubscriptionUpdated {
                        user_id: user_id.to_string(),
                    },
                ))
            }
            UpdateOutcome::Stale => Ok(Disposition::Ignored(
                "delivery is older than stored state".to_string(),
            )),
            UpdateOutcome::Rejected => {
                tracing::warn!(
                    user_id = %user_id,
                    current = subscription.status.as_str(),
                    incoming = mapped.as_str(),
                    "Rejected state-regressing subscription update"
                );
                Ok(Disposition::Ignored(format!(
                    "transition {} -> {} is not allowed",
                    subscription.status.as_str(),
                    mapped.as_str()
                )))
            }
        }
    }

    async fn on_subscription_deleted(
        &self,
        event: &WebhookEvent,
    ) -> Result<Disposition, BillingError> {
        let user_id = match &event.data {
            WebhookEventData::Subscription { user_id, .. } => user_id.clone(),
            _ => {
                return Err(BillingError::infrastructure(
                    "Unexpected payload for customer.subscription.deleted",
                ))
            }
        };

        let Some(user_id) = user_id else {
            return Ok(Disposition::Ignored(
                "subscription carries no user correlation tag".to_string(),
            ));
        };
        let user_id = UserId::new(user_id)
            .map_err(|e| BillingError::validation("user_id", e.to_string()))?;

        let Some(mut subscription) = self
            .subscriptions
            .find_by_user_id(&user_id)
            .await
            .map_err(BillingError::from)?
        else {
            return Ok(Disposition::Ignored(format!(
                "no subscription record for user {}",
                user_id
            )));
        };

        subscription.deleted_by_provider();
        self.subscriptions
            .update(&subscription)
            .await
            .map_err(BillingError::from)?;

        tracing::info!(user_id = %user_id, "Subscription ended by provider");

        Ok(Disposition::Effect(
            ProcessWebhookResult::SubscriptionCanceled {
                user_id: user_id.to_string(),
            },
        ))
    }

    async fn on_invoice_payment_failed(
        &self,
        event: &WebhookEvent,
    ) -> Result<Disposition, BillingError> {
        let subscription_id = match &event.data {
            WebhookEventData::Invoice {
                subscription_id, ..
            } => subscription_id.clone(),
            _ => {
                return Err(BillingError::infrastructure(
                    "Unexpected payload for invoice.payment_failed",
                ))
            }
        };

        let Some(subscription_id) = subscription_id else {
            return Ok(Disposition::Ignored(
                "invoice has no subscription id".to_string(),
            ));
        };

        // Invoices carry no user tag; correlate by provider subscription id.
        let Some(mut subscription) = self
            .subscriptions
            .find_by_stripe_subscription_id(&subscription_id)
            .await
            .map_err(BillingError::from)?
        else {
            return Ok(Disposition::Ignored(format!(
                "no subscription record for provider subscription {}",
                subscription_id
            )));
        };

        match subscription.mark_past_due() {
            UpdateOutcome::Applied => {
                self.subscriptions
                    .update(&subscription)
                    .await
                    .map_err(BillingError::from)?;
                tracing::warn!(
                    user_id = %subscription.user_id,
                    "Invoice payment failed, subscription past due"
                );
                Ok(Disposition::Effect(
                    ProcessWebhookResult::PaymentFailureRecorded { subscription_id },
                ))
            }
            _ => Ok(Disposition::Ignored(format!(
                "payment failure does not apply in {} state",
                subscription.status.as_str()
            ))),
        }
    }
}

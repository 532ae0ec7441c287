//! Subscription aggregate entity.
//!
//! One Subscription row exists per user (unique constraint on user_id,
//! enforced by upsert-on-conflict). The row is absent until the first
//! completed checkout; the webhook reconciler creates and maintains it.
//!
//! # Design Decisions
//!
//! - **Guarded transitions**: provider-reported statuses pass through the
//!   `SubscriptionStatus` state machine instead of being written blindly,
//!   so duplicate or out-of-order deliveries cannot regress state.
//! - **Staleness guard**: `subscription.updated` events carrying a
//!   `current_period_end` older than the stored one are skipped.
//! - **Idempotent cancel**: user cancellation of an already-canceled
//!   subscription is a no-op, not an error.

use crate::domain::foundation::{StateMachine, SubscriptionId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

use super::{Plan, SubscriptionStatus};

/// Result of applying a provider-reported update to the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The update was applied and the row should be persisted.
    Applied,
    /// The event is older than the stored state; nothing changed.
    Stale,
    /// The transition would regress state; nothing changed.
    Rejected,
}

impl UpdateOutcome {
    /// Returns true if the aggregate was mutated.
    pub fn changed(&self) -> bool {
        matches!(self, UpdateOutcome::Applied)
    }
}

/// Subscription aggregate - a user's billing record.
///
/// # Invariants
///
/// - `id` is globally unique
/// - `user_id` is unique (one subscription per user)
/// - Status transitions follow the `SubscriptionStatus` state machine,
///   except for checkout completion which replaces the row wholesale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Unique identifier for this record.
    pub id: SubscriptionId,

    /// User who owns this subscription.
    pub user_id: UserId,

    /// Plan the user is on.
    pub plan: Plan,

    /// Current status in the billing lifecycle.
    pub status: SubscriptionStatus,

    /// Billing provider's customer ID. Created lazily at first checkout.
    pub stripe_customer_id: Option<String>,

    /// Billing provider's subscription ID. Set by the reconciler.
    pub stripe_subscription_id: Option<String>,

    /// End of the current billing period, as reported by the provider.
    pub current_period_end: Timestamp,

    /// When the record was created.
    pub created_at: Timestamp,

    /// When the record was last mutated locally.
    pub updated_at: Timestamp,
}

impl Subscription {
    /// Build the record state for a completed checkout.
    ///
    /// Status is `Active` when the provider reports the subscription as
    /// active, `Trialing` otherwise. The repository upserts this state
    /// keyed by user id, so a returning user's old row is overwritten
    /// with provider truth at verification time.
    pub fn from_checkout(
        user_id: UserId,
        stripe_customer_id: String,
        stripe_subscription_id: String,
        provider_status: &str,
        current_period_end: Timestamp,
    ) -> Self {
        let now = Timestamp::now();
        let status = if provider_status == "active" {
            SubscriptionStatus::Active
        } else {
            SubscriptionStatus::Trialing
        };
        Self {
            id: SubscriptionId::new(),
            user_id,
            plan: Plan::Pro,
            status,
            stripe_customer_id: Some(stripe_customer_id),
            stripe_subscription_id: Some(stripe_subscription_id),
            current_period_end,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if this subscription currently grants access to paid features.
    pub fn has_access(&self) -> bool {
        self.status.has_access()
    }

    /// Apply a provider-reported status and period end.
    ///
    /// Skips events whose `current_period_end` is older than the stored
    /// value (stale delivery) and rejects transitions the state machine
    /// forbids. Both outcomes leave the aggregate untouched so the caller
    /// can acknowledge the delivery without persisting anything.
    pub fn apply_provider_update(
        &mut self,
        status: SubscriptionStatus,
        current_period_end: Timestamp,
    ) -> UpdateOutcome {
        if current_period_end.is_before(&self.current_period_end) {
            return UpdateOutcome::Stale;
        }
        if !self.status.can_transition_to(&status) {
            return UpdateOutcome::Rejected;
        }
        self.status = status;
        self.current_period_end = current_period_end;
        self.updated_at = Timestamp::now();
        UpdateOutcome::Applied
    }

    /// Record a failed invoice payment reported by the provider.
    ///
    /// The plan is left unchanged; the provider keeps retrying the charge
    /// while the user is in the grace period.
    pub fn mark_past_due(&mut self) -> UpdateOutcome {
        if !self.status.can_transition_to(&SubscriptionStatus::PastDue) {
            return UpdateOutcome::Rejected;
        }
        self.status = SubscriptionStatus::PastDue;
        self.updated_at = Timestamp::now();
        UpdateOutcome::Applied
    }

    /// End the subscription after the provider deleted it.
    ///
    /// The user falls back to the free plan.
    pub fn deleted_by_provider(&mut self) {
        self.status = SubscriptionStatus::Canceled;
        self.plan = Plan::Free;
        self.updated_at = Timestamp::now();
    }

    /// Cancel the subscription at the user's request.
    ///
    /// Returns false when the subscription was already canceled, in which
    /// case nothing changed and no persistence is needed. The plan is kept
    /// as-is: access runs until the provider ends the billing period and
    /// delivers its deletion event.
    pub fn cancel_by_user(&mut self) -> bool {
        if self.status == SubscriptionStatus::Canceled {
            return false;
        }
        self.status = SubscriptionStatus::Canceled;
        self.updated_at = Timestamp::now();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user_id() -> UserId {
        UserId::new("550e8400-e29b-41d4-a716-446655440000").unwrap()
    }

    fn checkout_subscription(provider_status: &str) -> Subscription {
        Subscription::from_checkout(
            test_user_id(),
            "cus_123".to_string(),
            "sub_123".to_string(),
            provider_status,
            Timestamp::now().add_days(30),
        )
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Checkout Construction Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn checkout_with_active_provider_status_is_active() {
        let sub = checkout_subscription("active");
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.plan, Plan::Pro);
    }

    #[test]
    fn checkout_with_trialing_provider_status_is_trialing() {
        let sub = checkout_subscription("trialing");
        assert_eq!(sub.status, SubscriptionStatus::Trialing);
        assert_eq!(sub.plan, Plan::Pro);
    }

    #[test]
    fn checkout_with_any_other_provider_status_is_trialing() {
        let sub = checkout_subscription("incomplete");
        assert_eq!(sub.status, SubscriptionStatus::Trialing);
    }

    #[test]
    fn checkout_stores_provider_ids() {
        let sub = checkout_subscription("active");
        assert_eq!(sub.stripe_customer_id.as_deref(), Some("cus_123"));
        assert_eq!(sub.stripe_subscription_id.as_deref(), Some("sub_123"));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Provider Update Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn provider_update_applies_newer_period_end() {
        let mut sub = checkout_subscription("trialing");
        let new_end = sub.current_period_end.add_days(30);

        let outcome = sub.apply_provider_update(SubscriptionStatus::Active, new_end);

        assert_eq!(outcome, UpdateOutcome::Applied);
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.current_period_end, new_end);
    }

    #[test]
    fn provider_update_skips_stale_period_end() {
        let mut sub = checkout_subscription("active");
        let stale_end = sub.current_period_end.add_days(-10);

        let outcome = sub.apply_provider_update(SubscriptionStatus::PastDue, stale_end);

        assert_eq!(outcome, UpdateOutcome::Stale);
        assert_eq!(sub.status, SubscriptionStatus::Active);
    }

    #[test]
    fn provider_update_rejects_regression_to_trialing() {
        let mut sub = checkout_subscription("active");
        let same_end = sub.current_period_end;

        let outcome = sub.apply_provider_update(SubscriptionStatus::Trialing, same_end);

        assert_eq!(outcome, UpdateOutcome::Rejected);
        assert_eq!(sub.status, SubscriptionStatus::Active);
    }

    #[test]
    fn provider_update_rejects_resurrecting_canceled() {
        let mut sub = checkout_subscription("active");
        sub.cancel_by_user();
        let later = sub.current_period_end.add_days(30);

        let outcome = sub.apply_provider_update(SubscriptionStatus::Active, later);

        assert_eq!(outcome, UpdateOutcome::Rejected);
        assert_eq!(sub.status, SubscriptionStatus::Canceled);
    }

    #[test]
    fn provider_update_with_equal_period_end_is_not_stale() {
        // Same period end carries a status change (e.g. trial converting).
        let mut sub = checkout_subscription("trialing");
        let same_end = sub.current_period_end;

        let outcome = sub.apply_provider_update(SubscriptionStatus::Active, same_end);

        assert_eq!(outcome, UpdateOutcome::Applied);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Payment Failure Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn mark_past_due_keeps_plan() {
        let mut sub = checkout_subscription("active");

        let outcome = sub.mark_past_due();

        assert_eq!(outcome, UpdateOutcome::Applied);
        assert_eq!(sub.status, SubscriptionStatus::PastDue);
        assert_eq!(sub.plan, Plan::Pro);
    }

    #[test]
    fn mark_past_due_rejected_after_cancellation() {
        let mut sub = checkout_subscription("active");
        sub.cancel_by_user();

        let outcome = sub.mark_past_due();

        assert_eq!(outcome, UpdateOutcome::Rejected);
        assert_eq!(sub.status, SubscriptionStatus::Canceled);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Deletion and Cancellation Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn provider_deletion_downgrades_to_free() {
        let mut sub = checkout_subscription("active");

        sub.deleted_by_provider();

        assert_eq!(sub.status, SubscriptionStatus::Canceled);
        assert_eq!(sub.plan, Plan::Free);
    }

    #[test]
    fn user_cancel_sets_canceled_and_keeps_plan() {
        let mut sub = checkout_subscription("active");

        let changed = sub.cancel_by_user();

        assert!(changed);
        assert_eq!(sub.status, SubscriptionStatus::Canceled);
        assert_eq!(sub.plan, Plan::Pro);
    }

    #[test]
    fn user_cancel_is_idempotent() {
        let mut sub = checkout_subscription("active");

        assert!(sub.cancel_by_user());
        assert!(!sub.cancel_by_user());
        assert_eq!(sub.status, SubscriptionStatus::Canceled);
    }

    #[test]
    fn access_follows_status() {
        let mut sub = checkout_subscription("trialing");
        assert!(sub.has_access());

        sub.cancel_by_user();
        assert!(!sub.has_access());
    }
}

//! Subscription repository port.
//!
//! Defines the contract for persisting Subscription records.
//!
//! # Design
//!
//! - **Upsert-on-conflict**: the webhook reconciler writes with
//!   `upsert`, keyed by user id, so concurrent deliveries for the same
//!   user resolve to single-statement last-write-wins at the row level
//! - **Unique constraint**: at most one subscription per user

use crate::domain::billing::Subscription;
use crate::domain::foundation::{DomainError, UserId};
use async_trait::async_trait;

/// Repository port for Subscription persistence.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Insert the subscription, or overwrite the user's existing row.
    ///
    /// All provider-derived columns are replaced on conflict; `created_at`
    /// is preserved for an existing row.
    async fn upsert(&self, subscription: &Subscription) -> Result<(), DomainError>;

    /// Update an existing subscription.
    ///
    /// # Errors
    ///
    /// - `SubscriptionNotFound` if the row doesn't exist
    /// - `DatabaseError` on persistence failure
    async fn update(&self, subscription: &Subscription) -> Result<(), DomainError>;

    /// Find a subscription by user ID.
    ///
    /// Returns `None` if the user has no subscription. This is the primary
    /// lookup since each user has at most one row.
    async fn find_by_user_id(&self, user_id: &UserId)
        -> Result<Option<Subscription>, DomainError>;

    /// Find a subscription by the billing provider's subscription ID.
    ///
    /// Used by the reconciler for invoice events, which carry the provider
    /// subscription id rather than a user correlation tag.
    async fn find_by_stripe_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError>;

    /// Delete a user's subscription row.
    ///
    /// Returns false when no row existed. Used by account deletion.
    async fn delete_by_user_id(&self, user_id: &UserId) -> Result<bool, DomainError>;
}

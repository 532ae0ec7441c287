//! DeleteAccountHandler - Permanently removes a user.
//!
//! Deletion is a three-step sequence with one hard requirement:
//!
//! 1. Best-effort immediate cancellation of the provider subscription,
//!    so a removed user's payment method stops being charged
//! 2. Deletion of the auth identity. This step must succeed; a failure
//!    fails the whole request with nothing else attempted first being
//!    user-visible
//! 3. Best-effort deletion of the subscription row
//!
//! The best-effort steps never fail the request. Their outcomes are
//! returned to the caller so operators can detect drift between the auth
//! store and the billing store instead of having failures swallowed.

use std::sync::Arc;

use crate::domain::billing::BillingError;
use crate::domain::foundation::UserId;
use crate::ports::{AuthProvider, PaymentProvider, SubscriptionRepository};

/// Command to delete the caller's account.
#[derive(Debug, Clone)]
pub struct DeleteAccountCommand {
    pub user_id: UserId,
}

/// Two-phase deletion report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteAccountResult {
    /// Whether the provider subscription was canceled (or none existed).
    pub billing_canceled: bool,
    /// Whether the subscription row was removed (or none existed).
    pub record_deleted: bool,
}

/// Handler for account deletion.
pub struct DeleteAccountHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    payment_provider: Arc<dyn PaymentProvider>,
    auth_provider: Arc<dyn AuthProvider>,
}

impl DeleteAccountHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        payment_provider: Arc<dyn PaymentProvider>,
        auth_provider: Arc<dyn AuthProvider>,
    ) -> Self {
        Self {
            subscriptions,
            payment_provider,
            auth_provider,
        }
    }

    pub async fn handle(
        &self,
        cmd: DeleteAccountCommand,
    ) -> Result<DeleteAccountResult, BillingError> {
        let subscription = self
            .subscriptions
            .find_by_user_id(&cmd.user_id)
            .await
            .map_err(BillingError::from)?;

        // 1. Stop the recurring charge. Best-effort: the account deletion
        // proceeds either way, but the outcome is reported.
        let billing_canceled = match subscription
            .as_ref()
            .and_then(|s| s.stripe_subscription_id.as_deref())
        {
            None => true,
            Some(provider_sub_id) => match self
                .payment_provider
                .cancel_subscription(provider_sub_id, false)
                .await
            {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!(
                        user_id = %cmd.user_id,
                        error = %e,
                        "Failed to cancel provider subscription during account deletion"
                    );
                    false
                }
            },
        };

        // 2. Remove the auth identity. This is the point of no return and
        // the one step that must succeed.
        self.auth_provider
            .delete_user(&cmd.user_id)
            .await
            .map_err(BillingError::from)?;

        // 3. Remove the subscription row. Best-effort.
        let record_deleted = match self.subscriptions.delete_by_user_id(&cmd.user_id).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(
                    user_id = %cmd.user_id,
                    error = %e,
                    "Failed to delete subscription row during account deletion"
                );
                false
            }
        };

        tracing::info!(
            user_id = %cmd.user_id,
            billing_canceled,
            record_deleted,
            "Account deleted"
        );

        Ok(DeleteAccountResult {
            billing_canceled,
            record_deleted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::Subscription;
    use crate::domain::foundation::{AuthError, AuthenticatedUser, DomainError, ErrorCode, Timestamp};
    use crate::ports::{
        CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer, PaymentError,
        ProviderSubscription, WebhookEvent,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;

    // ════════════════════════════════════════════════════════════════════════════
    // Mock Implementations
    // ════════════════════════════════════════════════════════════════════════════

    struct MockSubscriptionRepository {
        subscriptions: Mutex<Vec<Subscription>>,
        fail_delete: bool,
    }

    impl MockSubscriptionRepository {
        fn new() -> Self {
            Self {
                subscriptions: Mutex::new(Vec::new()),
                fail_delete: false,
            }
        }

        fn with_subscription(subscription: Subscription) -> Self {
            Self {
                subscriptions: Mutex::new(vec![subscription]),
                fail_delete: false,
            }
        }

        fn failing_delete(subscription: Subscription) -> Self {
            Self {
                subscriptions: Mutex::new(vec![subscription]),
                fail_delete: true,
            }
        }

        fn get_subscriptions(&self) -> Vec<Subscription> {
            self.subscriptions.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SubscriptionRepository for MockSubscriptionRepository {
        async fn upsert(&self, subscription: &Subscription) -> Result<(), DomainError> {
            self.subscriptions.lock().unwrap().push(subscription.clone());
            Ok(())
        }

        async fn update(&self, _subscription: &Subscription) -> Result<(), DomainError> {
            Ok(())
        }

        async fn find_by_user_id(
            &self,
            user_id: &UserId,
        ) -> Result<Option<Subscription>, DomainError> {
            Ok(self
                .subscriptions
                .lock()
                .unwrap()
                .iter()
                .find(|s| &s.user_id == user_id)
                .cloned())
        }

        async fn find_by_stripe_subscription_id(
            &self,
            _subscription_id: &str,
        ) -> Result<Option<Subscription>, DomainError> {
            Ok(None)
        }

        async fn delete_by_user_id(&self, user_id: &UserId) -> Result<bool, DomainError> {
            if self.fail_delete {
                return Err(DomainError::new(
                    ErrorCode::DatabaseError,
                    "Simulated delete failure",
                ));
            }
            let mut subs = self.subscriptions.lock().unwrap();
            let before = subs.len();
            subs.retain(|s| &s.user_id != user_id);
            Ok(subs.len() != before)
        }
    }

    struct MockPaymentProvider {
        cancel_calls: AtomicU32,
        fail_cancel: bool,
    }

    impl MockPaymentProvider {
        fn new() -> Self {
            Self {
                cancel_calls: AtomicU32::new(0),
                fail_cancel: false,
            }
        }

        fn failing_cancel() -> Self {
            Self {
                cancel_calls: AtomicU32::new(0),
                fail_cancel: true,
            }
        }

        fn cancel_calls(&self) -> u32 {
            self.cancel_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PaymentProvider for MockPaymentProvider {
        async fn create_customer(
            &self,
            _request: CreateCustomerRequest,
        ) -> Result<Customer, PaymentError> {
            unreachable!("not exercised by deletion")
        }

        async fn create_checkout_session(
            &self,
            _request: CreateCheckoutRequest,
        ) -> Result<CheckoutSession, PaymentError> {
            unreachable!("not exercised by deletion")
        }

        async fn get_subscription(
            &self,
            _subscription_id: &str,
        ) -> Result<Option<ProviderSubscription>, PaymentError> {
            Ok(None)
        }

        async fn cancel_subscription(
            &self,
            subscription_id: &str,
            _at_period_end: bool,
        ) -> Result<ProviderSubscription, PaymentError> {
            self.cancel_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_cancel {
                return Err(PaymentError::network("connection reset"));
            }
            Ok(ProviderSubscription {
                id: subscription_id.to_string(),
                customer_id: "cus_123".to_string(),
                status: "canceled".to_string(),
                current_period_end: 1737246290,
                cancel_at_period_end: false,
            })
        }

        async fn verify_webhook(
            &self,
            _payload: &[u8],
            _signature: &str,
        ) -> Result<WebhookEvent, PaymentError> {
            Err(PaymentError::invalid_webhook("not used"))
        }
    }

    struct MockAuthProvider {
        deleted: AtomicBool,
        fail_delete: bool,
    }

    impl MockAuthProvider {
        fn new() -> Self {
            Self {
                deleted: AtomicBool::new(false),
                fail_delete: false,
            }
        }

        fn failing() -> Self {
            Self {
                deleted: AtomicBool::new(false),
                fail_delete: true,
            }
        }

        fn was_deleted(&self) -> bool {
            self.deleted.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AuthProvider for MockAuthProvider {
        async fn resolve_token(
            &self,
            _bearer_token: &str,
        ) -> Result<AuthenticatedUser, AuthError> {
            Err(AuthError::InvalidToken)
        }

        async fn delete_user(&self, _user_id: &UserId) -> Result<(), AuthError> {
            if self.fail_delete {
                return Err(AuthError::ServiceUnavailable("admin API down".to_string()));
            }
            self.deleted.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Test Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn test_user_id() -> UserId {
        UserId::new("u3").unwrap()
    }

    fn active_subscription() -> Subscription {
        Subscription::from_checkout(
            test_user_id(),
            "cus_123".to_string(),
            "sub_123".to_string(),
            "active",
            Timestamp::now().add_days(30),
        )
    }

    fn cmd() -> DeleteAccountCommand {
        DeleteAccountCommand {
            user_id: test_user_id(),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Success Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn deletes_auth_identity_and_subscription_row() {
        let repo = Arc::new(MockSubscriptionRepository::with_subscription(
            active_subscription(),
        ));
        let payment = Arc::new(MockPaymentProvider::new());
        let auth = Arc::new(MockAuthProvider::new());
        let handler = DeleteAccountHandler::new(repo.clone(), payment, auth.clone());

        let result = handler.handle(cmd()).await.unwrap();

        assert!(auth.was_deleted());
        assert!(repo.get_subscriptions().is_empty());
        assert_eq!(
            result,
            DeleteAccountResult {
                billing_canceled: true,
                record_deleted: true,
            }
        );
    }

    #[tokio::test]
    async fn cancels_provider_subscription_immediately() {
        let repo = Arc::new(MockSubscriptionRepository::with_subscription(
            active_subscription(),
        ));
        let payment = Arc::new(MockPaymentProvider::new());
        let auth = Arc::new(MockAuthProvider::new());
        let handler = DeleteAccountHandler::new(repo, payment.clone(), auth);

        handler.handle(cmd()).await.unwrap();

        assert_eq!(payment.cancel_calls(), 1);
    }

    #[tokio::test]
    async fn user_without_subscription_still_deletes_identity() {
        let repo = Arc::new(MockSubscriptionRepository::new());
        let payment = Arc::new(MockPaymentProvider::new());
        let auth = Arc::new(MockAuthProvider::new());
        let handler = DeleteAccountHandler::new(repo, payment.clone(), auth.clone());

        let result = handler.handle(cmd()).await.unwrap();

        assert!(auth.was_deleted());
        assert_eq!(payment.cancel_calls(), 0);
        assert!(result.billing_canceled);
        assert!(result.record_deleted);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Best-Effort Outcome Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn provider_cancel_failure_is_reported_not_fatal() {
        let repo = Arc::new(MockSubscriptionRepository::with_subscription(
            active_subscription(),
        ));
        let payment = Arc::new(MockPaymentProvider::failing_cancel());
        let auth = Arc::new(MockAuthProvider::new());
        let handler = DeleteAccountHandler::new(repo, payment, auth.clone());

        let result = handler.handle(cmd()).await.unwrap();

        assert!(auth.was_deleted());
        assert!(!result.billing_canceled);
        assert!(result.record_deleted);
    }

    #[tokio::test]
    async fn row_delete_failure_is_reported_not_fatal() {
        let repo = Arc::new(MockSubscriptionRepository::failing_delete(
            active_subscription(),
        ));
        let payment = Arc::new(MockPaymentProvider::new());
        let auth = Arc::new(MockAuthProvider::new());
        let handler = DeleteAccountHandler::new(repo, payment, auth.clone());

        let result = handler.handle(cmd()).await.unwrap();

        assert!(auth.was_deleted());
        assert!(result.billing_canceled);
        assert!(!result.record_deleted);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Failure Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn auth_deletion_failure_fails_the_request() {
        let repo = Arc::new(MockSubscriptionRepository::with_subscription(
            active_subscription(),
        ));
        let payment = Arc::new(MockPaymentProvider::new());
        let auth = Arc::new(MockAuthProvider::failing());
        let handler = DeleteAccountHandler::new(repo.clone(), payment, auth);

        let result = handler.handle(cmd()).await;

        assert!(result.is_err());
        // The subscription row is only removed after identity deletion.
        assert_eq!(repo.get_subscriptions().len(), 1);
    }
}

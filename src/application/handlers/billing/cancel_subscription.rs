//! CancelSubscriptionHandler - Cancels a user's subscription.
//!
//! Cancellation is propagated to the billing provider synchronously
//! (ending the recurring charge at period end) before the local row is
//! marked canceled. Repeated calls reach the same terminal state without
//! error, and without touching the provider again.

use std::sync::Arc;

use crate::domain::billing::{BillingError, SubscriptionStatus};
use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::{PaymentProvider, SubscriptionRepository};

/// Command to cancel the caller's subscription.
#[derive(Debug, Clone)]
pub struct CancelSubscriptionCommand {
    pub user_id: UserId,
}

/// Result of a cancellation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelSubscriptionResult {
    /// The subscription was canceled by this call. Access runs until the
    /// end of the current billing period.
    Canceled { effective_at: Timestamp },
    /// The subscription was already canceled, or the user never had one.
    AlreadyCanceled,
}

/// Handler for subscription cancellation.
pub struct CancelSubscriptionHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    payment_provider: Arc<dyn PaymentProvider>,
}

impl CancelSubscriptionHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        payment_provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        Self {
            subscriptions,
            payment_provider,
        }
    }

    pub async fn handle(
        &self,
        cmd: CancelSubscriptionCommand,
    ) -> Result<CancelSubscriptionResult, BillingError> {
        // 1. A user with no row has nothing to cancel; treat as done.
        let Some(mut subscription) = self
            .subscriptions
            .find_by_user_id(&cmd.user_id)
            .await
            .map_err(BillingError::from)?
        else {
            return Ok(CancelSubscriptionResult::AlreadyCanceled);
        };

        // 2. Idempotency: a second call observes the terminal state.
        if subscription.status == SubscriptionStatus::Canceled {
            return Ok(CancelSubscriptionResult::AlreadyCanceled);
        }

        // 3. End the recurring charge at the provider before mutating
        // local state. A provider failure aborts the request; the user
        // retries and no state has diverged.
        if let Some(provider_sub_id) = subscription.stripe_subscription_id.clone() {
            self.payment_provider
                .cancel_subscription(&provider_sub_id, true)
                .await
                .map_err(|e| BillingError::payment_failed(e.to_string()))?;
        }

        // 4. Mark the local row canceled.
        let changed = subscription.cancel_by_user();
        debug_assert!(changed);
        self.subscriptions
            .update(&subscription)
            .await
            .map_err(BillingError::from)?;

        tracing::info!(
            user_id = %cmd.user_id,
            effective_at = %subscription.current_period_end,
            "Subscription canceled"
        );

        Ok(CancelSubscriptionResult::Canceled {
            effective_at: subscription.current_period_end,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{Subscription, SubscriptionStatus};
    use crate::domain::foundation::DomainError;
    use crate::ports::{
        CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer, PaymentError,
        ProviderSubscription, WebhookEvent,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    // ════════════════════════════════════════════════════════════════════════════
    // Mock Implementations
    // ════════════════════════════════════════════════════════════════════════════

    struct MockSubscriptionRepository {
        subscriptions: Mutex<Vec<Subscription>>,
    }

    impl MockSubscriptionRepository {
        fn new() -> Self {
            Self {
                subscriptions: Mutex::new(Vec::new()),
            }
        }

        fn with_subscription(subscription: Subscription) -> Self {
            Self {
                subscriptions: Mutex::new(vec![subscription]),
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

        async fn update(&self, subscription: &Subscription) -> Result<(), DomainError> {
            let mut subs = self.subscriptions.lock().unwrap();
            if let Some(s) = subs.iter_mut().find(|s| s.id == subscription.id) {
                *s = subscription.clone();
            }
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

        async fn delete_by_user_id(&self, _user_id: &UserId) -> Result<bool, DomainError> {
            Ok(false)
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
            unreachable!("not exercised by cancellation")
        }

        async fn create_checkout_session(
            &self,
            _request: CreateCheckoutRequest,
        ) -> Result<CheckoutSession, PaymentError> {
            unreachable!("not exercised by cancellation")
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
            at_period_end: bool,
        ) -> Result<ProviderSubscription, PaymentError> {
            self.cancel_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_cancel {
                return Err(PaymentError::network("connection reset"));
            }
            Ok(ProviderSubscription {
                id: subscription_id.to_string(),
                customer_id: "cus_123".to_string(),
                status: if at_period_end { "active" } else { "canceled" }.to_string(),
                current_period_end: 1737246290,
                cancel_at_period_end: at_period_end,
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

    // ════════════════════════════════════════════════════════════════════════════
    // Test Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn test_user_id() -> UserId {
        UserId::new("u2").unwrap()
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

    fn cmd() -> CancelSubscriptionCommand {
        CancelSubscriptionCommand {
            user_id: test_user_id(),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Success Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn cancels_active_subscription() {
        let repo = Arc::new(MockSubscriptionRepository::with_subscription(
            active_subscription(),
        ));
        let payment = Arc::new(MockPaymentProvider::new());
        let handler = CancelSubscriptionHandler::new(repo.clone(), payment.clone());

        let result = handler.handle(cmd()).await.unwrap();

        assert!(matches!(result, CancelSubscriptionResult::Canceled { .. }));
        assert_eq!(
            repo.get_subscriptions()[0].status,
            SubscriptionStatus::Canceled
        );
        assert_eq!(payment.cancel_calls(), 1);
    }

    #[tokio::test]
    async fn second_cancel_is_idempotent() {
        let repo = Arc::new(MockSubscriptionRepository::with_subscription(
            active_subscription(),
        ));
        let payment = Arc::new(MockPaymentProvider::new());
        let handler = CancelSubscriptionHandler::new(repo.clone(), payment.clone());

        let first = handler.handle(cmd()).await.unwrap();
        let second = handler.handle(cmd()).await.unwrap();

        assert!(matches!(first, CancelSubscriptionResult::Canceled { .. }));
        assert_eq!(second, CancelSubscriptionResult::AlreadyCanceled);
        assert_eq!(
            repo.get_subscriptions()[0].status,
            SubscriptionStatus::Canceled
        );
        // The provider is only contacted once.
        assert_eq!(payment.cancel_calls(), 1);
    }

    #[tokio::test]
    async fn user_without_subscription_succeeds() {
        let repo = Arc::new(MockSubscriptionRepository::new());
        let payment = Arc::new(MockPaymentProvider::new());
        let handler = CancelSubscriptionHandler::new(repo, payment.clone());

        let result = handler.handle(cmd()).await.unwrap();

        assert_eq!(result, CancelSubscriptionResult::AlreadyCanceled);
        assert_eq!(payment.cancel_calls(), 0);
    }

    #[tokio::test]
    async fn row_without_provider_subscription_cancels_locally() {
        let mut sub = active_subscription();
        sub.stripe_subscription_id = None;
        let repo = Arc::new(MockSubscriptionRepository::with_subscription(sub));
        let payment = Arc::new(MockPaymentProvider::new());
        let handler = CancelSubscriptionHandler::new(repo.clone(), payment.clone());

        let result = handler.handle(cmd()).await.unwrap();

        assert!(matches!(result, CancelSubscriptionResult::Canceled { .. }));
        assert_eq!(payment.cancel_calls(), 0);
        assert_eq!(
            repo.get_subscriptions()[0].status,
            SubscriptionStatus::Canceled
        );
    }

    #[tokio::test]
    async fn returns_period_end_as_effective_date() {
        let sub = active_subscription();
        let period_end = sub.current_period_end;
        let repo = Arc::new(MockSubscriptionRepository::with_subscription(sub));
        let payment = Arc::new(MockPaymentProvider::new());
        let handler = CancelSubscriptionHandler::new(repo, payment);

        let result = handler.handle(cmd()).await.unwrap();

        assert_eq!(
            result,
            CancelSubscriptionResult::Canceled {
                effective_at: period_end
            }
        );
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Failure Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn provider_failure_leaves_local_state_untouched() {
        let repo = Arc::new(MockSubscriptionRepository::with_subscription(
            active_subscription(),
        ));
        let payment = Arc::new(MockPaymentProvider::failing_cancel());
        let handler = CancelSubscriptionHandler::new(repo.clone(), payment);

        let result = handler.handle(cmd()).await;

        assert!(matches!(result, Err(BillingError::PaymentFailed { .. })));
        assert_eq!(
            repo.get_subscriptions()[0].status,
            SubscriptionStatus::Active
        );
    }
}

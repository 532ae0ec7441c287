//! CreateCheckoutHandler - Opens a hosted checkout session for a user.
//!
//! No local row is written here. The subscription record is created by the
//! webhook reconciler once the provider delivers `checkout.session.completed`;
//! until then the user's billing state is unchanged.

use std::sync::Arc;

use crate::domain::billing::{BillingError, Plan};
use crate::domain::foundation::UserId;
use crate::ports::{
    CreateCheckoutRequest, CreateCustomerRequest, PaymentProvider, SubscriptionRepository,
};

/// Command to start a paid checkout flow.
#[derive(Debug, Clone)]
pub struct CreateCheckoutCommand {
    pub user_id: String,
    pub email: String,
    pub plan: Plan,
    pub trial_days: Option<u32>,
    /// Redirect target after the hosted page completes.
    pub success_url: String,
    /// Redirect target after the hosted page is abandoned.
    pub cancel_url: String,
}

/// Result of checkout initiation.
#[derive(Debug, Clone)]
pub struct CreateCheckoutResult {
    /// Hosted page the caller redirects the user to.
    pub url: String,
}

/// Handler for starting checkout sessions.
pub struct CreateCheckoutHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    payment_provider: Arc<dyn PaymentProvider>,
}

impl CreateCheckoutHandler {
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
        cmd: CreateCheckoutCommand,
    ) -> Result<CreateCheckoutResult, BillingError> {
        // 1. Validate inputs.
        let user_id = UserId::new(cmd.user_id)
            .map_err(|e| BillingError::validation("userId", e.to_string()))?;
        if cmd.email.trim().is_empty() {
            return Err(BillingError::validation("email", "cannot be empty"));
        }
        if !cmd.plan.is_paid() {
            return Err(BillingError::validation(
                "plan",
                format!("{} plan has no checkout", cmd.plan.as_str()),
            ));
        }

        // 2. Reuse the provider customer when the user already has one.
        // At most one provider customer exists per user once the id is set.
        let existing = self
            .subscriptions
            .find_by_user_id(&user_id)
            .await
            .map_err(BillingError::from)?;

        let customer_id = match existing.and_then(|s| s.stripe_customer_id) {
            Some(id) => id,
            None => {
                let customer = self
                    .payment_provider
                    .create_customer(CreateCustomerRequest {
                        user_id: user_id.clone(),
                        email: cmd.email.clone(),
                    })
                    .await
                    .map_err(|e| BillingError::payment_failed(e.to_string()))?;
                tracing::info!(user_id = %user_id, customer_id = %customer.id, "Created provider customer");
                customer.id
            }
        };

        // 3. Open the hosted session.
        let session = self
            .payment_provider
            .create_checkout_session(CreateCheckoutRequest {
                user_id: user_id.clone(),
                email: cmd.email,
                customer_id: Some(customer_id),
                plan: cmd.plan,
                success_url: cmd.success_url,
                cancel_url: cmd.cancel_url,
                trial_days: cmd.trial_days,
            })
            .await
            .map_err(|e| match e.code {
                crate::ports::PaymentErrorCode::Configuration => {
                    BillingError::configuration(e.message)
                }
                _ => BillingError::payment_failed(e.to_string()),
            })?;

        Ok(CreateCheckoutResult { url: session.url })
    }
}

//! Axum router configuration for the billing endpoints.

use axum::{routing::post, Router};

use super::handlers::{
    cancel_account, create_checkout, delete_account, handle_stripe_webhook, BillingAppState,
};

/// Create the billing API router.
///
/// # Routes
///
/// ## Client Endpoints
/// - `POST /billing/checkout` - Start a paid checkout flow
///
/// ## Account Endpoints (require a bearer credential)
/// - `POST /account/cancel` - Cancel the caller's subscription
/// - `POST /account/delete` - Permanently delete the caller's account
///
/// ## Webhook Endpoints (no auth, signature verified)
/// - `POST /webhooks/stripe` - Reconcile billing provider events
pub fn billing_router() -> Router<BillingAppState> {
    Router::new()
        .nest(
            "/billing",
            Router::new().route("/checkout", post(create_checkout)),
        )
        .nest(
            "/account",
            Router::new()
                .route("/cancel", post(cancel_account))
                .route("/delete", post(delete_account)),
        )
        .nest(
            "/webhooks",
            Router::new().route("/stripe", post(handle_stripe_webhook)),
        )
}

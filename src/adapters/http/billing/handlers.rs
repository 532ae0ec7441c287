//! HTTP handlers for the billing endpoints.
//!
//! These handlers connect Axum routes to application layer command
//! handlers. The webhook endpoint consumes the raw body; re-serializing
//! it would break signature verification.

use std::sync::Arc;

use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::handlers::billing::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, CreateCheckoutCommand,
    CreateCheckoutHandler, DeleteAccountCommand, DeleteAccountHandler, ProcessWebhookCommand,
    ProcessWebhookHandler,
};
use crate::domain::billing::BillingError;
use crate::ports::{AuthProvider, PaymentProvider, SubscriptionRepository, WebhookEventRepository};

use super::dto::{
    CancelResponse, CheckoutResponse, CreateCheckoutRequest, DeleteResponse, ErrorResponse,
    WebhookAckResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// Cloned per request; dependencies are Arc-wrapped for cheap sharing.
#[derive(Clone)]
pub struct BillingAppState {
    pub subscription_repository: Arc<dyn SubscriptionRepository>,
    pub webhook_event_repository: Arc<dyn WebhookEventRepository>,
    pub payment_provider: Arc<dyn PaymentProvider>,
    pub auth_provider: Arc<dyn AuthProvider>,
    /// Public base URL of the web app, for checkout redirect targets.
    pub public_app_url: String,
}

impl BillingAppState {
    pub fn webhook_handler(&self) -> ProcessWebhookHandler {
        ProcessWebhookHandler::new(
            self.subscription_repository.clone(),
            self.webhook_event_repository.clone(),
            self.payment_provider.clone(),
        )
    }

    pub fn checkout_handler(&self) -> CreateCheckoutHandler {
        CreateCheckoutHandler::new(
            self.subscription_repository.clone(),
            self.payment_provider.clone(),
        )
    }

    pub fn cancel_handler(&self) -> CancelSubscriptionHandler {
        CancelSubscriptionHandler::new(
            self.subscription_repository.clone(),
            self.payment_provider.clone(),
        )
    }

    pub fn delete_handler(&self) -> DeleteAccountHandler {
        DeleteAccountHandler::new(
            self.subscription_repository.clone(),
            self.payment_provider.clone(),
            self.auth_provider.clone(),
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Bearer Token Extraction
// ════════════════════════════════════════════════════════════════════════════════

/// Raw bearer token pulled from the Authorization header.
///
/// Resolution to a user happens in the handler via the auth provider;
/// the extractor only enforces the header shape.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

/// Rejection type for BearerToken extraction.
#[derive(Debug)]
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> axum::response::Response {
        let error = ErrorResponse::new("Missing or invalid Authorization header");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

impl<S> axum::extract::FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let token = parts
                .headers
                .get(axum::http::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or(AuthenticationRequired)?;

            Ok(BearerToken(token.to_string()))
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/webhooks/stripe - Reconcile a billing provider event
pub async fn handle_stripe_webhook(
    State(state): State<BillingAppState>,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, BillingApiError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(BillingError::invalid_webhook_signature)?;

    let handler = state.webhook_handler();
    let cmd = ProcessWebhookCommand {
        payload: body.to_vec(),
        signature: signature.to_string(),
    };

    handler.handle(cmd).await?;

    Ok(Json(WebhookAckResponse { received: true }))
}

/// POST /api/billing/checkout - Start a paid checkout flow
pub async fn create_checkout(
    State(state): State<BillingAppState>,
    Json(request): Json<CreateCheckoutRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let base = state.public_app_url.trim_end_matches('/');
    let handler = state.checkout_handler();
    let cmd = CreateCheckoutCommand {
        user_id: request.user_id,
        email: request.email,
        plan: request.plan,
        trial_days: request.trial_days,
        success_url: format!("{}/dashboard?checkout=success", base),
        cancel_url: format!("{}/pricing?checkout=canceled", base),
    };

    let result = handler.handle(cmd).await?;

    Ok(Json(CheckoutResponse { url: result.url }))
}

/// POST /api/account/cancel - Cancel the caller's subscription
pub async fn cancel_account(
    State(state): State<BillingAppState>,
    BearerToken(token): BearerToken,
) -> Result<impl IntoResponse, BillingApiError> {
    let user = state
        .auth_provider
        .resolve_token(&token)
        .await
        .map_err(BillingError::from)?;

    let handler = state.cancel_handler();
    handler
        .handle(CancelSubscriptionCommand { user_id: user.id })
        .await?;

    Ok(Json(CancelResponse { success: true }))
}

/// POST /api/account/delete - Permanently delete the caller's account
pub async fn delete_account(
    State(state): State<BillingAppState>,
    BearerToken(token): BearerToken,
) -> Result<impl IntoResponse, BillingApiError> {
    let user = state
        .auth_provider
        .resolve_token(&token)
        .await
        .map_err(BillingError::from)?;

    let handler = state.delete_handler();
    let result = handler
        .handle(DeleteAccountCommand { user_id: user.id })
        .await?;

    Ok(Json(DeleteResponse {
        success: true,
        billing_canceled: result.billing_canceled,
        record_deleted: result.record_deleted,
    }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts billing errors to HTTP responses.
pub struct BillingApiError(BillingError);

impl From<BillingError> for BillingApiError {
    fn from(err: BillingError) -> Self {
        Self(err)
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            BillingError::InvalidWebhookSignature => StatusCode::BAD_REQUEST,
            BillingError::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            BillingError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            BillingError::NotFoundForUser(_) => StatusCode::NOT_FOUND,
            BillingError::PaymentFailed { .. }
            | BillingError::Configuration(_)
            | BillingError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorResponse::new(self.0.message());
        (status, Json(body)).into_response()
    }
}

//! Payment provider port for external payment processing.
//!
//! Defines the contract for the billing gateway integration (Stripe).
//! Implementations handle customer creation, hosted checkout sessions,
//! subscription lookup/cancellation, and webhook verification.
//!
//! # Design
//!
//! - **Gateway agnostic**: the interface carries no Stripe types; the
//!   adapter translates wire payloads into these structures
//! - **Raw provider statuses**: subscription status crosses this boundary
//!   as the provider's string; the domain owns the collapse to local
//!   status buckets

use crate::domain::billing::Plan;
use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Port for the payment provider integration.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a customer in the payment system.
    ///
    /// The internal user id is stored in provider metadata so webhook
    /// events can be correlated back to the user.
    async fn create_customer(&self, request: CreateCustomerRequest)
        -> Result<Customer, PaymentError>;

    /// Create a hosted checkout session for a subscription.
    ///
    /// Returns the session with the URL the user is redirected to.
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError>;

    /// Get a subscription by provider ID.
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<ProviderSubscription>, PaymentError>;

    /// Cancel a subscription.
    ///
    /// If `at_period_end` is true the subscription stays active until the
    /// current period ends; otherwise it is ended immediately.
    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<ProviderSubscription, PaymentError>;

    /// Verify a webhook signature and parse the event.
    ///
    /// Returns the parsed event if valid, an error if the signature or
    /// payload is invalid. Must not be called with a re-serialized body;
    /// the signature covers the raw bytes.
    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, PaymentError>;
}

/// Request to create a customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCustomerRequest {
    /// Internal user ID (stored as provider metadata).
    pub user_id: UserId,

    /// Customer email address.
    pub email: String,
}

/// Customer in the payment system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    /// Provider's customer ID.
    pub id: String,

    /// Customer email.
    pub email: String,
}

/// Request to create a checkout session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCheckoutRequest {
    /// Internal user ID.
    pub user_id: UserId,

    /// Customer email for pre-fill when no customer exists yet.
    pub email: String,

    /// Existing provider customer to attach the session to, if any.
    pub customer_id: Option<String>,

    /// Plan to subscribe to. Must be a paid plan.
    pub plan: Plan,

    /// URL to redirect to after successful checkout.
    pub success_url: String,

    /// URL to redirect to after cancelled checkout.
    pub cancel_url: String,

    /// Trial-day override for the subscription.
    pub trial_days: Option<u32>,
}

/// Checkout session for payment completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider's session ID.
    pub id: String,

    /// Hosted URL for the customer to complete checkout.
    pub url: String,
}

/// Subscription as reported by the payment provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSubscription {
    /// Provider's subscription ID.
    pub id: String,

    /// Provider's customer ID.
    pub customer_id: String,

    /// Raw provider status string (e.g. "active", "trialing").
    pub status: String,

    /// Current billing period end (Unix timestamp).
    pub current_period_end: i64,

    /// Whether the subscription cancels at period end.
    pub cancel_at_period_end: bool,
}

/// Webhook event from the payment provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event ID from the provider.
    pub id: String,

    /// Event type.
    pub event_type: WebhookEventType,

    /// Event payload.
    pub data: WebhookEventData,

    /// When the event occurred (Unix timestamp).
    pub created_at: i64,
}

/// Types of webhook events we handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    /// Checkout session completed successfully.
    CheckoutSessionCompleted,

    /// Subscription updated (status change, renewal, plan change).
    SubscriptionUpdated,

    /// Subscription deleted/ended.
    SubscriptionDeleted,

    /// Invoice payment failed.
    InvoicePaymentFailed,

    /// Unknown event type.
    Unknown(String),
}

impl WebhookEventType {
    /// The provider's event type string.
    pub fn as_str(&self) -> &str {
        match self {
            WebhookEventType::CheckoutSessionCompleted => "checkout.session.completed",
            WebhookEventType::SubscriptionUpdated => "customer.subscription.updated",
            WebhookEventType::SubscriptionDeleted => "customer.subscription.deleted",
            WebhookEventType::InvoicePaymentFailed => "invoice.payment_failed",
            WebhookEventType::Unknown(s) => s,
        }
    }
}

/// Webhook event payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WebhookEventData {
    /// Checkout session data.
    #[serde(rename = "checkout")]
    Checkout {
        session_id: String,
        customer_id: String,
        subscription_id: Option<String>,
        user_id: Option<String>,
    },

    /// Subscription data.
    #[serde(rename = "subscription")]
    Subscription {
        subscription_id: String,
        customer_id: String,
        status: String,
        current_period_end: i64,
        user_id: Option<String>,
    },

    /// Invoice data.
    #[serde(rename = "invoice")]
    Invoice {
        invoice_id: String,
        customer_id: String,
        subscription_id: Option<String>,
    },

    /// Raw/unknown event data.
    #[serde(rename = "raw")]
    Raw { json: String },
}

/// Errors from payment provider operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentError {
    /// Error code for categorization.
    pub code: PaymentErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl PaymentError {
    /// Create a new payment error.
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: code.is_retryable(),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    /// Create a not found error.
    pub fn not_found(resource: &str) -> Self {
        Self::new(PaymentErrorCode::NotFound, format!("{} not found", resource))
    }

    /// Create an invalid webhook error.
    pub fn invalid_webhook(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::InvalidWebhook, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::Configuration, message)
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PaymentError {}

impl From<PaymentError> for DomainError {
    fn from(err: PaymentError) -> Self {
        let code = match err.code {
            PaymentErrorCode::NotFound => ErrorCode::SubscriptionNotFound,
            PaymentErrorCode::InvalidWebhook => ErrorCode::InvalidWebhookSignature,
            PaymentErrorCode::Configuration => ErrorCode::ConfigurationError,
            _ => ErrorCode::ExternalServiceError,
        };
        DomainError::new(code, err.message)
    }
}

/// Payment error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    /// Network connectivity issue.
    NetworkError,

    /// API authentication failed.
    AuthenticationError,

    /// Resource not found.
    NotFound,

    /// Rate limit exceeded.
    RateLimitExceeded,

    /// Invalid webhook signature or payload.
    InvalidWebhook,

    /// Missing or invalid deployment configuration.
    Configuration,

    /// Provider API error.
    ProviderError,
}

impl PaymentErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::NetworkError | PaymentErrorCode::RateLimitExceeded
        )
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentErrorCode::NetworkError => "network_error",
            PaymentErrorCode::AuthenticationError => "authentication_error",
            PaymentErrorCode::NotFound => "not_found",
            PaymentErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            PaymentErrorCode::InvalidWebhook => "invalid_webhook",
            PaymentErrorCode::Configuration => "configuration",
            PaymentErrorCode::ProviderError => "provider_error",
        };
        write!(f, "{}", s)
    }
}

//! Billing-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | InvalidWebhookSignature | 400 |
//! | Unauthorized | 401 |
//! | ValidationFailed | 400 |
//! | NotFoundForUser | 404 |
//! | Configuration | 500 |
//! | PaymentFailed | 500 |
//! | Infrastructure | 500 |

use crate::domain::foundation::{AuthError, DomainError, ErrorCode, UserId};

/// Errors surfaced by the billing core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingError {
    /// No subscription exists for this user.
    NotFoundForUser(UserId),

    /// Webhook signature verification failed.
    InvalidWebhookSignature,

    /// The bearer credential was missing, invalid, or expired.
    Unauthorized(String),

    /// A request field failed validation.
    ValidationFailed { field: String, message: String },

    /// The billing provider rejected or failed an operation.
    PaymentFailed { reason: String },

    /// Required deployment configuration is missing or invalid.
    Configuration(String),

    /// Persistence or other infrastructure failure.
    Infrastructure(String),
}

impl BillingError {
    pub fn not_found_for_user(user_id: UserId) -> Self {
        BillingError::NotFoundForUser(user_id)
    }

    pub fn invalid_webhook_signature() -> Self {
        BillingError::InvalidWebhookSignature
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        BillingError::Unauthorized(message.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BillingError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn payment_failed(reason: impl Into<String>) -> Self {
        BillingError::PaymentFailed {
            reason: reason.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        BillingError::Configuration(message.into())
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        BillingError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            BillingError::NotFoundForUser(_) => ErrorCode::SubscriptionNotFound,
            BillingError::InvalidWebhookSignature => ErrorCode::InvalidWebhookSignature,
            BillingError::Unauthorized(_) => ErrorCode::Unauthorized,
            BillingError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            BillingError::PaymentFailed { .. } => ErrorCode::PaymentFailed,
            BillingError::Configuration(_) => ErrorCode::ConfigurationError,
            BillingError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Returns a user-facing error message.
    pub fn message(&self) -> String {
        match self {
            BillingError::NotFoundForUser(user_id) => {
                format!("No subscription found for user: {}", user_id)
            }
            BillingError::InvalidWebhookSignature => "Invalid signature".to_string(),
            BillingError::Unauthorized(msg) => msg.clone(),
            BillingError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            BillingError::PaymentFailed { reason } => format!("Payment provider error: {}", reason),
            BillingError::Configuration(msg) => format!("Configuration error: {}", msg),
            BillingError::Infrastructure(msg) => format!("Error: {}", msg),
        }
    }
}

impl std::fmt::Display for BillingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for BillingError {}

impl From<DomainError> for BillingError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed | ErrorCode::EmptyField | ErrorCode::InvalidFormat => {
                BillingError::ValidationFailed {
                    field: err
                        .details
                        .get("field")
                        .cloned()
                        .unwrap_or_else(|| "unknown".to_string()),
                    message: err.message,
                }
            }
            ErrorCode::PaymentFailed => BillingError::PaymentFailed {
                reason: err.message,
            },
            ErrorCode::ConfigurationError => BillingError::Configuration(err.message),
            _ => BillingError::Infrastructure(err.to_string()),
        }
    }
}

impl From<BillingError> for DomainError {
    fn from(err: BillingError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}

impl From<AuthError> for BillingError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken | AuthError::UserNotFound => {
                BillingError::Unauthorized(err.to_string())
            }
            AuthError::ServiceUnavailable(msg) => BillingError::Infrastructure(msg),
        }
    }
}

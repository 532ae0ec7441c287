//! HTTP DTOs for the billing endpoints.
//!
//! These types define the JSON request/response wire format. Field names
//! are camelCase to match the web client.

use serde::{Deserialize, Serialize};

use crate::domain::billing::Plan;

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to initiate a checkout session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    /// The authenticated user's id.
    pub user_id: String,
    /// Email used for the provider customer.
    pub email: String,
    /// Plan to subscribe to.
    pub plan: Plan,
    /// Optional trial-day override.
    #[serde(default)]
    pub trial_days: Option<u32>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Response for checkout initiation.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    /// The hosted checkout URL to redirect the user to.
    pub url: String,
}

/// Acknowledgement returned to the webhook sender.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAckResponse {
    pub received: bool,
}

/// Response for subscription cancellation.
#[derive(Debug, Clone, Serialize)]
pub struct CancelResponse {
    pub success: bool,
}

/// Response for account deletion, including the cleanup report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub success: bool,
    /// Whether the provider subscription was canceled (or none existed).
    pub billing_canceled: bool,
    /// Whether the subscription row was removed (or none existed).
    pub record_deleted: bool,
}

/// Standard error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

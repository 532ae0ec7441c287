//! Authenticated user identity and auth errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::UserId;

/// A user identity resolved from a bearer credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// The unique user identifier from the auth provider.
    pub id: UserId,

    /// The user's email address, if known.
    pub email: Option<String>,
}

impl AuthenticatedUser {
    pub fn new(id: UserId, email: Option<String>) -> Self {
        Self { id, email }
    }
}

/// Errors from the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The bearer token is missing, malformed, expired, or revoked.
    #[error("Invalid or expired credentials")]
    InvalidToken,

    /// No user exists for the given identifier.
    #[error("User not found")]
    UserNotFound,

    /// The auth provider could not be reached or returned a server error.
    #[error("Auth provider unavailable: {0}")]
    ServiceUnavailable(String),
}

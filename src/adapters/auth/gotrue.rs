//! GoTrue adapter for bearer-token resolution and user deletion.
//!
//! Implements the `AuthProvider` port against a GoTrue-compatible auth
//! API (the auth server used by Supabase deployments):
//!
//! - `GET /auth/v1/user` with the user's bearer token resolves the token
//!   to a user identity
//! - `DELETE /auth/v1/admin/users/{id}` with the service-role key removes
//!   the auth identity
//!
//! The service-role key is privileged and never leaves this adapter.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::foundation::{AuthError, AuthenticatedUser, UserId};
use crate::ports::AuthProvider;

/// Configuration for the GoTrue adapter.
#[derive(Clone)]
pub struct GoTrueConfig {
    /// Base URL of the auth deployment (e.g. "https://xyz.supabase.co").
    base_url: String,

    /// Service-role key used for admin operations and as the API key.
    service_role_key: SecretString,
}

impl GoTrueConfig {
    /// Create a new configuration.
    pub fn new(base_url: impl Into<String>, service_role_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            service_role_key: SecretString::new(service_role_key.into()),
        }
    }

    fn user_url(&self) -> String {
        format!("{}/auth/v1/user", self.base_url.trim_end_matches('/'))
    }

    fn admin_user_url(&self, user_id: &UserId) -> String {
        format!(
            "{}/auth/v1/admin/users/{}",
            self.base_url.trim_end_matches('/'),
            user_id
        )
    }
}

/// User payload returned by GoTrue.
#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// GoTrue implementation of the `AuthProvider` port.
pub struct GoTrueAuthAdapter {
    config: GoTrueConfig,
    http_client: reqwest::Client,
}

impl GoTrueAuthAdapter {
    /// Create a new adapter with the given configuration.
    pub fn new(config: GoTrueConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AuthProvider for GoTrueAuthAdapter {
    async fn resolve_token(&self, bearer_token: &str) -> Result<AuthenticatedUser, AuthError> {
        if bearer_token.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }

        let response = self
            .http_client
            .get(self.config.user_url())
            .header("apikey", self.config.service_role_key.expose_secret())
            .bearer_auth(bearer_token)
            .send()
            .await
            .map_err(|e| AuthError::ServiceUnavailable(e.to_string()))?;

        match response.status() {
            s if s.is_success() => {}
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                return Err(AuthError::InvalidToken);
            }
            reqwest::StatusCode::NOT_FOUND => return Err(AuthError::UserNotFound),
            s => {
                return Err(AuthError::ServiceUnavailable(format!(
                    "auth API returned {}",
                    s
                )));
            }
        }

        let user: GoTrueUser = response
            .json()
            .await
            .map_err(|e| AuthError::ServiceUnavailable(e.to_string()))?;

        let id = UserId::new(user.id).map_err(|_| AuthError::InvalidToken)?;
        Ok(AuthenticatedUser::new(id, user.email))
    }

    async fn delete_user(&self, user_id: &UserId) -> Result<(), AuthError> {
        let response = self
            .http_client
            .delete(self.config.admin_user_url(user_id))
            .header("apikey", self.config.service_role_key.expose_secret())
            .bearer_auth(self.config.service_role_key.expose_secret())
            .send()
            .await
            .map_err(|e| AuthError::ServiceUnavailable(e.to_string()))?;

        match response.status() {
            s if s.is_success() => {
                tracing::info!(user_id = %user_id, "Auth identity deleted");
                Ok(())
            }
            reqwest::StatusCode::NOT_FOUND => Err(AuthError::UserNotFound),
            s => Err(AuthError::ServiceUnavailable(format!(
                "auth admin API returned {}",
                s
            ))),
        }
    }
}

//! Authentication configuration

use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

/// Authentication configuration (GoTrue-compatible auth backend)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Base URL of the auth deployment
    pub base_url: String,

    /// Service-role key for admin operations
    pub service_role_key: String,
}

impl AuthConfig {
    /// Validate auth configuration
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.base_url.is_empty() {
            return Err(ValidationError::MissingRequired("AUTH_BASE_URL"));
        }
        if self.service_role_key.is_empty() {
            return Err(ValidationError::MissingRequired("AUTH_SERVICE_ROLE_KEY"));
        }

        // Plain HTTP is tolerated only outside production.
        if *environment == Environment::Production && !self.base_url.starts_with("https://") {
            return Err(ValidationError::InvalidAuthUrl);
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ValidationError::InvalidAuthUrl);
        }

        Ok(())
    }
}

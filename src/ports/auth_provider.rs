//! Auth provider port.
//!
//! The billing core never validates credentials itself; it delegates to
//! the auth backend. Two operations are needed: resolving a bearer token
//! to a user identity (cancel/delete endpoints) and removing the auth
//! identity (account deletion).

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser, UserId};

/// Port for the authentication backend.
///
/// # Contract
///
/// Implementations must:
/// - Return `AuthError::InvalidToken` for missing, malformed, expired,
///   or revoked tokens
/// - Return `AuthError::UserNotFound` when deleting a user that does not
///   exist
/// - Return `AuthError::ServiceUnavailable` for transient errors
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Resolve a bearer token to the user it belongs to.
    async fn resolve_token(&self, bearer_token: &str) -> Result<AuthenticatedUser, AuthError>;

    /// Permanently delete the user's auth identity.
    ///
    /// Irreversible.
    async fn delete_user(&self, user_id: &UserId) -> Result<(), AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct TestAuthProvider {
        tokens: Mutex<HashMap<String, AuthenticatedUser>>,
    }

    impl TestAuthProvider {
        fn new() -> Self {
            Self {
                tokens: Mutex::new(HashMap::new()),
            }
        }

        fn add_token(&self, token: &str, user: AuthenticatedUser) {
            self.tokens.lock().unwrap().insert(token.to_string(), user);
        }
    }

    #[async_trait]
    impl AuthProvider for TestAuthProvider {
        async fn resolve_token(
            &self,
            bearer_token: &str,
        ) -> Result<AuthenticatedUser, AuthError> {
            self.tokens
                .lock()
                .unwrap()
                .get(bearer_token)
                .cloned()
                .ok_or(AuthError::InvalidToken)
        }

        async fn delete_user(&self, user_id: &UserId) -> Result<(), AuthError> {
            let mut tokens = self.tokens.lock().unwrap();
            let before = tokens.len();
            tokens.retain(|_, u| &u.id != user_id);
            if tokens.len() == before {
                return Err(AuthError::UserNotFound);
            }
            Ok(())
        }
    }

    fn test_user() -> AuthenticatedUser {
        AuthenticatedUser::new(
            UserId::new("user-123").unwrap(),
            Some("owner@example.com".to_string()),
        )
    }

    #[tokio::test]
    async fn resolves_known_token() {
        let provider = TestAuthProvider::new();
        provider.add_token("tok_abc", test_user());

        let user = provider.resolve_token("tok_abc").await.unwrap();
        assert_eq!(user.id.as_str(), "user-123");
    }

    #[tokio::test]
    async fn rejects_unknown_token() {
        let provider = TestAuthProvider::new();
        let result = provider.resolve_token("tok_bogus").await;
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn delete_user_fails_for_missing_user() {
        let provider = TestAuthProvider::new();
        let result = provider
            .delete_user(&UserId::new("nobody").unwrap())
            .await;
        assert!(matches!(result, Err(AuthError::UserNotFound)));
    }

    #[test]
    fn auth_provider_is_object_safe_and_send_sync() {
        fn _assert_trait_object(_: &dyn AuthProvider) {}
        fn _assert_arc_send_sync<T: Send + Sync + ?Sized>() {}
        _assert_arc_send_sync::<std::sync::Arc<dyn AuthProvider>>();
    }
}

//! Password reset lifecycle
//!
//! Two-phase protocol: `request_reset` issues a single-use token for an
//! account resolved by email; `confirm_reset` exchanges a valid token for a
//! password update. Both phases run against the injected store inside one
//! transaction each.
//!
//! # Single-use enforcement
//!
//! Consumption is a compare-and-set at the store: the conditional update in
//! [`crate::store::AuthTx::consume_reset_token`] gates success on its row
//! count. Under concurrent confirm attempts for the same token exactly one
//! caller observes the pre-consumption state; every loser gets
//! `UsedResetToken`, never a silent duplicate success. The password update
//! and the consumption commit together or not at all.
//!
//! # Issuance policy
//!
//! Issuing a new token invalidates all prior unconsumed tokens for the same
//! user, bounding the attack surface to one live token per account.
//!
//! # Information leakage
//!
//! A reset request for an unknown email is absorbed: the caller cannot tell
//! whether the account exists. On confirm, an expired token and an unknown
//! token fail with the same `InvalidToken` kind.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AuthError, Result};
use crate::observability::SecurityEvent;
use crate::security_event;
use crate::store::AuthStore;
use crate::token::TokenCodec;

/// Hashing collaborator for the new credential.
///
/// The engine never stores a plaintext password; the application injects the
/// algorithm (argon2, bcrypt, ...) behind this seam.
pub trait PasswordHasher: Send + Sync {
    /// Hash a plaintext password for storage.
    fn hash(&self, password: &str) -> Result<String>;
}

/// A freshly issued reset grant, handed to the delivery collaborator.
///
/// The engine's postcondition is "a valid, unconsumed token now exists for
/// the user". Actually delivering it (email, SMS) is the caller's job.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedReset {
    /// Owning user
    pub user_id: Uuid,
    /// Encoded secret as it should reach the user
    pub token: String,
    /// Hard expiry of the grant
    pub expires_at: DateTime<Utc>,
}

/// The password reset service.
pub struct PasswordReset<S, H> {
    store: S,
    hasher: H,
    codec: TokenCodec,
    config: AuthConfig,
}

impl<S, H> PasswordReset<S, H>
where
    S: AuthStore,
    H: PasswordHasher,
{
    /// Create a new reset service.
    pub fn new(store: S, hasher: H, config: AuthConfig) -> Self {
        let codec = TokenCodec::new(config.token_length);
        Self {
            store,
            hasher,
            codec,
            config,
        }
    }

    /// The configuration this service was constructed with.
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Issue a reset token for the account registered under `email`.
    ///
    /// `authenticated` carries the current principal, if any: an
    /// already-authenticated caller must change its password through the
    /// authenticated flow, so a reset request from one fails
    /// `AuthorizedUser`.
    ///
    /// An unknown email is absorbed and returns `Ok(None)`: account
    /// existence is never revealed to the caller. On success the prior
    /// unconsumed tokens for the user are invalidated and the fresh grant is
    /// returned for delivery.
    pub async fn request_reset(
        &self,
        authenticated: Option<Uuid>,
        email: &str,
    ) -> Result<Option<IssuedReset>> {
        if authenticated.is_some() {
            return Err(AuthError::authorized_user());
        }

        let mut tx = self.store.begin().await?;

        let Some(user) = tx.find_user_by_email(email).await? else {
            // Deterministic release of the read-only transaction.
            tx.commit().await?;
            tracing::debug!("Reset requested for unknown email, absorbed");
            return Ok(None);
        };

        let revoked = tx.revoke_reset_tokens(user.id).await?;
        let secret = self.codec.generate();
        let expires_at = Utc::now() + Duration::from_std(self.config.token_expiry)
            .map_err(|e| AuthError::internal("invalid token expiry configuration", e))?;
        tx.insert_reset_token(user.id, &secret, expires_at).await?;
        tx.commit().await?;

        security_event!(
            SecurityEvent::PasswordResetRequested,
            user_id = %user.id,
            superseded_tokens = revoked,
            "Password reset token issued"
        );

        Ok(Some(IssuedReset {
            user_id: user.id,
            token: secret,
            expires_at,
        }))
    }

    /// Exchange a reset token for a password update.
    ///
    /// Validation order: undecodable value → `Malformed` (never reaches the
    /// store); unknown or expired token → `InvalidToken`, indistinguishably;
    /// consumed token → `UsedResetToken`. On a valid token the consumption
    /// and the password update commit atomically.
    pub async fn confirm_reset(&self, password: &str, token_value: &str) -> Result<()> {
        self.codec.validate(token_value).inspect_err(|_| {
            security_event!(
                SecurityEvent::MalformedCredential,
                "Reset token failed decoding"
            );
        })?;

        let mut tx = self.store.begin().await?;

        let Some(token) = tx.find_reset_token(token_value).await? else {
            tx.rollback().await?;
            return Err(AuthError::invalid_token());
        };

        if token.is_consumed() {
            tx.rollback().await?;
            security_event!(
                SecurityEvent::ResetTokenReplayed,
                user_id = %token.user_id,
                token_id = %token.id,
                "Confirm attempted with a consumed reset token"
            );
            return Err(AuthError::used_token());
        }

        if token.is_expired(Utc::now()) {
            // Same error kind as not-found: expiry must not be observable.
            tx.rollback().await?;
            return Err(AuthError::invalid_token());
        }

        // Compare-and-set gates the rest of the operation. A concurrent
        // confirm that consumed the token between our read and this update
        // shows up here as a false return.
        if !tx.consume_reset_token(token.id).await? {
            tx.rollback().await?;
            return Err(AuthError::used_token());
        }

        let hash = self.hasher.hash(password)?;
        tx.update_user_password(token.user_id, &hash).await?;
        tx.commit().await?;

        security_event!(
            SecurityEvent::PasswordResetConfirmed,
            user_id = %token.user_id,
            token_id = %token.id,
            "Password updated through reset flow"
        );

        Ok(())
    }

    /// Form-level entry point for the request phase.
    ///
    /// Reads the email from the field named by the configuration (default
    /// `email`); a missing field is `Malformed`.
    pub async fn request_reset_form(
        &self,
        authenticated: Option<Uuid>,
        form: &HashMap<String, String>,
    ) -> Result<Option<IssuedReset>> {
        let email = form
            .get(&self.config.email_field)
            .ok_or_else(|| AuthError::malformed(format!("missing field: {}", self.config.email_field)))?;
        self.request_reset(authenticated, email).await
    }

    /// Form-level entry point for the confirm phase.
    ///
    /// Reads the new password and the token from the fields named by the
    /// configuration (defaults `password`, `reset_token`).
    pub async fn confirm_reset_form(&self, form: &HashMap<String, String>) -> Result<()> {
        let password = form
            .get(&self.config.password_field)
            .ok_or_else(|| AuthError::malformed(format!("missing field: {}", self.config.password_field)))?;
        let token = form
            .get(&self.config.reset_token_field)
            .ok_or_else(|| {
                AuthError::malformed(format!("missing field: {}", self.config.reset_token_field))
            })?;
        self.confirm_reset(password, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{MemoryAuthStore, PlainHasher};
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    fn service(store: MemoryAuthStore) -> PasswordReset<MemoryAuthStore, PlainHasher> {
        PasswordReset::new(store, PlainHasher, AuthConfig::default())
    }

    fn service_with_expiry(
        store: MemoryAuthStore,
        expiry: StdDuration,
    ) -> PasswordReset<MemoryAuthStore, PlainHasher> {
        let config = AuthConfig::builder().token_expiry(expiry).build();
        PasswordReset::new(store, PlainHasher, config)
    }

    #[tokio::test]
    async fn test_end_to_end_reset() {
        let store = MemoryAuthStore::default();
        let user_id = store.add_user("user@example.com");
        let config = AuthConfig::builder()
            .token_length(32)
            .token_expiry(StdDuration::from_secs(15 * 60))
            .build();
        let reset = PasswordReset::new(store.clone(), PlainHasher, config);

        let issued = reset
            .request_reset(None, "user@example.com")
            .await
            .unwrap()
            .expect("token should be issued");
        assert_eq!(issued.user_id, user_id);

        reset
            .confirm_reset("new-password", &issued.token)
            .await
            .unwrap();

        assert_eq!(
            store.password_hash(user_id).as_deref(),
            Some("plain:new-password")
        );
        let tokens = store.reset_tokens_for(user_id);
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].is_consumed());

        // Immediate second confirm with the same token.
        let err = reset
            .confirm_reset("other-password", &issued.token)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UsedResetToken);
        assert_eq!(
            store.password_hash(user_id).as_deref(),
            Some("plain:new-password")
        );
    }

    #[tokio::test]
    async fn test_request_reset_absorbs_unknown_email() {
        let reset = service(MemoryAuthStore::default());
        let issued = reset.request_reset(None, "nobody@example.com").await.unwrap();
        assert!(issued.is_none());
    }

    #[tokio::test]
    async fn test_request_reset_rejects_authenticated_caller() {
        let store = MemoryAuthStore::default();
        let user_id = store.add_user("user@example.com");
        let reset = service(store);

        let err = reset
            .request_reset(Some(user_id), "user@example.com")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::AuthorizedUser);
    }

    #[tokio::test]
    async fn test_new_issuance_supersedes_prior_token() {
        let store = MemoryAuthStore::default();
        let user_id = store.add_user("user@example.com");
        let reset = service(store.clone());

        let first = reset
            .request_reset(None, "user@example.com")
            .await
            .unwrap()
            .unwrap();
        let second = reset
            .request_reset(None, "user@example.com")
            .await
            .unwrap()
            .unwrap();

        // The superseded token fails like any invalid token.
        let err = reset.confirm_reset("pw", &first.token).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidToken);

        reset.confirm_reset("pw", &second.token).await.unwrap();
        assert_eq!(store.password_hash(user_id).as_deref(), Some("plain:pw"));
    }

    #[tokio::test]
    async fn test_expired_token_fails_like_unknown() {
        let store = MemoryAuthStore::default();
        store.add_user("user@example.com");
        let reset = service_with_expiry(store.clone(), StdDuration::ZERO);

        let issued = reset
            .request_reset(None, "user@example.com")
            .await
            .unwrap()
            .unwrap();

        let expired_err = reset.confirm_reset("pw", &issued.token).await.unwrap_err();

        let unknown = TokenCodec::new(32).generate();
        let unknown_err = reset.confirm_reset("pw", &unknown).await.unwrap_err();

        // Unlinkability: expired-and-unconsumed and well-formed-but-unknown
        // are the same kind.
        assert_eq!(expired_err.kind, ErrorKind::InvalidToken);
        assert_eq!(unknown_err.kind, ErrorKind::InvalidToken);
    }

    #[tokio::test]
    async fn test_malformed_token_never_reaches_store() {
        let store = MemoryAuthStore::default();
        let reset = service(store.clone());

        let err = reset.confirm_reset("pw", "!!!").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Malformed);
        assert_eq!(store.begin_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_confirms_single_success() {
        let store = MemoryAuthStore::default();
        let user_id = store.add_user("user@example.com");
        let reset = Arc::new(service(store.clone()));

        let issued = reset
            .request_reset(None, "user@example.com")
            .await
            .unwrap()
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let reset = Arc::clone(&reset);
            let token = issued.token.clone();
            handles.push(tokio::spawn(async move {
                reset.confirm_reset(&format!("pw-{i}"), &token).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => successes += 1,
                Err(err) => assert!(matches!(
                    err.kind,
                    ErrorKind::UsedResetToken | ErrorKind::InvalidToken
                )),
            }
        }

        assert_eq!(successes, 1);
        // The password changed exactly once.
        assert_eq!(store.password_update_count(user_id), 1);
    }

    #[tokio::test]
    async fn test_atomicity_update_failure_rolls_back_consumption() {
        let store = MemoryAuthStore::default();
        let user_id = store.add_user("user@example.com");
        let reset = service(store.clone());

        let issued = reset
            .request_reset(None, "user@example.com")
            .await
            .unwrap()
            .unwrap();

        store.fail_update_password(true);
        let err = reset.confirm_reset("pw", &issued.token).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);

        // The rollback left the token unconsumed and the password untouched.
        let tokens = store.reset_tokens_for(user_id);
        assert!(!tokens[0].is_consumed());
        assert_eq!(store.password_hash(user_id), None);

        // With the fault cleared the same token still works.
        store.fail_update_password(false);
        reset.confirm_reset("pw", &issued.token).await.unwrap();
        assert_eq!(store.password_hash(user_id).as_deref(), Some("plain:pw"));
    }

    #[tokio::test]
    async fn test_atomicity_consume_failure_leaves_password_unchanged() {
        let store = MemoryAuthStore::default();
        let user_id = store.add_user("user@example.com");
        let reset = service(store.clone());

        let issued = reset
            .request_reset(None, "user@example.com")
            .await
            .unwrap()
            .unwrap();

        store.fail_consume_token(true);
        let err = reset.confirm_reset("pw", &issued.token).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);

        assert!(!store.reset_tokens_for(user_id)[0].is_consumed());
        assert_eq!(store.password_hash(user_id), None);
    }

    #[tokio::test]
    async fn test_atomicity_commit_failure_rolls_back_both() {
        let store = MemoryAuthStore::default();
        let user_id = store.add_user("user@example.com");
        let reset = service(store.clone());

        let issued = reset
            .request_reset(None, "user@example.com")
            .await
            .unwrap()
            .unwrap();

        store.fail_commit(true);
        let err = reset.confirm_reset("pw", &issued.token).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
        store.fail_commit(false);

        assert!(!store.reset_tokens_for(user_id)[0].is_consumed());
        assert_eq!(store.password_hash(user_id), None);
    }

    #[tokio::test]
    async fn test_form_entry_points() {
        let store = MemoryAuthStore::default();
        let user_id = store.add_user("user@example.com");
        let reset = service(store.clone());

        let mut form = HashMap::new();
        form.insert("email".to_string(), "user@example.com".to_string());
        let issued = reset
            .request_reset_form(None, &form)
            .await
            .unwrap()
            .unwrap();

        let mut confirm = HashMap::new();
        confirm.insert("password".to_string(), "new-password".to_string());
        confirm.insert("reset_token".to_string(), issued.token);
        reset.confirm_reset_form(&confirm).await.unwrap();

        assert_eq!(
            store.password_hash(user_id).as_deref(),
            Some("plain:new-password")
        );
    }

    #[tokio::test]
    async fn test_form_missing_field_is_malformed() {
        let reset = service(MemoryAuthStore::default());

        let err = reset
            .request_reset_form(None, &HashMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Malformed);

        let err = reset.confirm_reset_form(&HashMap::new()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Malformed);
    }
}

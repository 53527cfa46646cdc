//! Cookie-backed session strategy
//!
//! Implements the [`Authenticator`] contract by resolving an opaque session
//! cookie to its owning user through the persistence surface. The cookie
//! value is the base64-encoded session identifier, a reversible transport
//! encoding; the session row in the store is the actual credential.
//!
//! # Failure mapping
//!
//! A decode-valid but unknown or expired session is indistinguishable, from
//! the caller's perspective, from "no session at all": both fail
//! `Unauthorized`. An undecodable cookie is a distinct `Malformed` condition
//! and never reaches the store lookup. Infrastructure failures surface as
//! `Internal`.

use std::marker::PhantomData;

use async_trait::async_trait;
use axum::http::{request::Parts, HeaderMap};
use chrono::Utc;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::cookie;
use crate::error::{AuthError, Result};
use crate::observability::SecurityEvent;
use crate::security_event;
use crate::store::AuthStore;
use crate::strategy::{Authenticator, LoadUser, User};
use crate::token::TokenCodec;

/// Session-based [`Authenticator`] over an injected store and user loader.
pub struct SessionAuthenticator<S, L, T> {
    store: S,
    loader: L,
    config: AuthConfig,
    _payload: PhantomData<fn() -> T>,
}

impl<S, L, T> SessionAuthenticator<S, L, T>
where
    S: AuthStore,
    L: LoadUser<T>,
{
    /// Create a new session authenticator.
    pub fn new(store: S, loader: L, config: AuthConfig) -> Self {
        Self {
            store,
            loader,
            config,
            _payload: PhantomData,
        }
    }

    /// The configuration this strategy was constructed with.
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Decode a cookie value into the session identifier it carries.
    fn decode_session_id(value: &str) -> Result<Uuid> {
        let raw = TokenCodec::decode_str(value)?;
        Uuid::parse_str(&raw)
            .map_err(|e| AuthError::malformed("session cookie does not carry a session id")
                .with_details(e.to_string()))
    }

    /// Encode a session identifier into its cookie carrier value.
    ///
    /// Exposed for login flows, which create the session row outside this
    /// engine but must hand the client a carrier this strategy can decode.
    pub fn encode_session_id(id: Uuid) -> String {
        TokenCodec::encode(id.to_string().as_bytes())
    }
}

#[async_trait]
impl<S, L, T> Authenticator<T> for SessionAuthenticator<S, L, T>
where
    S: AuthStore,
    L: LoadUser<T>,
    T: Clone + Send + Sync + 'static,
{
    async fn authenticate(&self, _response: &mut HeaderMap, request: &Parts) -> Result<User<T>> {
        let Some(value) = cookie::get(&request.headers, &self.config.cookie_name) else {
            return Err(AuthError::unauthorized());
        };

        let session_id = Self::decode_session_id(value).inspect_err(|_| {
            security_event!(
                SecurityEvent::MalformedCredential,
                cookie = %self.config.cookie_name,
                "Session cookie failed decoding"
            );
        })?;

        let mut tx = self.store.begin().await?;
        let session = tx.find_session_by_id(session_id).await?;

        // An unknown session and an expired one must look identical to the
        // caller: never leak which identifiers exist.
        let session = match session {
            Some(s) if !s.is_expired(Utc::now()) => s,
            _ => {
                tx.rollback().await?;
                security_event!(
                    SecurityEvent::AuthenticationFailure,
                    session_id = %session_id,
                    "Session unknown or expired"
                );
                return Err(AuthError::unauthorized());
            }
        };

        // Read-only transactions still commit deterministically to release
        // the connection; a commit failure is an Internal condition.
        tx.commit().await?;

        let data = self.loader.load(session.user_id).await?;

        security_event!(
            SecurityEvent::AuthenticationSuccess,
            user_id = %session.user_id,
            session_id = %session.id,
            "Session resolved to user"
        );

        Ok(User::new(session.user_id, data))
    }

    async fn log_out(&self, response: &mut HeaderMap, request: &Parts) -> Result<()> {
        let Some(user) = User::<T>::from_request(request) else {
            return Err(AuthError::unauthorized());
        };
        let user_id = user.id;

        let result = async {
            let mut tx = self.store.begin().await?;
            let expired = tx.expire_sessions_by_user(user_id).await?;
            tx.commit().await?;
            Ok::<u64, AuthError>(expired)
        }
        .await;

        // The client cookie is cleared even when the server-side expire
        // fails, so a broken store never strands a stale credential on the
        // client. The error still propagates.
        cookie::delete(response, &self.config.cookie_name);

        let expired = result?;

        security_event!(
            SecurityEvent::SessionDestroyed,
            user_id = %user_id,
            sessions_expired = expired,
            "Sessions expired on logout"
        );
        security_event!(
            SecurityEvent::Logout,
            user_id = %user_id,
            "User logged out"
        );

        Ok(())
    }
}

//! Authenticator abstraction
//!
//! The generic contract every authentication strategy satisfies, so the rest
//! of an application depends on the capability, not on a concrete strategy.
//! The cookie-backed session strategy in [`crate::session`] is one
//! implementation; bearer-token or OAuth strategies would implement the same
//! trait and be selected by configuration.
//!
//! # Parametric user payload
//!
//! `T` is the application-defined user payload. The engine resolves a stable
//! user identifier; turning that identifier into `T` is the job of the
//! injected [`LoadUser`] seam, keeping the core agnostic to application user
//! fields. Strategies that do not need a payload use `()` with the
//! [`NoUserData`] loader.
//!
//! # Usage
//!
//! ```ignore
//! use postern::{Authenticator, SessionAuthenticator};
//!
//! async fn handler<A: Authenticator<Profile>>(auth: &A, parts: &Parts) {
//!     let mut response_headers = HeaderMap::new();
//!     match auth.authenticate(&mut response_headers, parts).await {
//!         Ok(user) => { /* user.id, user.data */ }
//!         Err(err) => { /* err.kind maps to a status code */ }
//!     }
//! }
//! ```

use async_trait::async_trait;
use axum::http::{request::Parts, HeaderMap};
use uuid::Uuid;

use crate::error::Result;

/// An identified user: stable identifier plus application payload.
#[derive(Debug, Clone, PartialEq)]
pub struct User<T> {
    /// Stable unique identifier
    pub id: Uuid,
    /// Application-defined payload
    pub data: T,
}

impl<T> User<T> {
    /// Create a new user value.
    pub fn new(id: Uuid, data: T) -> Self {
        Self { id, data }
    }
}

impl<T: Clone + Send + Sync + 'static> User<T> {
    /// Read the resolved user from request extensions, if middleware has
    /// placed one there.
    pub fn from_request(parts: &Parts) -> Option<&Self> {
        parts.extensions.get::<Self>()
    }
}

/// Contract every authentication strategy satisfies.
///
/// `response` is the outbound header sink strategies use for client-side
/// credential cleanup (cookie deletion); `request` carries the inbound
/// credential and, for `log_out`, the previously resolved user in its
/// extensions.
#[async_trait]
pub trait Authenticator<T>: Send + Sync {
    /// Resolve the request's credential to a user.
    ///
    /// Missing, unknown, or expired credentials fail `Unauthorized`;
    /// undecodable credentials fail `Malformed`; infrastructure failures
    /// surface as `Internal`.
    async fn authenticate(&self, response: &mut HeaderMap, request: &Parts) -> Result<User<T>>;

    /// Terminate the caller's current credential.
    ///
    /// Requires an already-resolved [`User`] in the request extensions,
    /// else `Unauthorized`.
    async fn log_out(&self, response: &mut HeaderMap, request: &Parts) -> Result<()>;
}

/// Seam turning a stable user identifier into the application payload.
#[async_trait]
pub trait LoadUser<T>: Send + Sync {
    /// Load the payload for `user_id`. Failures surface as `Internal`.
    async fn load(&self, user_id: Uuid) -> Result<T>;
}

/// Loader for strategies that carry no user payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoUserData;

#[async_trait]
impl LoadUser<()> for NoUserData {
    async fn load(&self, _user_id: Uuid) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_user(user: User<String>) -> Parts {
        let mut request = Request::new(());
        request.extensions_mut().insert(user);
        request.into_parts().0
    }

    #[test]
    fn test_user_from_request() {
        let user = User::new(Uuid::new_v4(), "payload".to_string());
        let parts = parts_with_user(user.clone());
        assert_eq!(User::<String>::from_request(&parts), Some(&user));
    }

    #[test]
    fn test_user_absent_from_request() {
        let parts = Request::new(()).into_parts().0;
        assert_eq!(User::<String>::from_request(&parts), None);
    }

    #[tokio::test]
    async fn test_no_user_data_loader() {
        let loaded = NoUserData.load(Uuid::new_v4()).await.unwrap();
        assert_eq!(loaded, ());
    }
}

//! Persistence surface
//!
//! The engine never talks to a database directly; it talks to [`AuthStore`],
//! an injected abstraction exposing transactional units of work. All
//! coordination between concurrent requests is pushed to the store: there is
//! no in-process mutable state and no in-memory locking in the engine itself.
//!
//! # Transaction discipline
//!
//! Every logical operation (authenticate, confirm-reset) runs all of its
//! reads and writes inside one [`AuthTx`], so partial effects are never
//! observable. A transaction dropped without [`AuthTx::commit`] rolls back;
//! this also covers caller cancellation, where the in-flight future is
//! dropped mid-operation.
//!
//! # Single-use enforcement
//!
//! [`AuthTx::consume_reset_token`] is a conditional update: it succeeds only
//! if the token was unconsumed at execution time and reports that through its
//! return value. Implementations must not express it as a check-then-act pair
//! of separate statements.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;

/// An active authenticated context, created at login outside this engine.
///
/// One session row maps to exactly one cookie value at a time; expiring a
/// session invalidates every cookie referencing it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Session {
    /// Unique identifier, used as the lookup key
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Hard expiry; a session at or past this instant is invalid
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session has expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A single-use credential-reset grant.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct ResetToken {
    /// Unique identifier
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Encoded secret value as transported to the user
    pub secret: String,
    /// Issuance time
    pub created_at: DateTime<Utc>,
    /// Hard expiry; tokens invalidate naturally without deletion
    pub expires_at: DateTime<Utc>,
    /// Set exactly once when the token is consumed
    pub consumed_at: Option<DateTime<Utc>>,
}

impl ResetToken {
    /// Whether the token has expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the token has already been consumed.
    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }
}

/// The account row fields this engine reads.
///
/// The user record is owned by the application; the engine only resolves it
/// by email during a reset request.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct UserRecord {
    /// Stable unique identifier
    pub id: Uuid,
    /// Account email, the reset-request lookup key
    pub email: String,
}

/// Transactional store consumed by the engine.
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Open a transaction. Dropped uncommitted transactions roll back.
    async fn begin(&self) -> Result<Box<dyn AuthTx>>;
}

/// A unit of work against the store.
///
/// All methods are suspension points; callers propagate cancellation by
/// dropping the future, which releases the transaction.
#[async_trait]
pub trait AuthTx: Send {
    /// Look up a session by its identifier.
    async fn find_session_by_id(&mut self, id: Uuid) -> Result<Option<Session>>;

    /// Expire all of a user's sessions in one mutating query.
    ///
    /// Returns the number of sessions expired.
    async fn expire_sessions_by_user(&mut self, user_id: Uuid) -> Result<u64>;

    /// Resolve an account by email.
    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<UserRecord>>;

    /// Invalidate all unconsumed reset tokens for a user.
    ///
    /// Returns the number of tokens revoked.
    async fn revoke_reset_tokens(&mut self, user_id: Uuid) -> Result<u64>;

    /// Persist a new reset token; returns its identifier.
    async fn insert_reset_token(
        &mut self,
        user_id: Uuid,
        secret: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Uuid>;

    /// Look up a reset token by its encoded secret.
    async fn find_reset_token(&mut self, secret: &str) -> Result<Option<ResetToken>>;

    /// Mark a token consumed, if and only if it is not already.
    ///
    /// Compare-and-set: returns `true` when this call performed the
    /// transition, `false` when another transaction got there first.
    async fn consume_reset_token(&mut self, id: Uuid) -> Result<bool>;

    /// Replace the user's password hash.
    async fn update_user_password(&mut self, user_id: Uuid, password_hash: &str) -> Result<()>;

    /// Commit the transaction. Failure surfaces as `Internal`.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Roll back the transaction explicitly.
    async fn rollback(self: Box<Self>) -> Result<()>;
}

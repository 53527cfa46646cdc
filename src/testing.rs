//! Test support
//!
//! An in-memory [`AuthStore`] with real transaction semantics, fault
//! injection hooks, and (behind the `postgres` feature) schema helpers for
//! integration tests against a live database.
//!
//! # MemoryAuthStore
//!
//! Transactions are serializable: [`MemoryAuthStore::begin`] hands out an
//! async lock held for the whole unit of work, so concurrent callers
//! interleave at transaction granularity exactly like `SERIALIZABLE`
//! isolation would. Each transaction snapshots the state on begin and
//! restores it on rollback, on a simulated commit failure, or on drop
//! without commit. That makes atomicity properties observable in unit
//! tests without a database.
//!
//! # Usage
//!
//! ```ignore
//! let store = MemoryAuthStore::default();
//! let user_id = store.add_user("user@example.com");
//! store.fail_commit(true); // next commits fail and roll back
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::crypto::constant_time_str_eq;
use crate::error::{AuthError, Result};
use crate::reset::PasswordHasher;
use crate::store::{AuthStore, AuthTx, ResetToken, Session, UserRecord};

#[derive(Debug, Clone, Default)]
struct State {
    users: Vec<UserRecord>,
    sessions: Vec<Session>,
    tokens: Vec<ResetToken>,
    password_hashes: HashMap<Uuid, String>,
    password_updates: HashMap<Uuid, u64>,
}

#[derive(Debug, Default)]
struct Faults {
    commit: bool,
    consume_token: bool,
    update_password: bool,
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<State>,
    faults: Mutex<Faults>,
    begin_count: AtomicUsize,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("memory store state lock poisoned")
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().expect("memory store fault lock poisoned")
    }
}

/// In-memory transactional store for tests.
#[derive(Clone, Default)]
pub struct MemoryAuthStore {
    tx_lock: Arc<tokio::sync::Mutex<()>>,
    inner: Arc<Inner>,
}

impl MemoryAuthStore {
    /// Seed a user; returns its identifier.
    pub fn add_user(&self, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.state().users.push(UserRecord {
            id,
            email: email.to_string(),
        });
        id
    }

    /// Seed a session for a user; returns its identifier.
    pub fn add_session(&self, user_id: Uuid, expires_at: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.state().sessions.push(Session {
            id,
            user_id,
            created_at: Utc::now(),
            expires_at,
        });
        id
    }

    /// Current state of a session, committed view.
    pub fn session(&self, id: Uuid) -> Option<Session> {
        self.inner.state().sessions.iter().find(|s| s.id == id).cloned()
    }

    /// All reset tokens held for a user, committed view.
    pub fn reset_tokens_for(&self, user_id: Uuid) -> Vec<ResetToken> {
        self.inner
            .state()
            .tokens
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    /// The stored password hash for a user, if one was ever written.
    pub fn password_hash(&self, user_id: Uuid) -> Option<String> {
        self.inner.state().password_hashes.get(&user_id).cloned()
    }

    /// How many password updates for a user survived a commit.
    pub fn password_update_count(&self, user_id: Uuid) -> u64 {
        self.inner
            .state()
            .password_updates
            .get(&user_id)
            .copied()
            .unwrap_or(0)
    }

    /// How many transactions have been opened.
    pub fn begin_count(&self) -> usize {
        self.inner.begin_count.load(Ordering::SeqCst)
    }

    /// Make subsequent commits fail and roll back.
    pub fn fail_commit(&self, fail: bool) {
        self.inner.faults().commit = fail;
    }

    /// Make subsequent token consumptions fail.
    pub fn fail_consume_token(&self, fail: bool) {
        self.inner.faults().consume_token = fail;
    }

    /// Make subsequent password updates fail.
    pub fn fail_update_password(&self, fail: bool) {
        self.inner.faults().update_password = fail;
    }
}

#[async_trait]
impl AuthStore for MemoryAuthStore {
    async fn begin(&self) -> Result<Box<dyn AuthTx>> {
        self.inner.begin_count.fetch_add(1, Ordering::SeqCst);
        let guard = Arc::clone(&self.tx_lock).lock_owned().await;
        let snapshot = self.inner.state().clone();
        Ok(Box::new(MemoryTx {
            _guard: guard,
            inner: Arc::clone(&self.inner),
            snapshot: Some(snapshot),
        }))
    }
}

/// One serializable unit of work against a [`MemoryAuthStore`].
///
/// Holds the store-wide lock for its lifetime and a begin-time snapshot for
/// rollback. Dropping the transaction without committing restores the
/// snapshot, mirroring a real database rolling back an abandoned
/// transaction.
struct MemoryTx {
    _guard: OwnedMutexGuard<()>,
    inner: Arc<Inner>,
    snapshot: Option<State>,
}

impl MemoryTx {
    fn restore_snapshot(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.inner.state() = snapshot;
        }
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        self.restore_snapshot();
    }
}

#[async_trait]
impl AuthTx for MemoryTx {
    async fn find_session_by_id(&mut self, id: Uuid) -> Result<Option<Session>> {
        Ok(self.inner.state().sessions.iter().find(|s| s.id == id).cloned())
    }

    async fn expire_sessions_by_user(&mut self, user_id: Uuid) -> Result<u64> {
        let now = Utc::now();
        let mut expired = 0;
        for session in &mut self.inner.state().sessions {
            if session.user_id == user_id && !session.is_expired(now) {
                session.expires_at = now;
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .inner
            .state()
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn revoke_reset_tokens(&mut self, user_id: Uuid) -> Result<u64> {
        let now = Utc::now();
        let mut revoked = 0;
        for token in &mut self.inner.state().tokens {
            if token.user_id == user_id && !token.is_consumed() && !token.is_expired(now) {
                token.expires_at = now;
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn insert_reset_token(
        &mut self,
        user_id: Uuid,
        secret: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.inner.state().tokens.push(ResetToken {
            id,
            user_id,
            secret: secret.to_string(),
            created_at: Utc::now(),
            expires_at,
            consumed_at: None,
        });
        Ok(id)
    }

    async fn find_reset_token(&mut self, secret: &str) -> Result<Option<ResetToken>> {
        // Constant-time comparison over every row, same as a real store
        // comparing against an indexed digest would avoid timing leaks.
        Ok(self
            .inner
            .state()
            .tokens
            .iter()
            .find(|t| constant_time_str_eq(&t.secret, secret))
            .cloned())
    }

    async fn consume_reset_token(&mut self, id: Uuid) -> Result<bool> {
        if self.inner.faults().consume_token {
            return Err(AuthError::internal_msg("simulated consume failure"));
        }
        let mut state = self.inner.state();
        match state
            .tokens
            .iter_mut()
            .find(|t| t.id == id && !t.is_consumed())
        {
            Some(token) => {
                token.consumed_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_user_password(&mut self, user_id: Uuid, password_hash: &str) -> Result<()> {
        if self.inner.faults().update_password {
            return Err(AuthError::internal_msg("simulated password update failure"));
        }
        let mut state = self.inner.state();
        state
            .password_hashes
            .insert(user_id, password_hash.to_string());
        *state.password_updates.entry(user_id).or_insert(0) += 1;
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        if self.inner.faults().commit {
            self.restore_snapshot();
            return Err(AuthError::internal_msg("simulated commit failure"));
        }
        // Discarding the snapshot makes the writes permanent.
        self.snapshot = None;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        self.restore_snapshot();
        Ok(())
    }
}

/// Transparent hasher for tests; the hash is the password with a marker
/// prefix so assertions can check exactly what was stored.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainHasher;

impl PasswordHasher for PlainHasher {
    fn hash(&self, password: &str) -> Result<String> {
        Ok(format!("plain:{password}"))
    }
}

// ============================================================================
// Postgres schema helpers
// ============================================================================

/// Schema for the tables the engine touches, for integration test databases.
#[cfg(feature = "postgres")]
pub const SCHEMA_SQL: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        expires_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reset_tokens (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        secret TEXT NOT NULL UNIQUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        expires_at TIMESTAMPTZ NOT NULL,
        consumed_at TIMESTAMPTZ
    )
    "#,
];

/// Create the engine's tables if they do not exist.
#[cfg(feature = "postgres")]
pub async fn init_schema(pool: &sqlx::PgPool) -> Result<()> {
    for statement in SCHEMA_SQL {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// Empty every table, keeping the schema.
#[cfg(feature = "postgres")]
pub async fn truncate_all_tables(pool: &sqlx::PgPool) -> Result<()> {
    sqlx::query("TRUNCATE users, sessions, reset_tokens CASCADE")
        .execute(pool)
        .await?;
    Ok(())
}

/// Drop every table the engine owns.
#[cfg(feature = "postgres")]
pub async fn drop_all_tables(pool: &sqlx::PgPool) -> Result<()> {
    sqlx::query("DROP TABLE IF EXISTS reset_tokens, sessions, users CASCADE")
        .execute(pool)
        .await?;
    Ok(())
}

/// Drop and recreate the schema for a clean-slate test run.
#[cfg(feature = "postgres")]
pub async fn reset_schema(pool: &sqlx::PgPool) -> Result<()> {
    drop_all_tables(pool).await?;
    init_schema(pool).await
}

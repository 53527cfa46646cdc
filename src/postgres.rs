//! PostgreSQL-backed store
//!
//! Implements [`AuthStore`] over a sqlx connection pool. Each [`AuthTx`]
//! wraps one database transaction; dropping it uncommitted rolls back, which
//! is sqlx's own transaction semantics, so cancellation safety falls out of
//! the driver.
//!
//! Single-use consumption is expressed as a conditional `UPDATE` gated on
//! `consumed_at IS NULL` and judged by its row count. Under concurrent
//! confirms the database serializes the two updates and exactly one reports
//! a row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::Result;
use crate::store::{AuthStore, AuthTx, ResetToken, Session, UserRecord};

/// [`AuthStore`] over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgAuthStore {
    pool: PgPool,
}

impl PgAuthStore {
    /// Create a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for health checks and application queries.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AuthStore for PgAuthStore {
    async fn begin(&self) -> Result<Box<dyn AuthTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgAuthTx { tx }))
    }
}

struct PgAuthTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl AuthTx for PgAuthTx {
    async fn find_session_by_id(&mut self, id: Uuid) -> Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT id, user_id, created_at, expires_at FROM sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(session)
    }

    async fn expire_sessions_by_user(&mut self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE sessions SET expires_at = now() \
             WHERE user_id = $1 AND expires_at > now()",
        )
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(user)
    }

    async fn revoke_reset_tokens(&mut self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE reset_tokens SET expires_at = now() \
             WHERE user_id = $1 AND consumed_at IS NULL AND expires_at > now()",
        )
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn insert_reset_token(
        &mut self,
        user_id: Uuid,
        secret: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO reset_tokens (user_id, secret, expires_at) \
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(user_id)
        .bind(secret)
        .bind(expires_at)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn find_reset_token(&mut self, secret: &str) -> Result<Option<ResetToken>> {
        let token = sqlx::query_as::<_, ResetToken>(
            "SELECT id, user_id, secret, created_at, expires_at, consumed_at \
             FROM reset_tokens WHERE secret = $1",
        )
        .bind(secret)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(token)
    }

    async fn consume_reset_token(&mut self, id: Uuid) -> Result<bool> {
        // The WHERE clause is the whole single-use guarantee: the row count
        // tells us whether this statement performed the transition.
        let result = sqlx::query(
            "UPDATE reset_tokens SET consumed_at = now() \
             WHERE id = $1 AND consumed_at IS NULL",
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_user_password(&mut self, user_id: Uuid, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use chrono::Duration;

    async fn connect() -> PgAuthStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPool::connect(&url).await.expect("connect");
        testing::reset_schema(&pool).await.expect("schema");
        PgAuthStore::new(pool)
    }

    async fn seed_user(store: &PgAuthStore, email: &str) -> Uuid {
        sqlx::query_scalar("INSERT INTO users (email) VALUES ($1) RETURNING id")
            .bind(email)
            .fetch_one(store.pool())
            .await
            .expect("seed user")
    }

    #[tokio::test]
    #[ignore = "requires a live PostgreSQL via DATABASE_URL"]
    async fn test_session_lookup_round_trip() {
        let store = connect().await;
        let user_id = seed_user(&store, "pg@example.com").await;

        let session_id: Uuid = sqlx::query_scalar(
            "INSERT INTO sessions (user_id, expires_at) VALUES ($1, $2) RETURNING id",
        )
        .bind(user_id)
        .bind(Utc::now() + Duration::hours(1))
        .fetch_one(store.pool())
        .await
        .expect("seed session");

        let mut tx = store.begin().await.unwrap();
        let session = tx.find_session_by_id(session_id).await.unwrap().unwrap();
        assert_eq!(session.user_id, user_id);

        let expired = tx.expire_sessions_by_user(user_id).await.unwrap();
        assert_eq!(expired, 1);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a live PostgreSQL via DATABASE_URL"]
    async fn test_consume_token_is_single_use() {
        let store = connect().await;
        let user_id = seed_user(&store, "pg-token@example.com").await;

        let mut tx = store.begin().await.unwrap();
        let token_id = tx
            .insert_reset_token(user_id, "secret-value", Utc::now() + Duration::minutes(15))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.consume_reset_token(token_id).await.unwrap());
        assert!(!tx.consume_reset_token(token_id).await.unwrap());
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a live PostgreSQL via DATABASE_URL"]
    async fn test_uncommitted_insert_rolls_back() {
        let store = connect().await;
        let user_id = seed_user(&store, "pg-rollback@example.com").await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_reset_token(user_id, "doomed", Utc::now() + Duration::minutes(15))
                .await
                .unwrap();
            // Dropped without commit.
        }

        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_reset_token("doomed").await.unwrap().is_none());
        tx.rollback().await.unwrap();
    }
}

//! Database connection infrastructure
//!
//! Connection pooling for the PostgreSQL-backed store with conservative,
//! security-minded defaults: bounded pool size, aggressive timeouts, SSL
//! required unless explicitly relaxed, and a health check on startup.

use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{AuthError, Result};
use crate::parse::parse_duration;

/// Connection pool configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database connection URL (from DATABASE_URL env var)
    pub database_url: String,

    /// Maximum number of connections in the pool
    /// Default: 10
    pub max_connections: u32,

    /// Minimum number of idle connections to maintain
    /// Default: 1
    pub min_connections: u32,

    /// Maximum time to wait for a connection from the pool
    /// Default: 30 seconds
    pub acquire_timeout: Duration,

    /// Maximum lifetime of a connection before it's closed
    /// Default: 30 minutes
    pub max_lifetime: Duration,

    /// Maximum idle time before a connection is closed
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// SSL mode for connections
    /// Default: Require
    pub ssl_mode: SslMode,

    /// Path to SSL root certificate (CA) for verification
    pub ssl_root_cert: Option<String>,
}

/// SSL/TLS mode for database connections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslMode {
    /// Never use SSL (development only!)
    Disable,
    /// Use SSL if available, but don't require it
    Prefer,
    /// Require SSL connection
    Require,
    /// Require SSL and verify server certificate
    VerifyCa,
    /// Require SSL, verify certificate, and verify hostname
    VerifyFull,
}

impl Default for SslMode {
    fn default() -> Self {
        // Session and token traffic is credential material; connections to
        // the store are encrypted unless explicitly relaxed.
        Self::Require
    }
}

impl From<SslMode> for PgSslMode {
    fn from(mode: SslMode) -> Self {
        match mode {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Prefer => PgSslMode::Prefer,
            SslMode::Require => PgSslMode::Require,
            SslMode::VerifyCa => PgSslMode::VerifyCa,
            SslMode::VerifyFull => PgSslMode::VerifyFull,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            max_lifetime: Duration::from_secs(30 * 60),
            idle_timeout: Duration::from_secs(10 * 60),
            ssl_mode: SslMode::Require,
            ssl_root_cert: None,
        }
    }
}

impl DatabaseConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DATABASE_URL`: PostgreSQL connection URL (required)
    /// - `DB_MAX_CONNECTIONS`: Max pool size (default: 10)
    /// - `DB_MIN_CONNECTIONS`: Min idle connections (default: 1)
    /// - `DB_ACQUIRE_TIMEOUT`: Connection acquire timeout (default: "30s")
    /// - `DB_MAX_LIFETIME`: Max connection lifetime (default: "30m")
    /// - `DB_IDLE_TIMEOUT`: Idle connection timeout (default: "10m")
    /// - `DB_SSL_MODE`: disable|prefer|require|verify-ca|verify-full (default: require)
    /// - `DB_SSL_ROOT_CERT`: Path to CA certificate for verify-ca/verify-full modes
    ///
    /// # Panics
    ///
    /// Panics if DATABASE_URL is not set.
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL environment variable must be set");

        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let min_connections = std::env::var("DB_MIN_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);

        let acquire_timeout = std::env::var("DB_ACQUIRE_TIMEOUT")
            .ok()
            .and_then(|s| parse_duration(&s))
            .unwrap_or(Duration::from_secs(30));

        let max_lifetime = std::env::var("DB_MAX_LIFETIME")
            .ok()
            .and_then(|s| parse_duration(&s))
            .unwrap_or(Duration::from_secs(30 * 60));

        let idle_timeout = std::env::var("DB_IDLE_TIMEOUT")
            .ok()
            .and_then(|s| parse_duration(&s))
            .unwrap_or(Duration::from_secs(10 * 60));

        let ssl_mode = std::env::var("DB_SSL_MODE")
            .map(|s| match s.to_lowercase().as_str() {
                "disable" => SslMode::Disable,
                "prefer" => SslMode::Prefer,
                "require" => SslMode::Require,
                "verify-ca" | "verifyca" => SslMode::VerifyCa,
                "verify-full" | "verifyfull" => SslMode::VerifyFull,
                _ => SslMode::Require,
            })
            .unwrap_or(SslMode::Require);

        let ssl_root_cert = std::env::var("DB_SSL_ROOT_CERT").ok();

        Self {
            database_url,
            max_connections,
            min_connections,
            acquire_timeout,
            max_lifetime,
            idle_timeout,
            ssl_mode,
            ssl_root_cert,
        }
    }

    /// Create a new builder for programmatic configuration.
    pub fn builder(database_url: impl Into<String>) -> DatabaseConfigBuilder {
        DatabaseConfigBuilder::new(database_url)
    }

    /// Check if SSL is required for this configuration.
    pub fn requires_ssl(&self) -> bool {
        !matches!(self.ssl_mode, SslMode::Disable | SslMode::Prefer)
    }
}

/// Builder for DatabaseConfig
#[derive(Debug, Clone)]
pub struct DatabaseConfigBuilder {
    config: DatabaseConfig,
}

impl DatabaseConfigBuilder {
    /// Create a new builder with the required database URL.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            config: DatabaseConfig {
                database_url: database_url.into(),
                ..Default::default()
            },
        }
    }

    /// Set maximum connections (default: 10)
    pub fn max_connections(mut self, n: u32) -> Self {
        self.config.max_connections = n;
        self
    }

    /// Set minimum idle connections (default: 1)
    pub fn min_connections(mut self, n: u32) -> Self {
        self.config.min_connections = n;
        self
    }

    /// Set connection acquire timeout
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.config.acquire_timeout = timeout;
        self
    }

    /// Set SSL mode
    pub fn ssl_mode(mut self, mode: SslMode) -> Self {
        self.config.ssl_mode = mode;
        self
    }

    /// Require SSL with full verification (production)
    pub fn require_ssl(self) -> Self {
        self.ssl_mode(SslMode::VerifyFull)
    }

    /// Build the configuration
    pub fn build(self) -> DatabaseConfig {
        self.config
    }
}

/// Create a connection pool with the given configuration.
///
/// Parses the URL, applies SSL settings and pool limits, then verifies the
/// pool with a health check before handing it back.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    info!(
        max_connections = config.max_connections,
        ssl_mode = ?config.ssl_mode,
        "Initializing database connection pool"
    );

    let mut connect_options = PgConnectOptions::from_str(&config.database_url)
        .map_err(|e| AuthError::internal("invalid DATABASE_URL", e))?
        .ssl_mode(config.ssl_mode.into());

    if let Some(ref root_cert) = config.ssl_root_cert {
        connect_options = connect_options.ssl_root_cert(root_cert);
        info!(ssl_root_cert = %root_cert, "Using SSL root certificate for verification");
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .max_lifetime(config.max_lifetime)
        .idle_timeout(config.idle_timeout)
        .test_before_acquire(true)
        .connect_with(connect_options)
        .await
        .map_err(|e| AuthError::internal("failed to connect to database", e))?;

    health_check(&pool).await?;

    info!("Database connection pool initialized successfully");

    Ok(pool)
}

/// Perform a health check on the database connection.
pub async fn health_check(pool: &PgPool) -> Result<HealthStatus> {
    let start = std::time::Instant::now();

    let result: (i32,) = sqlx::query_as("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| AuthError::internal("health check query failed", e))?;

    if result.0 != 1 {
        return Err(AuthError::internal_msg("unexpected health check result"));
    }

    let ssl_result: (bool,) = sqlx::query_as(
        "SELECT COALESCE((SELECT ssl FROM pg_stat_ssl WHERE pid = pg_backend_pid()), false)",
    )
    .fetch_one(pool)
    .await
    .unwrap_or((false,));

    let latency = start.elapsed();
    let status = HealthStatus {
        connected: true,
        ssl_enabled: ssl_result.0,
        latency,
        pool_size: pool.size(),
        idle_connections: pool.num_idle() as u32,
    };

    if status.ssl_enabled {
        info!(latency_ms = ?latency.as_millis(), "Database health check passed (SSL enabled)");
    } else {
        warn!(latency_ms = ?latency.as_millis(), "Database health check passed (SSL NOT enabled)");
    }

    Ok(status)
}

/// Database health status
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Connection is alive
    pub connected: bool,
    /// SSL/TLS is in use
    pub ssl_enabled: bool,
    /// Query latency
    pub latency: Duration,
    /// Current pool size
    pub pool_size: u32,
    /// Idle connections in pool
    pub idle_connections: u32,
}

impl HealthStatus {
    /// Check if the connection is secure (SSL enabled)
    pub fn is_secure(&self) -> bool {
        self.connected && self.ssl_enabled
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.connected && self.latency < Duration::from_secs(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_requires_ssl() {
        let config = DatabaseConfig::default();
        assert_eq!(config.ssl_mode, SslMode::Require);
        assert!(config.requires_ssl());
    }

    #[test]
    fn test_builder_overrides() {
        let config = DatabaseConfig::builder("postgres://localhost/postern")
            .max_connections(5)
            .ssl_mode(SslMode::Disable)
            .build();
        assert_eq!(config.max_connections, 5);
        assert!(!config.requires_ssl());
    }

    #[test]
    fn test_ssl_mode_mapping() {
        assert!(matches!(
            PgSslMode::from(SslMode::Disable),
            PgSslMode::Disable
        ));
        assert!(matches!(
            PgSslMode::from(SslMode::VerifyFull),
            PgSslMode::VerifyFull
        ));
    }
}

//! # Postern
//!
//! Credential and session verification engine for Axum applications.
//!
//! Postern answers one question on every request: "who is making this
//! request, and should they be allowed to proceed?" It resolves inbound
//! credentials to users through a pluggable strategy abstraction and manages
//! the password-reset lifecycle with single-use, expiring tokens.
//!
//! ## Features
//!
//! - **Authenticator abstraction**: one trait every strategy satisfies, so
//!   applications depend on the capability, not a concrete mechanism
//! - **Cookie-backed sessions**: opaque base64 session identifiers resolved
//!   through a transactional store, with logout that always clears the
//!   client cookie
//! - **Password reset**: single-use tokens enforced by compare-and-set at
//!   the store, atomic consume-plus-update, no account-existence leaks
//! - **Security events**: structured JSON audit logs with tracing
//! - **PostgreSQL store** (feature `postgres`): sqlx-backed implementation
//!   with SSL-required pooling and health checks
//! - **Test store**: in-memory [`testing::MemoryAuthStore`] with real
//!   transaction semantics and fault injection
//!
//! ## Quick Start
//!
//! ```ignore
//! use postern::{
//!     create_pool, AuthConfig, Authenticator, DatabaseConfig, NoUserData,
//!     PgAuthStore, SessionAuthenticator,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     postern::observability::init();
//!
//!     let pool = create_pool(&DatabaseConfig::from_env()).await?;
//!     let auth = SessionAuthenticator::new(
//!         PgAuthStore::new(pool),
//!         NoUserData,
//!         AuthConfig::from_env(),
//!     );
//!
//!     // In a handler or middleware:
//!     // let user = auth.authenticate(&mut response_headers, &parts).await?;
//!     Ok(())
//! }
//! ```

mod config;
mod cookie;
mod crypto;
#[cfg(feature = "postgres")]
mod database;
mod error;
pub mod observability;
mod parse;
#[cfg(feature = "postgres")]
mod postgres;
mod reset;
mod session;
mod store;
mod strategy;
pub mod testing;
mod token;

// Re-exports
pub use config::{
    AuthConfig, AuthConfigBuilder, DEFAULT_COOKIE_NAME, DEFAULT_TOKEN_EXPIRY,
    DEFAULT_TOKEN_LENGTH,
};
pub use cookie::{delete as delete_cookie, get as get_cookie};
pub use crypto::{constant_time_eq, constant_time_str_eq};
pub use error::{AuthError, ErrorKind, ErrorResponse, Result};
pub use parse::parse_duration;
pub use reset::{IssuedReset, PasswordHasher, PasswordReset};
pub use session::SessionAuthenticator;
pub use store::{AuthStore, AuthTx, ResetToken, Session, UserRecord};
pub use strategy::{Authenticator, LoadUser, NoUserData, User};
pub use token::TokenCodec;

#[cfg(feature = "postgres")]
pub use database::{
    create_pool, health_check, DatabaseConfig, DatabaseConfigBuilder, HealthStatus, SslMode,
};
#[cfg(feature = "postgres")]
pub use postgres::PgAuthStore;

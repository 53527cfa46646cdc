//! Authentication configuration
//!
//! All knobs the engine recognizes, carried as an explicit value passed at
//! construction time. There are no module-level mutable defaults: the cookie
//! name, token entropy, and expiry live here and nowhere else.

use std::time::Duration;

use crate::parse::parse_duration;

/// Default session cookie name
pub const DEFAULT_COOKIE_NAME: &str = "usid";

/// Default reset token entropy in bytes
pub const DEFAULT_TOKEN_LENGTH: usize = 32;

/// Default reset token lifetime
pub const DEFAULT_TOKEN_EXPIRY: Duration = Duration::from_secs(30 * 60);

/// Configuration for the session strategy and the password-reset lifecycle.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Name of the cookie carrying the session credential
    pub cookie_name: String,

    /// Entropy of generated reset tokens, in bytes, before encoding
    pub token_length: usize,

    /// Duration until a reset token expires, measured from issuance
    pub token_expiry: Duration,

    /// Form/query field carrying the account email on reset request
    pub email_field: String,

    /// Form/query field carrying the encoded reset token on confirm
    pub reset_token_field: String,

    /// Form/query field carrying the new password on confirm
    pub password_field: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            token_length: DEFAULT_TOKEN_LENGTH,
            token_expiry: DEFAULT_TOKEN_EXPIRY,
            email_field: "email".to_string(),
            reset_token_field: "reset_token".to_string(),
            password_field: "password".to_string(),
        }
    }
}

impl AuthConfig {
    /// Create a new builder
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::default()
    }

    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `AUTH_COOKIE_NAME`: Session cookie name (default: "usid")
    /// - `RESET_TOKEN_LENGTH`: Token entropy in bytes (default: 32)
    /// - `RESET_TOKEN_EXPIRY`: Token lifetime, e.g. "15m" (default: "30m")
    ///
    /// Unset or unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("AUTH_COOKIE_NAME") {
            if !name.is_empty() {
                config.cookie_name = name;
            }
        }

        if let Some(len) = std::env::var("RESET_TOKEN_LENGTH")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.token_length = len;
        }

        if let Some(expiry) = std::env::var("RESET_TOKEN_EXPIRY")
            .ok()
            .and_then(|s| parse_duration(&s))
        {
            config.token_expiry = expiry;
        }

        config
    }
}

/// Builder for [`AuthConfig`]
#[derive(Debug, Clone, Default)]
pub struct AuthConfigBuilder {
    config: AuthConfig,
}

impl AuthConfigBuilder {
    /// Set the session cookie name
    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.config.cookie_name = name.into();
        self
    }

    /// Set reset token entropy in bytes
    pub fn token_length(mut self, length: usize) -> Self {
        self.config.token_length = length;
        self
    }

    /// Set reset token lifetime
    pub fn token_expiry(mut self, expiry: Duration) -> Self {
        self.config.token_expiry = expiry;
        self
    }

    /// Set the email form field name
    pub fn email_field(mut self, name: impl Into<String>) -> Self {
        self.config.email_field = name.into();
        self
    }

    /// Set the reset token form field name
    pub fn reset_token_field(mut self, name: impl Into<String>) -> Self {
        self.config.reset_token_field = name.into();
        self
    }

    /// Set the password form field name
    pub fn password_field(mut self, name: impl Into<String>) -> Self {
        self.config.password_field = name.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> AuthConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.cookie_name, "usid");
        assert_eq!(config.token_length, 32);
        assert_eq!(config.token_expiry, Duration::from_secs(30 * 60));
        assert_eq!(config.email_field, "email");
        assert_eq!(config.reset_token_field, "reset_token");
        assert_eq!(config.password_field, "password");
    }

    #[test]
    fn test_builder() {
        let config = AuthConfig::builder()
            .cookie_name("session")
            .token_length(48)
            .token_expiry(Duration::from_secs(15 * 60))
            .email_field("account_email")
            .build();

        assert_eq!(config.cookie_name, "session");
        assert_eq!(config.token_length, 48);
        assert_eq!(config.token_expiry, Duration::from_secs(15 * 60));
        assert_eq!(config.email_field, "account_email");
        // Untouched fields keep their defaults
        assert_eq!(config.password_field, "password");
    }
}

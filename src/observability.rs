//! Security Event Logging
//!
//! Structured logging for security-relevant events in the authentication and
//! password-reset flows. Every event carries a stable name, a category, and a
//! severity so downstream log pipelines can filter and alert without parsing
//! free-form messages.
//!
//! # Usage
//!
//! ```ignore
//! use postern::observability::SecurityEvent;
//! use postern::security_event;
//!
//! security_event!(
//!     SecurityEvent::AuthenticationSuccess,
//!     user_id = %user.id,
//!     "User authenticated successfully"
//! );
//! ```

use std::fmt;

/// Security event categories for audit logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEvent {
    /// A session credential resolved to a user
    AuthenticationSuccess,
    /// A session credential was missing, unknown, or expired
    AuthenticationFailure,
    /// User logged out
    Logout,
    /// Session expired or invalidated server-side
    SessionDestroyed,
    /// Password reset token issued
    PasswordResetRequested,
    /// Password updated through the reset flow
    PasswordResetConfirmed,
    /// Confirm attempted with an already-consumed token
    ResetTokenReplayed,
    /// A credential or token value failed decoding
    MalformedCredential,
}

impl SecurityEvent {
    /// Event category for filtering/grouping
    pub fn category(&self) -> &'static str {
        match self {
            Self::AuthenticationSuccess
            | Self::AuthenticationFailure
            | Self::Logout
            | Self::SessionDestroyed => "authentication",

            Self::PasswordResetRequested | Self::PasswordResetConfirmed => "user_management",

            Self::ResetTokenReplayed | Self::MalformedCredential => "security",
        }
    }

    /// Severity level for the event
    pub fn severity(&self) -> Severity {
        match self {
            // Replay of a consumed token means the secret leaked or the
            // legitimate holder retried; either way it warrants attention.
            Self::ResetTokenReplayed => Severity::High,

            Self::AuthenticationFailure | Self::MalformedCredential => Severity::Medium,

            Self::AuthenticationSuccess
            | Self::PasswordResetRequested
            | Self::PasswordResetConfirmed => Severity::Medium,

            Self::Logout | Self::SessionDestroyed => Severity::Low,
        }
    }

    /// Stable event name
    pub fn name(&self) -> &'static str {
        match self {
            Self::AuthenticationSuccess => "authentication_success",
            Self::AuthenticationFailure => "authentication_failure",
            Self::Logout => "logout",
            Self::SessionDestroyed => "session_destroyed",
            Self::PasswordResetRequested => "password_reset_requested",
            Self::PasswordResetConfirmed => "password_reset_confirmed",
            Self::ResetTokenReplayed => "reset_token_replayed",
            Self::MalformedCredential => "malformed_credential",
        }
    }
}

impl fmt::Display for SecurityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Event severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Routine operations
    Low,
    /// Important state changes
    Medium,
    /// Security-relevant failures
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Log a security event with structured fields.
///
/// The macro automatically includes `security_event`, `category`, and
/// `severity` fields and maps severity to a tracing level.
#[macro_export]
macro_rules! security_event {
    ($event:expr, $($field:tt)*) => {{
        let event = $event;
        let severity = event.severity();
        let category = event.category();
        let event_name = event.name();

        match severity {
            $crate::observability::Severity::High => {
                ::tracing::warn!(
                    security_event = event_name,
                    category = category,
                    severity = "high",
                    $($field)*
                );
            }
            $crate::observability::Severity::Medium => {
                ::tracing::info!(
                    security_event = event_name,
                    category = category,
                    severity = "medium",
                    $($field)*
                );
            }
            $crate::observability::Severity::Low => {
                ::tracing::debug!(
                    security_event = event_name,
                    category = category,
                    severity = "low",
                    $($field)*
                );
            }
        }
    }};
}

pub use security_event;

/// Initialize a JSON-formatted tracing subscriber.
///
/// Respects `RUST_LOG` for filtering, defaulting to `info`. Call once at
/// application startup; a second call is a no-op returning `false`.
pub fn init() -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_categories() {
        assert_eq!(SecurityEvent::AuthenticationSuccess.category(), "authentication");
        assert_eq!(SecurityEvent::PasswordResetRequested.category(), "user_management");
        assert_eq!(SecurityEvent::ResetTokenReplayed.category(), "security");
    }

    #[test]
    fn test_event_severity() {
        assert_eq!(SecurityEvent::ResetTokenReplayed.severity(), Severity::High);
        assert_eq!(SecurityEvent::AuthenticationFailure.severity(), Severity::Medium);
        assert_eq!(SecurityEvent::SessionDestroyed.severity(), Severity::Low);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
    }

    #[test]
    fn test_event_name() {
        assert_eq!(SecurityEvent::Logout.name(), "logout");
        assert_eq!(SecurityEvent::ResetTokenReplayed.name(), "reset_token_replayed");
    }
}

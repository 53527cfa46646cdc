//! Typed authentication errors
//!
//! Every failure the engine can produce is a typed sentinel so callers can
//! branch without string matching. Infrastructure failures (transaction
//! begin/commit, query execution) are wrapped with operation context and
//! surfaced as `Internal`; semantic failures carry their own kind.
//!
//! # Error Taxonomy
//!
//! | Kind            | Meaning                                   | Status |
//! |-----------------|-------------------------------------------|--------|
//! | `Unauthorized`  | No, invalid, or expired session           | 401    |
//! | `AuthorizedUser`| Operation disallowed given current auth   | 403    |
//! | `InvalidToken`  | Reset token not found or expired          | 400    |
//! | `UsedResetToken`| Reset token already consumed              | 400    |
//! | `Malformed`     | Undecodable credential or token           | 400    |
//! | `Internal`      | Store or transport failure                | 500    |
//!
//! `InvalidToken` deliberately covers both "not found" and "expired" so a
//! well-formed unknown token and an expired one are indistinguishable to the
//! caller. `UsedResetToken` is kept distinct so confirm flows can give a
//! specific user message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::fmt;

/// Authentication error with a typed kind and wrapped source.
#[derive(Debug)]
pub struct AuthError {
    /// Error kind determines HTTP status and caller branching
    pub kind: ErrorKind,
    /// User-facing message (safe to expose for client-error kinds)
    pub message: String,
    /// Internal details (logged, never exposed)
    pub details: Option<String>,
    /// Original error, kept for logging and `source()` chains
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// Error categories with their transport status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No, invalid, or expired session credential (401)
    Unauthorized,
    /// Operation disallowed for an already-authenticated principal (403)
    AuthorizedUser,
    /// Reset token not found or expired (400)
    InvalidToken,
    /// Reset token already consumed (400)
    UsedResetToken,
    /// Credential or token value failed decoding (400)
    Malformed,
    /// Store or transport failure (500)
    Internal,
}

impl ErrorKind {
    /// HTTP status code for this error kind
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::AuthorizedUser => StatusCode::FORBIDDEN,
            Self::InvalidToken | Self::UsedResetToken | Self::Malformed => StatusCode::BAD_REQUEST,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the message can be exposed to the client verbatim
    pub fn expose_message(&self) -> bool {
        !matches!(self, Self::Internal)
    }
}

impl AuthError {
    /// Create a new error
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// No, invalid, or expired session (401)
    pub fn unauthorized() -> Self {
        Self::new(ErrorKind::Unauthorized, "authentication required")
    }

    /// Operation disallowed for an authenticated principal (403)
    pub fn authorized_user() -> Self {
        Self::new(
            ErrorKind::AuthorizedUser,
            "operation not permitted for an authenticated user",
        )
    }

    /// Reset token not found or expired (400)
    pub fn invalid_token() -> Self {
        Self::new(ErrorKind::InvalidToken, "invalid reset token")
    }

    /// Reset token already consumed (400)
    pub fn used_token() -> Self {
        Self::new(ErrorKind::UsedResetToken, "reset token already used")
    }

    /// Undecodable credential or token value (400)
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Malformed, message)
    }

    /// Store or transport failure (500) with wrapped source
    pub fn internal(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind: ErrorKind::Internal,
            message: message.into(),
            details: Some(source.to_string()),
            source: Some(Box::new(source)),
        }
    }

    /// Store or transport failure (500) without a source
    pub fn internal_msg(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Add internal details (logged but not exposed)
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Shorthand for callers branching on the kind
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    fn log(&self) {
        let details = self.details.as_deref().unwrap_or("none");
        match self.kind {
            ErrorKind::Internal => {
                tracing::error!(
                    error_kind = %self.kind,
                    message = %self.message,
                    details = %details,
                    "Internal error"
                );
            }
            ErrorKind::Unauthorized | ErrorKind::AuthorizedUser => {
                tracing::warn!(
                    error_kind = %self.kind,
                    message = %self.message,
                    "Auth error"
                );
            }
            _ => {
                tracing::debug!(
                    error_kind = %self.kind,
                    message = %self.message,
                    "Client error"
                );
            }
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::AuthorizedUser => write!(f, "authorized_user"),
            Self::InvalidToken => write!(f, "invalid_token"),
            Self::UsedResetToken => write!(f, "used_reset_token"),
            Self::Malformed => write!(f, "malformed"),
            Self::Internal => write!(f, "internal_error"),
        }
    }
}

impl std::error::Error for AuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

/// JSON error response format
#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorResponse {
    /// Error type/code
    pub error: String,
    /// Human-readable message
    pub message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.kind.status_code();
        let message = if self.kind.expose_message() {
            self.message
        } else {
            "An internal error occurred".to_string()
        };

        let response = ErrorResponse {
            error: self.kind.to_string(),
            message,
        };

        (status, Json(response)).into_response()
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        // Never expose database details to the client
        AuthError::internal("database error", err)
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, AuthError>;

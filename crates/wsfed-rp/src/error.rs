//! Federation error types

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Error reported by a pluggable token validator
pub type ValidatorError = Box<dyn std::error::Error + Send + Sync>;

/// Error reported by a dynamic configuration value resolver
pub type ResolverError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by a replay cache backend
#[derive(Debug, Clone, Error)]
pub enum ReplayCacheError {
    /// Backend could not be reached or refused the operation
    #[error("Replay cache unavailable: {0}")]
    Unavailable(String),

    /// Token id rejected by the backend (empty, oversized, ...)
    #[error("Invalid token id: {0}")]
    InvalidId(String),
}

/// Errors that can occur while building sign-in requests or processing
/// sign-in responses
///
/// None of these are retried internally. Callers should deny the
/// authentication and show a generic error page.
#[derive(Debug, Error)]
pub enum FederationError {
    /// Response body is not well-formed XML
    #[error("Malformed sign-in response: {reason}")]
    MalformedResponse { reason: String },

    /// Response envelope has the wrong shape
    #[error("Unexpected element {0}")]
    UnexpectedElement(String),

    /// No token found inside `RequestedSecurityToken`
    #[error("Sign-in response does not contain a security token")]
    MissingToken,

    /// No configured validator claims the token
    #[error("No token validator available for token type {}", .token_type.as_deref().unwrap_or("<undeclared>"))]
    NoValidatorAvailable { token_type: Option<String> },

    /// Validator rejected the token
    #[error("Token validation failed: {0}")]
    TokenValidationFailed(#[source] ValidatorError),

    /// Token id was already accepted once
    #[error("Replay attack with token id: {token_id}")]
    ReplayDetected { token_id: String },

    /// Token lifetime ended (only with [`ExpiryPolicy::Reject`](crate::ExpiryPolicy::Reject))
    #[error("Token expired at {expires}")]
    TokenExpired { expires: DateTime<Utc> },

    /// Token lifetime has not started (only with [`ExpiryPolicy::Reject`](crate::ExpiryPolicy::Reject))
    #[error("Token not valid before {created}")]
    TokenNotYetValid { created: DateTime<Utc> },

    /// Replay cache backend failed
    #[error(transparent)]
    ReplayCacheFailure(#[from] ReplayCacheError),

    /// Sign-in redirect could not be built
    #[error("Failed to create sign-in request: {reason}")]
    RequestBuildFailed {
        reason: String,
        #[source]
        source: Option<ResolverError>,
    },

    /// Issuer URL resolved to nothing
    #[error("No issuer URL configured")]
    MissingIssuer,

    /// Inbound `wa` action is not handled
    #[error("Unsupported federation action: {0}")]
    UnsupportedAction(String),

    /// Required inbound protocol parameter is absent
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
}

impl FederationError {
    /// Create a request build error without an underlying cause
    pub fn request_build(reason: impl Into<String>) -> Self {
        Self::RequestBuildFailed {
            reason: reason.into(),
            source: None,
        }
    }

    /// Whether the error is a trust decision against the presented token
    /// (as opposed to a malformed request or an infrastructure failure)
    pub fn is_security_violation(&self) -> bool {
        matches!(
            self,
            Self::TokenValidationFailed(_)
                | Self::ReplayDetected { .. }
                | Self::TokenExpired { .. }
                | Self::TokenNotYetValid { .. }
        )
    }
}

//! Error taxonomy for the authorization core.
//!
//! Grant-level failures carry no detail about which field was rejected
//! beyond the OAuth2 error code; the outer layer maps `oauth_error_code`
//! onto wire responses.

use thiserror::Error;

/// Unified error type for authorization and token operations.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Malformed or missing request fields
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Unknown client or redirect URI not registered
    #[error("Invalid client: {0}")]
    InvalidClient(String),

    /// Requested scope outside the application's registered set
    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    /// Expired, reused, or unknown code or refresh token; PKCE mismatch
    #[error("Invalid grant")]
    Grant,

    /// Grant type outside the supported set
    #[error("Unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    /// Missing or invalid signing key, unset issuer. Startup-fatal,
    /// never produced per-request.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Token signing failure; a partially-signed token is never returned
    #[error("Signing error: {0}")]
    Signing(String),

    /// Persistence failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal error
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// RFC 6749 error code for wire responses.
    #[must_use]
    pub const fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "invalid_request",
            Self::InvalidClient(_) => "invalid_client",
            Self::InvalidScope(_) => "invalid_scope",
            Self::Grant => "invalid_grant",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::Configuration(_) | Self::Signing(_) | Self::Storage(_) | Self::Internal(_) => {
                "server_error"
            }
        }
    }

    /// Create a validation error.
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an invalid-client error.
    #[must_use]
    pub fn invalid_client(msg: impl Into<String>) -> Self {
        Self::InvalidClient(msg.into())
    }

    /// Create an invalid-scope error.
    #[must_use]
    pub fn invalid_scope(msg: impl Into<String>) -> Self {
        Self::InvalidScope(msg.into())
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a signing error.
    #[must_use]
    pub fn signing(msg: impl Into<String>) -> Self {
        Self::Signing(msg.into())
    }

    /// Create a storage error.
    #[must_use]
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(anyhow::anyhow!(msg.into()))
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AuthError::Signing(err.to_string())
    }
}

// Audit error codes recorded alongside failed operations
/// Authorization code missing, expired, used, or bound to another client.
pub const CODE_INVALID: &str = "AUTH_CODE_INVALID";
/// PKCE verifier did not match the recorded challenge.
pub const PKCE_MISMATCH: &str = "AUTH_PKCE_MISMATCH";
/// Refresh token missing, expired, or revoked.
pub const REFRESH_INVALID: &str = "AUTH_REFRESH_INVALID";
/// Client credentials rejected.
pub const CLIENT_REJECTED: &str = "AUTH_CLIENT_REJECTED";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oauth_error_codes() {
        assert_eq!(
            AuthError::validation("missing code").oauth_error_code(),
            "invalid_request"
        );
        assert_eq!(AuthError::Grant.oauth_error_code(), "invalid_grant");
        assert_eq!(
            AuthError::UnsupportedGrantType("password".to_string()).oauth_error_code(),
            "unsupported_grant_type"
        );
        assert_eq!(
            AuthError::signing("no key").oauth_error_code(),
            "server_error"
        );
    }

    #[test]
    fn test_grant_error_carries_no_detail() {
        assert_eq!(AuthError::Grant.to_string(), "Invalid grant");
    }
}

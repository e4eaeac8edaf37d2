//! Security event records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Authentication-relevant event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityEventType {
    /// An authorization code was minted
    AuthorizationCodeIssued,
    /// An authorization code was redeemed
    AuthorizationCodeUsed,
    /// Redemption was attempted against a missing, expired, used, or
    /// mismatched code
    AuthorizationCodeExpired,
    /// A login attempt succeeded
    LoginSuccess,
    /// A login attempt failed
    LoginFailure,
    /// Access (and possibly ID) token issued via code exchange
    TokenIssued,
    /// Access token reissued via refresh rotation
    TokenRefreshed,
    /// A token was revoked
    TokenRevoked,
}

impl SecurityEventType {
    /// Audit-log code for this event.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCodeIssued => "AUTHORIZATION_CODE_ISSUED",
            Self::AuthorizationCodeUsed => "AUTHORIZATION_CODE_USED",
            Self::AuthorizationCodeExpired => "AUTHORIZATION_CODE_EXPIRED",
            Self::LoginSuccess => "LOGIN_SUCCESS",
            Self::LoginFailure => "LOGIN_FAILURE",
            Self::TokenIssued => "TOKEN_ISSUED",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::TokenRevoked => "TOKEN_REVOKED",
        }
    }
}

/// Caller network context attached to every event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    /// Caller IP address
    pub ip_address: String,
    /// Caller user agent, when supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Context for a caller IP with no user agent.
    #[must_use]
    pub fn from_ip(ip: impl Into<String>) -> Self {
        Self {
            ip_address: ip.into(),
            user_agent: None,
        }
    }
}

/// An append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// Event id
    pub id: String,
    /// Event kind
    pub event_type: SecurityEventType,
    /// Affected user, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Requesting client, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Caller IP address
    pub ip_address: String,
    /// Caller user agent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Whether the audited operation succeeded
    pub success: bool,
    /// Machine-readable failure code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Human-readable failure description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    /// When the event happened
    pub timestamp: DateTime<Utc>,
    /// Free-form metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl SecurityEvent {
    /// Create an event in the given request context.
    #[must_use]
    pub fn new(event_type: SecurityEventType, ctx: &RequestContext, success: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type,
            user_id: None,
            client_id: None,
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            success,
            error_code: None,
            error_description: None,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Attach the affected user.
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Attach the requesting client.
    #[must_use]
    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Attach a failure code and description.
    #[must_use]
    pub fn with_error(
        mut self,
        code: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.error_code = Some(code.into());
        self.error_description = Some(description.into());
        self
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_codes() {
        assert_eq!(
            SecurityEventType::AuthorizationCodeIssued.as_str(),
            "AUTHORIZATION_CODE_ISSUED"
        );
        assert_eq!(SecurityEventType::LoginFailure.as_str(), "LOGIN_FAILURE");
    }

    #[test]
    fn test_event_builder() {
        let ctx = RequestContext {
            ip_address: "203.0.113.9".to_string(),
            user_agent: Some("test-agent".to_string()),
        };

        let event = SecurityEvent::new(SecurityEventType::LoginFailure, &ctx, false)
            .with_user("user-1")
            .with_client("client-1")
            .with_error("AUTH_CLIENT_REJECTED", "bad credentials");

        assert_eq!(event.ip_address, "203.0.113.9");
        assert_eq!(event.user_agent.as_deref(), Some("test-agent"));
        assert!(!event.success);
        assert_eq!(event.error_code.as_deref(), Some("AUTH_CLIENT_REJECTED"));
        assert!(!event.id.is_empty());
    }
}

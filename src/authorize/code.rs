//! Authorization code records.
//!
//! A code moves ISSUED -> USED exactly once, or expires. Validation against
//! a used or expired code fails uniformly; callers never learn which.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A persisted single-use authorization code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    /// The opaque code value handed to the client
    pub code: String,
    /// Client the code was issued to
    pub client_id: String,
    /// Authenticated user the code represents
    pub user_id: String,
    /// Redirect URI recorded at issuance; must match exactly on redemption
    pub redirect_uri: String,
    /// Scopes granted at authorization
    pub scopes: Vec<String>,
    /// PKCE challenge, when the client supplied one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,
    /// PKCE challenge method, present iff a challenge is
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<String>,
    /// OIDC nonce to echo into the ID token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Opaque client state from the authorization request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// When the user authenticated
    pub auth_time: DateTime<Utc>,
    /// Expiry; reaped eventually, never deleted explicitly
    pub expires_at: DateTime<Utc>,
    /// Redemption flag, flipped false -> true exactly once
    pub used: bool,
}

impl AuthorizationCode {
    /// Create a new code record expiring `ttl` from now.
    #[must_use]
    pub fn new(
        code: String,
        client_id: String,
        user_id: String,
        redirect_uri: String,
        scopes: Vec<String>,
        ttl: std::time::Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            code,
            client_id,
            user_id,
            redirect_uri,
            scopes,
            code_challenge: None,
            code_challenge_method: None,
            nonce: None,
            state: None,
            auth_time: now,
            expires_at: now + Duration::from_std(ttl).unwrap_or_else(|_| Duration::seconds(600)),
            used: false,
        }
    }

    /// Attach a PKCE challenge.
    #[must_use]
    pub fn with_challenge(mut self, challenge: String, method: String) -> Self {
        self.code_challenge = Some(challenge);
        self.code_challenge_method = Some(method);
        self
    }

    /// Attach the OIDC nonce.
    #[must_use]
    pub fn with_nonce(mut self, nonce: String) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Attach the client state.
    #[must_use]
    pub fn with_state(mut self, state: String) -> Self {
        self.state = Some(state);
        self
    }

    /// Whether the code TTL has elapsed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Whether the code can still be redeemed.
    #[must_use]
    pub fn is_redeemable(&self) -> bool {
        !self.used && !self.is_expired()
    }

    /// Scopes joined the way the `scope` response field expects.
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}

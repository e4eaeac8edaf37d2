//! Access and ID token claim sets.

use crate::clients::UserAccount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Claims carried by a signed access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessClaims {
    /// Issuer
    pub iss: String,
    /// Stable user identifier
    pub sub: String,
    /// Audience: the client the token was minted for
    pub aud: String,
    /// Expiry, seconds since epoch
    pub exp: i64,
    /// Issued at
    pub iat: i64,
    /// Not before
    pub nbf: i64,
    /// Unique token id
    pub jti: String,
    /// Granted scopes, space-joined
    pub scope: String,
    /// Requesting client id
    pub client_id: String,
    /// User email
    pub email: String,
    /// Whether the email is verified
    pub email_verified: bool,
    /// User identifier duplicated for resource servers that expect it
    pub user_id: String,
}

impl AccessClaims {
    /// Build access claims for a user/client pair.
    #[must_use]
    pub fn new(
        issuer: &str,
        user: &UserAccount,
        client_id: &str,
        scope: String,
        ttl_seconds: i64,
    ) -> Self {
        let now = Utc::now().timestamp();
        Self {
            iss: issuer.to_string(),
            sub: user.id.clone(),
            aud: client_id.to_string(),
            exp: now + ttl_seconds,
            iat: now,
            nbf: now,
            jti: uuid::Uuid::new_v4().to_string(),
            scope,
            client_id: client_id.to_string(),
            email: user.email.clone(),
            email_verified: user.email_verified,
            user_id: user.id.clone(),
        }
    }

    /// Whether the token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.exp < Utc::now().timestamp()
    }
}

/// Identity claims carried by an ID token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdClaims {
    /// Issuer
    pub iss: String,
    /// Stable user identifier
    pub sub: String,
    /// Audience: the requesting client
    pub aud: String,
    /// Expiry
    pub exp: i64,
    /// Issued at
    pub iat: i64,
    /// When the user originally authenticated
    pub auth_time: i64,
    /// Nonce echoed from the authorization request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// User email
    pub email: String,
    /// Whether the email is verified
    pub email_verified: bool,
    /// Full name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Given name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    /// Family name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    /// Profile picture URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    /// BCP 47 locale
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl IdClaims {
    /// Build identity claims for a user/client pair.
    #[must_use]
    pub fn new(
        issuer: &str,
        user: &UserAccount,
        client_id: &str,
        auth_time: DateTime<Utc>,
        ttl_seconds: i64,
    ) -> Self {
        let now = Utc::now().timestamp();
        Self {
            iss: issuer.to_string(),
            sub: user.id.clone(),
            aud: client_id.to_string(),
            exp: now + ttl_seconds,
            iat: now,
            auth_time: auth_time.timestamp(),
            nonce: None,
            email: user.email.clone(),
            email_verified: user.email_verified,
            name: user.name.clone(),
            given_name: user.given_name.clone(),
            family_name: user.family_name.clone(),
            picture: user.picture.clone(),
            locale: user.locale.clone(),
        }
    }

    /// Echo the authorization request nonce.
    #[must_use]
    pub fn with_nonce(mut self, nonce: String) -> Self {
        self.nonce = Some(nonce);
        self
    }
}

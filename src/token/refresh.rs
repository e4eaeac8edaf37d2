//! Opaque refresh tokens.
//!
//! The plaintext secret is returned to the client once and never stored;
//! the store holds a deterministic keyed MAC of it. A keyed MAC (rather
//! than a salted hash) keeps the hash lookupable by value while a stolen
//! database alone cannot be used to forge lookups.

use chrono::{DateTime, Duration, Utc};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use ring::hmac;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// A stored refresh token. `token_hash` is the lookup key; the plaintext
/// never appears here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    /// Keyed MAC of the opaque secret
    pub token_hash: String,
    /// Owning user
    pub user_id: String,
    /// Client the token was issued to
    pub client_id: String,
    /// Scopes carried forward into refreshed access tokens
    pub scopes: Vec<String>,
    /// When the token was created
    pub created_at: DateTime<Utc>,
    /// Expiry
    pub expires_at: DateTime<Utc>,
    /// Revocation flag; set on rotation, explicit revoke, or logout
    pub revoked: bool,
}

impl RefreshToken {
    /// Create a token record expiring `ttl` from now.
    #[must_use]
    pub fn new(
        token_hash: String,
        user_id: String,
        client_id: String,
        scopes: Vec<String>,
        ttl: std::time::Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            token_hash,
            user_id,
            client_id,
            scopes,
            created_at: now,
            expires_at: now
                + Duration::from_std(ttl).unwrap_or_else(|_| Duration::days(30)),
            revoked: false,
        }
    }

    /// Whether the TTL has elapsed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Whether the token can be used in a refresh grant.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.revoked && !self.is_expired()
    }
}

/// Generates refresh secrets and their lookup hashes.
pub struct RefreshTokenGenerator {
    lookup_key: hmac::Key,
}

impl RefreshTokenGenerator {
    /// Build a generator around the server-held lookup MAC key.
    #[must_use]
    pub fn new(lookup_key: &[u8; 32]) -> Self {
        Self {
            lookup_key: hmac::Key::new(hmac::HMAC_SHA256, lookup_key),
        }
    }

    /// Generate a fresh opaque secret (256 bits, URL-safe).
    #[must_use]
    pub fn generate(&self) -> String {
        let mut random_bytes = Zeroizing::new([0u8; 32]);
        rand::thread_rng().fill_bytes(&mut *random_bytes);
        URL_SAFE_NO_PAD.encode(&*random_bytes)
    }

    /// Deterministic lookup hash of a presented token.
    #[must_use]
    pub fn hash(&self, token: &str) -> String {
        let tag = hmac::sign(&self.lookup_key, token.as_bytes());
        URL_SAFE_NO_PAD.encode(tag.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    fn generator() -> RefreshTokenGenerator {
        RefreshTokenGenerator::new(&[42u8; 32])
    }

    #[test]
    fn test_generate_unique_tokens() {
        let gen = generator();
        let token1 = gen.generate();
        let token2 = gen.generate();
        assert_ne!(token1, token2);
        assert_eq!(token1.len(), 43); // base64url of 32 bytes, no padding
    }

    #[test]
    fn test_hash_deterministic() {
        let gen = generator();
        let token = gen.generate();
        assert_eq!(gen.hash(&token), gen.hash(&token));
    }

    #[test]
    fn test_hash_keyed() {
        let token = "same-token";
        let hash_a = RefreshTokenGenerator::new(&[1u8; 32]).hash(token);
        let hash_b = RefreshTokenGenerator::new(&[2u8; 32]).hash(token);
        assert_ne!(hash_a, hash_b);
    }

    #[test]
    fn test_active_lifecycle() {
        let mut record = RefreshToken::new(
            "hash-1".to_string(),
            "user-1".to_string(),
            "client-1".to_string(),
            vec!["openid".to_string()],
            StdDuration::from_secs(3600),
        );

        assert!(record.is_active());

        record.revoked = true;
        assert!(!record.is_active());
    }

    #[test]
    fn test_expired_is_inactive() {
        let mut record = RefreshToken::new(
            "hash-1".to_string(),
            "user-1".to_string(),
            "client-1".to_string(),
            vec![],
            StdDuration::from_secs(3600),
        );
        record.expires_at = Utc::now() - Duration::seconds(1);

        assert!(record.is_expired());
        assert!(!record.is_active());
    }
}

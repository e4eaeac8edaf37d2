//! JWKS-style public key documents.
//!
//! Resource servers fetch this document to verify token signatures; the
//! `kid` in each token header selects the matching entry.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};

/// A single published RSA public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type, always "RSA"
    pub kty: String,
    /// Key id matching the token header
    pub kid: String,
    /// Key use, always "sig"
    #[serde(rename = "use")]
    pub key_use: String,
    /// Signing algorithm
    pub alg: String,
    /// Modulus, unsigned big-endian base64url
    pub n: String,
    /// Public exponent, unsigned big-endian base64url
    pub e: String,
}

impl Jwk {
    /// Build the JWK for an RSA public key.
    #[must_use]
    pub fn from_rsa(public_key: &RsaPublicKey, kid: impl Into<String>, alg: &str) -> Self {
        Self {
            kty: "RSA".to_string(),
            kid: kid.into(),
            key_use: "sig".to_string(),
            alg: alg.to_string(),
            n: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
        }
    }
}

/// The published key set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    /// Published keys, current first
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// JSON document for the key-set endpoint.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::RsaPrivateKey;

    #[test]
    fn test_rsa_jwk_fields() {
        let private = RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).unwrap();
        let jwk = Jwk::from_rsa(&private.to_public_key(), "key-1", "RS256");

        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.key_use, "sig");
        assert_eq!(jwk.kid, "key-1");
        assert_eq!(jwk.alg, "RS256");
        // 2048-bit modulus is 256 bytes -> 342 base64url chars, no padding
        assert_eq!(jwk.n.len(), 342);
        assert!(!jwk.n.contains('='));
        // Standard exponent 65537 encodes as AQAB
        assert_eq!(jwk.e, "AQAB");
    }

    #[test]
    fn test_jwks_serialization() {
        let private = RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).unwrap();
        let jwks = Jwks {
            keys: vec![Jwk::from_rsa(&private.to_public_key(), "key-1", "RS256")],
        };

        let json: serde_json::Value = serde_json::from_str(&jwks.to_json()).unwrap();
        assert_eq!(json["keys"][0]["use"], "sig");
        assert_eq!(json["keys"][0]["kid"], "key-1");
    }
}

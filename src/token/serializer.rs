//! JWS encoding against the key manager.

use crate::config::JwtAlgorithm;
use crate::error::AuthError;
use crate::keys::KeyManager;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, Header, Validation};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Signs claim sets and validates presented tokens.
pub struct TokenSerializer {
    algorithm: Algorithm,
}

impl TokenSerializer {
    /// Create a serializer for the configured algorithm.
    #[must_use]
    pub fn new(algorithm: JwtAlgorithm) -> Self {
        let algorithm = match algorithm {
            JwtAlgorithm::RS256 => Algorithm::RS256,
            JwtAlgorithm::PS256 => Algorithm::PS256,
        };
        Self { algorithm }
    }

    /// Sign a claim set; the header carries the manager's current `kid`.
    ///
    /// # Errors
    ///
    /// Returns a signing error; a partially-signed token is never produced.
    pub fn sign<C: Serialize>(&self, claims: &C, keys: &KeyManager) -> Result<String, AuthError> {
        let mut header = Header::new(self.algorithm);
        header.kid = Some(keys.key_id().to_string());
        encode(&header, claims, keys.encoding_key())
            .map_err(|e| AuthError::signing(e.to_string()))
    }

    /// Decode and verify a token against the key selected by its `kid`.
    ///
    /// Expiry is deliberately not validated here; the revocation path
    /// treats an expired token as already dead.
    ///
    /// # Errors
    ///
    /// Fails on malformed structure, unknown `kid`, or a bad signature.
    pub fn decode<C: DeserializeOwned>(
        &self,
        token: &str,
        keys: &KeyManager,
    ) -> Result<C, AuthError> {
        let header =
            decode_header(token).map_err(|e| AuthError::validation(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::validation("Token header missing kid"))?;
        let key = keys
            .decoding_key(&kid)
            .ok_or_else(|| AuthError::validation(format!("Unknown kid: {}", kid)))?;

        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<C>(token, key, &validation)
            .map_err(|e| AuthError::validation(e.to_string()))?;
        Ok(data.claims)
    }
}

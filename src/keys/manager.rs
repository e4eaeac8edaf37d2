//! Signing key lifecycle.
//!
//! One RSA-2048 key pair is generated at process start and held for the
//! process lifetime. Private material never leaves this module; signing
//! callers get `jsonwebtoken` key handles, everyone else gets the JWKS
//! document. A next key can be staged ahead of a rollover and is selected
//! by `kid`.

use crate::config::{Config, JwtAlgorithm};
use crate::error::AuthError;
use crate::keys::jwks::{Jwk, Jwks};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs8::EncodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::info;

const RSA_BITS: usize = 2048;

/// A generated signing key with its id and pre-built JWT handles.
pub struct SigningKey {
    kid: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    public_key: RsaPublicKey,
}

impl SigningKey {
    fn generate(kid: String) -> Result<Self, AuthError> {
        let private_key = RsaPrivateKey::new(&mut rand::rngs::OsRng, RSA_BITS)
            .map_err(|e| AuthError::config(format!("RSA key generation failed: {}", e)))?;
        let public_key = private_key.to_public_key();

        // PEM buffer is zeroized on drop; the EncodingKey keeps its own copy.
        let pem = private_key
            .to_pkcs8_pem(Default::default())
            .map_err(|e| AuthError::config(format!("Key serialization failed: {}", e)))?;
        let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| AuthError::config(format!("Invalid signing key: {}", e)))?;

        let n = URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be());
        let e = URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be());
        let decoding_key = DecodingKey::from_rsa_components(&n, &e)
            .map_err(|e| AuthError::config(format!("Invalid verification key: {}", e)))?;

        Ok(Self {
            kid,
            encoding_key,
            decoding_key,
            public_key,
        })
    }

    /// Key id carried in token headers and the key set.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }
}

/// Owns the process signing keys.
pub struct KeyManager {
    algorithm: JwtAlgorithm,
    current: SigningKey,
    next: Option<SigningKey>,
}

impl KeyManager {
    /// Generate the process key pair.
    ///
    /// Key id comes from configuration when set, otherwise a fresh UUID.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if generation fails; startup-fatal.
    pub fn generate(config: &Config) -> Result<Self, AuthError> {
        let kid = config
            .key_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let current = SigningKey::generate(kid)?;

        info!(kid = %current.kid, algorithm = config.jwt_algorithm.as_str(), "Generated signing key");

        Ok(Self {
            algorithm: config.jwt_algorithm,
            current,
            next: None,
        })
    }

    /// Signing algorithm for token headers.
    #[must_use]
    pub fn algorithm(&self) -> JwtAlgorithm {
        self.algorithm
    }

    /// Current key id.
    #[must_use]
    pub fn key_id(&self) -> &str {
        self.current.kid()
    }

    /// Encoding key for signing; private material stays inside.
    #[must_use]
    pub fn encoding_key(&self) -> &EncodingKey {
        &self.current.encoding_key
    }

    /// Decoding key for a given `kid`, current or staged.
    #[must_use]
    pub fn decoding_key(&self, kid: &str) -> Option<&DecodingKey> {
        if kid == self.current.kid {
            return Some(&self.current.decoding_key);
        }
        self.next
            .as_ref()
            .filter(|k| k.kid == kid)
            .map(|k| &k.decoding_key)
    }

    /// Stage a next key ahead of rollover.
    ///
    /// The staged key appears in the key set so verifiers can pick it up
    /// before any token is signed with it.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if generation fails.
    pub fn stage_next(&mut self) -> Result<&str, AuthError> {
        let staged = SigningKey::generate(uuid::Uuid::new_v4().to_string())?;
        info!(kid = %staged.kid, "Staged next signing key");
        self.next = Some(staged);
        Ok(self.next.as_ref().map(|k| k.kid.as_str()).unwrap_or_default())
    }

    /// Promote the staged key to current.
    ///
    /// # Errors
    ///
    /// Fails when no key is staged.
    pub fn promote_next(&mut self) -> Result<(), AuthError> {
        let staged = self
            .next
            .take()
            .ok_or_else(|| AuthError::config("No staged key to promote"))?;
        info!(old_kid = %self.current.kid, new_kid = %staged.kid, "Promoted signing key");
        self.current = staged;
        Ok(())
    }

    /// Published key set: current key plus any staged key.
    #[must_use]
    pub fn jwks(&self) -> Jwks {
        let alg = self.algorithm.as_str();
        let mut keys = vec![Jwk::from_rsa(
            &self.current.public_key,
            &self.current.kid,
            alg,
        )];
        if let Some(next) = &self.next {
            keys.push(Jwk::from_rsa(&next.public_key, &next.kid, alg));
        }
        Jwks { keys }
    }
}

//! PKCE verifier/challenge handling per RFC 7636.
//!
//! Stateless. Challenge comparison is constant-time to avoid leaking how
//! close a presented verifier came to matching.

use crate::error::AuthError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Unreserved characters allowed in a code verifier (RFC 7636 §4.1).
const VERIFIER_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Minimum verifier length.
pub const MIN_VERIFIER_LEN: usize = 43;
/// Maximum verifier length.
pub const MAX_VERIFIER_LEN: usize = 128;

/// PKCE challenge methods supported by this server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeMethod {
    /// Challenge equals the verifier
    Plain,
    /// Challenge is base64url(SHA-256(verifier)), no padding
    S256,
}

impl ChallengeMethod {
    /// Parse a challenge method name.
    pub fn parse(s: &str) -> Result<Self, AuthError> {
        match s {
            "plain" => Ok(Self::Plain),
            "S256" => Ok(Self::S256),
            other => Err(AuthError::validation(format!(
                "Unsupported code_challenge_method: {}",
                other
            ))),
        }
    }

    /// Method name as it appears on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::S256 => "S256",
        }
    }
}

/// Generate a random code verifier.
///
/// Length is chosen uniformly in [43, 128]; characters are drawn from the
/// RFC 7636 unreserved set.
#[must_use]
pub fn generate_verifier() -> String {
    let mut rng = rand::thread_rng();
    let len = rng.gen_range(MIN_VERIFIER_LEN..=MAX_VERIFIER_LEN);
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..VERIFIER_CHARSET.len());
            VERIFIER_CHARSET[idx] as char
        })
        .collect()
}

/// Derive the challenge for a verifier under the given method.
///
/// # Errors
///
/// Returns a validation error for any method outside `plain`/`S256`.
pub fn challenge(verifier: &str, method: &str) -> Result<String, AuthError> {
    match ChallengeMethod::parse(method)? {
        ChallengeMethod::Plain => Ok(verifier.to_string()),
        ChallengeMethod::S256 => {
            let digest = Sha256::digest(verifier.as_bytes());
            Ok(URL_SAFE_NO_PAD.encode(digest))
        }
    }
}

/// Verify a presented verifier against a recorded challenge.
///
/// Recomputes the challenge and compares in constant time. Never errors:
/// absent inputs or an unsupported method simply fail verification.
#[must_use]
pub fn verify(verifier: Option<&str>, recorded: Option<&str>, method: &str) -> bool {
    let (Some(verifier), Some(recorded)) = (verifier, recorded) else {
        return false;
    };

    let Ok(computed) = challenge(verifier, method) else {
        return false;
    };

    let computed_bytes = computed.as_bytes();
    let recorded_bytes = recorded.as_bytes();

    // Length check first (this leaks length but that's acceptable)
    if computed_bytes.len() != recorded_bytes.len() {
        return false;
    }

    computed_bytes.ct_eq(recorded_bytes).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verifier_length_and_charset() {
        for _ in 0..50 {
            let verifier = generate_verifier();
            assert!(verifier.len() >= MIN_VERIFIER_LEN);
            assert!(verifier.len() <= MAX_VERIFIER_LEN);
            assert!(verifier
                .bytes()
                .all(|b| VERIFIER_CHARSET.contains(&b)));
        }
    }

    #[test]
    fn test_s256_round_trip() {
        let verifier = generate_verifier();
        let challenge = challenge(&verifier, "S256").unwrap();
        assert!(verify(Some(&verifier), Some(&challenge), "S256"));
    }

    #[test]
    fn test_s256_known_vector() {
        // RFC 7636 appendix B
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let expected = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";
        assert_eq!(challenge(verifier, "S256").unwrap(), expected);
    }

    #[test]
    fn test_plain_is_identity() {
        assert_eq!(challenge("abc", "plain").unwrap(), "abc");
        assert!(verify(Some("abc"), Some("abc"), "plain"));
        assert!(!verify(Some("abc"), Some("abd"), "plain"));
    }

    #[test]
    fn test_wrong_verifier_rejected() {
        let verifier = generate_verifier();
        let other = generate_verifier();
        let challenge = challenge(&verifier, "S256").unwrap();
        assert!(!verify(Some(&other), Some(&challenge), "S256"));
    }

    #[test]
    fn test_unsupported_method() {
        assert!(challenge("abc", "S512").is_err());
        // verify never errors, it just fails
        assert!(!verify(Some("abc"), Some("abc"), "S512"));
    }

    #[test]
    fn test_missing_inputs_fail_closed() {
        assert!(!verify(None, Some("challenge"), "S256"));
        assert!(!verify(Some("verifier"), None, "S256"));
        assert!(!verify(None, None, "plain"));
    }
}

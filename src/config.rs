//! Centralized configuration for the authorization core.
//!
//! All configuration is loaded from environment variables and validated
//! at startup. Invalid values are startup-fatal, never per-request.

use crate::error::AuthError;
use std::env;
use std::time::Duration;

/// JWT signing algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JwtAlgorithm {
    /// RSA with SHA-256
    RS256,
    /// RSA-PSS with SHA-256
    PS256,
}

impl JwtAlgorithm {
    /// Parse algorithm from string.
    pub fn parse(s: &str) -> Result<Self, AuthError> {
        match s.to_uppercase().as_str() {
            "RS256" => Ok(Self::RS256),
            "PS256" => Ok(Self::PS256),
            _ => Err(AuthError::config(format!("Invalid JWT algorithm: {}", s))),
        }
    }

    /// Algorithm name for the JWT and JWKS headers.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RS256 => "RS256",
            Self::PS256 => "PS256",
        }
    }
}

/// Authorization core configuration.
#[derive(Debug, Clone)]
pub struct Config {
    // Token settings
    /// Issuer claim for access and ID tokens
    pub issuer: String,
    /// Signing algorithm
    pub jwt_algorithm: JwtAlgorithm,
    /// Signing key id; generated when unset
    pub key_id: Option<String>,
    /// Access token TTL
    pub access_token_ttl: Duration,
    /// Refresh token TTL
    pub refresh_token_ttl: Duration,
    /// ID token TTL
    pub id_token_ttl: Duration,

    // Authorization code settings
    /// Authorization code TTL
    pub authorization_code_ttl: Duration,
    /// Replay cache TTL for repeated code submissions
    pub replay_cache_ttl: Duration,

    // Lockout settings
    /// Failed attempts from one IP before lockout
    pub ip_lockout_threshold: u32,
    /// Window in which IP failures accumulate
    pub ip_lockout_window: Duration,
    /// Failed logins per account before lockout
    pub account_lockout_threshold: u32,
    /// Window in which account failures accumulate
    pub account_lockout_window: Duration,
    /// Per-IP failure count that marks an IP suspicious
    pub suspicion_threshold: u32,

    // Security
    /// Keyed-MAC secret for refresh token lookup hashes (32 bytes)
    pub refresh_lookup_key: [u8; 32],
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, AuthError> {
        dotenvy::dotenv().ok();

        let issuer = env::var("AUTH_ISSUER").map_err(|_| {
            AuthError::config("AUTH_ISSUER must be set to the public issuer URL")
        })?;
        if issuer.is_empty() {
            return Err(AuthError::config("AUTH_ISSUER must not be empty"));
        }

        let jwt_algorithm = JwtAlgorithm::parse(
            &env::var("JWT_ALGORITHM").unwrap_or_else(|_| "RS256".to_string()),
        )?;
        let key_id = env::var("SIGNING_KEY_ID").ok().filter(|v| !v.is_empty());

        let access_token_ttl = Duration::from_secs(parse_env("ACCESS_TOKEN_TTL", 900)?);
        let refresh_token_ttl = Duration::from_secs(parse_env("REFRESH_TOKEN_TTL", 2_592_000)?);
        let id_token_ttl = Duration::from_secs(parse_env("ID_TOKEN_TTL", 900)?);
        let authorization_code_ttl = Duration::from_secs(parse_env("AUTH_CODE_TTL", 600)?);
        let replay_cache_ttl = Duration::from_secs(parse_env("REPLAY_CACHE_TTL", 60)?);

        let ip_lockout_threshold = parse_env("IP_LOCKOUT_THRESHOLD", 5)?;
        let ip_lockout_window = Duration::from_secs(parse_env("IP_LOCKOUT_WINDOW", 1800)?);
        let account_lockout_threshold = parse_env("ACCOUNT_LOCKOUT_THRESHOLD", 5)?;
        let account_lockout_window =
            Duration::from_secs(parse_env("ACCOUNT_LOCKOUT_WINDOW", 3600)?);
        let suspicion_threshold = parse_env("SUSPICION_THRESHOLD", 3)?;

        let refresh_lookup_key = parse_lookup_key()?;

        Ok(Self {
            issuer,
            jwt_algorithm,
            key_id,
            access_token_ttl,
            refresh_token_ttl,
            id_token_ttl,
            authorization_code_ttl,
            replay_cache_ttl,
            ip_lockout_threshold,
            ip_lockout_window,
            account_lockout_threshold,
            account_lockout_window,
            suspicion_threshold,
            refresh_lookup_key,
        })
    }

    /// Configuration with defaults for tests and local development.
    #[must_use]
    pub fn for_tests(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            jwt_algorithm: JwtAlgorithm::RS256,
            key_id: None,
            access_token_ttl: Duration::from_secs(900),
            refresh_token_ttl: Duration::from_secs(2_592_000),
            id_token_ttl: Duration::from_secs(900),
            authorization_code_ttl: Duration::from_secs(600),
            replay_cache_ttl: Duration::from_secs(60),
            ip_lockout_threshold: 5,
            ip_lockout_window: Duration::from_secs(1800),
            account_lockout_threshold: 5,
            account_lockout_window: Duration::from_secs(3600),
            suspicion_threshold: 3,
            refresh_lookup_key: [7u8; 32],
        }
    }
}

/// Parse environment variable with default value.
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, AuthError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val
            .parse()
            .map_err(|e| AuthError::config(format!("Invalid {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

/// Parse the refresh-token lookup MAC key from the environment.
fn parse_lookup_key() -> Result<[u8; 32], AuthError> {
    match env::var("REFRESH_LOOKUP_KEY") {
        Ok(key) => {
            let bytes =
                base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &key)
                    .map_err(|e| {
                        AuthError::config(format!("Invalid REFRESH_LOOKUP_KEY: {}", e))
                    })?;

            if bytes.len() != 32 {
                return Err(AuthError::config(format!(
                    "REFRESH_LOOKUP_KEY must be 32 bytes, got {}",
                    bytes.len()
                )));
            }

            let mut arr = [0u8; 32];
            arr.copy_from_slice(&bytes);
            Ok(arr)
        }
        Err(_) => {
            // Generate random key for development. Refresh tokens will not
            // survive a restart without a configured key.
            use rand::RngCore;
            let mut key = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut key);
            Ok(key)
        }
    }
}

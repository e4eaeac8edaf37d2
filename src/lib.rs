//! OAuth2/OIDC authorization core.
//!
//! Provides authorization-code issuance and redemption, PKCE enforcement,
//! access/ID token signing, refresh token rotation, replay-safe token
//! exchange, and a security audit trail with brute-force lockout.
//!
//! Transport, persistence engines, and user/client registration live in the
//! embedding backend; this crate exposes the protocol state machines behind
//! storage traits.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
pub mod authorize;
pub mod clients;
pub mod config;
pub mod error;
pub mod keys;
pub mod pkce;
pub mod replay;
pub mod store;
pub mod token;

// Re-exports for convenience
pub use audit::SecurityAuditor;
pub use authorize::AuthorizationIssuer;
pub use config::Config;
pub use error::AuthError;
pub use keys::KeyManager;
pub use token::TokenIssuer;

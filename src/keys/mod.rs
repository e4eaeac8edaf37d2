//! Signing key ownership and public key-set publication.

pub mod jwks;
pub mod manager;

pub use jwks::{Jwk, Jwks};
pub use manager::KeyManager;

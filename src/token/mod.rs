//! Token issuance: grant dispatch, signing, refresh rotation, revocation.

pub mod claims;
pub mod issuer;
pub mod refresh;
pub mod serializer;

pub use claims::{AccessClaims, IdClaims};
pub use issuer::{GrantType, TokenIssuer, TokenRequest, TokenResponse};
pub use refresh::{RefreshToken, RefreshTokenGenerator};
pub use serializer::TokenSerializer;

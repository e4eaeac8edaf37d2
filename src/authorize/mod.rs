//! Authorization-code issuance and single-use redemption.

pub mod code;
pub mod issuer;

pub use code::AuthorizationCode;
pub use issuer::{AuthorizationIssuer, AuthorizationRequest};

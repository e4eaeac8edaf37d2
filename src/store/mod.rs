//! Persistence seams.
//!
//! The embedding backend supplies durable implementations; the in-memory
//! ones in [`memory`] back tests and local development. The single-use
//! guarantee for authorization codes rests on `mark_used` being a
//! compare-and-swap in the real store, not on in-process locking.

pub mod memory;

use crate::audit::event::SecurityEvent;
use crate::authorize::code::AuthorizationCode;
use crate::error::AuthError;
use crate::token::refresh::RefreshToken;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use memory::{MemoryAuthorizationCodeStore, MemoryRefreshTokenStore, MemorySecurityEventStore};

/// Durable storage for authorization codes.
#[async_trait]
pub trait AuthorizationCodeStore: Send + Sync {
    /// Persist a freshly issued code.
    async fn insert(&self, code: AuthorizationCode) -> Result<(), AuthError>;

    /// Fetch a code by value.
    async fn get(&self, code: &str) -> Result<Option<AuthorizationCode>, AuthError>;

    /// Atomically flip `used` from false to true.
    ///
    /// Returns true iff this call performed the flip. Implementations must
    /// make this a conditional update (CAS or serializable transaction) so
    /// concurrent redemptions across server instances cannot both win.
    async fn mark_used(&self, code: &str) -> Result<bool, AuthError>;
}

/// Durable storage for refresh tokens, keyed by lookup hash.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Persist a new token record.
    async fn insert(&self, token: RefreshToken) -> Result<(), AuthError>;

    /// Fetch a token by its lookup hash.
    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, AuthError>;

    /// Set `revoked` on the token with this hash.
    ///
    /// Returns true iff an active token was found and revoked.
    async fn revoke(&self, token_hash: &str) -> Result<bool, AuthError>;

    /// Revoke every active token for a user (logout). Returns the count.
    async fn revoke_all_for_user(&self, user_id: &str) -> Result<u32, AuthError>;
}

/// Append-only audit log storage.
#[async_trait]
pub trait SecurityEventStore: Send + Sync {
    /// Append an event.
    async fn append(&self, event: SecurityEvent) -> Result<(), AuthError>;

    /// Count failed-login events for one user since the given instant.
    async fn count_failed_logins_for_user(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, AuthError>;

    /// Count failed-login events across all users since the given instant.
    async fn count_failed_logins_since(&self, since: DateTime<Utc>) -> Result<u64, AuthError>;
}

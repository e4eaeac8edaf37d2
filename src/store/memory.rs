//! In-memory store implementations for tests and development.
//!
//! `mark_used` holds the write lock across check and flip, which gives the
//! required compare-and-swap semantics within one process.

use crate::audit::event::{SecurityEvent, SecurityEventType};
use crate::authorize::code::AuthorizationCode;
use crate::error::AuthError;
use crate::store::{AuthorizationCodeStore, RefreshTokenStore, SecurityEventStore};
use crate::token::refresh::RefreshToken;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory authorization code store.
#[derive(Default)]
pub struct MemoryAuthorizationCodeStore {
    codes: RwLock<HashMap<String, AuthorizationCode>>,
}

impl MemoryAuthorizationCodeStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthorizationCodeStore for MemoryAuthorizationCodeStore {
    async fn insert(&self, code: AuthorizationCode) -> Result<(), AuthError> {
        let mut codes = self.codes.write().await;
        codes.insert(code.code.clone(), code);
        Ok(())
    }

    async fn get(&self, code: &str) -> Result<Option<AuthorizationCode>, AuthError> {
        let codes = self.codes.read().await;
        Ok(codes.get(code).cloned())
    }

    async fn mark_used(&self, code: &str) -> Result<bool, AuthError> {
        let mut codes = self.codes.write().await;
        match codes.get_mut(code) {
            Some(record) if !record.used => {
                record.used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// In-memory refresh token store keyed by lookup hash.
#[derive(Default)]
pub struct MemoryRefreshTokenStore {
    tokens: RwLock<HashMap<String, RefreshToken>>,
}

impl MemoryRefreshTokenStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active (unrevoked, unexpired) tokens for a user.
    pub async fn active_count_for_user(&self, user_id: &str) -> usize {
        let tokens = self.tokens.read().await;
        tokens
            .values()
            .filter(|t| t.user_id == user_id && t.is_active())
            .count()
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn insert(&self, token: RefreshToken) -> Result<(), AuthError> {
        let mut tokens = self.tokens.write().await;
        tokens.insert(token.token_hash.clone(), token);
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, AuthError> {
        let tokens = self.tokens.read().await;
        Ok(tokens.get(token_hash).cloned())
    }

    async fn revoke(&self, token_hash: &str) -> Result<bool, AuthError> {
        let mut tokens = self.tokens.write().await;
        match tokens.get_mut(token_hash) {
            Some(record) if !record.revoked => {
                record.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_for_user(&self, user_id: &str) -> Result<u32, AuthError> {
        let mut tokens = self.tokens.write().await;
        let mut count = 0;
        for record in tokens.values_mut() {
            if record.user_id == user_id && !record.revoked {
                record.revoked = true;
                count += 1;
            }
        }
        Ok(count)
    }
}

/// In-memory append-only audit log.
#[derive(Default)]
pub struct MemorySecurityEventStore {
    events: RwLock<Vec<SecurityEvent>>,
}

impl MemorySecurityEventStore {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events, in append order.
    pub async fn events(&self) -> Vec<SecurityEvent> {
        let events = self.events.read().await;
        events.clone()
    }
}

#[async_trait]
impl SecurityEventStore for MemorySecurityEventStore {
    async fn append(&self, event: SecurityEvent) -> Result<(), AuthError> {
        let mut events = self.events.write().await;
        events.push(event);
        Ok(())
    }

    async fn count_failed_logins_for_user(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, AuthError> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|e| {
                e.event_type == SecurityEventType::LoginFailure
                    && e.user_id.as_deref() == Some(user_id)
                    && e.timestamp >= since
            })
            .count() as u64)
    }

    async fn count_failed_logins_since(&self, since: DateTime<Utc>) -> Result<u64, AuthError> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|e| e.event_type == SecurityEventType::LoginFailure && e.timestamp >= since)
            .count() as u64)
    }
}

//! Replay guard for the token endpoint.
//!
//! Authorization codes are single-use, but network retries legitimately
//! resubmit the same code. The guard remembers the first exchange's full
//! outcome per code for a short TTL so a retry gets the identical response
//! instead of `invalid_grant`. Failed exchanges are remembered too, so
//! hammering a bad code short-circuits to the same error.

use crate::token::issuer::TokenResponse;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// The remembered outcome of a code exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeOutcome {
    /// Exchange succeeded; the full response to replay
    Completed(TokenResponse),
    /// Exchange failed; the OAuth error code and description to replay
    Denied {
        /// RFC 6749 error code
        error: String,
        /// Description as first returned
        description: String,
    },
}

struct ReplayEntry {
    outcome: ExchangeOutcome,
    cached_at: Instant,
}

/// Short-TTL cache mapping authorization codes to exchange outcomes.
pub struct ReplayGuard {
    entries: RwLock<HashMap<String, ReplayEntry>>,
    ttl: Duration,
}

impl ReplayGuard {
    /// Create a guard with the given entry TTL.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Look up the cached outcome for a code, if still fresh.
    pub async fn get(&self, code: &str) -> Option<ExchangeOutcome> {
        let entries = self.entries.read().await;
        entries
            .get(code)
            .filter(|entry| entry.cached_at.elapsed() < self.ttl)
            .map(|entry| entry.outcome.clone())
    }

    /// Record the outcome of a code exchange.
    ///
    /// Expired entries are swept on each write; there is no background
    /// task. A settled success is canonical and is never displaced. A
    /// failure marker can be displaced by a success: when duplicate
    /// submissions race, the redemption loser may write its failure before
    /// the winner finishes, and the winner's response must still be
    /// retrievable by retry.
    pub async fn record(&self, code: &str, outcome: ExchangeOutcome) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.cached_at.elapsed() < self.ttl);

        let replace = match entries.get(code) {
            None => true,
            Some(existing) => {
                matches!(existing.outcome, ExchangeOutcome::Denied { .. })
                    && matches!(outcome, ExchangeOutcome::Completed(_))
            }
        };
        if replace {
            entries.insert(
                code.to_string(),
                ReplayEntry {
                    outcome,
                    cached_at: Instant::now(),
                },
            );
        }
    }

    /// Number of live cache entries.
    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries
            .values()
            .filter(|entry| entry.cached_at.elapsed() < self.ttl)
            .count()
    }

    /// Whether the cache holds no live entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn denied() -> ExchangeOutcome {
        ExchangeOutcome::Denied {
            error: "invalid_grant".to_string(),
            description: "code already redeemed".to_string(),
        }
    }

    fn completed(token: &str) -> ExchangeOutcome {
        ExchangeOutcome::Completed(TokenResponse {
            access_token: token.to_string(),
            token_type: "Bearer".to_string(),
            expires_in: 900,
            refresh_token: Some("refresh".to_string()),
            scope: "openid".to_string(),
            id_token: None,
        })
    }

    #[tokio::test]
    async fn test_replay_returns_first_outcome() {
        let guard = ReplayGuard::new(Duration::from_secs(60));

        guard.record("code-1", completed("token-a")).await;
        // A late second write must not displace the canonical outcome
        guard.record("code-1", completed("token-b")).await;

        assert_eq!(guard.get("code-1").await, Some(completed("token-a")));
    }

    #[tokio::test]
    async fn test_failure_marker_replayed() {
        let guard = ReplayGuard::new(Duration::from_secs(60));
        guard.record("code-1", denied()).await;
        assert_eq!(guard.get("code-1").await, Some(denied()));

        // A second failure does not restart the entry
        guard.record("code-1", denied()).await;
        assert_eq!(guard.get("code-1").await, Some(denied()));
    }

    #[tokio::test]
    async fn test_success_displaces_failure_marker() {
        // The losing side of a duplicate-submission race can settle its
        // failure first; the winner's response must still win the cache.
        let guard = ReplayGuard::new(Duration::from_secs(60));
        guard.record("code-1", denied()).await;
        guard.record("code-1", completed("token-a")).await;
        assert_eq!(guard.get("code-1").await, Some(completed("token-a")));
    }

    #[tokio::test]
    async fn test_miss_on_unknown_code() {
        let guard = ReplayGuard::new(Duration::from_secs(60));
        assert!(guard.get("unseen").await.is_none());
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let guard = ReplayGuard::new(Duration::from_millis(20));
        guard.record("code-1", denied()).await;
        assert!(guard.get("code-1").await.is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(guard.get("code-1").await.is_none());

        // Sweep happens on the next write
        guard.record("code-2", denied()).await;
        assert_eq!(guard.len().await, 1);
    }
}

//! Security auditor: event logging and brute-force lockout.
//!
//! Event writes are best-effort. A failed write must never abort the
//! operation being audited; it increments a process-level counter and
//! emits a warning so the loss stays diagnosable.

use crate::audit::event::SecurityEvent;
use crate::error::AuthError;
use crate::store::SecurityEventStore;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::warn;

/// Per-IP failure state.
///
/// Counters older than the lockout window are treated as reset lazily on
/// the next read; nothing sweeps them eagerly.
#[derive(Debug, Clone)]
struct IpFailureState {
    count: u32,
    last_failure: Instant,
}

/// Lockout thresholds for the auditor.
#[derive(Debug, Clone)]
pub struct LockoutPolicy {
    /// Failed attempts from one IP before lockout
    pub ip_threshold: u32,
    /// Window in which IP failures accumulate
    pub ip_window: Duration,
    /// Failed logins per account before lockout
    pub account_threshold: u32,
    /// Window in which account failures accumulate
    pub account_window: Duration,
    /// Per-IP failure count that marks an IP suspicious
    pub suspicion_threshold: u32,
}

impl From<&crate::config::Config> for LockoutPolicy {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            ip_threshold: config.ip_lockout_threshold,
            ip_window: config.ip_lockout_window,
            account_threshold: config.account_lockout_threshold,
            account_window: config.account_lockout_window,
            suspicion_threshold: config.suspicion_threshold,
        }
    }
}

/// Report from [`SecurityAuditor::suspicious_activity_summary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuspiciousActivitySummary {
    /// Failed logins recorded in the trailing 24 hours
    pub failed_logins_24h: u64,
    /// IPs currently at or above the suspicion threshold
    pub suspicious_ips: Vec<String>,
}

/// Records security events and derives lockout state.
pub struct SecurityAuditor {
    events: Arc<dyn SecurityEventStore>,
    policy: LockoutPolicy,
    ip_failures: RwLock<HashMap<String, IpFailureState>>,
    dropped_events: AtomicU64,
}

impl SecurityAuditor {
    /// Create an auditor over the given event store.
    #[must_use]
    pub fn new(events: Arc<dyn SecurityEventStore>, policy: LockoutPolicy) -> Self {
        Self {
            events,
            policy,
            ip_failures: RwLock::new(HashMap::new()),
            dropped_events: AtomicU64::new(0),
        }
    }

    /// Append an event, best-effort.
    pub async fn log(&self, event: SecurityEvent) {
        let event_type = event.event_type;
        if let Err(e) = self.events.append(event).await {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
            warn!(
                event_type = event_type.as_str(),
                error = %e,
                "Dropped security event"
            );
        }
    }

    /// Events dropped because the store rejected them.
    #[must_use]
    pub fn dropped_audit_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Whether persisted failed logins lock this account.
    ///
    /// # Errors
    ///
    /// Propagates event-store failures; the caller decides whether to fail
    /// open or closed.
    pub async fn is_account_locked(&self, user_id: &str) -> Result<bool, AuthError> {
        let window = ChronoDuration::from_std(self.policy.account_window)
            .unwrap_or_else(|_| ChronoDuration::hours(1));
        let since = Utc::now() - window;
        let failures = self
            .events
            .count_failed_logins_for_user(user_id, since)
            .await?;
        Ok(failures >= u64::from(self.policy.account_threshold))
    }

    /// Whether this IP's in-memory failure counter locks it out.
    pub async fn is_ip_locked(&self, ip: &str) -> bool {
        let failures = self.ip_failures.read().await;
        match failures.get(ip) {
            Some(state) if state.last_failure.elapsed() < self.policy.ip_window => {
                state.count >= self.policy.ip_threshold
            }
            _ => false,
        }
    }

    /// Record a failed attempt from an IP.
    pub async fn track_failed_attempt(&self, ip: &str) {
        let mut failures = self.ip_failures.write().await;
        let now = Instant::now();
        let state = failures.entry(ip.to_string()).or_insert(IpFailureState {
            count: 0,
            last_failure: now,
        });

        // Window elapsed: the old streak no longer counts
        if state.last_failure.elapsed() >= self.policy.ip_window {
            state.count = 0;
        }

        state.count += 1;
        state.last_failure = now;

        if state.count >= self.policy.ip_threshold {
            warn!(ip = %ip, count = state.count, "IP reached lockout threshold");
        }
    }

    /// Clear the failure counter for an IP after any success.
    pub async fn clear_failed_attempts(&self, ip: &str) {
        let mut failures = self.ip_failures.write().await;
        failures.remove(ip);
    }

    /// Trailing-24h failed-login count plus currently suspicious IPs.
    ///
    /// # Errors
    ///
    /// Propagates event-store failures.
    pub async fn suspicious_activity_summary(
        &self,
    ) -> Result<SuspiciousActivitySummary, AuthError> {
        let since = Utc::now() - ChronoDuration::hours(24);
        let failed_logins_24h = self.events.count_failed_logins_since(since).await?;

        let failures = self.ip_failures.read().await;
        let mut suspicious_ips: Vec<String> = failures
            .iter()
            .filter(|(_, state)| {
                state.last_failure.elapsed() < self.policy.ip_window
                    && state.count >= self.policy.suspicion_threshold
            })
            .map(|(ip, _)| ip.clone())
            .collect();
        suspicious_ips.sort();

        Ok(SuspiciousActivitySummary {
            failed_logins_24h,
            suspicious_ips,
        })
    }
}

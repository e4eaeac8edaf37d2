//! Brute-force lockout and suspicious-activity tests.

use oauth_provider::audit::{
    LockoutPolicy, RequestContext, SecurityAuditor, SecurityEvent, SecurityEventType,
};
use oauth_provider::authorize::AuthorizationIssuer;
use oauth_provider::clients::{
    MemoryClientRegistry, MemoryUserDirectory, OAuthApplication, UserAccount,
};
use oauth_provider::config::Config;
use oauth_provider::keys::KeyManager;
use oauth_provider::store::{
    MemoryAuthorizationCodeStore, MemoryRefreshTokenStore, MemorySecurityEventStore,
};
use oauth_provider::token::{TokenIssuer, TokenRequest};
use std::sync::Arc;
use std::time::Duration;

fn policy() -> LockoutPolicy {
    LockoutPolicy {
        ip_threshold: 5,
        ip_window: Duration::from_secs(1800),
        account_threshold: 5,
        account_window: Duration::from_secs(3600),
        suspicion_threshold: 3,
    }
}

fn ctx_for(ip: &str) -> RequestContext {
    RequestContext::from_ip(ip)
}

#[tokio::test]
async fn ip_locks_at_exactly_the_threshold() {
    let auditor = SecurityAuditor::new(Arc::new(MemorySecurityEventStore::new()) as _, policy());

    for attempt in 1..=4 {
        auditor.track_failed_attempt("198.51.100.7").await;
        assert!(
            !auditor.is_ip_locked("198.51.100.7").await,
            "locked after only {} attempts",
            attempt
        );
    }

    auditor.track_failed_attempt("198.51.100.7").await;
    assert!(auditor.is_ip_locked("198.51.100.7").await);
}

#[tokio::test]
async fn one_success_clears_the_counter() {
    let auditor = SecurityAuditor::new(Arc::new(MemorySecurityEventStore::new()) as _, policy());

    for _ in 0..5 {
        auditor.track_failed_attempt("198.51.100.7").await;
    }
    assert!(auditor.is_ip_locked("198.51.100.7").await);

    auditor.clear_failed_attempts("198.51.100.7").await;
    assert!(!auditor.is_ip_locked("198.51.100.7").await);

    // The streak starts over from zero
    auditor.track_failed_attempt("198.51.100.7").await;
    assert!(!auditor.is_ip_locked("198.51.100.7").await);
}

#[tokio::test]
async fn counters_reset_lazily_after_the_window() {
    let mut short = policy();
    short.ip_window = Duration::from_millis(30);
    let auditor = SecurityAuditor::new(Arc::new(MemorySecurityEventStore::new()) as _, short);

    for _ in 0..5 {
        auditor.track_failed_attempt("198.51.100.7").await;
    }
    assert!(auditor.is_ip_locked("198.51.100.7").await);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!auditor.is_ip_locked("198.51.100.7").await);

    // The next failure counts as the first of a new streak
    auditor.track_failed_attempt("198.51.100.7").await;
    assert!(!auditor.is_ip_locked("198.51.100.7").await);
}

#[tokio::test]
async fn account_lockout_follows_persisted_failures() {
    let events = Arc::new(MemorySecurityEventStore::new());
    let auditor = SecurityAuditor::new(Arc::clone(&events) as _, policy());
    let ctx = ctx_for("203.0.113.9");

    for _ in 0..4 {
        auditor
            .log(
                SecurityEvent::new(SecurityEventType::LoginFailure, &ctx, false)
                    .with_user("user-1"),
            )
            .await;
    }
    assert!(!auditor.is_account_locked("user-1").await.unwrap());

    auditor
        .log(SecurityEvent::new(SecurityEventType::LoginFailure, &ctx, false).with_user("user-1"))
        .await;
    assert!(auditor.is_account_locked("user-1").await.unwrap());
}

#[tokio::test]
async fn summary_reports_failures_and_suspicious_ips() {
    let events = Arc::new(MemorySecurityEventStore::new());
    let auditor = SecurityAuditor::new(Arc::clone(&events) as _, policy());

    for ip in ["198.51.100.7", "198.51.100.8"] {
        for _ in 0..3 {
            auditor.track_failed_attempt(ip).await;
        }
    }
    auditor.track_failed_attempt("198.51.100.9").await;

    for _ in 0..6 {
        auditor
            .log(SecurityEvent::new(
                SecurityEventType::LoginFailure,
                &ctx_for("198.51.100.7"),
                false,
            ))
            .await;
    }

    let summary = auditor.suspicious_activity_summary().await.unwrap();
    assert_eq!(summary.failed_logins_24h, 6);
    assert_eq!(
        summary.suspicious_ips,
        vec!["198.51.100.7".to_string(), "198.51.100.8".to_string()]
    );
}

#[tokio::test]
async fn failed_exchanges_feed_the_ip_counter() {
    let config = Config::for_tests("https://auth.example.com");

    let registry = MemoryClientRegistry::new();
    registry
        .register(OAuthApplication::new(
            "client-1",
            vec!["https://app.example/cb".to_string()],
            vec!["openid".to_string()],
        ))
        .await;
    let registry = Arc::new(registry);

    let users = MemoryUserDirectory::new();
    users
        .add(UserAccount {
            id: "user-1".to_string(),
            email: "user@example.com".to_string(),
            email_verified: true,
            name: None,
            given_name: None,
            family_name: None,
            picture: None,
            locale: None,
        })
        .await;

    let auditor = Arc::new(SecurityAuditor::new(
        Arc::new(MemorySecurityEventStore::new()) as _,
        LockoutPolicy::from(&config),
    ));
    let authorizer = Arc::new(AuthorizationIssuer::new(
        Arc::clone(&registry) as _,
        Arc::new(MemoryAuthorizationCodeStore::new()),
        Arc::clone(&auditor),
        config.authorization_code_ttl,
    ));
    let tokens = TokenIssuer::new(
        &config,
        Arc::new(KeyManager::generate(&config).unwrap()),
        authorizer,
        registry as _,
        Arc::new(MemoryRefreshTokenStore::new()) as _,
        Arc::new(users) as _,
        Arc::clone(&auditor),
    );

    let ctx = ctx_for("198.51.100.7");
    // Each guess is a distinct code, so the replay guard does not absorb it
    for i in 0..5 {
        let request = TokenRequest {
            grant_type: "authorization_code".to_string(),
            code: Some(format!("guessed-code-{}", i)),
            redirect_uri: Some("https://app.example/cb".to_string()),
            client_id: Some("client-1".to_string()),
            ..Default::default()
        };
        let _ = tokens.process_token_request(&request, &ctx).await;
    }

    assert!(auditor.is_ip_locked("198.51.100.7").await);
    assert!(!auditor.is_ip_locked("203.0.113.1").await);
}

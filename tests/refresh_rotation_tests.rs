//! Refresh token rotation and revocation tests.
//!
//! Rotation must leave exactly one live token per lineage: the grant that
//! used a token kills it and mints its successor.

use oauth_provider::audit::{LockoutPolicy, RequestContext, SecurityAuditor};
use oauth_provider::authorize::{AuthorizationIssuer, AuthorizationRequest};
use oauth_provider::clients::{
    MemoryClientRegistry, MemoryUserDirectory, OAuthApplication, UserAccount,
};
use oauth_provider::config::Config;
use oauth_provider::error::AuthError;
use oauth_provider::keys::KeyManager;
use oauth_provider::store::{
    MemoryAuthorizationCodeStore, MemoryRefreshTokenStore, MemorySecurityEventStore,
};
use oauth_provider::token::{TokenIssuer, TokenRequest};
use std::sync::Arc;

struct Harness {
    tokens: TokenIssuer,
    refresh_store: Arc<MemoryRefreshTokenStore>,
    authorizer: Arc<AuthorizationIssuer>,
}

async fn harness() -> Harness {
    let config = Config::for_tests("https://auth.example.com");

    let registry = MemoryClientRegistry::new();
    registry
        .register(OAuthApplication::new(
            "client-1",
            vec!["https://app.example/cb".to_string()],
            vec!["openid".to_string(), "email".to_string()],
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
    let refresh_store = Arc::new(MemoryRefreshTokenStore::new());
    let authorizer = Arc::new(AuthorizationIssuer::new(
        Arc::clone(&registry) as _,
        Arc::new(MemoryAuthorizationCodeStore::new()),
        Arc::clone(&auditor),
        config.authorization_code_ttl,
    ));

    let tokens = TokenIssuer::new(
        &config,
        Arc::new(KeyManager::generate(&config).unwrap()),
        Arc::clone(&authorizer),
        registry as _,
        Arc::clone(&refresh_store) as _,
        Arc::new(users) as _,
        auditor,
    );

    Harness {
        tokens,
        refresh_store,
        authorizer,
    }
}

fn ctx() -> RequestContext {
    RequestContext::from_ip("203.0.113.9")
}

impl Harness {
    /// Authorize and exchange a code, returning the initial refresh token.
    async fn obtain_refresh_token(&self) -> String {
        let request = AuthorizationRequest {
            client_id: "client-1".to_string(),
            redirect_uri: "https://app.example/cb".to_string(),
            response_type: "code".to_string(),
            scope: Some("openid email".to_string()),
            ..Default::default()
        };
        let user = UserAccount {
            id: "user-1".to_string(),
            email: "user@example.com".to_string(),
            email_verified: true,
            name: None,
            given_name: None,
            family_name: None,
            picture: None,
            locale: None,
        };
        let code = self.authorizer.issue(&request, &user, &ctx()).await.unwrap();

        let response = self
            .tokens
            .process_token_request(
                &TokenRequest {
                    grant_type: "authorization_code".to_string(),
                    code: Some(code),
                    redirect_uri: Some("https://app.example/cb".to_string()),
                    client_id: Some("client-1".to_string()),
                    ..Default::default()
                },
                &ctx(),
            )
            .await
            .unwrap();

        response.refresh_token.unwrap()
    }

    fn refresh_request(&self, token: &str) -> TokenRequest {
        TokenRequest {
            grant_type: "refresh_token".to_string(),
            refresh_token: Some(token.to_string()),
            ..Default::default()
        }
    }
}

#[tokio::test]
async fn rotation_invalidates_the_used_token() {
    let harness = harness().await;
    let first = harness.obtain_refresh_token().await;

    let response = harness
        .tokens
        .process_token_request(&harness.refresh_request(&first), &ctx())
        .await
        .unwrap();

    let second = response.refresh_token.expect("rotation mints a successor");
    assert_ne!(first, second);
    assert!(response.id_token.is_none());
    assert_eq!(response.scope, "openid email");

    // The consumed token is dead
    let replayed = harness
        .tokens
        .process_token_request(&harness.refresh_request(&first), &ctx())
        .await;
    assert!(matches!(replayed, Err(AuthError::Grant)));

    // Its successor still works
    let rotated_again = harness
        .tokens
        .process_token_request(&harness.refresh_request(&second), &ctx())
        .await;
    assert!(rotated_again.is_ok());
}

#[tokio::test]
async fn exactly_one_live_token_per_lineage() {
    let harness = harness().await;
    let mut current = harness.obtain_refresh_token().await;

    for _ in 0..5 {
        assert_eq!(harness.refresh_store.active_count_for_user("user-1").await, 1);
        let response = harness
            .tokens
            .process_token_request(&harness.refresh_request(&current), &ctx())
            .await
            .unwrap();
        current = response.refresh_token.unwrap();
    }

    assert_eq!(harness.refresh_store.active_count_for_user("user-1").await, 1);
}

#[tokio::test]
async fn unknown_refresh_token_rejected() {
    let harness = harness().await;
    let result = harness
        .tokens
        .process_token_request(&harness.refresh_request("fabricated-token"), &ctx())
        .await;
    assert!(matches!(result, Err(AuthError::Grant)));
}

#[tokio::test]
async fn refresh_with_foreign_client_id_rejected() {
    let harness = harness().await;
    let token = harness.obtain_refresh_token().await;

    let mut request = harness.refresh_request(&token);
    request.client_id = Some("client-9".to_string());

    let result = harness.tokens.process_token_request(&request, &ctx()).await;
    assert!(matches!(result, Err(AuthError::Grant)));
}

#[tokio::test]
async fn revoked_token_cannot_refresh() {
    let harness = harness().await;
    let token = harness.obtain_refresh_token().await;

    harness
        .tokens
        .revoke(&token, Some("refresh_token"), "client-1", &ctx())
        .await
        .unwrap();

    let result = harness
        .tokens
        .process_token_request(&harness.refresh_request(&token), &ctx())
        .await;
    assert!(matches!(result, Err(AuthError::Grant)));
}

#[tokio::test]
async fn revocation_is_idempotent_and_quiet() {
    let harness = harness().await;
    let token = harness.obtain_refresh_token().await;

    harness
        .tokens
        .revoke(&token, None, "client-1", &ctx())
        .await
        .unwrap();
    // Second revocation of the same token: still a success
    harness
        .tokens
        .revoke(&token, None, "client-1", &ctx())
        .await
        .unwrap();
    // Unknown values are quiet successes too
    harness
        .tokens
        .revoke("never-issued", None, "client-1", &ctx())
        .await
        .unwrap();
}

#[tokio::test]
async fn access_token_revocation_validates_structure_only() {
    let harness = harness().await;

    let request = AuthorizationRequest {
        client_id: "client-1".to_string(),
        redirect_uri: "https://app.example/cb".to_string(),
        response_type: "code".to_string(),
        scope: Some("openid".to_string()),
        ..Default::default()
    };
    let user = UserAccount {
        id: "user-1".to_string(),
        email: "user@example.com".to_string(),
        email_verified: true,
        name: None,
        given_name: None,
        family_name: None,
        picture: None,
        locale: None,
    };
    let code = harness.authorizer.issue(&request, &user, &ctx()).await.unwrap();
    let response = harness
        .tokens
        .process_token_request(
            &TokenRequest {
                grant_type: "authorization_code".to_string(),
                code: Some(code),
                redirect_uri: Some("https://app.example/cb".to_string()),
                client_id: Some("client-1".to_string()),
                ..Default::default()
            },
            &ctx(),
        )
        .await
        .unwrap();

    harness
        .tokens
        .revoke(&response.access_token, Some("access_token"), "client-1", &ctx())
        .await
        .unwrap();

    // Malformed input on the access-token path is still a quiet success
    harness
        .tokens
        .revoke("not-a-jwt", Some("access_token"), "client-1", &ctx())
        .await
        .unwrap();
}

#[tokio::test]
async fn logout_revokes_every_lineage() {
    let harness = harness().await;
    let first = harness.obtain_refresh_token().await;
    let second = harness.obtain_refresh_token().await;
    assert_ne!(first, second);
    assert_eq!(harness.refresh_store.active_count_for_user("user-1").await, 2);

    let revoked = harness
        .tokens
        .revoke_all_for_user("user-1", &ctx())
        .await
        .unwrap();
    assert_eq!(revoked, 2);
    assert_eq!(harness.refresh_store.active_count_for_user("user-1").await, 0);

    for token in [first, second] {
        let result = harness
            .tokens
            .process_token_request(&harness.refresh_request(&token), &ctx())
            .await;
        assert!(matches!(result, Err(AuthError::Grant)));
    }
}

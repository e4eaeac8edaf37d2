//! Authorization request validation and code redemption.
//!
//! `consume` is the single gate through which downstream code learns who
//! authenticated. Every redemption failure looks identical to the caller:
//! a missing code, an expired code, a replayed code, and a client or
//! redirect mismatch all produce the same grant error, so the token
//! endpoint cannot be used to probe for valid codes.

use crate::audit::event::{RequestContext, SecurityEvent, SecurityEventType};
use crate::audit::SecurityAuditor;
use crate::authorize::code::AuthorizationCode;
use crate::clients::{ClientRegistry, UserAccount};
use crate::error::{self, AuthError};
use crate::pkce;
use crate::store::AuthorizationCodeStore;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A parsed authorization request.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationRequest {
    /// Requesting client
    pub client_id: String,
    /// Requested redirect URI
    pub redirect_uri: String,
    /// Must be "code"
    pub response_type: String,
    /// Space-delimited scopes; empty defaults to "openid"
    pub scope: Option<String>,
    /// Opaque client state
    pub state: Option<String>,
    /// OIDC nonce
    pub nonce: Option<String>,
    /// PKCE challenge
    pub code_challenge: Option<String>,
    /// PKCE challenge method
    pub code_challenge_method: Option<String>,
}

/// Issues and redeems single-use authorization codes.
pub struct AuthorizationIssuer {
    clients: Arc<dyn ClientRegistry>,
    codes: Arc<dyn AuthorizationCodeStore>,
    audit: Arc<SecurityAuditor>,
    code_ttl: Duration,
}

impl AuthorizationIssuer {
    /// Wire up an issuer.
    #[must_use]
    pub fn new(
        clients: Arc<dyn ClientRegistry>,
        codes: Arc<dyn AuthorizationCodeStore>,
        audit: Arc<SecurityAuditor>,
        code_ttl: Duration,
    ) -> Self {
        Self {
            clients,
            codes,
            audit,
            code_ttl,
        }
    }

    /// Validate an authorization request and mint a code for the user.
    ///
    /// # Errors
    ///
    /// Fails on unknown client, unregistered redirect URI, a response type
    /// other than `code`, scopes outside the registered set, or a PKCE
    /// challenge without a valid method.
    pub async fn issue(
        &self,
        request: &AuthorizationRequest,
        user: &UserAccount,
        ctx: &RequestContext,
    ) -> Result<String, AuthError> {
        let app = self
            .clients
            .get_application(&request.client_id)
            .await?
            .ok_or_else(|| AuthError::invalid_client("Unknown client_id"))?;

        if !app.allows_redirect_uri(&request.redirect_uri) {
            return Err(AuthError::invalid_client("redirect_uri not registered"));
        }

        if request.response_type != "code" {
            return Err(AuthError::validation(format!(
                "Unsupported response_type: {}",
                request.response_type
            )));
        }

        let scopes = requested_scopes(request.scope.as_deref());
        if !app.allows_scopes(scopes.iter().map(String::as_str)) {
            return Err(AuthError::invalid_scope("Scope outside registered set"));
        }

        // A challenge is only accepted with a valid method, and a method
        // means nothing without a challenge.
        let challenge = match (&request.code_challenge, &request.code_challenge_method) {
            (Some(challenge), Some(method)) => {
                let method = pkce::ChallengeMethod::parse(method)?;
                Some((challenge.clone(), method.as_str().to_string()))
            }
            (Some(_), None) => {
                return Err(AuthError::validation(
                    "code_challenge requires code_challenge_method",
                ))
            }
            (None, Some(_)) => {
                return Err(AuthError::validation(
                    "code_challenge_method requires code_challenge",
                ))
            }
            (None, None) => None,
        };

        let code_value = generate_code();

        let mut record = AuthorizationCode::new(
            code_value.clone(),
            app.client_id.clone(),
            user.id.clone(),
            request.redirect_uri.clone(),
            scopes,
            self.code_ttl,
        );
        if let Some((challenge, method)) = challenge {
            record = record.with_challenge(challenge, method);
        }
        if let Some(nonce) = &request.nonce {
            record = record.with_nonce(nonce.clone());
        }
        if let Some(state) = &request.state {
            record = record.with_state(state.clone());
        }

        self.codes.insert(record).await?;

        self.audit
            .log(
                SecurityEvent::new(SecurityEventType::AuthorizationCodeIssued, ctx, true)
                    .with_user(&user.id)
                    .with_client(&app.client_id),
            )
            .await;

        info!(client_id = %app.client_id, user_id = %user.id, "Issued authorization code");

        Ok(code_value)
    }

    /// Redeem a code exactly once, returning the full record.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Grant` for every redemption failure; the cause
    /// is recorded in the audit trail only.
    pub async fn consume(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
        ctx: &RequestContext,
    ) -> Result<AuthorizationCode, AuthError> {
        let Some(mut record) = self.codes.get(code).await? else {
            return Err(self.deny(ctx, client_id, error::CODE_INVALID, "code not found").await);
        };

        if !record.is_redeemable() {
            return Err(self
                .deny(ctx, client_id, error::CODE_INVALID, "code expired or used")
                .await);
        }

        if record.client_id != client_id || record.redirect_uri != redirect_uri {
            return Err(self
                .deny(ctx, client_id, error::CODE_INVALID, "binding mismatch")
                .await);
        }

        if let Some(challenge) = &record.code_challenge {
            let method = record.code_challenge_method.as_deref().unwrap_or("S256");
            if !pkce::verify(code_verifier, Some(challenge), method) {
                return Err(self
                    .deny(ctx, client_id, error::PKCE_MISMATCH, "verifier rejected")
                    .await);
            }
        }

        // The conditional update is what makes redemption single-use under
        // concurrent submission, in-process or across instances.
        if !self.codes.mark_used(record.code.as_str()).await? {
            return Err(self
                .deny(ctx, client_id, error::CODE_INVALID, "lost redemption race")
                .await);
        }
        record.used = true;

        self.audit
            .log(
                SecurityEvent::new(SecurityEventType::AuthorizationCodeUsed, ctx, true)
                    .with_user(&record.user_id)
                    .with_client(client_id),
            )
            .await;

        info!(client_id = %client_id, user_id = %record.user_id, "Redeemed authorization code");

        Ok(record)
    }

    /// Log a uniform redemption failure and build the grant error.
    async fn deny(
        &self,
        ctx: &RequestContext,
        client_id: &str,
        error_code: &str,
        detail: &str,
    ) -> AuthError {
        warn!(client_id = %client_id, error_code = %error_code, "Rejected code redemption");
        self.audit
            .log(
                SecurityEvent::new(SecurityEventType::AuthorizationCodeExpired, ctx, false)
                    .with_client(client_id)
                    .with_error(error_code, detail),
            )
            .await;
        AuthError::Grant
    }
}

/// Requested scopes, defaulting to `openid` when the parameter is empty.
fn requested_scopes(scope: Option<&str>) -> Vec<String> {
    let scopes: Vec<String> = scope
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if scopes.is_empty() {
        vec!["openid".to_string()]
    } else {
        scopes
    }
}

/// 256 bits of URL-safe randomness.
fn generate_code() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

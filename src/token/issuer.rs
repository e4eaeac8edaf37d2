//! Token endpoint core: grant dispatch, signing, rotation, revocation.
//!
//! The replay guard is consulted before and updated after every code
//! exchange in the same logical operation, so a client whose connection
//! died after redemption can retry the identical request and receive the
//! identical response.

use crate::audit::event::{RequestContext, SecurityEvent, SecurityEventType};
use crate::audit::SecurityAuditor;
use crate::authorize::AuthorizationIssuer;
use crate::clients::{ClientRegistry, UserAccount, UserDirectory};
use crate::config::Config;
use crate::error::{self, AuthError};
use crate::keys::KeyManager;
use crate::replay::{ExchangeOutcome, ReplayGuard};
use crate::store::RefreshTokenStore;
use crate::token::claims::{AccessClaims, IdClaims};
use crate::token::refresh::{RefreshToken, RefreshTokenGenerator};
use crate::token::serializer::TokenSerializer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Supported grant kinds. Adding one is a compile-time-checked change:
/// every dispatch site matches exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantType {
    /// Exchange of a single-use authorization code
    AuthorizationCode,
    /// Rotation of a refresh token
    RefreshToken,
}

impl GrantType {
    /// Parse a wire grant type.
    ///
    /// # Errors
    ///
    /// Names the unsupported type in the error.
    pub fn parse(s: &str) -> Result<Self, AuthError> {
        match s {
            "authorization_code" => Ok(Self::AuthorizationCode),
            "refresh_token" => Ok(Self::RefreshToken),
            other => Err(AuthError::UnsupportedGrantType(other.to_string())),
        }
    }

    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
        }
    }
}

/// Form-style token request as parsed by the outer layer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    /// Requested grant type
    pub grant_type: String,
    /// Authorization code (authorization_code grant)
    pub code: Option<String>,
    /// Redirect URI used at authorization (authorization_code grant)
    pub redirect_uri: Option<String>,
    /// Requesting client
    pub client_id: Option<String>,
    /// Client secret for confidential clients
    pub client_secret: Option<String>,
    /// PKCE verifier
    pub code_verifier: Option<String>,
    /// Refresh token (refresh_token grant)
    pub refresh_token: Option<String>,
}

/// Successful token response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Signed access token
    pub access_token: String,
    /// Always "Bearer"
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
    /// Rotating refresh token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Granted scopes, space-joined
    pub scope: String,
    /// ID token, present when `openid` was granted at authorization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

/// Issues, refreshes, and revokes tokens.
pub struct TokenIssuer {
    issuer: String,
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
    id_token_ttl: Duration,
    keys: Arc<KeyManager>,
    serializer: TokenSerializer,
    authorizer: Arc<AuthorizationIssuer>,
    clients: Arc<dyn ClientRegistry>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    users: Arc<dyn UserDirectory>,
    audit: Arc<SecurityAuditor>,
    replay: ReplayGuard,
    refresh_gen: RefreshTokenGenerator,
}

impl TokenIssuer {
    /// Wire up a token issuer from configuration and collaborators.
    #[must_use]
    pub fn new(
        config: &Config,
        keys: Arc<KeyManager>,
        authorizer: Arc<AuthorizationIssuer>,
        clients: Arc<dyn ClientRegistry>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        users: Arc<dyn UserDirectory>,
        audit: Arc<SecurityAuditor>,
    ) -> Self {
        Self {
            issuer: config.issuer.clone(),
            access_token_ttl: config.access_token_ttl,
            refresh_token_ttl: config.refresh_token_ttl,
            id_token_ttl: config.id_token_ttl,
            serializer: TokenSerializer::new(config.jwt_algorithm),
            refresh_gen: RefreshTokenGenerator::new(&config.refresh_lookup_key),
            replay: ReplayGuard::new(config.replay_cache_ttl),
            keys,
            authorizer,
            clients,
            refresh_tokens,
            users,
            audit,
        }
    }

    /// Dispatch a token request on its grant type.
    ///
    /// # Errors
    ///
    /// Validation errors for malformed requests, `AuthError::Grant` for
    /// rejected codes or refresh tokens, signing/storage errors otherwise.
    pub async fn process_token_request(
        &self,
        request: &TokenRequest,
        ctx: &RequestContext,
    ) -> Result<TokenResponse, AuthError> {
        match GrantType::parse(&request.grant_type)? {
            GrantType::AuthorizationCode => self.exchange_code(request, ctx).await,
            GrantType::RefreshToken => self.refresh(request, ctx).await,
        }
    }

    /// authorization_code grant.
    async fn exchange_code(
        &self,
        request: &TokenRequest,
        ctx: &RequestContext,
    ) -> Result<TokenResponse, AuthError> {
        let code = require(&request.code, "code")?;
        let redirect_uri = require(&request.redirect_uri, "redirect_uri")?;
        let client_id = require(&request.client_id, "client_id")?;

        // A retry of an exchange we already settled gets the settled answer.
        if let Some(outcome) = self.replay.get(code).await {
            info!(client_id = %client_id, "Replayed cached exchange outcome");
            return outcome_to_result(outcome);
        }

        self.authenticate_client(client_id, request.client_secret.as_deref(), ctx)
            .await?;

        let record = match self
            .authorizer
            .consume(code, client_id, redirect_uri, request.code_verifier.as_deref(), ctx)
            .await
        {
            Ok(record) => record,
            Err(AuthError::Grant) => {
                // Settle the failure so retries of this code short-circuit
                // instead of re-deriving the rejection.
                self.replay
                    .record(
                        code,
                        ExchangeOutcome::Denied {
                            error: "invalid_grant".to_string(),
                            description: "code rejected".to_string(),
                        },
                    )
                    .await;
                self.audit.track_failed_attempt(&ctx.ip_address).await;
                return Err(AuthError::Grant);
            }
            Err(other) => return Err(other),
        };

        let user = self.lookup_user(&record.user_id).await?;
        let scope = record.scope_string();

        let access_token = self.sign_access_token(&user, client_id, scope.clone())?;
        let refresh_token = self
            .issue_refresh_token(&user.id, client_id, record.scopes.clone())
            .await?;

        let id_token = if record.scopes.iter().any(|s| s == "openid") {
            Some(self.sign_id_token(&user, client_id, record.auth_time, record.nonce.clone())?)
        } else {
            None
        };

        let response = TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_ttl.as_secs(),
            refresh_token: Some(refresh_token),
            scope,
            id_token,
        };

        // Same logical operation as consumption: settle before returning,
        // so a response lost on the wire is recoverable by retry.
        self.replay
            .record(code, ExchangeOutcome::Completed(response.clone()))
            .await;

        self.audit.clear_failed_attempts(&ctx.ip_address).await;
        self.audit
            .log(
                SecurityEvent::new(SecurityEventType::TokenIssued, ctx, true)
                    .with_user(&user.id)
                    .with_client(client_id),
            )
            .await;

        info!(client_id = %client_id, user_id = %user.id, "Issued tokens for authorization code");

        Ok(response)
    }

    /// refresh_token grant: rotate the presented token.
    async fn refresh(
        &self,
        request: &TokenRequest,
        ctx: &RequestContext,
    ) -> Result<TokenResponse, AuthError> {
        let presented = require(&request.refresh_token, "refresh_token")?;
        let hash = self.refresh_gen.hash(presented);

        let record = self.refresh_tokens.find_by_hash(&hash).await?;
        let record = match record {
            Some(record) if record.is_active() => record,
            _ => {
                self.audit.track_failed_attempt(&ctx.ip_address).await;
                self.audit
                    .log(
                        SecurityEvent::new(SecurityEventType::TokenRefreshed, ctx, false)
                            .with_error(error::REFRESH_INVALID, "refresh token rejected"),
                    )
                    .await;
                warn!("Rejected refresh token");
                return Err(AuthError::Grant);
            }
        };

        // When the client identifies itself it must be the token's owner.
        if let Some(client_id) = &request.client_id {
            if *client_id != record.client_id {
                self.audit.track_failed_attempt(&ctx.ip_address).await;
                return Err(AuthError::Grant);
            }
        }

        let user = self.lookup_user(&record.user_id).await?;
        let scope = record.scopes.join(" ");

        let access_token = self.sign_access_token(&user, &record.client_id, scope.clone())?;

        // Revoking the presented token before minting its successor makes
        // rotation single-winner: of two concurrent grants with the same
        // token, exactly one gets past this point.
        if !self.refresh_tokens.revoke(&hash).await? {
            self.audit.track_failed_attempt(&ctx.ip_address).await;
            return Err(AuthError::Grant);
        }

        let new_refresh = self
            .issue_refresh_token(&user.id, &record.client_id, record.scopes.clone())
            .await?;

        self.audit.clear_failed_attempts(&ctx.ip_address).await;
        self.audit
            .log(
                SecurityEvent::new(SecurityEventType::TokenRefreshed, ctx, true)
                    .with_user(&user.id)
                    .with_client(&record.client_id),
            )
            .await;

        info!(client_id = %record.client_id, user_id = %user.id, "Rotated refresh token");

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_ttl.as_secs(),
            refresh_token: Some(new_refresh),
            scope,
            id_token: None,
        })
    }

    /// Best-effort revocation. Idempotent; "not found" is success.
    ///
    /// Tries the refresh-token store first unless the hint says otherwise,
    /// then falls back to validating the value as an access token. Access
    /// tokens are stateless, so that path only confirms structure and the
    /// `client_id` claim; an expired token counts as revoked.
    ///
    /// # Errors
    ///
    /// Only storage failures surface; unknown tokens do not.
    pub async fn revoke(
        &self,
        token: &str,
        token_type_hint: Option<&str>,
        client_id: &str,
        ctx: &RequestContext,
    ) -> Result<(), AuthError> {
        if token_type_hint != Some("access_token") {
            let hash = self.refresh_gen.hash(token);
            if self.refresh_tokens.revoke(&hash).await? {
                self.audit
                    .log(
                        SecurityEvent::new(SecurityEventType::TokenRevoked, ctx, true)
                            .with_client(client_id)
                            .with_metadata("token_type", "refresh_token".into()),
                    )
                    .await;
                info!(client_id = %client_id, "Revoked refresh token");
                return Ok(());
            }
        }

        match self.serializer.decode::<AccessClaims>(token, &self.keys) {
            Ok(claims) if claims.client_id == client_id => {
                // Stateless: nothing to delete. Expired means already dead;
                // a live token stays valid until expiry absent a denylist.
                self.audit
                    .log(
                        SecurityEvent::new(SecurityEventType::TokenRevoked, ctx, true)
                            .with_user(&claims.sub)
                            .with_client(client_id)
                            .with_metadata("token_type", "access_token".into())
                            .with_metadata("expired", claims.is_expired().into()),
                    )
                    .await;
                Ok(())
            }
            _ => {
                // Unknown or foreign token: still a quiet success.
                self.audit
                    .log(
                        SecurityEvent::new(SecurityEventType::TokenRevoked, ctx, false)
                            .with_client(client_id)
                            .with_error(error::REFRESH_INVALID, "token not recognized"),
                    )
                    .await;
                Ok(())
            }
        }
    }

    /// Revoke every refresh token a user holds (logout).
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn revoke_all_for_user(
        &self,
        user_id: &str,
        ctx: &RequestContext,
    ) -> Result<u32, AuthError> {
        let count = self.refresh_tokens.revoke_all_for_user(user_id).await?;
        self.audit
            .log(
                SecurityEvent::new(SecurityEventType::TokenRevoked, ctx, true)
                    .with_user(user_id)
                    .with_metadata("revoked_count", count.into()),
            )
            .await;
        info!(user_id = %user_id, count = count, "Revoked all refresh tokens for user");
        Ok(count)
    }

    /// Verify a confidential client's secret when one is registered.
    async fn authenticate_client(
        &self,
        client_id: &str,
        client_secret: Option<&str>,
        ctx: &RequestContext,
    ) -> Result<(), AuthError> {
        let Some(app) = self.clients.get_application(client_id).await? else {
            // The code lookup will fail uniformly; nothing to verify here.
            return Ok(());
        };

        if !app.verify_secret(client_secret) {
            self.audit.track_failed_attempt(&ctx.ip_address).await;
            self.audit
                .log(
                    SecurityEvent::new(SecurityEventType::TokenIssued, ctx, false)
                        .with_client(client_id)
                        .with_error(error::CLIENT_REJECTED, "client secret rejected"),
                )
                .await;
            return Err(AuthError::invalid_client("Client authentication failed"));
        }

        Ok(())
    }

    async fn lookup_user(&self, user_id: &str) -> Result<UserAccount, AuthError> {
        self.users
            .get_user(user_id)
            .await?
            .ok_or_else(|| AuthError::internal(format!("Unknown user: {}", user_id)))
    }

    fn sign_access_token(
        &self,
        user: &UserAccount,
        client_id: &str,
        scope: String,
    ) -> Result<String, AuthError> {
        let claims = AccessClaims::new(
            &self.issuer,
            user,
            client_id,
            scope,
            self.access_token_ttl.as_secs() as i64,
        );
        self.serializer.sign(&claims, &self.keys)
    }

    fn sign_id_token(
        &self,
        user: &UserAccount,
        client_id: &str,
        auth_time: DateTime<Utc>,
        nonce: Option<String>,
    ) -> Result<String, AuthError> {
        let mut claims = IdClaims::new(
            &self.issuer,
            user,
            client_id,
            auth_time,
            self.id_token_ttl.as_secs() as i64,
        );
        if let Some(nonce) = nonce {
            claims = claims.with_nonce(nonce);
        }
        self.serializer.sign(&claims, &self.keys)
    }

    async fn issue_refresh_token(
        &self,
        user_id: &str,
        client_id: &str,
        scopes: Vec<String>,
    ) -> Result<String, AuthError> {
        let secret = self.refresh_gen.generate();
        let record = RefreshToken::new(
            self.refresh_gen.hash(&secret),
            user_id.to_string(),
            client_id.to_string(),
            scopes,
            self.refresh_token_ttl,
        );
        self.refresh_tokens.insert(record).await?;
        Ok(secret)
    }
}

/// Pull a required field out of an optional request slot.
fn require<'a>(field: &'a Option<String>, name: &str) -> Result<&'a str, AuthError> {
    field
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AuthError::validation(format!("{} is required", name)))
}

/// Translate a cached outcome back into the caller-visible result.
fn outcome_to_result(outcome: ExchangeOutcome) -> Result<TokenResponse, AuthError> {
    match outcome {
        ExchangeOutcome::Completed(response) => Ok(response),
        ExchangeOutcome::Denied { error, description } => Err(match error.as_str() {
            "invalid_grant" => AuthError::Grant,
            "invalid_client" => AuthError::InvalidClient(description),
            "invalid_scope" => AuthError::InvalidScope(description),
            "unsupported_grant_type" => AuthError::UnsupportedGrantType(description),
            _ => AuthError::Validation(description),
        }),
    }
}

//! Registered client applications and user accounts.
//!
//! Both are owned by external registries; this core reads them through the
//! `ClientRegistry` and `UserDirectory` seams. In-memory implementations
//! back the test suites and local development.

use crate::error::AuthError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;

/// A registered OAuth client application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthApplication {
    /// Client identifier
    pub client_id: String,
    /// Redirect URIs, matched exactly
    pub redirect_uris: HashSet<String>,
    /// Scopes the application may be granted
    pub registered_scopes: HashSet<String>,
    /// Client secret for confidential clients; public PKCE clients omit it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Human-readable application name
    pub name: String,
}

impl OAuthApplication {
    /// Create an application with the given id, redirect URIs, and scopes.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        redirect_uris: impl IntoIterator<Item = String>,
        registered_scopes: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uris: redirect_uris.into_iter().collect(),
            registered_scopes: registered_scopes.into_iter().collect(),
            client_secret: None,
            name: String::new(),
        }
    }

    /// Set a client secret, making this a confidential client.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Set the application name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Whether the redirect URI is registered (exact match).
    #[must_use]
    pub fn allows_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.contains(uri)
    }

    /// Whether every requested scope is inside the registered set.
    #[must_use]
    pub fn allows_scopes<'a>(&self, scopes: impl IntoIterator<Item = &'a str>) -> bool {
        scopes.into_iter().all(|s| self.registered_scopes.contains(s))
    }

    /// Verify a presented client secret in constant time.
    ///
    /// Returns true for public clients only when no secret was presented.
    #[must_use]
    pub fn verify_secret(&self, presented: Option<&str>) -> bool {
        match (&self.client_secret, presented) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(registered), Some(presented)) => {
                registered.len() == presented.len()
                    && registered.as_bytes().ct_eq(presented.as_bytes()).into()
            }
        }
    }
}

/// An end user as seen by the token layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    /// Stable subject identifier
    pub id: String,
    /// Primary email address
    pub email: String,
    /// Whether the email has been verified
    pub email_verified: bool,
    /// Full display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Given name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    /// Family name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    /// Profile picture URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    /// BCP 47 locale
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

/// Read-only access to registered client applications.
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    /// Look up an application by client id.
    async fn get_application(&self, client_id: &str)
        -> Result<Option<OAuthApplication>, AuthError>;
}

/// Read-only access to user accounts.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up a user by stable identifier.
    async fn get_user(&self, user_id: &str) -> Result<Option<UserAccount>, AuthError>;
}

/// In-memory client registry for tests and development.
#[derive(Default)]
pub struct MemoryClientRegistry {
    applications: RwLock<HashMap<String, OAuthApplication>>,
}

impl MemoryClientRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an application.
    pub async fn register(&self, app: OAuthApplication) {
        let mut applications = self.applications.write().await;
        applications.insert(app.client_id.clone(), app);
    }
}

#[async_trait]
impl ClientRegistry for MemoryClientRegistry {
    async fn get_application(
        &self,
        client_id: &str,
    ) -> Result<Option<OAuthApplication>, AuthError> {
        let applications = self.applications.read().await;
        Ok(applications.get(client_id).cloned())
    }
}

/// In-memory user directory for tests and development.
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<String, UserAccount>>,
}

impl MemoryUserDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user.
    pub async fn add(&self, user: UserAccount) {
        let mut users = self.users.write().await;
        users.insert(user.id.clone(), user);
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserAccount>, AuthError> {
        let users = self.users.read().await;
        Ok(users.get(user_id).cloned())
    }
}

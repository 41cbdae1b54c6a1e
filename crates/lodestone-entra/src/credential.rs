//! Token credentials
//!
//! A [`TokenCredential`] produces Entra bearer tokens for a set of scopes.
//! [`ClientSecretCredential`] implements the OAuth2 client-credentials flow;
//! [`StaticTokenCredential`] serves a fixed token for tests and pre-acquired
//! tokens.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use lodestone_core::{LodestoneError, Result};
use reqwest::Client;
use serde::Deserialize;

use crate::PROVIDER_CALL_TIMEOUT;

/// A bearer token together with its expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_on,
        }
    }

    /// Whether the token expires within the given margin from now
    pub fn expires_within(&self, margin: Duration) -> bool {
        self.expires_on <= Utc::now() + margin
    }
}

/// Trait for identity providers that can issue access tokens
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Request a token valid for the given scopes
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken>;
}

// ============================================================================
// Static Credential
// ============================================================================

/// A credential that always returns the same token
pub struct StaticTokenCredential {
    token: AccessToken,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self {
            token: AccessToken::new(token, expires_on),
        }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(&self, _scopes: &[&str]) -> Result<AccessToken> {
        Ok(self.token.clone())
    }
}

// ============================================================================
// Client Secret Credential
// ============================================================================

const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Entra client-credentials (service principal) flow
pub struct ClientSecretCredential {
    client: Client,
    authority: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

impl ClientSecretCredential {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            authority: DEFAULT_AUTHORITY.to_string(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Override the authority endpoint (sovereign clouds, tests)
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into();
        self
    }

    /// Create from the conventional `AZURE_TENANT_ID`/`AZURE_CLIENT_ID`/
    /// `AZURE_CLIENT_SECRET` environment variables
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| {
            std::env::var(name).map_err(|_| {
                LodestoneError::Configuration(format!("environment variable {name} is not set"))
            })
        };

        Ok(Self::new(
            var("AZURE_TENANT_ID")?,
            var("AZURE_CLIENT_ID")?,
            var("AZURE_CLIENT_SECRET")?,
        ))
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken> {
        let url = format!("{}/{}/oauth2/v2.0/token", self.authority, self.tenant_id);
        let scope = scopes.join(" ");

        let response = self
            .client
            .post(&url)
            .timeout(PROVIDER_CALL_TIMEOUT)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", scope.as_str()),
            ])
            .send()
            .await
            .map_err(|e| LodestoneError::Token(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LodestoneError::Token(format!(
                "token request returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| LodestoneError::Token(format!("invalid token response: {e}")))?;

        Ok(AccessToken::new(
            token.access_token,
            Utc::now() + Duration::seconds(token.expires_in),
        ))
    }
}

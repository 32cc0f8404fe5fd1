//! Access tokens for Azure Resource Manager
//!
//! Implements the OAuth2 client-credentials flow against the environment's
//! token authority. The service principal proves itself either with a client
//! secret or, under workload identity, with a federated service-account token
//! read from disk on every refresh.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::cloud::CloudProfile;
use crate::error::AzureError;

/// Tokens are refreshed this long before they expire
const REFRESH_MARGIN_MINUTES: i64 = 5;

const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// How the service principal authenticates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCredential {
    /// Shared client secret
    Secret(String),
    /// Federated token file (workload identity)
    FederatedTokenFile(PathBuf),
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_on: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: String,
}

/// Service principal token source with an in-memory cache
#[derive(Debug)]
pub struct TokenCredential {
    http: Client,
    token_url: String,
    scope: String,
    client_id: String,
    credential: ClientCredential,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenCredential {
    pub fn new(
        http: Client,
        cloud: &CloudProfile,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        credential: ClientCredential,
    ) -> Self {
        let tenant_id = tenant_id.into();
        Self {
            http,
            token_url: format!(
                "{}/{}/oauth2/v2.0/token",
                cloud.active_directory_endpoint.trim_end_matches('/'),
                tenant_id
            ),
            scope: cloud.token_scope(),
            client_id: client_id.into(),
            credential,
            cached: Mutex::new(None),
        }
    }

    /// A valid bearer token, fetching a new one when the cached token is near expiry
    pub async fn token(&self) -> Result<String, AzureError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_on - Duration::minutes(REFRESH_MARGIN_MINUTES) > Utc::now() {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.request_token().await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }

    async fn request_token(&self) -> Result<CachedToken, AzureError> {
        debug!(token_url = %self.token_url, client_id = %self.client_id, "Requesting access token");

        let mut form = vec![
            ("grant_type", "client_credentials".to_string()),
            ("client_id", self.client_id.clone()),
            ("scope", self.scope.clone()),
        ];
        match &self.credential {
            ClientCredential::Secret(secret) => form.push(("client_secret", secret.clone())),
            ClientCredential::FederatedTokenFile(path) => {
                let assertion = tokio::fs::read_to_string(path).await.map_err(|e| {
                    AzureError::Authentication(format!(
                        "failed to read federated token file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                form.push(("client_assertion_type", CLIENT_ASSERTION_TYPE.to_string()));
                form.push(("client_assertion", assertion.trim().to_string()));
            }
        }

        let response = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(AzureError::send)?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let detail = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|e| format!("{}: {}", e.error, e.error_description))
                .unwrap_or(body);
            return Err(AzureError::Authentication(format!(
                "token request rejected with status {}: {}",
                status, detail
            )));
        }

        let token: TokenResponse = serde_json::from_str(&body)?;
        let lifetime = i64::try_from(token.expires_in).unwrap_or(3600).min(86_400);
        Ok(CachedToken {
            access_token: token.access_token,
            expires_on: Utc::now() + Duration::seconds(lifetime),
        })
    }
}

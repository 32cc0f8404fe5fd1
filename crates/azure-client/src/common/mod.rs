//! Common utilities for the Azure Resource Manager client
//!
//! Provides the authenticated HTTP wrapper shared by every resource operation.

pub mod resource_id;

use std::sync::Arc;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::TokenCredential;
use crate::error::AzureError;

pub use resource_id::ResourceId;

/// User agent fragment identifying this client to ARM
pub const USER_AGENT: &str = concat!(
    "cluster-api-azure-services azure-machine-controller/",
    env!("CARGO_PKG_VERSION")
);

/// List response wrapper from ARM
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmList<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArmErrorResponse {
    error: ArmErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ArmErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Authenticated HTTP client bound to one resource-manager endpoint
#[derive(Debug)]
pub struct ArmHttp {
    client: Client,
    base_url: String,
    credential: Arc<TokenCredential>,
}

impl ArmHttp {
    pub fn new(client: Client, base_url: &str, credential: Arc<TokenCredential>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credential,
        }
    }

    /// Build a full URL from a resource path, an API version and extra query parameters
    pub fn build_url(&self, path: &str, api_version: &str, query: &[(&str, &str)]) -> String {
        if path.starts_with("http") {
            return path.to_string();
        }
        let mut url = format!("{}{}?api-version={}", self.base_url, path, api_version);
        for (key, value) in query {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    async fn auth_header(&self) -> Result<String, AzureError> {
        Ok(format!("Bearer {}", self.credential.token().await?))
    }

    /// GET a single resource
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        api_version: &str,
        query: &[(&str, &str)],
    ) -> Result<T, AzureError> {
        let url = self.build_url(path, api_version, query);
        debug!(url = %url, "GET request");

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header().await?)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(AzureError::send)?;

        handle_response(path, response).await
    }

    /// GET every page of a list operation, following `nextLink`
    pub async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        api_version: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, AzureError> {
        let mut url = self.build_url(path, api_version, query);
        let mut all_results = Vec::new();

        loop {
            debug!(url = %url, "Fetching page");
            let page: ArmList<T> = self.get(&url, api_version, &[]).await?;
            all_results.extend(page.value);
            match page.next_link {
                Some(next) if !next.is_empty() => url = next,
                _ => break,
            }
        }

        Ok(all_results)
    }

    /// PUT a resource (create or update)
    ///
    /// ARM answers 200 for an in-place update and 201/202 while the
    /// operation continues asynchronously; all of them are success.
    pub async fn put<T, B>(&self, path: &str, api_version: &str, body: &B) -> Result<T, AzureError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.build_url(path, api_version, &[]);
        debug!(url = %url, "PUT request");

        let response = self
            .client
            .put(&url)
            .header("Authorization", self.auth_header().await?)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(AzureError::send)?;

        handle_response(path, response).await
    }

    /// DELETE a resource; an already-absent resource is success
    pub async fn delete(&self, path: &str, api_version: &str) -> Result<(), AzureError> {
        let url = self.build_url(path, api_version, &[]);
        debug!(url = %url, "DELETE request");

        let response = self
            .client
            .delete(&url)
            .header("Authorization", self.auth_header().await?)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(AzureError::send)?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(api_error(status, body))
    }
}

async fn handle_response<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, AzureError> {
    let status = response.status();
    let text = response.text().await?;

    if status.is_success() {
        serde_json::from_str(&text).map_err(|e| {
            warn!(error = %e, path = %path, "Failed to parse response");
            AzureError::Serialization(e)
        })
    } else if status == StatusCode::NOT_FOUND {
        Err(AzureError::NotFound(format!("{}: {}", path, error_message(&text))))
    } else {
        Err(api_error(status, text))
    }
}

fn api_error(status: StatusCode, body: String) -> AzureError {
    match serde_json::from_str::<ArmErrorResponse>(&body) {
        Ok(parsed) => AzureError::Api {
            status: status.as_u16(),
            code: parsed.error.code,
            message: parsed.error.message,
        },
        Err(_) => AzureError::Api {
            status: status.as_u16(),
            code: status.canonical_reason().unwrap_or("Unknown").to_string(),
            message: body,
        },
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ArmErrorResponse>(body)
        .map(|parsed| parsed.error.message)
        .unwrap_or_else(|_| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_error_bodies_are_unpacked() {
        let err = api_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"code":"InvalidParameter","message":"vmSize is not valid"}}"#.to_string(),
        );
        match err {
            AzureError::Api { status, code, message } => {
                assert_eq!(status, 400);
                assert_eq!(code, "InvalidParameter");
                assert_eq!(message, "vmSize is not valid");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unparseable_error_bodies_are_kept_verbatim() {
        let err = api_error(StatusCode::BAD_GATEWAY, "upstream reset".to_string());
        assert_eq!(err.status(), Some(502));
        assert!(err.to_string().contains("upstream reset"));
    }

    #[test]
    fn user_agent_names_the_services_component() {
        assert!(USER_AGENT.starts_with("cluster-api-azure-services"));
    }
}

//! Azure cloud environments
//!
//! A [`CloudProfile`] parameterizes every request the client issues: the
//! resource-manager base URL, the token authority and audience, the API version
//! of each resource provider, and the capabilities the environment lacks.
//! Azure Stack Hub is the odd one out: its endpoints come from the stamp's
//! metadata document and it runs older API versions.

use std::fmt;

use serde::Deserialize;
use tracing::debug;

use crate::error::AzureError;

/// Known Azure environments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloudEnvironment {
    Public,
    UsGovernment,
    China,
    Stack,
}

impl fmt::Display for CloudEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Public => "AzurePublicCloud",
            Self::UsGovernment => "AzureUSGovernmentCloud",
            Self::China => "AzureChinaCloud",
            Self::Stack => "AzureStackCloud",
        };
        f.write_str(name)
    }
}

/// API versions per resource provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiVersions {
    /// Microsoft.Compute virtual machines, availability sets and extensions
    pub compute: String,
    /// Microsoft.Compute managed disks
    pub disks: String,
    /// Microsoft.Network
    pub network: String,
    /// Microsoft.Compute resource SKUs
    pub resource_skus: String,
}

/// Endpoints, API versions and capability flags of one Azure environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudProfile {
    pub environment: CloudEnvironment,
    /// Resource manager base URL, without trailing slash
    pub resource_manager_endpoint: String,
    /// Token authority base URL, without trailing slash
    pub active_directory_endpoint: String,
    /// Audience the access token is minted for
    pub token_audience: String,
    pub api_versions: ApiVersions,
    /// Whether VMs may request Ultra SSD support
    pub supports_ultra_ssd: bool,
    /// Whether the SKU listing accepts a `location eq` filter
    pub filters_skus_server_side: bool,
    /// Whether accelerated networking is validated against the SKU catalog
    pub supports_accelerated_networking_check: bool,
}

/// API versions used on every environment except Azure Stack Hub
fn current_api_versions() -> ApiVersions {
    ApiVersions {
        compute: "2023-03-01".to_string(),
        disks: "2023-04-02".to_string(),
        network: "2023-05-01".to_string(),
        resource_skus: "2021-07-01".to_string(),
    }
}

/// Compute API version Azure Stack Hub is pinned to
pub const STACK_COMPUTE_API_VERSION: &str = "2019-03-01";

fn stack_api_versions() -> ApiVersions {
    ApiVersions {
        compute: STACK_COMPUTE_API_VERSION.to_string(),
        disks: STACK_COMPUTE_API_VERSION.to_string(),
        network: "2018-11-01".to_string(),
        resource_skus: "2017-09-01".to_string(),
    }
}

impl CloudProfile {
    pub fn public() -> Self {
        Self::hosted(
            CloudEnvironment::Public,
            "https://management.azure.com",
            "https://login.microsoftonline.com",
        )
    }

    pub fn us_government() -> Self {
        Self::hosted(
            CloudEnvironment::UsGovernment,
            "https://management.usgovcloudapi.net",
            "https://login.microsoftonline.us",
        )
    }

    pub fn china() -> Self {
        Self::hosted(
            CloudEnvironment::China,
            "https://management.chinacloudapi.cn",
            "https://login.chinacloudapi.cn",
        )
    }

    fn hosted(environment: CloudEnvironment, resource_manager: &str, active_directory: &str) -> Self {
        Self {
            environment,
            resource_manager_endpoint: resource_manager.to_string(),
            active_directory_endpoint: active_directory.to_string(),
            token_audience: resource_manager.to_string(),
            api_versions: current_api_versions(),
            supports_ultra_ssd: true,
            filters_skus_server_side: true,
            supports_accelerated_networking_check: true,
        }
    }

    /// Azure Stack Hub profile from already-resolved endpoints
    pub fn stack(resource_manager: &str, active_directory: &str, audience: &str) -> Self {
        Self {
            environment: CloudEnvironment::Stack,
            resource_manager_endpoint: resource_manager.trim_end_matches('/').to_string(),
            active_directory_endpoint: active_directory.trim_end_matches('/').to_string(),
            token_audience: audience.trim_end_matches('/').to_string(),
            api_versions: stack_api_versions(),
            supports_ultra_ssd: false,
            filters_skus_server_side: false,
            supports_accelerated_networking_check: false,
        }
    }

    /// Resolve an Azure Stack Hub profile from `<arm>/metadata/endpoints`
    pub async fn discover_stack(http: &reqwest::Client, arm_endpoint: &str) -> Result<Self, AzureError> {
        let arm_endpoint = arm_endpoint.trim_end_matches('/');
        if arm_endpoint.is_empty() {
            return Err(AzureError::InvalidRequest(
                "an ARM endpoint is required for AzureStackCloud".to_string(),
            ));
        }

        let url = format!("{}/metadata/endpoints?api-version=2015-01-01", arm_endpoint);
        debug!(url = %url, "Fetching Azure Stack metadata endpoints");

        let response = http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(AzureError::send)?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AzureError::Api {
                status: status.as_u16(),
                code: "MetadataEndpointsUnavailable".to_string(),
                message: body,
            });
        }

        let metadata: StackMetadata = serde_json::from_str(&body)?;
        let audience = metadata
            .authentication
            .audiences
            .first()
            .cloned()
            .ok_or_else(|| AzureError::InvalidRequest("metadata endpoints list no token audience".to_string()))?;

        Ok(Self::stack(
            arm_endpoint,
            &metadata.authentication.login_endpoint,
            &audience,
        ))
    }

    /// OAuth2 scope requested for resource-manager tokens
    pub fn token_scope(&self) -> String {
        format!("{}/.default", self.token_audience.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StackMetadata {
    authentication: StackAuthentication,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StackAuthentication {
    login_endpoint: String,
    #[serde(default)]
    audiences: Vec<String>,
}

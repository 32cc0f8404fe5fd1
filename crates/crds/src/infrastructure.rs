//! Infrastructure resource
//!
//! Mirror of the cluster-scoped `config.openshift.io/v1` Infrastructure singleton
//! (always named `cluster`). The controller reads the cluster ID and the Azure
//! platform status from it.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Name of the Infrastructure singleton
pub const INFRASTRUCTURE_NAME: &str = "cluster";

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "config.openshift.io",
    version = "v1",
    kind = "Infrastructure",
    status = "InfrastructureStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureSpec {
    /// Platform configuration as supplied at install time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_spec: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureStatus {
    /// Unique cluster identifier, used as the cluster ID in resource names and tags
    #[serde(default)]
    pub infrastructure_name: String,

    /// Observed platform settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_status: Option<PlatformStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStatus {
    /// Platform type ("Azure", "AWS", ...)
    #[serde(default, rename = "type")]
    pub platform_type: String,

    /// Azure-specific settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzurePlatformStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzurePlatformStatus {
    /// Resource group holding the cluster resources
    #[serde(default)]
    pub resource_group_name: String,

    /// Resource group holding the network resources
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network_resource_group_name: String,

    /// Azure environment; absent means the public cloud
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_name: Option<AzureCloudName>,

    /// Resource manager endpoint, required for Azure Stack Hub
    #[serde(default, rename = "armEndpoint", skip_serializing_if = "Option::is_none")]
    pub arm_endpoint: Option<String>,

    /// User-defined tags applied to every Azure resource of the cluster
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_tags: Vec<AzureResourceTag>,
}

/// Azure cloud environment name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum AzureCloudName {
    #[default]
    #[serde(alias = "AzurePublic")]
    AzurePublicCloud,
    #[serde(alias = "AzureUSGovernment")]
    AzureUSGovernmentCloud,
    #[serde(alias = "AzureChina")]
    AzureChinaCloud,
    AzureStackCloud,
}

/// A key/value tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AzureResourceTag {
    /// Tag key
    pub key: String,

    /// Tag value
    pub value: String,
}

impl Infrastructure {
    /// Azure platform status, if the cluster runs on Azure
    pub fn azure_status(&self) -> Option<&AzurePlatformStatus> {
        self.status
            .as_ref()
            .and_then(|s| s.platform_status.as_ref())
            .and_then(|p| p.azure.as_ref())
    }

    /// Cluster ID (`status.infrastructureName`), empty if not yet populated
    pub fn cluster_id(&self) -> &str {
        self.status
            .as_ref()
            .map(|s| s.infrastructure_name.as_str())
            .unwrap_or_default()
    }
}

//! Microsoft.Compute resource SKU catalog models

use serde::{Deserialize, Serialize};

/// Resource type of virtual machine SKUs
pub const VIRTUAL_MACHINES_RESOURCE_TYPE: &str = "virtualMachines";

/// Resource type of availability set SKUs
pub const AVAILABILITY_SETS_RESOURCE_TYPE: &str = "availabilitySets";

/// Capability names published in the SKU catalog
pub mod capabilities {
    pub const VCPUS: &str = "vCPUs";
    pub const MEMORY_GB: &str = "MemoryGB";
    pub const GPUS: &str = "GPUs";
    pub const ACCELERATED_NETWORKING_ENABLED: &str = "AcceleratedNetworkingEnabled";
    pub const MAXIMUM_PLATFORM_FAULT_DOMAIN_COUNT: &str = "MaximumPlatformFaultDomainCount";
    pub const ULTRA_SSD_AVAILABLE: &str = "UltraSSDAvailable";
}

/// One entry of the SKU catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSku {
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub location_info: Vec<ResourceSkuLocationInfo>,
    #[serde(default)]
    pub capabilities: Vec<ResourceSkuCapability>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restrictions: Vec<ResourceSkuRestriction>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSkuLocationInfo {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub zones: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSkuCapability {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSkuRestriction {
    #[serde(default, rename = "type")]
    pub restriction_type: String,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,
}

impl ResourceSku {
    /// Whether the SKU is offered at the location (case-insensitive)
    pub fn available_in(&self, location: &str) -> bool {
        self.locations.iter().any(|l| l.eq_ignore_ascii_case(location))
    }

    /// Zones the SKU is offered in at the location
    pub fn zones_in(&self, location: &str) -> Vec<String> {
        self.location_info
            .iter()
            .filter(|info| info.location.eq_ignore_ascii_case(location))
            .flat_map(|info| info.zones.iter().cloned())
            .collect()
    }

    /// Raw value of a capability, if published
    pub fn capability(&self, name: &str) -> Option<&str> {
        self.capabilities
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }

    /// Whether a boolean capability is published as `"True"` (case-insensitive)
    pub fn has_capability(&self, name: &str) -> bool {
        self.capability(name)
            .is_some_and(|value| value.eq_ignore_ascii_case("true"))
    }
}

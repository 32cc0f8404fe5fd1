//! Location-scoped cache of the compute SKU catalog.
//!
//! The catalog is listed once, on first use, and indexed by lower-cased SKU
//! name and resource type. Environments that cannot filter the listing by
//! location server-side get the full catalog, filtered here.

use std::collections::HashMap;
use std::sync::Arc;

use azure_client::{AzureClientTrait, AzureError, ResourceSku, capabilities};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::ReconcileError;

/// SKU lookup failures
#[derive(Debug, Error)]
pub enum SkuError {
    /// No SKU of that name and type is offered at the location
    #[error("resource sku {name} of type {resource_type} not found in {location}")]
    NotFound {
        name: String,
        resource_type: String,
        location: String,
    },

    /// A capability is published with a value of the wrong shape
    #[error("resource sku {name} has invalid {capability} value {value:?}")]
    InvalidCapability {
        name: String,
        capability: &'static str,
        value: String,
    },

    /// Listing the catalog failed
    #[error("failed to list resource skus: {0}")]
    Azure(#[from] AzureError),
}

impl SkuError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Convert for a verb: a missing SKU is a configuration error, a failed listing is not
    pub fn into_reconcile(self, context: impl std::fmt::Display) -> ReconcileError {
        match self {
            Self::Azure(source) => ReconcileError::cloud(context.to_string(), source),
            other => ReconcileError::InvalidConfiguration(format!("{context}: {other}")),
        }
    }
}

type SkuKey = (String, String);

/// Lazily populated SKU catalog for one location
pub struct ResourceSkuCache {
    client: Arc<dyn AzureClientTrait>,
    location: String,
    skus: OnceCell<HashMap<SkuKey, ResourceSku>>,
}

impl std::fmt::Debug for ResourceSkuCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceSkuCache")
            .field("location", &self.location)
            .field("loaded", &self.skus.initialized())
            .finish_non_exhaustive()
    }
}

impl ResourceSkuCache {
    pub fn new(client: Arc<dyn AzureClientTrait>, location: impl Into<String>) -> Self {
        Self {
            client,
            location: location.into(),
            skus: OnceCell::new(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    async fn catalog(&self) -> Result<&HashMap<SkuKey, ResourceSku>, SkuError> {
        self.skus
            .get_or_try_init(|| async {
                let server_side = self.client.cloud().filters_skus_server_side;
                let filter = server_side.then_some(self.location.as_str());
                let listed = self.client.list_resource_skus(filter).await?;

                let catalog: HashMap<_, _> = listed
                    .into_iter()
                    .filter(|sku| sku.available_in(&self.location))
                    .map(|sku| ((sku.name.to_lowercase(), sku.resource_type.clone()), sku))
                    .collect();
                debug!(location = %self.location, count = catalog.len(), "Loaded resource SKU catalog");
                Ok::<_, SkuError>(catalog)
            })
            .await
    }

    /// SKU by name and resource type
    pub async fn get(&self, name: &str, resource_type: &str) -> Result<&ResourceSku, SkuError> {
        self.catalog()
            .await?
            .get(&(name.to_lowercase(), resource_type.to_string()))
            .ok_or_else(|| SkuError::NotFound {
                name: name.to_string(),
                resource_type: resource_type.to_string(),
                location: self.location.clone(),
            })
    }

    /// Every SKU of a resource type offered at the location
    pub async fn of_type(&self, resource_type: &str) -> Result<Vec<&ResourceSku>, SkuError> {
        Ok(self
            .catalog()
            .await?
            .values()
            .filter(|sku| sku.resource_type == resource_type)
            .collect())
    }

    async fn numeric<T: std::str::FromStr>(
        &self,
        name: &str,
        resource_type: &str,
        capability: &'static str,
    ) -> Result<Option<T>, SkuError> {
        let sku = self.get(name, resource_type).await?;
        sku.capability(capability)
            .map(|value| {
                value.parse().map_err(|_| SkuError::InvalidCapability {
                    name: name.to_string(),
                    capability,
                    value: value.to_string(),
                })
            })
            .transpose()
    }

    /// Number of vCPUs of a VM size
    pub async fn vcpus(&self, vm_size: &str) -> Result<Option<i64>, SkuError> {
        self.numeric(vm_size, azure_client::VIRTUAL_MACHINES_RESOURCE_TYPE, capabilities::VCPUS)
            .await
    }

    /// Memory of a VM size in GiB
    pub async fn memory_gb(&self, vm_size: &str) -> Result<Option<f64>, SkuError> {
        self.numeric(vm_size, azure_client::VIRTUAL_MACHINES_RESOURCE_TYPE, capabilities::MEMORY_GB)
            .await
    }

    /// Number of GPUs of a VM size; absent means none
    pub async fn gpus(&self, vm_size: &str) -> Result<i64, SkuError> {
        Ok(self
            .numeric(vm_size, azure_client::VIRTUAL_MACHINES_RESOURCE_TYPE, capabilities::GPUS)
            .await?
            .unwrap_or(0))
    }

    /// Whether a VM size supports accelerated networking
    pub async fn accelerated_networking(&self, vm_size: &str) -> Result<bool, SkuError> {
        Ok(self
            .get(vm_size, azure_client::VIRTUAL_MACHINES_RESOURCE_TYPE)
            .await?
            .has_capability(capabilities::ACCELERATED_NETWORKING_ENABLED))
    }

    /// Maximum platform fault domain count of an availability set SKU
    pub async fn max_fault_domain_count(&self, sku_name: &str) -> Result<Option<i32>, SkuError> {
        self.numeric(
            sku_name,
            azure_client::AVAILABILITY_SETS_RESOURCE_TYPE,
            capabilities::MAXIMUM_PLATFORM_FAULT_DOMAIN_COUNT,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{availability_set_sku, vm_sku};
    use azure_client::{CloudProfile, MockAzureClient};

    #[tokio::test]
    async fn test_lookup_is_case_insensitive_and_cached() {
        let mock = MockAzureClient::new("sub");
        mock.add_resource_sku(vm_sku("Standard_D4s_v3", "eastus2", &["1", "2", "3"], true));
        let cache = ResourceSkuCache::new(Arc::new(mock.clone()), "eastus2");

        assert_eq!(cache.vcpus("standard_d4s_v3").await.unwrap(), Some(4));
        assert_eq!(cache.memory_gb("Standard_D4s_v3").await.unwrap(), Some(16.0));
        assert_eq!(cache.gpus("Standard_D4s_v3").await.unwrap(), 0);
        assert!(cache.accelerated_networking("Standard_D4s_v3").await.unwrap());
        assert_eq!(mock.calls_to("list_resource_skus"), vec!["eastus2"]);
    }

    #[tokio::test]
    async fn test_not_found_is_distinct_from_listing_failure() {
        let mock = MockAzureClient::new("sub");
        mock.add_resource_sku(vm_sku("Standard_D4s_v3", "westeurope", &[], false));
        let cache = ResourceSkuCache::new(Arc::new(mock.clone()), "eastus2");
        let err = cache.vcpus("Standard_D4s_v3").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.into_reconcile("nic").is_terminal());

        let failing = MockAzureClient::new("sub");
        failing.fail_on("list_resource_skus", azure_client::MockFailure::status(500, "boom"));
        let cache = ResourceSkuCache::new(Arc::new(failing), "eastus2");
        let err = cache.vcpus("Standard_D4s_v3").await.unwrap_err();
        assert!(!err.is_not_found());
        assert!(!err.into_reconcile("nic").is_terminal());
    }

    #[tokio::test]
    async fn test_stack_lists_unfiltered() {
        let profile = CloudProfile::stack("https://arm.local", "https://adfs.local", "https://aud.local");
        let mock = MockAzureClient::with_cloud("sub", profile);
        mock.add_resource_sku(availability_set_sku("Aligned", "local", 3));
        mock.add_resource_sku(availability_set_sku("Aligned", "other", 2));
        let cache = ResourceSkuCache::new(Arc::new(mock.clone()), "local");

        assert_eq!(cache.max_fault_domain_count("Aligned").await.unwrap(), Some(3));
        assert_eq!(mock.calls_to("list_resource_skus"), vec!["*"]);
    }
}

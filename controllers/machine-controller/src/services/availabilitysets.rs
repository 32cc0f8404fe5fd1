//! Availability sets shared by the machines of a MachineSet.

use azure_client::{AvailabilitySet, AvailabilitySetProperties, AvailabilitySetSku};
use tracing::{debug, info};

use crate::error::ReconcileError;
use crate::scope::MachineScope;
use crate::services::{absent_ok, found};

/// SKU of every availability set the controller creates
pub const ALIGNED_SKU: &str = "Aligned";

/// Fault domain count when the SKU catalog does not publish one
pub const DEFAULT_FAULT_DOMAIN_COUNT: i32 = 2;

pub const UPDATE_DOMAIN_COUNT: i32 = 5;

/// Availability set to manage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilitySetSpec {
    pub name: String,
}

pub async fn get(scope: &MachineScope, spec: &AvailabilitySetSpec) -> Result<Option<AvailabilitySet>, ReconcileError> {
    found(scope.client.get_availability_set(scope.resource_group(), &spec.name).await)
        .map_err(|e| ReconcileError::cloud(format!("failed to get availability set {}", spec.name), e))
}

async fn fault_domain_count(scope: &MachineScope) -> Result<i32, ReconcileError> {
    match scope.skus.max_fault_domain_count(ALIGNED_SKU).await {
        Ok(Some(count)) => Ok(count),
        Ok(None) => Ok(DEFAULT_FAULT_DOMAIN_COUNT),
        Err(e) if e.is_not_found() => {
            debug!(location = %scope.location(), "No Aligned availability set SKU, using the default fault domain count");
            Ok(DEFAULT_FAULT_DOMAIN_COUNT)
        }
        Err(e) => Err(e.into_reconcile("failed to get maximum platform fault domain count")),
    }
}

/// Create the set, or converge the tags of an existing one.
///
/// Everything but the tags is immutable once created.
pub async fn create_or_update(scope: &MachineScope, spec: &AvailabilitySetSpec) -> Result<AvailabilitySet, ReconcileError> {
    let set = match get(scope, spec).await? {
        Some(existing) if existing.tags == scope.tags => {
            debug!(name = %spec.name, "Availability set is up to date");
            return Ok(existing);
        }
        Some(mut existing) => {
            info!(name = %spec.name, "Updating availability set tags");
            existing.tags = scope.tags.clone();
            existing
        }
        None => {
            let fault_domains = fault_domain_count(scope).await?;
            info!(name = %spec.name, fault_domains, "Creating availability set");
            AvailabilitySet {
                location: scope.location().to_string(),
                tags: scope.tags.clone(),
                sku: Some(AvailabilitySetSku {
                    name: ALIGNED_SKU.to_string(),
                }),
                properties: AvailabilitySetProperties {
                    platform_fault_domain_count: Some(fault_domains),
                    platform_update_domain_count: Some(UPDATE_DOMAIN_COUNT),
                    virtual_machines: Vec::new(),
                },
                ..Default::default()
            }
        }
    };

    scope
        .client
        .create_or_update_availability_set(scope.resource_group(), &spec.name, &set)
        .await
        .map_err(|e| ReconcileError::cloud(format!("failed to create availability set {}", spec.name), e))
}

/// Delete the set unless virtual machines are still attached to it
pub async fn delete(scope: &MachineScope, spec: &AvailabilitySetSpec) -> Result<(), ReconcileError> {
    let Some(set) = get(scope, spec).await? else {
        debug!(name = %spec.name, "Availability set not found, nothing to delete");
        return Ok(());
    };

    if !set.properties.virtual_machines.is_empty() {
        info!(
            name = %spec.name,
            members = set.properties.virtual_machines.len(),
            "Availability set still has virtual machines, skipping deletion"
        );
        return Ok(());
    }

    info!(name = %spec.name, "Deleting availability set");
    absent_ok(scope.client.delete_availability_set(scope.resource_group(), &spec.name).await)
        .map_err(|e| ReconcileError::cloud(format!("failed to delete availability set {}", spec.name), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TEST_RESOURCE_GROUP, TestEnv, availability_set_sku, machine_builder};
    use azure_client::SubResource;

    fn spec() -> AvailabilitySetSpec {
        AvailabilitySetSpec {
            name: "test-abcd_workers-as".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_uses_sku_fault_domains() {
        let env = TestEnv::new();
        env.mock.add_resource_sku(availability_set_sku(ALIGNED_SKU, "eastus2", 3));
        let scope = env.scope(machine_builder("machine-test").build()).await;

        let set = create_or_update(&scope, &spec()).await.unwrap();
        assert_eq!(set.properties.platform_fault_domain_count, Some(3));
        assert_eq!(set.properties.platform_update_domain_count, Some(5));
        assert_eq!(set.sku.unwrap().name, ALIGNED_SKU);
    }

    #[tokio::test]
    async fn test_create_defaults_fault_domains() {
        let env = TestEnv::new();
        let scope = env.scope(machine_builder("machine-test").build()).await;
        let set = create_or_update(&scope, &spec()).await.unwrap();
        assert_eq!(set.properties.platform_fault_domain_count, Some(DEFAULT_FAULT_DOMAIN_COUNT));
    }

    #[tokio::test]
    async fn test_update_only_touches_tags() {
        let env = TestEnv::new();
        let scope = env.scope(machine_builder("machine-test").build()).await;
        create_or_update(&scope, &spec()).await.unwrap();
        create_or_update(&scope, &spec()).await.unwrap();
        assert_eq!(env.mock.calls_to("create_or_update_availability_set").len(), 1);

        let scope = env
            .scope(
                machine_builder("machine-test")
                    .spec(|s| {
                        s.tags.insert("team".to_string(), "compute".to_string());
                    })
                    .build(),
            )
            .await;
        let set = create_or_update(&scope, &spec()).await.unwrap();
        assert_eq!(set.tags["team"], "compute");
        assert_eq!(set.properties.platform_fault_domain_count, Some(DEFAULT_FAULT_DOMAIN_COUNT));
        assert_eq!(env.mock.calls_to("create_or_update_availability_set").len(), 2);
    }

    #[tokio::test]
    async fn test_delete_skips_sets_with_members() {
        let env = TestEnv::new();
        let scope = env.scope(machine_builder("machine-test").build()).await;
        let mut set = create_or_update(&scope, &spec()).await.unwrap();
        set.properties.virtual_machines = vec![SubResource::new("/subscriptions/s/vm/other")];
        env.mock.add_availability_set(TEST_RESOURCE_GROUP, set);

        delete(&scope, &spec()).await.unwrap();
        assert!(env.mock.calls_to("delete_availability_set").is_empty());
        assert!(env.mock.availability_set(TEST_RESOURCE_GROUP, &spec().name).is_some());
    }

    #[tokio::test]
    async fn test_delete_empty_and_absent_sets() {
        let env = TestEnv::new();
        let scope = env.scope(machine_builder("machine-test").build()).await;
        create_or_update(&scope, &spec()).await.unwrap();

        delete(&scope, &spec()).await.unwrap();
        assert!(env.mock.availability_set(TEST_RESOURCE_GROUP, &spec().name).is_none());
        delete(&scope, &spec()).await.unwrap();
        assert_eq!(env.mock.calls_to("delete_availability_set").len(), 1);
    }
}

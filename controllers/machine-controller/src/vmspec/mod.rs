//! Derivation of the ARM virtual machine request from a provider spec.
//!
//! [`build_virtual_machine`] makes no cloud calls: everything it needs from
//! Azure (the NIC ID, the availability set) is resolved by the reconciler
//! first and passed in through [`VmParams`].

pub mod os_profile;
pub mod security;
pub mod storage;

use std::collections::BTreeMap;

use azure_client::{
    AdditionalCapabilities, BillingProfile, BootDiagnostics, CapacityReservationProfile, DiagnosticsProfile,
    HardwareProfile, NetworkInterfaceReference, NetworkInterfaceReferenceProperties, NetworkProfile, StorageProfile,
    SubResource, VirtualMachine, VirtualMachineIdentity, VirtualMachineProperties,
};
use crds::{AzureMachineProviderSpec, BootDiagnosticsStorageAccountType, UltraSsdCapability};
use serde_json::json;
use tracing::warn;

use crate::error::ReconcileError;
use crate::names;

/// Inputs of the VM request besides the provider spec
#[derive(Debug, Clone)]
pub struct VmParams<'a> {
    pub name: &'a str,
    pub subscription_id: &'a str,
    pub resource_group: &'a str,
    pub location: &'a str,
    pub spec: &'a AzureMachineProviderSpec,
    pub tags: &'a BTreeMap<String, String>,
    pub nic_id: &'a str,
    /// Decoded SSH public key; empty to generate one
    pub ssh_public_key: &'a str,
    /// Base64-encoded user data
    pub custom_data: Option<&'a str>,
    pub availability_set_id: Option<&'a str>,
    /// Whether the cloud environment accepts the Ultra SSD capability
    pub supports_ultra_ssd: bool,
}

fn spot_settings(spec: &AzureMachineProviderSpec, properties: &mut VirtualMachineProperties) {
    let Some(options) = &spec.spot_vm_options else {
        return;
    };
    properties.priority = Some("Spot".to_string());
    properties.eviction_policy = Some("Deallocate".to_string());

    if let Some(max_price) = options.max_price.as_deref().filter(|p| !p.is_empty()) {
        match max_price.parse::<f64>() {
            Ok(price) => {
                properties.billing_profile = Some(BillingProfile { max_price: Some(price) });
            }
            Err(e) => warn!(max_price, error = %e, "Ignoring unparsable spot max price"),
        }
    }
}

fn ultra_ssd_enabled(spec: &AzureMachineProviderSpec) -> Option<bool> {
    match spec.ultra_ssd_capability {
        Some(UltraSsdCapability::Enabled) => Some(true),
        Some(UltraSsdCapability::Disabled) => Some(false),
        None => storage::has_ultra_ssd(spec).then_some(true),
    }
}

fn diagnostics_profile(spec: &AzureMachineProviderSpec) -> Result<Option<DiagnosticsProfile>, ReconcileError> {
    let Some(boot) = spec.diagnostics.as_ref().and_then(|d| d.boot.as_ref()) else {
        return Ok(None);
    };

    let storage_uri = match boot.storage_account_type {
        BootDiagnosticsStorageAccountType::AzureManaged => None,
        BootDiagnosticsStorageAccountType::CustomerManaged => {
            let uri = boot
                .customer_managed
                .as_ref()
                .map(|c| c.storage_account_uri.clone())
                .filter(|uri| !uri.is_empty())
                .ok_or_else(|| {
                    ReconcileError::InvalidConfiguration(
                        "boot diagnostics storageAccountURI must be set for CustomerManaged storage".to_string(),
                    )
                })?;
            Some(uri)
        }
    };

    Ok(Some(DiagnosticsProfile {
        boot_diagnostics: Some(BootDiagnostics {
            enabled: Some(true),
            storage_uri,
        }),
    }))
}

/// Check the parts of the VM request that depend only on the provider spec
pub fn validate(name: &str, spec: &AzureMachineProviderSpec) -> Result<(), ReconcileError> {
    storage::data_disks(name, spec)?;
    security::security_profile(spec)?;
    diagnostics_profile(spec)?;
    if !spec.capacity_reservation_group_id.is_empty() {
        names::validate_resource_id(&spec.capacity_reservation_group_id)
            .map_err(|e| e.context("invalid capacityReservationGroupID"))?;
    }
    Ok(())
}

/// Build the VM request
pub fn build_virtual_machine(params: &VmParams<'_>) -> Result<VirtualMachine, ReconcileError> {
    let spec = params.spec;

    let os_profile = os_profile::os_profile(params.name, &spec.os_disk, params.ssh_public_key, params.custom_data)?;
    let (image_reference, plan) = storage::image_reference(params.subscription_id, &spec.image);
    let data_disks = storage::data_disks(params.name, spec)?;
    let security_profile = security::security_profile(spec)?;

    let mut properties = VirtualMachineProperties {
        hardware_profile: Some(HardwareProfile {
            vm_size: Some(spec.vm_size.clone()),
        }),
        storage_profile: Some(StorageProfile {
            image_reference: Some(image_reference),
            os_disk: Some(storage::os_disk(params.name, spec)),
            data_disks,
        }),
        os_profile: Some(os_profile),
        network_profile: Some(NetworkProfile {
            network_interfaces: vec![NetworkInterfaceReference {
                id: params.nic_id.to_string(),
                properties: Some(NetworkInterfaceReferenceProperties { primary: Some(true) }),
            }],
        }),
        security_profile,
        diagnostics_profile: diagnostics_profile(spec)?,
        ..Default::default()
    };

    spot_settings(spec, &mut properties);

    properties.additional_capabilities = ultra_ssd_enabled(spec)
        .filter(|_| params.supports_ultra_ssd)
        .map(|enabled| AdditionalCapabilities {
            ultra_ssd_enabled: Some(enabled),
        });

    if !spec.capacity_reservation_group_id.is_empty() {
        names::validate_resource_id(&spec.capacity_reservation_group_id)
            .map_err(|e| e.context("invalid capacityReservationGroupID"))?;
        properties.capacity_reservation = Some(CapacityReservationProfile {
            capacity_reservation_group: Some(SubResource::new(spec.capacity_reservation_group_id.clone())),
        });
    }

    let identity = (!spec.managed_identity.is_empty()).then(|| {
        let id = names::managed_identity_id(params.subscription_id, params.resource_group, &spec.managed_identity);
        VirtualMachineIdentity {
            identity_type: "UserAssigned".to_string(),
            user_assigned_identities: BTreeMap::from([(id, json!({}))]),
        }
    });

    let zones = if spec.zone.is_empty() {
        properties.availability_set = params.availability_set_id.map(SubResource::new);
        Vec::new()
    } else {
        vec![spec.zone.clone()]
    };

    Ok(VirtualMachine {
        location: params.location.to_string(),
        tags: params.tags.clone(),
        zones,
        plan,
        identity,
        properties,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::{CustomerManagedBootDiagnostics, Diagnostics, SpotVmOptions};

    const NIC_ID: &str = "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Network/networkInterfaces/m-nic";

    fn base_spec() -> AzureMachineProviderSpec {
        let mut spec = AzureMachineProviderSpec {
            vm_size: "Standard_D4s_v3".to_string(),
            ..Default::default()
        };
        spec.os_disk.os_type = "Linux".to_string();
        spec.image.resource_id = "/resourceGroups/rg/providers/Microsoft.Compute/images/img".to_string();
        spec
    }

    fn build(spec: &AzureMachineProviderSpec, availability_set_id: Option<&str>, ultra: bool) -> Result<VirtualMachine, ReconcileError> {
        let tags = BTreeMap::from([("kubernetes.io_cluster.test-abcd".to_string(), "owned".to_string())]);
        build_virtual_machine(&VmParams {
            name: "machine-test",
            subscription_id: "sub",
            resource_group: "rg",
            location: "eastus2",
            spec,
            tags: &tags,
            nic_id: NIC_ID,
            ssh_public_key: "ssh-rsa AAA",
            custom_data: Some("Qk9PVA=="),
            availability_set_id,
            supports_ultra_ssd: ultra,
        })
    }

    #[test]
    fn test_basic_request() {
        let vm = build(&base_spec(), None, true).unwrap();
        assert_eq!(vm.location, "eastus2");
        assert_eq!(vm.vm_size(), "Standard_D4s_v3");
        assert_eq!(vm.tags["kubernetes.io_cluster.test-abcd"], "owned");
        let nic = &vm.properties.network_profile.as_ref().unwrap().network_interfaces[0];
        assert_eq!(nic.id, NIC_ID);
        assert!(vm.identity.is_none());
        assert!(vm.zones.is_empty());
        assert!(vm.properties.priority.is_none());
        assert!(vm.properties.additional_capabilities.is_none());
        assert!(vm.properties.diagnostics_profile.is_none());
        assert_eq!(
            vm.properties.os_profile.unwrap().custom_data.as_deref(),
            Some("Qk9PVA==")
        );
    }

    #[test]
    fn test_validate_rejects_what_the_request_builder_rejects() {
        assert!(validate("machine-test", &base_spec()).is_ok());

        let mut spec = base_spec();
        spec.data_disks = vec![crds::DataDisk {
            name_suffix: "etcd".to_string(),
            disk_size_gb: 4,
            lun: None,
            ..Default::default()
        }];
        let err = validate("machine-test", &spec).unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidConfiguration(_)), "{err:?}");
        assert!(build(&spec, None, true).is_err());

        let mut spec = base_spec();
        spec.capacity_reservation_group_id = "not-an-id".to_string();
        assert!(validate("machine-test", &spec).is_err());
    }

    #[test]
    fn test_zone_wins_over_availability_set() {
        let mut spec = base_spec();
        spec.zone = "2".to_string();
        let vm = build(&spec, Some("/as"), true).unwrap();
        assert_eq!(vm.zones, vec!["2"]);
        assert!(vm.properties.availability_set.is_none());

        let vm = build(&base_spec(), Some("/as"), true).unwrap();
        assert_eq!(vm.properties.availability_set.unwrap().id, "/as");
    }

    #[test]
    fn test_managed_identity() {
        let mut spec = base_spec();
        spec.managed_identity = "id1".to_string();
        let identity = build(&spec, None, true).unwrap().identity.unwrap();
        assert_eq!(identity.identity_type, "UserAssigned");
        assert!(identity.user_assigned_identities.contains_key(
            "/subscriptions/sub/resourcegroups/rg/providers/Microsoft.ManagedIdentity/userAssignedIdentities/id1"
        ));
    }

    #[test]
    fn test_spot_options() {
        let mut spec = base_spec();
        spec.spot_vm_options = Some(SpotVmOptions {
            max_price: Some("0.25".to_string()),
        });
        let vm = build(&spec, None, true).unwrap();
        assert_eq!(vm.properties.priority.as_deref(), Some("Spot"));
        assert_eq!(vm.properties.eviction_policy.as_deref(), Some("Deallocate"));
        assert_eq!(vm.properties.billing_profile.unwrap().max_price, Some(0.25));

        spec.spot_vm_options = Some(SpotVmOptions { max_price: None });
        let vm = build(&spec, None, true).unwrap();
        assert_eq!(vm.properties.priority.as_deref(), Some("Spot"));
        assert!(vm.properties.billing_profile.is_none());
    }

    #[test]
    fn test_ultra_ssd_capability() {
        let mut spec = base_spec();
        spec.ultra_ssd_capability = Some(UltraSsdCapability::Disabled);
        let caps = build(&spec, None, true).unwrap().properties.additional_capabilities;
        assert_eq!(caps.unwrap().ultra_ssd_enabled, Some(false));

        let mut spec = base_spec();
        spec.data_disks = vec![crds::DataDisk {
            name_suffix: "etcd".to_string(),
            disk_size_gb: 8,
            lun: Some(0),
            deletion_policy: "Delete".to_string(),
            managed_disk: crds::DataDiskManagedDiskParameters {
                storage_account_type: crds::ULTRA_SSD_LRS.to_string(),
                disk_encryption_set: None,
            },
            caching_type: None,
        }];
        let caps = build(&spec, None, true).unwrap().properties.additional_capabilities;
        assert_eq!(caps.unwrap().ultra_ssd_enabled, Some(true));

        // Dropped where the environment cannot honour it
        assert!(build(&spec, None, false).unwrap().properties.additional_capabilities.is_none());
    }

    #[test]
    fn test_capacity_reservation_must_be_resource_id() {
        let mut spec = base_spec();
        spec.capacity_reservation_group_id =
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Compute/capacityReservationGroups/g".to_string();
        let vm = build(&spec, None, true).unwrap();
        assert!(vm.properties.capacity_reservation.unwrap().capacity_reservation_group.is_some());

        spec.capacity_reservation_group_id = "not-an-id".to_string();
        let err = build(&spec, None, true).unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_boot_diagnostics() {
        let mut spec = base_spec();
        spec.diagnostics = Some(Diagnostics {
            boot: Some(crds::BootDiagnostics {
                storage_account_type: BootDiagnosticsStorageAccountType::AzureManaged,
                customer_managed: None,
            }),
        });
        let boot = build(&spec, None, true).unwrap().properties.diagnostics_profile.unwrap().boot_diagnostics.unwrap();
        assert_eq!(boot.enabled, Some(true));
        assert!(boot.storage_uri.is_none());

        spec.diagnostics = Some(Diagnostics {
            boot: Some(crds::BootDiagnostics {
                storage_account_type: BootDiagnosticsStorageAccountType::CustomerManaged,
                customer_managed: Some(CustomerManagedBootDiagnostics {
                    storage_account_uri: "https://diag.blob.core.windows.net/".to_string(),
                }),
            }),
        });
        let boot = build(&spec, None, true).unwrap().properties.diagnostics_profile.unwrap().boot_diagnostics.unwrap();
        assert_eq!(boot.storage_uri.as_deref(), Some("https://diag.blob.core.windows.net/"));

        spec.diagnostics = Some(Diagnostics {
            boot: Some(crds::BootDiagnostics {
                storage_account_type: BootDiagnosticsStorageAccountType::CustomerManaged,
                customer_managed: Some(CustomerManagedBootDiagnostics::default()),
            }),
        });
        assert!(matches!(
            build(&spec, None, true).unwrap_err(),
            ReconcileError::InvalidConfiguration(_)
        ));
    }

    #[test]
    fn test_invalid_data_disk_fails_derivation() {
        let mut spec = base_spec();
        spec.data_disks = vec![crds::DataDisk {
            name_suffix: "-x".to_string(),
            disk_size_gb: 8,
            lun: Some(0),
            deletion_policy: "Delete".to_string(),
            ..Default::default()
        }];
        assert!(matches!(
            build(&spec, None, true).unwrap_err(),
            ReconcileError::InvalidConfiguration(_)
        ));
    }
}

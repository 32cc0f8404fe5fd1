//! Resource name generators and validators.
//!
//! Every cloud resource owned by a Machine is named deterministically from
//! the cluster ID and the Machine name, so a reconcile can find what an
//! earlier one created without recording it anywhere.

use azure_client::ResourceId;

use crate::error::ReconcileError;

/// Maximum length of a public IP address name
pub const MAX_PUBLIC_IP_NAME_LENGTH: usize = 63;

/// Maximum length of an availability set name
pub const MAX_AVAILABILITY_SET_NAME_LENGTH: usize = 80;

/// Maximum length of a managed disk name
pub const MAX_DISK_NAME_LENGTH: usize = 80;

const AVAILABILITY_SET_SUFFIX: &str = "-as";

/// `<machine>-nic`
pub fn nic_name(machine: &str) -> String {
    format!("{machine}-nic")
}

/// `<machine>_OSDisk`
pub fn os_disk_name(machine: &str) -> String {
    format!("{machine}_OSDisk")
}

/// `<cluster>-<machine>-publicip`, rejected rather than truncated when too long
pub fn public_ip_name(cluster_id: &str, machine: &str) -> Result<String, ReconcileError> {
    let name = format!("{cluster_id}-{machine}-publicip");
    if name.len() > MAX_PUBLIC_IP_NAME_LENGTH {
        return Err(ReconcileError::InvalidConfiguration(format!(
            "public IP name {name} is longer than {MAX_PUBLIC_IP_NAME_LENGTH} characters"
        )));
    }
    Ok(name)
}

/// Availability set shared by the machines of a MachineSet.
///
/// The MachineSet name is prefixed with the cluster ID unless it already
/// starts with it, cut to 77 characters and suffixed with `-as`.
pub fn availability_set_name(cluster_id: &str, machine_set: &str) -> String {
    let mut name = if machine_set.starts_with(cluster_id) {
        machine_set.to_string()
    } else {
        format!("{cluster_id}_{machine_set}")
    };

    let max = MAX_AVAILABILITY_SET_NAME_LENGTH - AVAILABILITY_SET_SUFFIX.len();
    if name.len() > max {
        let mut cut = max;
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        name.truncate(cut);
    }
    name.push_str(AVAILABILITY_SET_SUFFIX);
    name
}

/// Provider ID registered on the Node backed by the VM
pub fn provider_id(subscription_id: &str, resource_group: &str, computer_name: &str) -> String {
    format!(
        "azure:///subscriptions/{}/resourceGroups/{}/providers/Microsoft.Compute/virtualMachines/{}",
        subscription_id.to_lowercase(),
        resource_group.to_lowercase(),
        computer_name
    )
}

/// Fully-qualified ID of a user-assigned managed identity
pub fn managed_identity_id(subscription_id: &str, resource_group: &str, name: &str) -> String {
    format!(
        "/subscriptions/{subscription_id}/resourcegroups/{resource_group}/providers/Microsoft.ManagedIdentity/userAssignedIdentities/{name}"
    )
}

/// `<machine>_<suffix>`, rejected when longer than 80 characters
pub fn data_disk_name(machine: &str, name_suffix: &str) -> Result<String, ReconcileError> {
    let name = format!("{machine}_{name_suffix}");
    if name.len() > MAX_DISK_NAME_LENGTH {
        return Err(ReconcileError::InvalidConfiguration(format!(
            "data disk name {name} is longer than {MAX_DISK_NAME_LENGTH} characters"
        )));
    }
    Ok(name)
}

/// ID of a resource in the subscription
pub fn resource_id(subscription_id: &str, resource_group: &str, provider_type: &str, name: &str) -> String {
    format!("/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/{provider_type}/{name}")
}

/// Check that `id` is a well-formed Azure resource ID
pub fn validate_resource_id(id: &str) -> Result<(), ReconcileError> {
    ResourceId::parse(id)
        .map(|_| ())
        .map_err(|e| ReconcileError::InvalidConfiguration(format!("invalid resource ID {id:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owned_resource_names() {
        assert_eq!(nic_name("machine-test"), "machine-test-nic");
        assert_eq!(os_disk_name("machine-test"), "machine-test_OSDisk");
        assert_eq!(
            public_ip_name("test-abcd", "machine-test").unwrap(),
            "test-abcd-machine-test-publicip"
        );
        assert_eq!(data_disk_name("machine-test", "etcd").unwrap(), "machine-test_etcd");
    }

    #[test]
    fn test_generators_are_deterministic() {
        assert_eq!(nic_name("m"), nic_name("m"));
        assert_eq!(
            availability_set_name("cluster", "workers"),
            availability_set_name("cluster", "workers")
        );
        assert_eq!(provider_id("S", "RG", "m"), provider_id("S", "RG", "m"));
    }

    #[test]
    fn test_public_ip_name_too_long_is_rejected() {
        let machine = "m".repeat(60);
        let err = public_ip_name("cluster", &machine).unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_data_disk_name_too_long_is_rejected() {
        let suffix = "d".repeat(80);
        assert!(data_disk_name("machine", &suffix).is_err());
    }

    #[test]
    fn test_availability_set_name() {
        assert_eq!(availability_set_name("test-abcd", "workers"), "test-abcd_workers-as");
        assert_eq!(
            availability_set_name("test-abcd", "test-abcd-worker-eastus"),
            "test-abcd-worker-eastus-as"
        );

        let long = "w".repeat(100);
        let name = availability_set_name("test-abcd", &long);
        assert_eq!(name.len(), MAX_AVAILABILITY_SET_NAME_LENGTH);
        assert!(name.starts_with("test-abcd_www"));
        assert!(name.ends_with("-as"));
    }

    #[test]
    fn test_provider_id_lowercases_subscription_and_group() {
        assert_eq!(
            provider_id("ABC-123", "dummyResourceGroup", "Machine-Test"),
            "azure:///subscriptions/abc-123/resourceGroups/dummyresourcegroup/providers/Microsoft.Compute/virtualMachines/Machine-Test"
        );
    }

    #[test]
    fn test_managed_identity_id() {
        assert_eq!(
            managed_identity_id("sub", "rg", "id1"),
            "/subscriptions/sub/resourcegroups/rg/providers/Microsoft.ManagedIdentity/userAssignedIdentities/id1"
        );
    }

    #[test]
    fn test_validate_resource_id() {
        assert!(validate_resource_id(
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Compute/capacityReservationGroups/crg"
        )
        .is_ok());
        assert!(validate_resource_id("subscriptions/sub").is_err());
        assert!(validate_resource_id("/subscriptions").is_err());
        assert!(validate_resource_id("/foo/bar").is_err());
    }
}

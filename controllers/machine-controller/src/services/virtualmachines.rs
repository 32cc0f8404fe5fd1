//! Virtual machines.
//!
//! The request body is derived by [`crate::vmspec`]; this adapter only moves
//! it to and from ARM.

use azure_client::VirtualMachine;
use tracing::info;

use crate::error::ReconcileError;
use crate::scope::MachineScope;
use crate::services::{absent_ok, found};

pub async fn get(scope: &MachineScope, name: &str) -> Result<Option<VirtualMachine>, ReconcileError> {
    found(scope.client.get_virtual_machine(scope.resource_group(), name).await)
        .map_err(|e| ReconcileError::cloud(format!("failed to get vm {name}"), e))
}

/// Issue the create; ARM accepts it before provisioning finishes
pub async fn create_or_update(scope: &MachineScope, name: &str, vm: &VirtualMachine) -> Result<VirtualMachine, ReconcileError> {
    info!(name, resource_group = %scope.resource_group(), size = %vm.vm_size(), "Creating virtual machine");
    scope
        .client
        .create_or_update_virtual_machine(scope.resource_group(), name, vm)
        .await
        .map_err(|e| ReconcileError::cloud(format!("cannot create vm {name}"), e))
}

pub async fn delete(scope: &MachineScope, name: &str) -> Result<(), ReconcileError> {
    info!(name, resource_group = %scope.resource_group(), "Deleting virtual machine");
    absent_ok(scope.client.delete_virtual_machine(scope.resource_group(), name).await)
        .map_err(|e| ReconcileError::cloud(format!("failed to delete vm {name}"), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TestEnv, machine_builder};
    use azure_client::{HardwareProfile, MockFailure, VirtualMachineProperties};

    #[tokio::test]
    async fn test_vm_lifecycle() {
        let env = TestEnv::new();
        let scope = env.scope(machine_builder("machine-test").build()).await;
        assert!(get(&scope, "machine-test").await.unwrap().is_none());

        let vm = VirtualMachine {
            location: "eastus2".to_string(),
            properties: VirtualMachineProperties {
                hardware_profile: Some(HardwareProfile {
                    vm_size: Some("Standard_D4s_v3".to_string()),
                }),
                ..Default::default()
            },
            ..Default::default()
        };
        let created = create_or_update(&scope, "machine-test", &vm).await.unwrap();
        assert_eq!(created.provisioning_state(), "Succeeded");
        assert!(get(&scope, "machine-test").await.unwrap().is_some());

        delete(&scope, "machine-test").await.unwrap();
        delete(&scope, "machine-test").await.unwrap();
        assert!(get(&scope, "machine-test").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_failure_is_not_absence() {
        let env = TestEnv::new();
        env.mock.fail_on("get_virtual_machine", MockFailure::status(500, "boom"));
        let scope = env.scope(machine_builder("machine-test").build()).await;
        assert!(get(&scope, "machine-test").await.is_err());
    }
}

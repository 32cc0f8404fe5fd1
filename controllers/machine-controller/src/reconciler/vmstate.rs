//! VM state derived from the provisioning state and the power state.

use azure_client::VirtualMachine;
use crds::VmState;

const SUCCEEDED: &str = "Succeeded";
const POWER_STATE_PREFIX: &str = "PowerState/";

fn power_state(code: &str) -> VmState {
    match code {
        "starting" => VmState::Starting,
        "running" => VmState::Running,
        "stopping" => VmState::Stopping,
        "stopped" => VmState::Stopped,
        "deallocating" => VmState::Deallocating,
        "deallocated" => VmState::Deallocated,
        _ => VmState::Unknown,
    }
}

/// `None` while ARM reports no provisioning state.
///
/// Until provisioning succeeds the provisioning state is the VM state;
/// afterwards the first `PowerState/*` instance-view code is.
pub fn vm_state(vm: &VirtualMachine) -> Option<VmState> {
    let provisioning = vm.provisioning_state();
    if provisioning.is_empty() {
        return None;
    }
    if provisioning != SUCCEEDED {
        return Some(VmState::parse(provisioning).unwrap_or(VmState::Unknown));
    }

    let state = vm
        .status_codes()
        .find_map(|code| code.strip_prefix(POWER_STATE_PREFIX))
        .map(power_state)
        .unwrap_or(VmState::Succeeded);
    Some(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use azure_client::{InstanceViewStatus, VirtualMachineInstanceView, VirtualMachineProperties};

    fn vm(provisioning: Option<&str>, codes: &[&str]) -> VirtualMachine {
        VirtualMachine {
            properties: VirtualMachineProperties {
                provisioning_state: provisioning.map(str::to_string),
                instance_view: Some(VirtualMachineInstanceView {
                    statuses: codes
                        .iter()
                        .map(|code| InstanceViewStatus {
                            code: Some(code.to_string()),
                            display_status: None,
                        })
                        .collect(),
                }),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_provisioning_state_wins_until_succeeded() {
        assert_eq!(vm_state(&vm(Some("Creating"), &["PowerState/running"])), Some(VmState::Creating));
        assert_eq!(vm_state(&vm(Some("Deleting"), &[])), Some(VmState::Deleting));
        assert_eq!(vm_state(&vm(Some("Migrating"), &[])), Some(VmState::Unknown));
        assert_eq!(vm_state(&vm(None, &[])), None);
    }

    #[test]
    fn test_power_state_after_success() {
        let running = vm(Some("Succeeded"), &["ProvisioningState/succeeded", "PowerState/running"]);
        assert_eq!(vm_state(&running), Some(VmState::Running));
        assert_eq!(
            vm_state(&vm(Some("Succeeded"), &["PowerState/deallocated"])),
            Some(VmState::Deallocated)
        );
        assert_eq!(vm_state(&vm(Some("Succeeded"), &["PowerState/hibernated"])), Some(VmState::Unknown));
        assert_eq!(vm_state(&vm(Some("Succeeded"), &[])), Some(VmState::Succeeded));
    }
}

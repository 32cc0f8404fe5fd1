//! Delete: release the machine's cloud resources in reverse creation order.

use crds::VmState;
use tracing::{info, warn};

use crate::error::ReconcileError;
use crate::names;
use crate::scope::MachineScope;
use crate::services::availabilitysets::{self, AvailabilitySetSpec};
use crate::services::disks::{self, DiskSpec};
use crate::services::networkinterfaces::{self, NetworkInterfaceSpec};
use crate::services::publicips::{self, PublicIpSpec};
use crate::services::virtualmachines;

pub async fn delete(scope: &mut MachineScope) -> Result<(), ReconcileError> {
    scope.set_vm_state(VmState::Deleting);
    let machine = scope.name().to_string();

    virtualmachines::delete(scope, &machine)
        .await
        .map_err(|e| e.context(format!("failed to delete machine {machine}")))?;

    disks::delete(
        scope,
        &DiskSpec {
            name: names::os_disk_name(&machine),
        },
    )
    .await
    .map_err(|e| e.context(format!("failed to delete OS disk of machine {machine}")))?;

    let nic = NetworkInterfaceSpec {
        name: names::nic_name(&machine),
        vnet_name: scope.provider_spec.vnet.clone(),
        ..Default::default()
    };
    networkinterfaces::delete(scope, &nic)
        .await
        .map_err(|e| e.context(format!("unable to delete network interface of machine {machine}")))?;

    if scope.provider_spec.public_ip {
        match names::public_ip_name(&scope.cluster_id, &machine) {
            Ok(name) => publicips::delete(scope, &PublicIpSpec { name })
                .await
                .map_err(|e| e.context(format!("unable to delete public IP of machine {machine}")))?,
            // No public IP can exist under a name ARM would have rejected
            Err(e) => warn!(machine = %machine, error = %e, "Skipping public IP deletion"),
        }
    }

    // An explicitly named set is not owned by the machine
    if scope.provider_spec.availability_set.is_empty() {
        if let Some(machine_set) = scope.machine_set() {
            let name = names::availability_set_name(&scope.cluster_id, machine_set);
            availabilitysets::delete(scope, &AvailabilitySetSpec { name })
                .await
                .map_err(|e| e.context(format!("failed to delete availability set of machine {machine}")))?;
        }
    }

    info!(machine = %machine, "Deleted machine resources");
    Ok(())
}

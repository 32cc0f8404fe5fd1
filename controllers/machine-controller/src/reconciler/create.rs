//! Create: public IP, network interface, availability set, VM and startup script.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info};

use super::{conditions, update};
use crate::error::ReconcileError;
use crate::names;
use crate::scope::MachineScope;
use crate::services::availabilitysets::{self, AvailabilitySetSpec};
use crate::services::networkinterfaces::{self, NetworkInterfaceSpec};
use crate::services::publicips::{self, PublicIpSpec};
use crate::services::virtualmachineextensions::{self, STARTUP_SCRIPT_EXTENSION, VmExtensionSpec};
use crate::services::{availabilityzones, virtualmachines};
use crate::vmspec::{self, VmParams};

const PROVISIONING_SUCCEEDED: &str = "Succeeded";
const PROVISIONING_FAILED: &str = "Failed";

/// Create the machine's cloud resources, then populate it from the VM.
///
/// A failure is recorded in the `MachineCreated` condition and returned as is.
pub async fn create(scope: &mut MachineScope) -> Result<(), ReconcileError> {
    // Persisted machines always carry an annotation map, even an empty one
    scope.annotations_mut();

    if let Err(e) = create_resources(scope).await {
        conditions::set_condition(
            &mut scope.provider_status.conditions,
            conditions::creation_failed(e.message()),
        );
        return Err(e);
    }

    update::update(scope).await
}

async fn create_resources(scope: &MachineScope) -> Result<(), ReconcileError> {
    validate(scope).await?;
    let nic_id = create_network_interface(scope).await?;
    let availability_set = availability_set(scope).await?;
    create_virtual_machine(scope, &nic_id, availability_set.as_deref()).await?;
    create_startup_script(scope).await
}

/// Reject a machine that cannot be built before any resource is created for it
async fn validate(scope: &MachineScope) -> Result<(), ReconcileError> {
    let spec = &scope.provider_spec;
    let machine = scope.name();

    if spec.vnet.is_empty() {
        return Err(ReconcileError::InvalidConfiguration(format!(
            "MachineConfig vnet is missing on machine {machine}"
        )));
    }
    if spec.subnet.is_empty() {
        return Err(ReconcileError::InvalidConfiguration(format!(
            "MachineConfig subnet is missing on machine {machine}"
        )));
    }
    if spec.public_ip {
        names::public_ip_name(&scope.cluster_id, machine)?;
    }
    if spec.accelerated_networking {
        networkinterfaces::check_accelerated_networking(scope, &spec.vm_size).await?;
    }
    vmspec::validate(machine, spec)
}

/// Create the public IP if requested and the NIC; returns the NIC ID
async fn create_network_interface(scope: &MachineScope) -> Result<String, ReconcileError> {
    let spec = &scope.provider_spec;
    let machine = scope.name();

    let public_ip_name = if spec.public_ip {
        let name = names::public_ip_name(&scope.cluster_id, machine)?;
        publicips::create_or_update(scope, &PublicIpSpec { name: name.clone() })
            .await
            .map_err(|e| e.context(format!("unable to create public IP for machine {machine}")))?;
        Some(name)
    } else {
        None
    };

    let nic_spec = NetworkInterfaceSpec {
        name: names::nic_name(machine),
        vnet_name: spec.vnet.clone(),
        subnet_name: spec.subnet.clone(),
        vm_size: spec.vm_size.clone(),
        accelerated_networking: spec.accelerated_networking,
        security_group_name: spec.security_group.clone(),
        application_security_group_names: spec.application_security_groups.clone(),
        public_load_balancer_name: spec.public_load_balancer.clone(),
        internal_load_balancer_name: spec.internal_load_balancer.clone(),
        nat_rule: spec.nat_rule,
        public_ip_name,
    };
    let nic = networkinterfaces::create_or_update(scope, &nic_spec)
        .await
        .map_err(|e| e.context(format!("failed to create nic {} for machine {machine}", nic_spec.name)))?;

    Ok(nic.id.unwrap_or_else(|| {
        names::resource_id(
            &scope.subscription_id,
            scope.resource_group(),
            "Microsoft.Network/networkInterfaces",
            &nic_spec.name,
        )
    }))
}

/// Availability set the VM joins, created when it is derived from the MachineSet
async fn availability_set(scope: &MachineScope) -> Result<Option<String>, ReconcileError> {
    let spec = &scope.provider_spec;
    if !spec.availability_set.is_empty() {
        return Ok(Some(spec.availability_set.clone()));
    }

    let zones = availabilityzones::get(scope, &spec.vm_size).await?;
    if !zones.is_empty() {
        debug!(machine = %scope.name(), ?zones, "Location has availability zones, skipping availability set");
        return Ok(None);
    }

    let Some(machine_set) = scope.machine_set() else {
        debug!(machine = %scope.name(), "Machine has no MachineSet label, skipping availability set");
        return Ok(None);
    };

    if spec.spot_vm_options.is_some() {
        debug!(machine = %scope.name(), "Spot machine, skipping availability set");
        return Ok(None);
    }

    let name = names::availability_set_name(&scope.cluster_id, machine_set);
    availabilitysets::create_or_update(scope, &AvailabilitySetSpec { name: name.clone() }).await?;
    Ok(Some(name))
}

async fn create_virtual_machine(
    scope: &MachineScope,
    nic_id: &str,
    availability_set: Option<&str>,
) -> Result<(), ReconcileError> {
    let name = scope.name();

    let ssh_public_key = STANDARD
        .decode(&scope.provider_spec.ssh_public_key)
        .ok()
        .and_then(|raw| String::from_utf8(raw).ok())
        .ok_or_else(|| ReconcileError::InvalidConfiguration("failed to decode ssh public key".to_string()))?;
    let custom_data = scope.custom_data().await?;

    let Some(vm) = virtualmachines::get(scope, name).await? else {
        let availability_set_id = availability_set.map(|set| {
            names::resource_id(
                &scope.subscription_id,
                scope.resource_group(),
                "Microsoft.Compute/availabilitySets",
                set,
            )
        });
        let request = vmspec::build_virtual_machine(&VmParams {
            name,
            subscription_id: &scope.subscription_id,
            resource_group: scope.resource_group(),
            location: scope.location(),
            spec: &scope.provider_spec,
            tags: &scope.tags,
            nic_id,
            ssh_public_key: &ssh_public_key,
            custom_data: custom_data.as_deref(),
            availability_set_id: availability_set_id.as_deref(),
            supports_ultra_ssd: scope.cloud().supports_ultra_ssd,
        })?;
        virtualmachines::create_or_update(scope, name, &request).await?;
        return Ok(());
    };

    match vm.provisioning_state() {
        PROVISIONING_SUCCEEDED => Ok(()),
        PROVISIONING_FAILED => {
            info!(machine = %name, "VM is in the Failed provisioning state, deleting it");
            virtualmachines::delete(scope, name).await?;
            Err(ReconcileError::Transient(format!(
                "vm {name} is deleted, retry creating in next reconcile"
            )))
        }
        state => Err(ReconcileError::Transient(format!(
            "vm {name} is still in provisioning state {state}, reconcile"
        ))),
    }
}

/// Attach the startup script to machines bootstrapped without user data
async fn create_startup_script(scope: &MachineScope) -> Result<(), ReconcileError> {
    let spec = &scope.provider_spec;
    if spec.user_data_secret.is_some() || spec.startup_script.is_empty() {
        return Ok(());
    }

    let extension = VmExtensionSpec {
        name: STARTUP_SCRIPT_EXTENSION.to_string(),
        vm_name: scope.name().to_string(),
        script_data: spec.startup_script.clone(),
    };
    if virtualmachineextensions::get(scope, &extension).await?.is_some() {
        return Ok(());
    }
    virtualmachineextensions::create_or_update(scope, &extension).await?;
    Ok(())
}

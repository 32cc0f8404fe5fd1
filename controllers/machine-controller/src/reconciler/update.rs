//! Update: reflect the observed VM into the Machine.

use azure_client::VirtualMachine;
use crds::labels::{INSTANCE_TYPE_LABEL, INTERRUPTIBLE_INSTANCE_LABEL, REGION_LABEL, ZONE_LABEL};
use crds::{MachineAddress, MachineAddressType};
use tracing::{debug, info};

use super::{conditions, vmstate};
use crate::error::ReconcileError;
use crate::names;
use crate::scope::MachineScope;
use crate::services::interfaceloadbalancers;
use crate::services::networkinterfaces::{self, NetworkInterfaceSpec};
use crate::services::publicips::{self, PublicIpSpec};
use crate::services::virtualmachines;

/// Last segment of a resource ID
fn id_name(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

fn nic_names(vm: &VirtualMachine) -> Vec<String> {
    vm.properties
        .network_profile
        .iter()
        .flat_map(|profile| profile.network_interfaces.iter())
        .map(|nic| id_name(&nic.id).to_string())
        .collect()
}

fn computer_name(vm: &VirtualMachine) -> Option<&str> {
    vm.properties
        .os_profile
        .as_ref()
        .and_then(|os| os.computer_name.as_deref())
        .filter(|name| !name.is_empty())
}

/// Populate addresses, provider ID, status and cloud labels from the VM
pub async fn update(scope: &mut MachineScope) -> Result<(), ReconcileError> {
    let name = scope.name().to_string();
    let vm = virtualmachines::get(scope, &name)
        .await?
        .ok_or_else(|| ReconcileError::NotFound(format!("vm {name} not found")))?;

    let observed = vm.vm_size();
    if !observed.is_empty() && !observed.eq_ignore_ascii_case(&scope.provider_spec.vm_size) {
        return Err(ReconcileError::ImmutableField(format!(
            "vmSize of machine {name} cannot be changed from {observed} to {}",
            scope.provider_spec.vm_size
        )));
    }

    let addresses = network_addresses(scope, &vm).await?;
    scope.machine.status.get_or_insert_with(Default::default).addresses = addresses;

    if scope.is_control_plane() && scope.provider_spec.internal_load_balancer.is_empty() {
        adopt_internal_load_balancer(scope, &vm).await?;
    }

    let computer_name = computer_name(&vm).unwrap_or(&name);
    scope.machine.spec.provider_id = Some(names::provider_id(
        &scope.subscription_id,
        scope.resource_group(),
        computer_name,
    ));

    conditions::set_condition(&mut scope.provider_status.conditions, conditions::creation_succeeded());
    set_cloud_provider_specifics(scope, &vm);
    Ok(())
}

async fn network_addresses(scope: &MachineScope, vm: &VirtualMachine) -> Result<Vec<MachineAddress>, ReconcileError> {
    let mut addresses = Vec::new();
    let computer_name = computer_name(vm);
    if let Some(computer_name) = computer_name {
        addresses.push(MachineAddress::new(MachineAddressType::Hostname, computer_name));
        addresses.push(MachineAddress::new(MachineAddressType::InternalDns, computer_name));
    }

    for nic_name in nic_names(vm) {
        let spec = NetworkInterfaceSpec {
            name: nic_name.clone(),
            vnet_name: scope.provider_spec.vnet.clone(),
            ..Default::default()
        };
        let Some(nic) = networkinterfaces::get(scope, &spec).await? else {
            debug!(nic = %nic_name, "Network interface of the VM not found");
            continue;
        };

        let suffix = nic
            .properties
            .dns_settings
            .as_ref()
            .and_then(|dns| dns.internal_domain_name_suffix.as_deref());
        if let (Some(computer_name), Some(suffix)) = (computer_name, suffix) {
            addresses.push(MachineAddress::new(
                MachineAddressType::InternalDns,
                format!("{computer_name}.{suffix}"),
            ));
        }

        for config in &nic.properties.ip_configurations {
            if let Some(ip) = config.properties.private_ip_address.as_deref().filter(|ip| !ip.is_empty()) {
                addresses.push(MachineAddress::new(MachineAddressType::InternalIp, ip));
            }

            let Some(public_ip_ref) = &config.properties.public_ip_address else {
                continue;
            };
            let spec = PublicIpSpec {
                name: id_name(&public_ip_ref.id).to_string(),
            };
            let Some(public_ip) = publicips::get(scope, &spec).await? else {
                debug!(public_ip = %spec.name, "Public IP of the VM not found");
                continue;
            };
            if let Some(ip) = public_ip.properties.ip_address.as_deref().filter(|ip| !ip.is_empty()) {
                addresses.push(MachineAddress::new(MachineAddressType::ExternalIp, ip));
            }
            if let Some(fqdn) = public_ip
                .properties
                .dns_settings
                .as_ref()
                .and_then(|dns| dns.fqdn.as_deref())
                .filter(|fqdn| !fqdn.is_empty())
            {
                addresses.push(MachineAddress::new(MachineAddressType::ExternalDns, fqdn));
            }
        }
    }

    Ok(addresses)
}

/// Record the first internal load balancer in front of a control-plane VM
async fn adopt_internal_load_balancer(scope: &mut MachineScope, vm: &VirtualMachine) -> Result<(), ReconcileError> {
    for nic_name in nic_names(vm) {
        let load_balancers = interfaceloadbalancers::list(scope, &nic_name).await?;
        let internal = load_balancers
            .iter()
            .find(|lb| interfaceloadbalancers::is_internal(lb))
            .and_then(|lb| lb.name.clone());
        if let Some(lb_name) = internal {
            info!(machine = %scope.name(), load_balancer = %lb_name, "Adopting internal load balancer");
            scope.provider_spec.internal_load_balancer = lb_name;
            return Ok(());
        }
    }
    Ok(())
}

fn set_cloud_provider_specifics(scope: &mut MachineScope, vm: &VirtualMachine) {
    if let Some(state) = vmstate::vm_state(vm) {
        scope.set_vm_state(state);
    }
    scope.provider_status.vm_id = vm.properties.vm_id.clone();

    let labels = scope.labels_mut();
    if !vm.location.is_empty() {
        labels.insert(REGION_LABEL.to_string(), vm.location.clone());
    }
    if !vm.zones.is_empty() {
        labels.insert(ZONE_LABEL.to_string(), vm.zones.join(","));
    }
    if !vm.vm_size().is_empty() {
        labels.insert(INSTANCE_TYPE_LABEL.to_string(), vm.vm_size().to_string());
    }

    if scope.provider_spec.spot_vm_options.is_some() {
        scope
            .labels_mut()
            .insert(INTERRUPTIBLE_INSTANCE_LABEL.to_string(), String::new());
        scope
            .machine
            .spec
            .metadata
            .get_or_insert_with(Default::default)
            .labels
            .insert(INTERRUPTIBLE_INSTANCE_LABEL.to_string(), String::new());
    }
}

//! Compute operations for MockAzureClient
//!
//! Handles virtual machines, managed disks, availability sets, VM extensions
//! and the SKU catalog

use super::{MockAzureClient, id_name, key};
use crate::error::AzureError;
use crate::models::*;

pub async fn get_virtual_machine(client: &MockAzureClient, resource_group: &str, name: &str) -> Result<VirtualMachine, AzureError> {
    client.record("get_virtual_machine", name)?;
    client.virtual_machines
        .lock()
        .unwrap()
        .get(&key(&[resource_group, name]))
        .cloned()
        .ok_or_else(|| AzureError::NotFound(format!("virtual machine {} not found", name)))
}

pub async fn create_or_update_virtual_machine(
    client: &MockAzureClient,
    resource_group: &str,
    name: &str,
    vm: &VirtualMachine,
) -> Result<VirtualMachine, AzureError> {
    client.record("create_or_update_virtual_machine", name)?;

    let id = client.resource_id(resource_group, "Microsoft.Compute/virtualMachines", name);
    let mut stored = vm.clone();
    stored.id = Some(id.clone());
    stored.name = Some(name.to_string());
    let vm_id = format!("00000000-0000-0000-0000-{:012}", client.next_id());
    stored.properties.vm_id.get_or_insert(vm_id);
    stored.properties.provisioning_state.get_or_insert_with(|| "Succeeded".to_string());
    stored.properties.instance_view.get_or_insert_with(|| VirtualMachineInstanceView {
        statuses: vec![
            InstanceViewStatus {
                code: Some("ProvisioningState/succeeded".to_string()),
                display_status: Some("Provisioning succeeded".to_string()),
            },
            InstanceViewStatus {
                code: Some("PowerState/running".to_string()),
                display_status: Some("VM running".to_string()),
            },
        ],
    });

    // ARM maintains the membership of the referenced availability set
    if let Some(set_ref) = &stored.properties.availability_set {
        let set_key = key(&[resource_group, &id_name(&set_ref.id)]);
        if let Some(set) = client.availability_sets.lock().unwrap().get_mut(&set_key) {
            if !set.properties.virtual_machines.iter().any(|m| m.id.eq_ignore_ascii_case(&id)) {
                set.properties.virtual_machines.push(SubResource::new(id.clone()));
            }
        }
    }

    // ...and the back-reference from each attached interface
    if let Some(profile) = &stored.properties.network_profile {
        let mut nics = client.network_interfaces.lock().unwrap();
        for nic_ref in &profile.network_interfaces {
            if let Some(nic) = nics.get_mut(&key(&[resource_group, &id_name(&nic_ref.id)])) {
                nic.properties.virtual_machine = Some(SubResource::new(id.clone()));
            }
        }
    }

    client.virtual_machines
        .lock()
        .unwrap()
        .insert(key(&[resource_group, name]), stored.clone());
    Ok(stored)
}

pub async fn delete_virtual_machine(client: &MockAzureClient, resource_group: &str, name: &str) -> Result<(), AzureError> {
    client.record("delete_virtual_machine", name)?;
    if *client.defer_vm_deletes.lock().unwrap() {
        if let Some(vm) = client.virtual_machines.lock().unwrap().get_mut(&key(&[resource_group, name])) {
            vm.properties.provisioning_state = Some("Deleting".to_string());
        }
        return Ok(());
    }
    let removed = client.virtual_machines.lock().unwrap().remove(&key(&[resource_group, name]));

    if let Some(vm) = removed {
        let id = vm.id.unwrap_or_default();
        for set in client.availability_sets.lock().unwrap().values_mut() {
            set.properties.virtual_machines.retain(|m| !m.id.eq_ignore_ascii_case(&id));
        }
    }
    Ok(())
}

pub async fn delete_disk(client: &MockAzureClient, resource_group: &str, name: &str) -> Result<(), AzureError> {
    client.record("delete_disk", name)?;
    client.disks.lock().unwrap().remove(&key(&[resource_group, name]));
    Ok(())
}

pub async fn get_availability_set(client: &MockAzureClient, resource_group: &str, name: &str) -> Result<AvailabilitySet, AzureError> {
    client.record("get_availability_set", name)?;
    client.availability_sets
        .lock()
        .unwrap()
        .get(&key(&[resource_group, name]))
        .cloned()
        .ok_or_else(|| AzureError::NotFound(format!("availability set {} not found", name)))
}

pub async fn create_or_update_availability_set(
    client: &MockAzureClient,
    resource_group: &str,
    name: &str,
    set: &AvailabilitySet,
) -> Result<AvailabilitySet, AzureError> {
    client.record("create_or_update_availability_set", name)?;

    let mut sets = client.availability_sets.lock().unwrap();
    let set_key = key(&[resource_group, name]);
    let mut stored = set.clone();
    stored.id = Some(client.resource_id(resource_group, "Microsoft.Compute/availabilitySets", name));
    stored.name = Some(name.to_string());
    if let Some(existing) = sets.get(&set_key) {
        stored.properties.virtual_machines = existing.properties.virtual_machines.clone();
    }
    sets.insert(set_key, stored.clone());
    Ok(stored)
}

pub async fn delete_availability_set(client: &MockAzureClient, resource_group: &str, name: &str) -> Result<(), AzureError> {
    client.record("delete_availability_set", name)?;

    let mut sets = client.availability_sets.lock().unwrap();
    let set_key = key(&[resource_group, name]);
    if sets
        .get(&set_key)
        .is_some_and(|set| !set.properties.virtual_machines.is_empty())
    {
        return Err(AzureError::Api {
            status: 409,
            code: "OperationNotAllowed".to_string(),
            message: format!("availability set {} still has virtual machines", name),
        });
    }
    sets.remove(&set_key);
    Ok(())
}

pub async fn get_virtual_machine_extension(
    client: &MockAzureClient,
    resource_group: &str,
    vm_name: &str,
    name: &str,
) -> Result<VirtualMachineExtension, AzureError> {
    client.record("get_virtual_machine_extension", &format!("{}/{}", vm_name, name))?;
    client.extensions
        .lock()
        .unwrap()
        .get(&key(&[resource_group, vm_name, name]))
        .cloned()
        .ok_or_else(|| AzureError::NotFound(format!("extension {} of {} not found", name, vm_name)))
}

pub async fn create_or_update_virtual_machine_extension(
    client: &MockAzureClient,
    resource_group: &str,
    vm_name: &str,
    name: &str,
    extension: &VirtualMachineExtension,
) -> Result<VirtualMachineExtension, AzureError> {
    client.record("create_or_update_virtual_machine_extension", &format!("{}/{}", vm_name, name))?;

    if !client.has_virtual_machine(resource_group, vm_name) {
        return Err(AzureError::NotFound(format!("virtual machine {} not found", vm_name)));
    }

    let mut stored = extension.clone();
    stored.id = Some(client.resource_id(
        resource_group,
        &format!("Microsoft.Compute/virtualMachines/{}/extensions", vm_name),
        name,
    ));
    stored.name = Some(name.to_string());
    stored.properties.provisioning_state = Some("Succeeded".to_string());
    client.extensions
        .lock()
        .unwrap()
        .insert(key(&[resource_group, vm_name, name]), stored.clone());
    Ok(stored)
}

pub async fn delete_virtual_machine_extension(
    client: &MockAzureClient,
    resource_group: &str,
    vm_name: &str,
    name: &str,
) -> Result<(), AzureError> {
    client.record("delete_virtual_machine_extension", &format!("{}/{}", vm_name, name))?;
    client.extensions.lock().unwrap().remove(&key(&[resource_group, vm_name, name]));
    Ok(())
}

pub async fn list_resource_skus(client: &MockAzureClient, location: Option<&str>) -> Result<Vec<ResourceSku>, AzureError> {
    client.record("list_resource_skus", location.unwrap_or("*"))?;
    Ok(client.resource_skus
        .lock()
        .unwrap()
        .iter()
        .filter(|sku| location.is_none_or(|loc| sku.available_in(loc)))
        .cloned()
        .collect())
}

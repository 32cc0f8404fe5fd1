//! Network operations for MockAzureClient
//!
//! Handles network interfaces, subnets, public IP addresses and load balancers

use super::{MockAzureClient, key};
use crate::error::AzureError;
use crate::models::*;

pub async fn get_network_interface(client: &MockAzureClient, resource_group: &str, name: &str) -> Result<NetworkInterface, AzureError> {
    client.record("get_network_interface", name)?;
    client.network_interfaces
        .lock()
        .unwrap()
        .get(&key(&[resource_group, name]))
        .cloned()
        .ok_or_else(|| AzureError::NotFound(format!("network interface {} not found", name)))
}

pub async fn create_or_update_network_interface(
    client: &MockAzureClient,
    resource_group: &str,
    name: &str,
    nic: &NetworkInterface,
) -> Result<NetworkInterface, AzureError> {
    client.record("create_or_update_network_interface", name)?;

    let id = client.resource_id(resource_group, "Microsoft.Network/networkInterfaces", name);
    let mut stored = nic.clone();
    for config in &mut stored.properties.ip_configurations {
        let config_name = config.name.clone().unwrap_or_default();
        config.id.get_or_insert_with(|| format!("{}/ipConfigurations/{}", id, config_name));
        if config.properties.private_ip_address.is_none() {
            let n = client.next_id();
            let is_v6 = config.properties.private_ip_address_version.as_deref() == Some("IPv6");
            config.properties.private_ip_address = Some(if is_v6 {
                format!("fd00::{:x}", n)
            } else {
                format!("10.0.{}.{}", n / 250, n % 250 + 4)
            });
        }
    }
    stored.id = Some(id);
    stored.name = Some(name.to_string());
    stored.properties.provisioning_state = Some("Succeeded".to_string());
    stored.properties.dns_settings.get_or_insert_with(|| InterfaceDnsSettings {
        internal_domain_name_suffix: Some("mock.internal.cloudapp.net".to_string()),
    });

    client.network_interfaces
        .lock()
        .unwrap()
        .insert(key(&[resource_group, name]), stored.clone());
    Ok(stored)
}

pub async fn delete_network_interface(client: &MockAzureClient, resource_group: &str, name: &str) -> Result<(), AzureError> {
    client.record("delete_network_interface", name)?;
    client.network_interfaces.lock().unwrap().remove(&key(&[resource_group, name]));
    Ok(())
}

pub async fn get_subnet(client: &MockAzureClient, resource_group: &str, vnet: &str, name: &str) -> Result<Subnet, AzureError> {
    client.record("get_subnet", &format!("{}/{}", vnet, name))?;
    client.subnets
        .lock()
        .unwrap()
        .get(&key(&[resource_group, vnet, name]))
        .cloned()
        .ok_or_else(|| AzureError::NotFound(format!("subnet {} of virtual network {} not found", name, vnet)))
}

pub async fn get_public_ip_address(client: &MockAzureClient, resource_group: &str, name: &str) -> Result<PublicIpAddress, AzureError> {
    client.record("get_public_ip_address", name)?;
    client.public_ips
        .lock()
        .unwrap()
        .get(&key(&[resource_group, name]))
        .cloned()
        .ok_or_else(|| AzureError::NotFound(format!("public IP address {} not found", name)))
}

pub async fn create_or_update_public_ip_address(
    client: &MockAzureClient,
    resource_group: &str,
    name: &str,
    ip: &PublicIpAddress,
) -> Result<PublicIpAddress, AzureError> {
    client.record("create_or_update_public_ip_address", name)?;

    let mut stored = ip.clone();
    stored.id = Some(client.resource_id(resource_group, "Microsoft.Network/publicIPAddresses", name));
    stored.name = Some(name.to_string());
    if stored.properties.ip_address.is_none() {
        let n = client.next_id();
        let is_v6 = stored.properties.public_ip_address_version.as_deref() == Some("IPv6");
        stored.properties.ip_address = Some(if is_v6 {
            format!("2001:db8::{:x}", n)
        } else {
            format!("20.0.{}.{}", n / 250, n % 250 + 4)
        });
    }
    let location = stored.location.clone();
    if let Some(dns) = stored.properties.dns_settings.as_mut() {
        if dns.fqdn.is_none() {
            if let Some(label) = &dns.domain_name_label {
                dns.fqdn = Some(format!("{}.{}.cloudapp.azure.com", label, location));
            }
        }
    }

    client.public_ips
        .lock()
        .unwrap()
        .insert(key(&[resource_group, name]), stored.clone());
    Ok(stored)
}

pub async fn delete_public_ip_address(client: &MockAzureClient, resource_group: &str, name: &str) -> Result<(), AzureError> {
    client.record("delete_public_ip_address", name)?;
    client.public_ips.lock().unwrap().remove(&key(&[resource_group, name]));
    Ok(())
}

pub async fn get_load_balancer(client: &MockAzureClient, resource_group: &str, name: &str) -> Result<LoadBalancer, AzureError> {
    client.record("get_load_balancer", name)?;
    client.load_balancers
        .lock()
        .unwrap()
        .get(&key(&[resource_group, name]))
        .cloned()
        .ok_or_else(|| AzureError::NotFound(format!("load balancer {} not found", name)))
}

pub async fn list_interface_load_balancers(
    client: &MockAzureClient,
    resource_group: &str,
    nic_name: &str,
) -> Result<Vec<LoadBalancer>, AzureError> {
    client.record("list_interface_load_balancers", nic_name)?;

    let nic = client.network_interfaces
        .lock()
        .unwrap()
        .get(&key(&[resource_group, nic_name]))
        .cloned()
        .ok_or_else(|| AzureError::NotFound(format!("network interface {} not found", nic_name)))?;

    let pool_ids: Vec<String> = nic
        .properties
        .ip_configurations
        .iter()
        .flat_map(|c| c.properties.load_balancer_backend_address_pools.iter())
        .map(|pool| pool.id.to_lowercase())
        .collect();

    Ok(client.load_balancers
        .lock()
        .unwrap()
        .values()
        .filter(|lb| {
            lb.properties
                .backend_address_pools
                .iter()
                .any(|pool| pool_ids.contains(&pool.id.to_lowercase()))
        })
        .cloned()
        .collect())
}

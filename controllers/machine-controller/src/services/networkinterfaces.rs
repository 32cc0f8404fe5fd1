//! Network interfaces owned by machines.
//!
//! The interface gets an IPv4 configuration and, when the subnet carries an
//! IPv6 prefix, a secondary IPv6 configuration. Backend pools of the named
//! public and internal load balancers are split between the two by the IP
//! family of the frontend that feeds them.

use azure_client::{
    InterfaceIpConfiguration, InterfaceIpConfigurationProperties, LoadBalancer, NetworkInterface,
    NetworkInterfaceProperties, SubResource, Subnet,
};
use tracing::{debug, info};

use crate::error::ReconcileError;
use crate::names;
use crate::scope::MachineScope;
use crate::services::{absent_ok, found};

/// Name of the primary IPv4 configuration
pub const IPV4_CONFIG_NAME: &str = "pipConfig";

/// Name of the secondary IPv6 configuration
pub const IPV6_CONFIG_NAME: &str = "ipConfigv6";

/// Network interface to manage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkInterfaceSpec {
    pub name: String,
    pub vnet_name: String,
    pub subnet_name: String,
    pub vm_size: String,
    pub accelerated_networking: bool,
    pub security_group_name: String,
    pub application_security_group_names: Vec<String>,
    pub public_load_balancer_name: String,
    pub internal_load_balancer_name: String,
    /// Index into the public load balancer's inbound NAT rules
    pub nat_rule: Option<i64>,
    pub public_ip_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IpFamily {
    V4,
    V6,
}

pub async fn get(scope: &MachineScope, spec: &NetworkInterfaceSpec) -> Result<Option<NetworkInterface>, ReconcileError> {
    found(scope.client.get_network_interface(scope.resource_group(), &spec.name).await)
        .map_err(|e| ReconcileError::cloud(format!("failed to get nic {}", spec.name), e))
}

/// Family of the frontend that feeds `pool_id` through a load-balancing rule.
///
/// Pools without a rule are classified by name.
fn pool_family(lb: &LoadBalancer, pool_id: &str, pool_name: &str) -> IpFamily {
    let frontend_id = lb
        .properties
        .load_balancing_rules
        .iter()
        .filter(|rule| {
            rule.properties
                .backend_address_pool
                .as_ref()
                .is_some_and(|pool| pool.id.eq_ignore_ascii_case(pool_id))
        })
        .find_map(|rule| rule.properties.frontend_ip_configuration.as_ref());

    let frontend_version = frontend_id.and_then(|frontend_id| {
        lb.properties
            .frontend_ip_configurations
            .iter()
            .find(|frontend| frontend.id.eq_ignore_ascii_case(&frontend_id.id))
            .and_then(|frontend| frontend.properties.private_ip_address_version.as_deref())
    });

    match frontend_version {
        Some(version) if version.eq_ignore_ascii_case("IPv6") => IpFamily::V6,
        Some(_) => IpFamily::V4,
        None if pool_name.to_lowercase().contains("ipv6") => IpFamily::V6,
        None => IpFamily::V4,
    }
}

async fn load_balancer(scope: &MachineScope, name: &str) -> Result<LoadBalancer, ReconcileError> {
    scope
        .client
        .get_load_balancer(scope.resource_group(), name)
        .await
        .map_err(|e| ReconcileError::cloud(format!("failed to get load balancer {name}"), e))
}

fn attach_pools(lb: &LoadBalancer, v4: &mut Vec<SubResource>, v6: &mut Vec<SubResource>, has_ipv6: bool) {
    for pool in &lb.properties.backend_address_pools {
        match pool_family(lb, &pool.id, &pool.name) {
            IpFamily::V4 => v4.push(SubResource::new(pool.id.clone())),
            IpFamily::V6 if has_ipv6 => v6.push(SubResource::new(pool.id.clone())),
            IpFamily::V6 => debug!(pool = %pool.name, "Skipping IPv6 backend pool on an IPv4-only subnet"),
        }
    }
}

/// Fail when the VM size does not support accelerated networking
pub(crate) async fn check_accelerated_networking(scope: &MachineScope, vm_size: &str) -> Result<(), ReconcileError> {
    if !scope.cloud().supports_accelerated_networking_check {
        return Ok(());
    }
    let supported = scope
        .skus
        .accelerated_networking(vm_size)
        .await
        .map_err(|e| e.into_reconcile(format!("failed to check accelerated networking for {vm_size}")))?;
    if !supported {
        return Err(ReconcileError::InvalidConfiguration(format!(
            "accelerated networking not supported on instance type: {vm_size}"
        )));
    }
    Ok(())
}

fn ip_configuration(
    name: &str,
    family: IpFamily,
    subnet: &Subnet,
    application_security_groups: &[SubResource],
) -> InterfaceIpConfiguration {
    InterfaceIpConfiguration {
        name: Some(name.to_string()),
        properties: InterfaceIpConfigurationProperties {
            private_ip_allocation_method: Some("Dynamic".to_string()),
            private_ip_address_version: Some(
                match family {
                    IpFamily::V4 => "IPv4",
                    IpFamily::V6 => "IPv6",
                }
                .to_string(),
            ),
            subnet: subnet.id.clone().map(SubResource::new),
            primary: Some(family == IpFamily::V4),
            application_security_groups: application_security_groups.to_vec(),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub async fn create_or_update(scope: &MachineScope, spec: &NetworkInterfaceSpec) -> Result<NetworkInterface, ReconcileError> {
    let network_rg = scope.network_resource_group();

    let subnet = scope
        .client
        .get_subnet(network_rg, &spec.vnet_name, &spec.subnet_name)
        .await
        .map_err(|e| {
            ReconcileError::cloud(
                format!("failed to get subnet {} of vnet {}", spec.subnet_name, spec.vnet_name),
                e,
            )
        })?;
    let has_ipv6 = subnet.has_ipv6();

    let application_security_groups: Vec<SubResource> = spec
        .application_security_group_names
        .iter()
        .map(|name| {
            SubResource::new(names::resource_id(
                &scope.subscription_id,
                network_rg,
                "Microsoft.Network/applicationSecurityGroups",
                name,
            ))
        })
        .collect();

    let mut v4 = ip_configuration(IPV4_CONFIG_NAME, IpFamily::V4, &subnet, &application_security_groups);
    let mut v6 = ip_configuration(IPV6_CONFIG_NAME, IpFamily::V6, &subnet, &application_security_groups);

    if !spec.public_load_balancer_name.is_empty() {
        let lb = load_balancer(scope, &spec.public_load_balancer_name).await?;
        attach_pools(
            &lb,
            &mut v4.properties.load_balancer_backend_address_pools,
            &mut v6.properties.load_balancer_backend_address_pools,
            has_ipv6,
        );

        if let Some(index) = spec.nat_rule {
            let rule = usize::try_from(index)
                .ok()
                .and_then(|i| lb.properties.inbound_nat_rules.get(i))
                .ok_or_else(|| {
                    ReconcileError::InvalidConfiguration(format!(
                        "load balancer {} has no inbound NAT rule at index {index}",
                        spec.public_load_balancer_name
                    ))
                })?;
            v4.properties
                .load_balancer_inbound_nat_rules
                .push(SubResource::new(rule.id.clone()));
        }
    }

    if !spec.internal_load_balancer_name.is_empty() {
        let lb = load_balancer(scope, &spec.internal_load_balancer_name).await?;
        attach_pools(
            &lb,
            &mut v4.properties.load_balancer_backend_address_pools,
            &mut v6.properties.load_balancer_backend_address_pools,
            has_ipv6,
        );
    }

    if let Some(public_ip_name) = &spec.public_ip_name {
        v4.properties.public_ip_address = Some(SubResource::new(names::resource_id(
            &scope.subscription_id,
            network_rg,
            "Microsoft.Network/publicIPAddresses",
            public_ip_name,
        )));
    }

    let enable_accelerated_networking = if spec.accelerated_networking {
        check_accelerated_networking(scope, &spec.vm_size).await?;
        Some(true)
    } else {
        None
    };

    let network_security_group = (!spec.security_group_name.is_empty()).then(|| {
        SubResource::new(names::resource_id(
            &scope.subscription_id,
            network_rg,
            "Microsoft.Network/networkSecurityGroups",
            &spec.security_group_name,
        ))
    });

    let mut ip_configurations = vec![v4];
    if has_ipv6 {
        ip_configurations.push(v6);
    }

    let nic = NetworkInterface {
        location: scope.location().to_string(),
        tags: scope.tags.clone(),
        properties: NetworkInterfaceProperties {
            ip_configurations,
            network_security_group,
            enable_accelerated_networking,
            ..Default::default()
        },
        ..Default::default()
    };

    info!(name = %spec.name, resource_group = %scope.resource_group(), ipv6 = has_ipv6, "Creating network interface");
    scope
        .client
        .create_or_update_network_interface(scope.resource_group(), &spec.name, &nic)
        .await
        .map_err(|e| ReconcileError::cloud(format!("failed to create nic {}", spec.name), e))
}

pub async fn delete(scope: &MachineScope, spec: &NetworkInterfaceSpec) -> Result<(), ReconcileError> {
    info!(name = %spec.name, "Deleting network interface");
    absent_ok(scope.client.delete_network_interface(scope.resource_group(), &spec.name).await)
        .map_err(|e| ReconcileError::cloud(format!("failed to delete nic {}", spec.name), e))
}

//! Load balancers a network interface is attached to.

use azure_client::LoadBalancer;

use crate::error::ReconcileError;
use crate::scope::MachineScope;

/// Load balancers whose backend pools reference the interface
pub async fn list(scope: &MachineScope, nic_name: &str) -> Result<Vec<LoadBalancer>, ReconcileError> {
    scope
        .client
        .list_interface_load_balancers(scope.resource_group(), nic_name)
        .await
        .map_err(|e| ReconcileError::cloud(format!("failed to list load balancers of nic {nic_name}"), e))
}

/// Whether any frontend of the load balancer has a private address.
///
/// On Azure a private frontend means the load balancer is internal.
pub fn is_internal(lb: &LoadBalancer) -> bool {
    lb.properties
        .frontend_ip_configurations
        .iter()
        .any(|frontend| frontend.properties.private_ip_address.as_deref().is_some_and(|ip| !ip.is_empty()))
}

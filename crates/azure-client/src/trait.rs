//! AzureClient trait for mocking
//!
//! This trait abstracts the AzureClient to enable mocking in unit tests.
//! The concrete AzureClient implements this trait, and tests can use the
//! in-memory `MockAzureClient` (feature `test-util`).

use crate::cloud::CloudProfile;
use crate::error::AzureError;
use crate::models::*;

/// Trait for Azure Resource Manager operations
///
/// Every method addresses one resource by resource group and name within the
/// client's subscription. `get_*` methods fail with [`AzureError::NotFound`]
/// when the resource is absent; `delete_*` methods succeed in that case.
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait AzureClientTrait: Send + Sync {
    /// Subscription the client operates in
    fn subscription_id(&self) -> &str;

    /// Environment the client talks to
    fn cloud(&self) -> &CloudProfile;

    // Compute: virtual machines
    async fn get_virtual_machine(&self, resource_group: &str, name: &str) -> Result<VirtualMachine, AzureError>;
    async fn create_or_update_virtual_machine(&self, resource_group: &str, name: &str, vm: &VirtualMachine) -> Result<VirtualMachine, AzureError>;
    async fn delete_virtual_machine(&self, resource_group: &str, name: &str) -> Result<(), AzureError>;

    // Compute: managed disks
    async fn delete_disk(&self, resource_group: &str, name: &str) -> Result<(), AzureError>;

    // Compute: availability sets
    async fn get_availability_set(&self, resource_group: &str, name: &str) -> Result<AvailabilitySet, AzureError>;
    async fn create_or_update_availability_set(&self, resource_group: &str, name: &str, set: &AvailabilitySet) -> Result<AvailabilitySet, AzureError>;
    async fn delete_availability_set(&self, resource_group: &str, name: &str) -> Result<(), AzureError>;

    // Compute: VM extensions
    async fn get_virtual_machine_extension(&self, resource_group: &str, vm_name: &str, name: &str) -> Result<VirtualMachineExtension, AzureError>;
    async fn create_or_update_virtual_machine_extension(&self, resource_group: &str, vm_name: &str, name: &str, extension: &VirtualMachineExtension) -> Result<VirtualMachineExtension, AzureError>;
    async fn delete_virtual_machine_extension(&self, resource_group: &str, vm_name: &str, name: &str) -> Result<(), AzureError>;

    // Compute: SKU catalog
    /// List compute SKUs; with `location` set, only SKUs offered there
    async fn list_resource_skus(&self, location: Option<&str>) -> Result<Vec<ResourceSku>, AzureError>;

    // Network: interfaces
    async fn get_network_interface(&self, resource_group: &str, name: &str) -> Result<NetworkInterface, AzureError>;
    async fn create_or_update_network_interface(&self, resource_group: &str, name: &str, nic: &NetworkInterface) -> Result<NetworkInterface, AzureError>;
    async fn delete_network_interface(&self, resource_group: &str, name: &str) -> Result<(), AzureError>;

    // Network: subnets
    async fn get_subnet(&self, resource_group: &str, vnet: &str, name: &str) -> Result<Subnet, AzureError>;

    // Network: public IP addresses
    async fn get_public_ip_address(&self, resource_group: &str, name: &str) -> Result<PublicIpAddress, AzureError>;
    async fn create_or_update_public_ip_address(&self, resource_group: &str, name: &str, ip: &PublicIpAddress) -> Result<PublicIpAddress, AzureError>;
    async fn delete_public_ip_address(&self, resource_group: &str, name: &str) -> Result<(), AzureError>;

    // Network: load balancers
    async fn get_load_balancer(&self, resource_group: &str, name: &str) -> Result<LoadBalancer, AzureError>;
    async fn list_interface_load_balancers(&self, resource_group: &str, nic_name: &str) -> Result<Vec<LoadBalancer>, AzureError>;
}

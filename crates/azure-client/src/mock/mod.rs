//! Mock AzureClient for unit testing
//!
//! This module provides an in-memory implementation of AzureClientTrait that
//! can be used in unit tests without an Azure subscription.
//!
//! The mock is organized by resource provider:
//! - `compute.rs` - virtual machines, disks, availability sets, extensions, SKUs
//! - `network.rs` - network interfaces, subnets, public IPs, load balancers
//!
//! Every call is appended to a call log (`"<operation> <resource>"`), and any
//! operation can be made to fail with [`MockAzureClient::fail_on`].

mod compute;
mod network;

use crate::azure_trait::AzureClientTrait;
use crate::cloud::CloudProfile;
use crate::error::AzureError;
use crate::models::*;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Failure injected into a mock operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    /// ARM error response with the given status
    Api { status: u16, message: String },
    /// The request could not be built
    SendFailure(String),
    /// The request timed out or the connection failed
    Transport(String),
    /// The token issuer rejected the credentials
    Authentication(String),
}

impl MockFailure {
    /// ARM error response with the given status
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    fn to_error(&self) -> AzureError {
        match self {
            Self::Api { status, message } if *status == 404 => AzureError::NotFound(message.clone()),
            Self::Api { status, message } => AzureError::Api {
                status: *status,
                code: "MockFailure".to_string(),
                message: message.clone(),
            },
            Self::SendFailure(message) => AzureError::SendFailure(message.clone()),
            Self::Transport(message) => AzureError::Transport(message.clone()),
            Self::Authentication(message) => AzureError::Authentication(message.clone()),
        }
    }
}

/// Mock AzureClient for testing
///
/// This mock stores resources in memory, keyed by lower-cased resource group
/// and name, and assigns IDs, private/public addresses and provisioning
/// states the way ARM would.
#[derive(Clone)]
pub struct MockAzureClient {
    pub(crate) subscription_id: String,
    pub(crate) cloud: CloudProfile,
    // In-memory storage for resources
    pub(crate) virtual_machines: Arc<Mutex<HashMap<String, VirtualMachine>>>,
    pub(crate) disks: Arc<Mutex<HashSet<String>>>,
    pub(crate) availability_sets: Arc<Mutex<HashMap<String, AvailabilitySet>>>,
    pub(crate) extensions: Arc<Mutex<HashMap<String, VirtualMachineExtension>>>,
    pub(crate) resource_skus: Arc<Mutex<Vec<ResourceSku>>>,
    pub(crate) network_interfaces: Arc<Mutex<HashMap<String, NetworkInterface>>>,
    pub(crate) subnets: Arc<Mutex<HashMap<String, Subnet>>>,
    pub(crate) public_ips: Arc<Mutex<HashMap<String, PublicIpAddress>>>,
    pub(crate) load_balancers: Arc<Mutex<HashMap<String, LoadBalancer>>>,
    // Test instrumentation
    pub(crate) failures: Arc<Mutex<HashMap<String, MockFailure>>>,
    pub(crate) calls: Arc<Mutex<Vec<String>>>,
    pub(crate) defer_vm_deletes: Arc<Mutex<bool>>,
    // Counter for generating IDs and addresses
    pub(crate) next_id: Arc<Mutex<u64>>,
}

impl std::fmt::Debug for MockAzureClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockAzureClient")
            .field("subscription_id", &self.subscription_id)
            .finish_non_exhaustive()
    }
}

impl MockAzureClient {
    /// Create a new mock client for the public cloud
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self::with_cloud(subscription_id, CloudProfile::public())
    }

    /// Create a new mock client for the given environment
    pub fn with_cloud(subscription_id: impl Into<String>, cloud: CloudProfile) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            cloud,
            virtual_machines: Arc::new(Mutex::new(HashMap::new())),
            disks: Arc::new(Mutex::new(HashSet::new())),
            availability_sets: Arc::new(Mutex::new(HashMap::new())),
            extensions: Arc::new(Mutex::new(HashMap::new())),
            resource_skus: Arc::new(Mutex::new(Vec::new())),
            network_interfaces: Arc::new(Mutex::new(HashMap::new())),
            subnets: Arc::new(Mutex::new(HashMap::new())),
            public_ips: Arc::new(Mutex::new(HashMap::new())),
            load_balancers: Arc::new(Mutex::new(HashMap::new())),
            failures: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            defer_vm_deletes: Arc::new(Mutex::new(false)),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    /// Make every call of `operation` (a trait method name) fail
    pub fn fail_on(&self, operation: &str, failure: MockFailure) {
        self.failures.lock().unwrap().insert(operation.to_string(), failure);
    }

    /// Remove an injected failure
    pub fn clear_failure(&self, operation: &str) {
        self.failures.lock().unwrap().remove(operation);
    }

    /// Accept VM deletes but leave the VM in the `Deleting` provisioning state
    pub fn defer_vm_deletes(&self) {
        *self.defer_vm_deletes.lock().unwrap() = true;
    }

    /// Calls made so far, as `"<operation> <resource>"`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls of one operation, as the resource part only
    pub fn calls_to(&self, operation: &str) -> Vec<String> {
        let prefix = format!("{} ", operation);
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| call.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    /// Calls that create, update or delete a resource
    pub fn mutating_calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.starts_with("create_or_update_") || call.starts_with("delete_"))
            .cloned()
            .collect()
    }

    /// Add a virtual machine to the mock store (for test setup)
    pub fn add_virtual_machine(&self, resource_group: &str, vm: VirtualMachine) {
        let name = vm.name.clone().unwrap_or_default();
        let mut vm = vm;
        vm.id.get_or_insert_with(|| self.resource_id(resource_group, "Microsoft.Compute/virtualMachines", &name));
        self.virtual_machines.lock().unwrap().insert(key(&[resource_group, &name]), vm);
    }

    /// Add an availability set to the mock store (for test setup)
    pub fn add_availability_set(&self, resource_group: &str, set: AvailabilitySet) {
        let name = set.name.clone().unwrap_or_default();
        let mut set = set;
        set.id.get_or_insert_with(|| self.resource_id(resource_group, "Microsoft.Compute/availabilitySets", &name));
        self.availability_sets.lock().unwrap().insert(key(&[resource_group, &name]), set);
    }

    /// Add a managed disk to the mock store (for test setup)
    pub fn add_disk(&self, resource_group: &str, name: &str) {
        self.disks.lock().unwrap().insert(key(&[resource_group, name]));
    }

    /// Add a SKU to the catalog (for test setup)
    pub fn add_resource_sku(&self, sku: ResourceSku) {
        self.resource_skus.lock().unwrap().push(sku);
    }

    /// Add a network interface to the mock store (for test setup)
    pub fn add_network_interface(&self, resource_group: &str, nic: NetworkInterface) {
        let name = nic.name.clone().unwrap_or_default();
        let mut nic = nic;
        nic.id.get_or_insert_with(|| self.resource_id(resource_group, "Microsoft.Network/networkInterfaces", &name));
        self.network_interfaces.lock().unwrap().insert(key(&[resource_group, &name]), nic);
    }

    /// Add a subnet to the mock store (for test setup)
    pub fn add_subnet(&self, resource_group: &str, vnet: &str, subnet: Subnet) {
        let name = subnet.name.clone().unwrap_or_default();
        let mut subnet = subnet;
        subnet.id.get_or_insert_with(|| {
            self.resource_id(
                resource_group,
                &format!("Microsoft.Network/virtualNetworks/{}/subnets", vnet),
                &name,
            )
        });
        self.subnets.lock().unwrap().insert(key(&[resource_group, vnet, &name]), subnet);
    }

    /// Add a public IP address to the mock store (for test setup)
    pub fn add_public_ip_address(&self, resource_group: &str, ip: PublicIpAddress) {
        let name = ip.name.clone().unwrap_or_default();
        let mut ip = ip;
        ip.id.get_or_insert_with(|| self.resource_id(resource_group, "Microsoft.Network/publicIPAddresses", &name));
        self.public_ips.lock().unwrap().insert(key(&[resource_group, &name]), ip);
    }

    /// Add a load balancer to the mock store (for test setup)
    pub fn add_load_balancer(&self, resource_group: &str, lb: LoadBalancer) {
        let name = lb.name.clone().unwrap_or_default();
        let mut lb = lb;
        lb.id.get_or_insert_with(|| self.resource_id(resource_group, "Microsoft.Network/loadBalancers", &name));
        self.load_balancers.lock().unwrap().insert(key(&[resource_group, &name]), lb);
    }

    /// Whether a virtual machine is stored
    pub fn has_virtual_machine(&self, resource_group: &str, name: &str) -> bool {
        self.virtual_machines.lock().unwrap().contains_key(&key(&[resource_group, name]))
    }

    /// Stored virtual machine, if any
    pub fn virtual_machine(&self, resource_group: &str, name: &str) -> Option<VirtualMachine> {
        self.virtual_machines.lock().unwrap().get(&key(&[resource_group, name])).cloned()
    }

    /// Stored network interface, if any
    pub fn network_interface(&self, resource_group: &str, name: &str) -> Option<NetworkInterface> {
        self.network_interfaces.lock().unwrap().get(&key(&[resource_group, name])).cloned()
    }

    /// Stored availability set, if any
    pub fn availability_set(&self, resource_group: &str, name: &str) -> Option<AvailabilitySet> {
        self.availability_sets.lock().unwrap().get(&key(&[resource_group, name])).cloned()
    }

    /// Stored VM extension, if any
    pub fn virtual_machine_extension(&self, resource_group: &str, vm_name: &str, name: &str) -> Option<VirtualMachineExtension> {
        self.extensions.lock().unwrap().get(&key(&[resource_group, vm_name, name])).cloned()
    }

    /// Record a call and return the injected failure for the operation, if any
    pub(crate) fn record(&self, operation: &str, resource: &str) -> Result<(), AzureError> {
        self.calls.lock().unwrap().push(format!("{} {}", operation, resource));
        match self.failures.lock().unwrap().get(operation) {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    /// Generate next ID
    pub(crate) fn next_id(&self) -> u64 {
        let mut id = self.next_id.lock().unwrap();
        let current = *id;
        *id += 1;
        current
    }

    pub(crate) fn resource_id(&self, resource_group: &str, kind: &str, name: &str) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}",
            self.subscription_id, resource_group, kind, name
        )
    }
}

/// Store key: path components joined by `/`, lower-cased like ARM's case-insensitive names
pub(crate) fn key(parts: &[&str]) -> String {
    parts.join("/").to_lowercase()
}

/// Last path segment of a resource ID, lower-cased
pub(crate) fn id_name(id: &str) -> String {
    id.rsplit('/').next().unwrap_or_default().to_lowercase()
}

#[async_trait::async_trait]
impl AzureClientTrait for MockAzureClient {
    fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    fn cloud(&self) -> &CloudProfile {
        &self.cloud
    }

    // Compute operations - delegated to compute module
    async fn get_virtual_machine(&self, resource_group: &str, name: &str) -> Result<VirtualMachine, AzureError> {
        compute::get_virtual_machine(self, resource_group, name).await
    }

    async fn create_or_update_virtual_machine(&self, resource_group: &str, name: &str, vm: &VirtualMachine) -> Result<VirtualMachine, AzureError> {
        compute::create_or_update_virtual_machine(self, resource_group, name, vm).await
    }

    async fn delete_virtual_machine(&self, resource_group: &str, name: &str) -> Result<(), AzureError> {
        compute::delete_virtual_machine(self, resource_group, name).await
    }

    async fn delete_disk(&self, resource_group: &str, name: &str) -> Result<(), AzureError> {
        compute::delete_disk(self, resource_group, name).await
    }

    async fn get_availability_set(&self, resource_group: &str, name: &str) -> Result<AvailabilitySet, AzureError> {
        compute::get_availability_set(self, resource_group, name).await
    }

    async fn create_or_update_availability_set(&self, resource_group: &str, name: &str, set: &AvailabilitySet) -> Result<AvailabilitySet, AzureError> {
        compute::create_or_update_availability_set(self, resource_group, name, set).await
    }

    async fn delete_availability_set(&self, resource_group: &str, name: &str) -> Result<(), AzureError> {
        compute::delete_availability_set(self, resource_group, name).await
    }

    async fn get_virtual_machine_extension(&self, resource_group: &str, vm_name: &str, name: &str) -> Result<VirtualMachineExtension, AzureError> {
        compute::get_virtual_machine_extension(self, resource_group, vm_name, name).await
    }

    async fn create_or_update_virtual_machine_extension(&self, resource_group: &str, vm_name: &str, name: &str, extension: &VirtualMachineExtension) -> Result<VirtualMachineExtension, AzureError> {
        compute::create_or_update_virtual_machine_extension(self, resource_group, vm_name, name, extension).await
    }

    async fn delete_virtual_machine_extension(&self, resource_group: &str, vm_name: &str, name: &str) -> Result<(), AzureError> {
        compute::delete_virtual_machine_extension(self, resource_group, vm_name, name).await
    }

    async fn list_resource_skus(&self, location: Option<&str>) -> Result<Vec<ResourceSku>, AzureError> {
        compute::list_resource_skus(self, location).await
    }

    // Network operations - delegated to network module
    async fn get_network_interface(&self, resource_group: &str, name: &str) -> Result<NetworkInterface, AzureError> {
        network::get_network_interface(self, resource_group, name).await
    }

    async fn create_or_update_network_interface(&self, resource_group: &str, name: &str, nic: &NetworkInterface) -> Result<NetworkInterface, AzureError> {
        network::create_or_update_network_interface(self, resource_group, name, nic).await
    }

    async fn delete_network_interface(&self, resource_group: &str, name: &str) -> Result<(), AzureError> {
        network::delete_network_interface(self, resource_group, name).await
    }

    async fn get_subnet(&self, resource_group: &str, vnet: &str, name: &str) -> Result<Subnet, AzureError> {
        network::get_subnet(self, resource_group, vnet, name).await
    }

    async fn get_public_ip_address(&self, resource_group: &str, name: &str) -> Result<PublicIpAddress, AzureError> {
        network::get_public_ip_address(self, resource_group, name).await
    }

    async fn create_or_update_public_ip_address(&self, resource_group: &str, name: &str, ip: &PublicIpAddress) -> Result<PublicIpAddress, AzureError> {
        network::create_or_update_public_ip_address(self, resource_group, name, ip).await
    }

    async fn delete_public_ip_address(&self, resource_group: &str, name: &str) -> Result<(), AzureError> {
        network::delete_public_ip_address(self, resource_group, name).await
    }

    async fn get_load_balancer(&self, resource_group: &str, name: &str) -> Result<LoadBalancer, AzureError> {
        network::get_load_balancer(self, resource_group, name).await
    }

    async fn list_interface_load_balancers(&self, resource_group: &str, nic_name: &str) -> Result<Vec<LoadBalancer>, AzureError> {
        network::list_interface_load_balancers(self, resource_group, nic_name).await
    }
}

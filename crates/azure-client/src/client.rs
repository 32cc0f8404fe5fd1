//! Azure Resource Manager client
//!
//! Implements [`AzureClientTrait`] over the ARM REST API. Paths are built per
//! resource provider and every call carries the API version selected by the
//! client's [`CloudProfile`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::auth::{ClientCredential, TokenCredential};
use crate::azure_trait::AzureClientTrait;
use crate::cloud::CloudProfile;
use crate::common::{ArmHttp, USER_AGENT};
use crate::error::AzureError;
use crate::models::*;

/// Default timeout for API requests
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Build the HTTP client shared by token requests and ARM calls
pub fn build_http_client() -> Result<Client, AzureError> {
    Client::builder()
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()
        .map_err(AzureError::Http)
}

/// Azure Resource Manager client scoped to one subscription
#[derive(Debug)]
pub struct AzureClient {
    http: ArmHttp,
    subscription_id: String,
    cloud: CloudProfile,
}

impl AzureClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `subscription_id` - Subscription every request is scoped to
    /// * `cloud` - Environment endpoints and API versions
    /// * `tenant_id` / `client_id` - Service principal identity
    /// * `credential` - Client secret or federated token file
    pub fn new(
        subscription_id: impl Into<String>,
        cloud: CloudProfile,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        credential: ClientCredential,
    ) -> Result<Self, AzureError> {
        let client = build_http_client()?;
        let token = TokenCredential::new(client.clone(), &cloud, tenant_id, client_id, credential);
        Ok(Self::with_credential(subscription_id, cloud, client, Arc::new(token)))
    }

    /// Create a client from an existing HTTP client and token source
    pub fn with_credential(
        subscription_id: impl Into<String>,
        cloud: CloudProfile,
        client: Client,
        credential: Arc<TokenCredential>,
    ) -> Self {
        Self {
            http: ArmHttp::new(client, &cloud.resource_manager_endpoint, credential),
            subscription_id: subscription_id.into(),
            cloud,
        }
    }

    fn resource_path(&self, resource_group: &str, provider_path: &str) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}",
            self.subscription_id, resource_group, provider_path
        )
    }

    fn vm_path(&self, resource_group: &str, name: &str) -> String {
        self.resource_path(resource_group, &format!("Microsoft.Compute/virtualMachines/{}", name))
    }

    fn network_path(&self, resource_group: &str, kind: &str, name: &str) -> String {
        self.resource_path(resource_group, &format!("Microsoft.Network/{}/{}", kind, name))
    }

    fn compute_version(&self) -> &str {
        &self.cloud.api_versions.compute
    }

    fn network_version(&self) -> &str {
        &self.cloud.api_versions.network
    }
}

#[async_trait::async_trait]
impl AzureClientTrait for AzureClient {
    fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    fn cloud(&self) -> &CloudProfile {
        &self.cloud
    }

    async fn get_virtual_machine(&self, resource_group: &str, name: &str) -> Result<VirtualMachine, AzureError> {
        let path = self.vm_path(resource_group, name);
        self.http
            .get(&path, self.compute_version(), &[("$expand", "instanceView")])
            .await
    }

    async fn create_or_update_virtual_machine(
        &self,
        resource_group: &str,
        name: &str,
        vm: &VirtualMachine,
    ) -> Result<VirtualMachine, AzureError> {
        let path = self.vm_path(resource_group, name);
        self.http.put(&path, self.compute_version(), vm).await
    }

    async fn delete_virtual_machine(&self, resource_group: &str, name: &str) -> Result<(), AzureError> {
        let path = self.vm_path(resource_group, name);
        self.http.delete(&path, self.compute_version()).await
    }

    async fn delete_disk(&self, resource_group: &str, name: &str) -> Result<(), AzureError> {
        let path = self.resource_path(resource_group, &format!("Microsoft.Compute/disks/{}", name));
        self.http.delete(&path, &self.cloud.api_versions.disks).await
    }

    async fn get_availability_set(&self, resource_group: &str, name: &str) -> Result<AvailabilitySet, AzureError> {
        let path = self.resource_path(resource_group, &format!("Microsoft.Compute/availabilitySets/{}", name));
        self.http.get(&path, self.compute_version(), &[]).await
    }

    async fn create_or_update_availability_set(
        &self,
        resource_group: &str,
        name: &str,
        set: &AvailabilitySet,
    ) -> Result<AvailabilitySet, AzureError> {
        let path = self.resource_path(resource_group, &format!("Microsoft.Compute/availabilitySets/{}", name));
        self.http.put(&path, self.compute_version(), set).await
    }

    async fn delete_availability_set(&self, resource_group: &str, name: &str) -> Result<(), AzureError> {
        let path = self.resource_path(resource_group, &format!("Microsoft.Compute/availabilitySets/{}", name));
        self.http.delete(&path, self.compute_version()).await
    }

    async fn get_virtual_machine_extension(
        &self,
        resource_group: &str,
        vm_name: &str,
        name: &str,
    ) -> Result<VirtualMachineExtension, AzureError> {
        let path = format!("{}/extensions/{}", self.vm_path(resource_group, vm_name), name);
        self.http.get(&path, self.compute_version(), &[]).await
    }

    async fn create_or_update_virtual_machine_extension(
        &self,
        resource_group: &str,
        vm_name: &str,
        name: &str,
        extension: &VirtualMachineExtension,
    ) -> Result<VirtualMachineExtension, AzureError> {
        let path = format!("{}/extensions/{}", self.vm_path(resource_group, vm_name), name);
        self.http.put(&path, self.compute_version(), extension).await
    }

    async fn delete_virtual_machine_extension(
        &self,
        resource_group: &str,
        vm_name: &str,
        name: &str,
    ) -> Result<(), AzureError> {
        let path = format!("{}/extensions/{}", self.vm_path(resource_group, vm_name), name);
        self.http.delete(&path, self.compute_version()).await
    }

    async fn list_resource_skus(&self, location: Option<&str>) -> Result<Vec<ResourceSku>, AzureError> {
        let path = format!("/subscriptions/{}/providers/Microsoft.Compute/skus", self.subscription_id);
        let version = &self.cloud.api_versions.resource_skus;

        let filter = location
            .filter(|_| self.cloud.filters_skus_server_side)
            .map(|loc| format!("location eq '{}'", loc));
        let skus: Vec<ResourceSku> = match &filter {
            Some(filter) => self.http.get_all(&path, version, &[("$filter", filter.as_str())]).await?,
            None => self.http.get_all(&path, version, &[]).await?,
        };

        // Environments without server-side filtering return the whole catalog
        let skus = match location {
            Some(loc) if filter.is_none() => skus.into_iter().filter(|sku| sku.available_in(loc)).collect(),
            _ => skus,
        };
        debug!(count = skus.len(), location = ?location, "Listed resource SKUs");
        Ok(skus)
    }

    async fn get_network_interface(&self, resource_group: &str, name: &str) -> Result<NetworkInterface, AzureError> {
        let path = self.network_path(resource_group, "networkInterfaces", name);
        self.http.get(&path, self.network_version(), &[]).await
    }

    async fn create_or_update_network_interface(
        &self,
        resource_group: &str,
        name: &str,
        nic: &NetworkInterface,
    ) -> Result<NetworkInterface, AzureError> {
        let path = self.network_path(resource_group, "networkInterfaces", name);
        self.http.put(&path, self.network_version(), nic).await
    }

    async fn delete_network_interface(&self, resource_group: &str, name: &str) -> Result<(), AzureError> {
        let path = self.network_path(resource_group, "networkInterfaces", name);
        self.http.delete(&path, self.network_version()).await
    }

    async fn get_subnet(&self, resource_group: &str, vnet: &str, name: &str) -> Result<Subnet, AzureError> {
        let path = format!("{}/subnets/{}", self.network_path(resource_group, "virtualNetworks", vnet), name);
        self.http.get(&path, self.network_version(), &[]).await
    }

    async fn get_public_ip_address(&self, resource_group: &str, name: &str) -> Result<PublicIpAddress, AzureError> {
        let path = self.network_path(resource_group, "publicIPAddresses", name);
        self.http.get(&path, self.network_version(), &[]).await
    }

    async fn create_or_update_public_ip_address(
        &self,
        resource_group: &str,
        name: &str,
        ip: &PublicIpAddress,
    ) -> Result<PublicIpAddress, AzureError> {
        let path = self.network_path(resource_group, "publicIPAddresses", name);
        self.http.put(&path, self.network_version(), ip).await
    }

    async fn delete_public_ip_address(&self, resource_group: &str, name: &str) -> Result<(), AzureError> {
        let path = self.network_path(resource_group, "publicIPAddresses", name);
        self.http.delete(&path, self.network_version()).await
    }

    async fn get_load_balancer(&self, resource_group: &str, name: &str) -> Result<LoadBalancer, AzureError> {
        let path = self.network_path(resource_group, "loadBalancers", name);
        self.http.get(&path, self.network_version(), &[]).await
    }

    async fn list_interface_load_balancers(
        &self,
        resource_group: &str,
        nic_name: &str,
    ) -> Result<Vec<LoadBalancer>, AzureError> {
        let path = format!(
            "{}/loadBalancers",
            self.network_path(resource_group, "networkInterfaces", nic_name)
        );
        self.http.get_all(&path, self.network_version(), &[]).await
    }
}

//! Test utilities for unit testing the reconciler
//!
//! In-memory stand-ins for every collaborator of a [`MachineScope`], seeded
//! with a cluster, a credentials secret, a subnet and a VM SKU, plus a
//! builder for Machines carrying a valid provider spec.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use azure_client::{
    AVAILABILITY_SETS_RESOURCE_TYPE, AzureClientTrait, CloudProfile, MockAzureClient, ResourceSku,
    ResourceSkuCapability, ResourceSkuLocationInfo, Subnet, SubnetProperties, VIRTUAL_MACHINES_RESOURCE_TYPE,
    capabilities,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use crds::labels::MACHINE_CLUSTER_ID_LABEL;
use crds::{
    AzureCloudName, AzureMachineProviderSpec, AzurePlatformStatus, Image, INFRASTRUCTURE_NAME, Infrastructure,
    InfrastructureSpec, InfrastructureStatus, Machine, MachineSpec, OsDisk, OsDiskManagedDiskParameters,
    PlatformStatus, SecretReference, encode_provider_spec,
};
use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::events::EventType;

use crate::error::ControllerError;
use crate::events::EventPublisher;
use crate::metrics::Metrics;
use crate::scope::credentials::Credentials;
use crate::scope::sources::{CloudClientFactory, InfrastructureReader, MachineStore, SecretReader};
use crate::scope::{MachineScope, ScopeDeps};

pub const TEST_CLUSTER_ID: &str = "test-abcd";
pub const TEST_SUBSCRIPTION: &str = "test-subscription";
pub const TEST_RESOURCE_GROUP: &str = "dummyResourceGroup";
pub const TEST_NAMESPACE: &str = "default";
pub const CREDENTIALS_SECRET: &str = "azure-cloud-credentials";
pub const TEST_LOCATION: &str = "eastus2";
pub const TEST_VM_SIZE: &str = "Standard_D4s_v3";

/// Decoded form of the default SSH key
pub const TEST_SSH_KEY: &str = "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQC7 machine-test";

/// Provider spec every builder starts from
pub fn provider_spec() -> AzureMachineProviderSpec {
    AzureMachineProviderSpec {
        credentials_secret: Some(SecretReference {
            name: CREDENTIALS_SECRET.to_string(),
            namespace: Some(TEST_NAMESPACE.to_string()),
        }),
        location: TEST_LOCATION.to_string(),
        vm_size: TEST_VM_SIZE.to_string(),
        image: Image {
            resource_id: format!(
                "/resourceGroups/{TEST_RESOURCE_GROUP}/providers/Microsoft.Compute/images/{TEST_CLUSTER_ID}-rhcos"
            ),
            ..Default::default()
        },
        os_disk: OsDisk {
            os_type: "Linux".to_string(),
            managed_disk: OsDiskManagedDiskParameters {
                storage_account_type: "Premium_LRS".to_string(),
                ..Default::default()
            },
            disk_size_gb: 128,
            ..Default::default()
        },
        ssh_public_key: STANDARD.encode(TEST_SSH_KEY),
        vnet: "vn1".to_string(),
        subnet: "sn1".to_string(),
        resource_group: TEST_RESOURCE_GROUP.to_string(),
        network_resource_group: TEST_RESOURCE_GROUP.to_string(),
        ..Default::default()
    }
}

/// Builds test Machines
pub struct MachineBuilder {
    name: String,
    spec: AzureMachineProviderSpec,
    labels: BTreeMap<String, String>,
}

pub fn machine_builder(name: &str) -> MachineBuilder {
    MachineBuilder {
        name: name.to_string(),
        spec: provider_spec(),
        labels: BTreeMap::from([(MACHINE_CLUSTER_ID_LABEL.to_string(), TEST_CLUSTER_ID.to_string())]),
    }
}

impl MachineBuilder {
    /// Edit the provider spec
    pub fn spec(mut self, edit: impl FnOnce(&mut AzureMachineProviderSpec)) -> Self {
        edit(&mut self.spec);
        self
    }

    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> Machine {
        let mut machine = Machine::new(
            &self.name,
            MachineSpec {
                provider_spec: crds::ProviderSpec {
                    value: Some(encode_provider_spec(&self.spec).unwrap()),
                },
                ..Default::default()
            },
        );
        machine.metadata = ObjectMeta {
            name: Some(self.name),
            namespace: Some(TEST_NAMESPACE.to_string()),
            labels: Some(self.labels),
            ..Default::default()
        };
        machine
    }
}

/// VM size SKU with 4 vCPUs and 16 GiB of memory
pub fn vm_sku(name: &str, location: &str, zones: &[&str], accelerated_networking: bool) -> ResourceSku {
    let capability = |name: &str, value: &str| ResourceSkuCapability {
        name: name.to_string(),
        value: value.to_string(),
    };
    ResourceSku {
        resource_type: VIRTUAL_MACHINES_RESOURCE_TYPE.to_string(),
        name: name.to_string(),
        locations: vec![location.to_string()],
        location_info: vec![ResourceSkuLocationInfo {
            location: location.to_string(),
            zones: zones.iter().map(|z| z.to_string()).collect(),
        }],
        capabilities: vec![
            capability(capabilities::VCPUS, "4"),
            capability(capabilities::MEMORY_GB, "16"),
            capability(
                capabilities::ACCELERATED_NETWORKING_ENABLED,
                if accelerated_networking { "True" } else { "False" },
            ),
        ],
        ..Default::default()
    }
}

pub fn availability_set_sku(name: &str, location: &str, max_fault_domains: i32) -> ResourceSku {
    ResourceSku {
        resource_type: AVAILABILITY_SETS_RESOURCE_TYPE.to_string(),
        name: name.to_string(),
        locations: vec![location.to_string()],
        capabilities: vec![ResourceSkuCapability {
            name: capabilities::MAXIMUM_PLATFORM_FAULT_DOMAIN_COUNT.to_string(),
            value: max_fault_domains.to_string(),
        }],
        ..Default::default()
    }
}

/// [`MachineStore`] keeping the last written Machine
#[derive(Default)]
pub struct InMemoryMachineStore {
    operations: Mutex<Vec<&'static str>>,
    last: Mutex<Option<Machine>>,
}

impl InMemoryMachineStore {
    /// Patches issued so far, `status` or `spec`
    pub fn operations(&self) -> Vec<&'static str> {
        self.operations.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Machine> {
        self.last.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.operations.lock().unwrap().clear();
    }

    fn record(&self, operation: &'static str, machine: &Machine) -> Machine {
        self.operations.lock().unwrap().push(operation);
        *self.last.lock().unwrap() = Some(machine.clone());
        machine.clone()
    }
}

#[async_trait]
impl MachineStore for InMemoryMachineStore {
    async fn patch_machine(&self, _original: &Machine, modified: &Machine) -> Result<Machine, ControllerError> {
        Ok(self.record("spec", modified))
    }

    async fn patch_machine_status(&self, _original: &Machine, modified: &Machine) -> Result<Machine, ControllerError> {
        Ok(self.record("status", modified))
    }
}

#[derive(Default)]
pub struct InMemorySecrets {
    secrets: Mutex<HashMap<(String, String), BTreeMap<String, Vec<u8>>>>,
}

impl InMemorySecrets {
    /// Create or replace a Secret
    pub fn insert(&self, namespace: &str, name: &str, data: &[(&str, &str)]) {
        let data = data
            .iter()
            .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
            .collect();
        self.secrets
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), data);
    }
}

#[async_trait]
impl SecretReader for InMemorySecrets {
    async fn read_secret(&self, namespace: &str, name: &str) -> Result<BTreeMap<String, Vec<u8>>, ControllerError> {
        self.secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ControllerError::NotFound(format!("secret {namespace}/{name}")))
    }
}

pub struct InMemoryInfrastructure {
    infrastructure: Mutex<Infrastructure>,
}

impl InMemoryInfrastructure {
    fn new(cluster_id: &str) -> Self {
        let mut infrastructure = Infrastructure::new(INFRASTRUCTURE_NAME, InfrastructureSpec::default());
        infrastructure.status = Some(InfrastructureStatus {
            infrastructure_name: cluster_id.to_string(),
            platform_status: Some(PlatformStatus {
                platform_type: "Azure".to_string(),
                azure: Some(AzurePlatformStatus {
                    resource_group_name: TEST_RESOURCE_GROUP.to_string(),
                    ..Default::default()
                }),
            }),
        });
        Self {
            infrastructure: Mutex::new(infrastructure),
        }
    }

    /// Edit the Azure platform status
    pub fn update(&self, edit: impl FnOnce(&mut AzurePlatformStatus)) {
        let mut infrastructure = self.infrastructure.lock().unwrap();
        let status = infrastructure.status.get_or_insert_with(Default::default);
        let platform = status.platform_status.get_or_insert_with(Default::default);
        edit(platform.azure.get_or_insert_with(Default::default));
    }
}

#[async_trait]
impl InfrastructureReader for InMemoryInfrastructure {
    async fn get_infrastructure(&self) -> Result<Infrastructure, ControllerError> {
        Ok(self.infrastructure.lock().unwrap().clone())
    }
}

/// [`CloudClientFactory`] handing out the shared mock
pub struct MockClientFactory {
    mock: MockAzureClient,
    connections: Mutex<Vec<(AzureCloudName, Option<String>)>>,
}

impl MockClientFactory {
    /// Environments requested so far
    pub fn connections(&self) -> Vec<(AzureCloudName, Option<String>)> {
        self.connections.lock().unwrap().clone()
    }
}

#[async_trait]
impl CloudClientFactory for MockClientFactory {
    async fn connect(
        &self,
        _credentials: &Credentials,
        cloud_name: AzureCloudName,
        arm_endpoint: Option<&str>,
    ) -> Result<Arc<dyn AzureClientTrait>, ControllerError> {
        self.connections
            .lock()
            .unwrap()
            .push((cloud_name, arm_endpoint.map(str::to_string)));
        Ok(Arc::new(self.mock.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub type_: EventType,
    pub reason: String,
    pub action: String,
    pub note: String,
}

#[derive(Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEvents {
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    /// `(type, reason)` of every event, in order
    pub fn reasons(&self) -> Vec<(EventType, String)> {
        self.events().into_iter().map(|e| (e.type_, e.reason)).collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingEvents {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        self.events.lock().unwrap().push(RecordedEvent {
            type_,
            reason: reason.to_string(),
            action: action.to_string(),
            note: note.unwrap_or_default(),
        });
    }
}

/// Seeded collaborators sharing one mock cloud
pub struct TestEnv {
    pub mock: MockAzureClient,
    pub store: Arc<InMemoryMachineStore>,
    pub secrets: Arc<InMemorySecrets>,
    pub infrastructure: Arc<InMemoryInfrastructure>,
    pub factory: Arc<MockClientFactory>,
    pub events: Arc<RecordingEvents>,
    pub metrics: Arc<Metrics>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_cloud(CloudProfile::public())
    }

    pub fn with_cloud(profile: CloudProfile) -> Self {
        let mock = MockAzureClient::with_cloud(TEST_SUBSCRIPTION, profile);
        mock.add_subnet(
            TEST_RESOURCE_GROUP,
            "vn1",
            Subnet {
                name: Some("sn1".to_string()),
                properties: SubnetProperties {
                    address_prefix: Some("10.0.0.0/24".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        mock.add_resource_sku(vm_sku(TEST_VM_SIZE, TEST_LOCATION, &["1", "2", "3"], true));

        let secrets = InMemorySecrets::default();
        secrets.insert(
            TEST_NAMESPACE,
            CREDENTIALS_SECRET,
            &[
                ("azure_subscription_id", TEST_SUBSCRIPTION),
                ("azure_client_id", "client-id"),
                ("azure_client_secret", "client-secret"),
                ("azure_tenant_id", "tenant-id"),
                ("azure_resourcegroup", TEST_RESOURCE_GROUP),
                ("azure_region", TEST_LOCATION),
            ],
        );

        Self {
            factory: Arc::new(MockClientFactory {
                mock: mock.clone(),
                connections: Mutex::new(Vec::new()),
            }),
            mock,
            store: Arc::new(InMemoryMachineStore::default()),
            secrets: Arc::new(secrets),
            infrastructure: Arc::new(InMemoryInfrastructure::new(TEST_CLUSTER_ID)),
            events: Arc::new(RecordingEvents::default()),
            metrics: Arc::new(Metrics::new().unwrap()),
        }
    }

    pub fn deps(&self) -> ScopeDeps {
        ScopeDeps {
            store: self.store.clone(),
            secrets: self.secrets.clone(),
            infrastructure: self.infrastructure.clone(),
            clients: self.factory.clone(),
            workload_identity_enabled: false,
        }
    }

    /// Scope for `machine`; panics if it cannot be built
    pub async fn scope(&self, machine: Machine) -> MachineScope {
        MachineScope::new(machine, &self.deps()).await.unwrap()
    }
}

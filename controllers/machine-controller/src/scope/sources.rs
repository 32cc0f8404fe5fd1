//! Collaborators the machine scope reads from and writes to.
//!
//! Each one is a trait so reconciler tests can run against in-memory
//! doubles; the `Kube*` types and [`AzureClientFactory`] are the production
//! implementations.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use azure_client::{AzureClient, AzureClientTrait, CloudProfile};
use crds::{AzureCloudName, INFRASTRUCTURE_NAME, Infrastructure, Machine};
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::ControllerError;
use crate::scope::credentials::Credentials;
use crate::scope::persistence::{is_empty_patch, spec_patch, status_patch};

/// Writes Machine changes back to the cluster
#[async_trait]
pub trait MachineStore: Send + Sync {
    /// Patch metadata and spec with the difference between `original` and `modified`
    async fn patch_machine(&self, original: &Machine, modified: &Machine) -> Result<Machine, ControllerError>;

    /// Patch the status subresource with the difference between `original` and `modified`
    async fn patch_machine_status(&self, original: &Machine, modified: &Machine) -> Result<Machine, ControllerError>;
}

/// Reads Secret data
#[async_trait]
pub trait SecretReader: Send + Sync {
    /// Data of the named Secret
    async fn read_secret(&self, namespace: &str, name: &str) -> Result<BTreeMap<String, Vec<u8>>, ControllerError>;
}

/// Reads the cluster Infrastructure singleton
#[async_trait]
pub trait InfrastructureReader: Send + Sync {
    async fn get_infrastructure(&self) -> Result<Infrastructure, ControllerError>;
}

/// Builds Azure clients for resolved credentials
#[async_trait]
pub trait CloudClientFactory: Send + Sync {
    /// Client for the credentials' subscription in the given environment
    async fn connect(
        &self,
        credentials: &Credentials,
        cloud_name: AzureCloudName,
        arm_endpoint: Option<&str>,
    ) -> Result<Arc<dyn AzureClientTrait>, ControllerError>;
}

/// [`MachineStore`] over the Kubernetes API
#[derive(Clone)]
pub struct KubeMachineStore {
    client: Client,
}

impl std::fmt::Debug for KubeMachineStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeMachineStore").finish_non_exhaustive()
    }
}

impl KubeMachineStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, machine: &Machine) -> Api<Machine> {
        Api::namespaced(self.client.clone(), machine.namespace())
    }
}

#[async_trait]
impl MachineStore for KubeMachineStore {
    async fn patch_machine(&self, original: &Machine, modified: &Machine) -> Result<Machine, ControllerError> {
        let patch = spec_patch(original, modified)?;
        if is_empty_patch(&patch) {
            return Ok(modified.clone());
        }
        debug!(machine = %modified.name(), "Patching machine");
        Ok(self
            .api(modified)
            .patch(modified.name(), &PatchParams::default(), &Patch::<()>::Json(patch))
            .await?)
    }

    async fn patch_machine_status(&self, original: &Machine, modified: &Machine) -> Result<Machine, ControllerError> {
        let patch = status_patch(original, modified)?;
        if is_empty_patch(&patch) {
            return Ok(modified.clone());
        }
        debug!(machine = %modified.name(), "Patching machine status");
        Ok(self
            .api(modified)
            .patch_status(modified.name(), &PatchParams::default(), &Patch::<()>::Json(patch))
            .await?)
    }
}

/// [`SecretReader`] over the Kubernetes API
#[derive(Clone)]
pub struct KubeSecretReader {
    client: Client,
}

impl std::fmt::Debug for KubeSecretReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretReader").finish_non_exhaustive()
    }
}

impl KubeSecretReader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretReader for KubeSecretReader {
    async fn read_secret(&self, namespace: &str, name: &str) -> Result<BTreeMap<String, Vec<u8>>, ControllerError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api
            .get_opt(name)
            .await?
            .ok_or_else(|| ControllerError::NotFound(format!("secret {namespace}/{name}")))?;

        Ok(secret
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key, value.0))
            .collect())
    }
}

/// [`InfrastructureReader`] over the Kubernetes API
#[derive(Clone)]
pub struct KubeInfrastructureReader {
    client: Client,
}

impl std::fmt::Debug for KubeInfrastructureReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeInfrastructureReader").finish_non_exhaustive()
    }
}

impl KubeInfrastructureReader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl InfrastructureReader for KubeInfrastructureReader {
    async fn get_infrastructure(&self) -> Result<Infrastructure, ControllerError> {
        let api: Api<Infrastructure> = Api::all(self.client.clone());
        api.get_opt(INFRASTRUCTURE_NAME)
            .await?
            .ok_or_else(|| ControllerError::NotFound(format!("infrastructure {INFRASTRUCTURE_NAME}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    subscription_id: String,
    tenant_id: String,
    client_id: String,
    cloud_name: AzureCloudName,
    arm_endpoint: Option<String>,
}

/// [`CloudClientFactory`] building [`AzureClient`]s.
///
/// Clients are cached per identity and environment so their access tokens
/// survive across reconciles.
pub struct AzureClientFactory {
    http: reqwest::Client,
    workload_identity_token_file: Option<PathBuf>,
    clients: Mutex<HashMap<ClientKey, (Option<String>, Arc<dyn AzureClientTrait>)>>,
}

impl std::fmt::Debug for AzureClientFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureClientFactory")
            .field("workload_identity_token_file", &self.workload_identity_token_file)
            .finish_non_exhaustive()
    }
}

impl AzureClientFactory {
    pub fn new(workload_identity_token_file: Option<PathBuf>) -> Result<Self, ControllerError> {
        Ok(Self {
            http: azure_client::build_http_client()?,
            workload_identity_token_file,
            clients: Mutex::new(HashMap::new()),
        })
    }

    async fn profile(&self, cloud_name: AzureCloudName, arm_endpoint: Option<&str>) -> Result<CloudProfile, ControllerError> {
        let profile = match cloud_name {
            AzureCloudName::AzurePublicCloud => CloudProfile::public(),
            AzureCloudName::AzureUSGovernmentCloud => CloudProfile::us_government(),
            AzureCloudName::AzureChinaCloud => CloudProfile::china(),
            AzureCloudName::AzureStackCloud => {
                let endpoint = arm_endpoint.filter(|e| !e.is_empty()).ok_or_else(|| {
                    ControllerError::InvalidConfig("armEndpoint is required for AzureStackCloud".to_string())
                })?;
                info!(arm_endpoint = %endpoint, "Discovering Azure Stack endpoints");
                CloudProfile::discover_stack(&self.http, endpoint).await?
            }
        };
        Ok(profile)
    }
}

#[async_trait]
impl CloudClientFactory for AzureClientFactory {
    async fn connect(
        &self,
        credentials: &Credentials,
        cloud_name: AzureCloudName,
        arm_endpoint: Option<&str>,
    ) -> Result<Arc<dyn AzureClientTrait>, ControllerError> {
        let key = ClientKey {
            subscription_id: credentials.subscription_id.clone(),
            tenant_id: credentials.tenant_id.clone(),
            client_id: credentials.client_id.clone(),
            cloud_name,
            arm_endpoint: arm_endpoint.map(str::to_string),
        };

        let mut clients = self.clients.lock().await;
        if let Some((secret, client)) = clients.get(&key) {
            // A rotated secret needs a fresh token source
            if *secret == credentials.client_secret {
                return Ok(Arc::clone(client));
            }
        }

        let profile = self.profile(cloud_name, arm_endpoint).await?;
        let credential = credentials.client_credential(self.workload_identity_token_file.as_deref())?;
        let client: Arc<dyn AzureClientTrait> = Arc::new(AzureClient::new(
            credentials.subscription_id.clone(),
            profile,
            credentials.tenant_id.clone(),
            credentials.client_id.clone(),
            credential,
        )?);

        debug!(subscription = %credentials.subscription_id, cloud = ?cloud_name, "Built Azure client");
        clients.insert(key, (credentials.client_secret.clone(), Arc::clone(&client)));
        Ok(client)
    }
}

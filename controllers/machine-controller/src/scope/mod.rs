//! Per-reconcile machine scope.
//!
//! A [`MachineScope`] is built at the start of every reconciler verb. It
//! decodes the provider spec and status, resolves the cluster identity, the
//! merged tag set and the Azure credentials, and connects a client for the
//! cluster's cloud environment. The verb mutates the scope's copy of the
//! Machine and its decoded payloads; [`MachineScope::persist`] writes them back
//! with JSON patches computed against the snapshot taken at construction.

pub mod credentials;
pub mod persistence;
pub mod sources;
pub mod tags;

use std::collections::BTreeMap;
use std::sync::Arc;

use azure_client::{AzureClientTrait, CloudProfile};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use crds::labels::{INSTANCE_STATE_ANNOTATION, MACHINE_ROLE_LABEL, MACHINE_ROLE_MASTER, MACHINE_SET_LABEL};
use crds::{
    AzureMachineProviderSpec, AzureMachineProviderStatus, Machine, VmState, decode_provider_spec,
    decode_provider_status, encode_provider_spec, encode_provider_status,
};
use tracing::{debug, warn};

use crate::error::{ControllerError, ReconcileError};
use crate::services::resourceskus::ResourceSkuCache;
use credentials::Credentials;
use sources::{CloudClientFactory, InfrastructureReader, MachineStore, SecretReader};

/// Key of the user-data Secret holding the bootstrap payload
pub const USER_DATA_SECRET_KEY: &str = "userData";

/// Collaborators shared by every scope
#[derive(Clone)]
pub struct ScopeDeps {
    pub store: Arc<dyn MachineStore>,
    pub secrets: Arc<dyn SecretReader>,
    pub infrastructure: Arc<dyn InfrastructureReader>,
    pub clients: Arc<dyn CloudClientFactory>,
    pub workload_identity_enabled: bool,
}

impl std::fmt::Debug for ScopeDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeDeps")
            .field("workload_identity_enabled", &self.workload_identity_enabled)
            .finish_non_exhaustive()
    }
}

/// State of one Machine for the duration of one reconciler verb
pub struct MachineScope {
    /// Working copy of the Machine; labels, annotations, addresses and provider ID are edited here
    pub machine: Machine,
    pub provider_spec: AzureMachineProviderSpec,
    pub provider_status: AzureMachineProviderStatus,
    pub cluster_id: String,
    pub subscription_id: String,
    /// Tags applied to every owned Azure resource
    pub tags: BTreeMap<String, String>,
    pub client: Arc<dyn AzureClientTrait>,
    pub skus: ResourceSkuCache,
    original: Machine,
    secrets: Arc<dyn SecretReader>,
    store: Arc<dyn MachineStore>,
}

impl std::fmt::Debug for MachineScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MachineScope")
            .field("machine", &self.machine.name())
            .field("namespace", &self.machine.namespace())
            .field("cluster_id", &self.cluster_id)
            .field("subscription_id", &self.subscription_id)
            .finish_non_exhaustive()
    }
}

/// Map a collaborator failure into a verb result
fn collaborator_error(context: &str, err: ControllerError) -> ReconcileError {
    match err {
        ControllerError::NotFound(_) | ControllerError::InvalidConfig(_) => {
            ReconcileError::InvalidConfiguration(format!("{context}: {err}"))
        }
        other => ReconcileError::Transient(format!("{context}: {other}")),
    }
}

impl MachineScope {
    /// Build the scope for `machine`
    pub async fn new(machine: Machine, deps: &ScopeDeps) -> Result<Self, ReconcileError> {
        let name = machine.name().to_string();

        let mut provider_spec = decode_provider_spec(machine.spec.provider_spec.value.as_ref()).map_err(|e| {
            ReconcileError::InvalidConfiguration(format!("failed to get machine config for {name}: {e}"))
        })?;
        let provider_status = decode_provider_status(
            machine.status.as_ref().and_then(|s| s.provider_status.as_ref()),
        )
        .map_err(|e| ReconcileError::InvalidConfiguration(format!("failed to get machine provider status for {name}: {e}")))?;

        let infrastructure = deps
            .infrastructure
            .get_infrastructure()
            .await
            .map_err(|e| collaborator_error("failed to get infrastructure", e))?;
        let cluster_id = infrastructure.cluster_id().to_string();
        let platform = infrastructure.azure_status().cloned().unwrap_or_default();

        let tags = tags::merge_tags(&cluster_id, &platform.resource_tags, &provider_spec.tags)?;

        let secret_ref = provider_spec.credentials_secret.clone().ok_or_else(|| {
            ReconcileError::InvalidConfiguration(format!("machine {name} has no credentials secret"))
        })?;
        let secret_namespace = secret_ref
            .namespace
            .clone()
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| machine.namespace().to_string());
        let data = deps
            .secrets
            .read_secret(&secret_namespace, &secret_ref.name)
            .await
            .map_err(|e| collaborator_error("failed to get credentials secret", e))?;
        let credentials = Credentials::from_secret(&secret_ref.name, &data, deps.workload_identity_enabled)?;

        if provider_spec.resource_group.is_empty() {
            provider_spec.resource_group = credentials.resource_group.clone();
        }
        if provider_spec.network_resource_group.is_empty() {
            provider_spec.network_resource_group = provider_spec.resource_group.clone();
        }
        if provider_spec.location.is_empty() {
            provider_spec.location = credentials.region.clone();
        }

        let cloud_name = platform.cloud_name.unwrap_or_default();
        let client = deps
            .clients
            .connect(&credentials, cloud_name, platform.arm_endpoint.as_deref())
            .await
            .map_err(|e| collaborator_error("failed to create azure client", e))?;

        debug!(
            machine = %name,
            cluster_id = %cluster_id,
            resource_group = %provider_spec.resource_group,
            location = %provider_spec.location,
            "Built machine scope"
        );

        let skus = ResourceSkuCache::new(Arc::clone(&client), provider_spec.location.clone());
        Ok(Self {
            original: machine.clone(),
            machine,
            provider_spec,
            provider_status,
            cluster_id,
            subscription_id: credentials.subscription_id,
            tags,
            client,
            skus,
            secrets: Arc::clone(&deps.secrets),
            store: Arc::clone(&deps.store),
        })
    }

    pub fn name(&self) -> &str {
        self.machine.name()
    }

    pub fn namespace(&self) -> &str {
        self.machine.namespace()
    }

    pub fn resource_group(&self) -> &str {
        &self.provider_spec.resource_group
    }

    pub fn network_resource_group(&self) -> &str {
        &self.provider_spec.network_resource_group
    }

    pub fn location(&self) -> &str {
        &self.provider_spec.location
    }

    pub fn cloud(&self) -> &CloudProfile {
        self.client.cloud()
    }

    /// Role label of the machine
    pub fn role(&self) -> Option<&str> {
        self.machine.label(MACHINE_ROLE_LABEL)
    }

    pub fn is_control_plane(&self) -> bool {
        self.role() == Some(MACHINE_ROLE_MASTER)
    }

    /// MachineSet the machine belongs to, from its label
    pub fn machine_set(&self) -> Option<&str> {
        self.machine.label(MACHINE_SET_LABEL).filter(|s| !s.is_empty())
    }

    /// Record the observed VM state in the provider status and the instance-state annotation
    pub fn set_vm_state(&mut self, state: VmState) {
        self.provider_status.vm_state = Some(state);
        self.annotations_mut()
            .insert(INSTANCE_STATE_ANNOTATION.to_string(), state.as_str().to_string());
    }

    /// Object annotations, created empty if missing
    pub fn annotations_mut(&mut self) -> &mut BTreeMap<String, String> {
        self.machine.metadata.annotations.get_or_insert_with(BTreeMap::new)
    }

    /// Object labels, created empty if missing
    pub fn labels_mut(&mut self) -> &mut BTreeMap<String, String> {
        self.machine.metadata.labels.get_or_insert_with(BTreeMap::new)
    }

    /// Bootstrap payload from the user-data Secret, base64-encoded for CustomData.
    ///
    /// `None` when the machine references no user-data Secret.
    pub async fn custom_data(&self) -> Result<Option<String>, ReconcileError> {
        let Some(secret_ref) = &self.provider_spec.user_data_secret else {
            return Ok(None);
        };
        let namespace = secret_ref
            .namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| self.namespace());

        let data = self
            .secrets
            .read_secret(namespace, &secret_ref.name)
            .await
            .map_err(|e| collaborator_error(&format!("error getting user data secret {}", secret_ref.name), e))?;

        match data.get(USER_DATA_SECRET_KEY) {
            Some(user_data) if !user_data.is_empty() => Ok(Some(STANDARD.encode(user_data))),
            _ => Err(ReconcileError::InvalidConfiguration(format!(
                "secret {}/{} does not have {USER_DATA_SECRET_KEY:?} field set, this is required to create a machine",
                namespace, secret_ref.name
            ))),
        }
    }

    /// Machine with the decoded payloads encoded back into their envelopes
    fn encoded_machine(&self) -> Result<Machine, ControllerError> {
        let encode_err = |e: crds::CodecError| ControllerError::InvalidConfig(e.to_string());

        let mut machine = self.machine.clone();
        machine.spec.provider_spec.value = Some(encode_provider_spec(&self.provider_spec).map_err(encode_err)?);
        machine.status.get_or_insert_with(Default::default).provider_status =
            Some(encode_provider_status(Some(&self.provider_status)).map_err(encode_err)?);
        Ok(machine)
    }

    /// Write the scope's changes back to the Machine.
    ///
    /// The status goes first so `lastUpdated` is recorded even if the spec
    /// patch then fails; an unchanged status is not patched.
    pub async fn persist(&mut self) -> Result<(), ControllerError> {
        let mut modified = self.encoded_machine()?;

        if modified.status != self.original.status {
            if let Some(status) = modified.status.as_mut() {
                status.last_updated = Some(Utc::now());
            }
            debug!(machine = %self.name(), "Persisting machine status");
            self.store.patch_machine_status(&self.original, &modified).await?;
        }

        self.store.patch_machine(&self.original, &modified).await?;

        self.original = modified.clone();
        self.machine = modified;
        Ok(())
    }

    /// [`persist`](Self::persist) for paths that already carry an error to report
    pub async fn persist_after_failure(&mut self) {
        if let Err(e) = self.persist().await {
            warn!(machine = %self.name(), error = %e, "Failed to persist machine after reconcile error");
        }
    }
}

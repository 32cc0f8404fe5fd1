//! VM extensions carrying a startup script.

use azure_client::{VirtualMachineExtension, VirtualMachineExtensionProperties};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;
use tracing::info;

use crate::error::ReconcileError;
use crate::scope::MachineScope;
use crate::services::{absent_ok, found};

/// Name of the extension running the machine's startup script
pub const STARTUP_SCRIPT_EXTENSION: &str = "startupScript";

const PUBLISHER: &str = "Microsoft.Azure.Extensions";
const EXTENSION_TYPE: &str = "CustomScript";
const TYPE_HANDLER_VERSION: &str = "2.1";

/// Extension to manage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmExtensionSpec {
    pub name: String,
    pub vm_name: String,
    /// Script body, in plain text
    pub script_data: String,
}

pub async fn get(scope: &MachineScope, spec: &VmExtensionSpec) -> Result<Option<VirtualMachineExtension>, ReconcileError> {
    found(
        scope
            .client
            .get_virtual_machine_extension(scope.resource_group(), &spec.vm_name, &spec.name)
            .await,
    )
    .map_err(|e| ReconcileError::cloud(format!("failed to get vm extension {}", spec.name), e))
}

pub async fn create_or_update(scope: &MachineScope, spec: &VmExtensionSpec) -> Result<VirtualMachineExtension, ReconcileError> {
    let extension = VirtualMachineExtension {
        location: scope.location().to_string(),
        tags: scope.tags.clone(),
        properties: VirtualMachineExtensionProperties {
            publisher: PUBLISHER.to_string(),
            extension_type: EXTENSION_TYPE.to_string(),
            type_handler_version: TYPE_HANDLER_VERSION.to_string(),
            auto_upgrade_minor_version: Some(true),
            settings: Some(json!({ "script": STANDARD.encode(&spec.script_data) })),
            ..Default::default()
        },
        ..Default::default()
    };

    info!(name = %spec.name, vm = %spec.vm_name, "Creating VM extension");
    scope
        .client
        .create_or_update_virtual_machine_extension(scope.resource_group(), &spec.vm_name, &spec.name, &extension)
        .await
        .map_err(|e| ReconcileError::cloud(format!("cannot create vm extension {}", spec.name), e))
}

pub async fn delete(scope: &MachineScope, spec: &VmExtensionSpec) -> Result<(), ReconcileError> {
    absent_ok(
        scope
            .client
            .delete_virtual_machine_extension(scope.resource_group(), &spec.vm_name, &spec.name)
            .await,
    )
    .map_err(|e| ReconcileError::cloud(format!("failed to delete vm extension {}", spec.name), e))
}

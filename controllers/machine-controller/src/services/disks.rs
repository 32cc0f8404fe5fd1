//! Managed disks.

use tracing::info;

use crate::error::ReconcileError;
use crate::scope::MachineScope;
use crate::services::absent_ok;

/// Disk to manage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskSpec {
    pub name: String,
}

pub async fn delete(scope: &MachineScope, spec: &DiskSpec) -> Result<(), ReconcileError> {
    info!(name = %spec.name, resource_group = %scope.resource_group(), "Deleting disk");
    absent_ok(scope.client.delete_disk(scope.resource_group(), &spec.name).await)
        .map_err(|e| ReconcileError::cloud(format!("failed to delete disk {}", spec.name), e))
}

//! Availability zones offered for a VM size at the scope's location.

use azure_client::VIRTUAL_MACHINES_RESOURCE_TYPE;

use crate::error::ReconcileError;
use crate::scope::MachineScope;

/// Zones of `vm_size` at the location, sorted.
///
/// An empty `vm_size` yields the largest zone list of any VM size at the
/// location, which tells whether the location has zones at all. An unknown
/// size has no zones.
pub async fn get(scope: &MachineScope, vm_size: &str) -> Result<Vec<String>, ReconcileError> {
    let location = scope.location();

    let mut zones = if vm_size.is_empty() {
        scope
            .skus
            .of_type(VIRTUAL_MACHINES_RESOURCE_TYPE)
            .await
            .map_err(|e| e.into_reconcile("failed to list availability zones"))?
            .into_iter()
            .map(|sku| sku.zones_in(location))
            .max_by_key(Vec::len)
            .unwrap_or_default()
    } else {
        match scope.skus.get(vm_size, VIRTUAL_MACHINES_RESOURCE_TYPE).await {
            Ok(sku) => sku.zones_in(location),
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e.into_reconcile("failed to list availability zones")),
        }
    };

    zones.sort();
    zones.dedup();
    Ok(zones)
}

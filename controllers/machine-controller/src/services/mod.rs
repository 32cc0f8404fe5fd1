//! Cloud-resource adapters.
//!
//! One module per Azure resource kind, each exposing free functions over a
//! [`MachineScope`](crate::scope::MachineScope) and a narrowly-typed spec:
//! `get` yields `None` for an absent resource, `create_or_update` is
//! idempotent, and `delete` succeeds when the resource is already gone.
//! Azure failures leave here as [`ReconcileError::Cloud`](crate::error::ReconcileError::Cloud)
//! with a resource-qualified context; the reconciler classifies them.

pub mod availabilitysets;
pub mod availabilityzones;
pub mod disks;
pub mod interfaceloadbalancers;
pub mod networkinterfaces;
pub mod publicips;
pub mod resourceskus;
pub mod virtualmachineextensions;
pub mod virtualmachines;

use azure_client::AzureError;

/// `Ok(None)` when the resource does not exist
pub(crate) fn found<T>(result: Result<T, AzureError>) -> Result<Option<T>, AzureError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Success when the resource to delete is already gone
pub(crate) fn absent_ok(result: Result<(), AzureError>) -> Result<(), AzureError> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

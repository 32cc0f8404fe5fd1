//! Exists: whether the machine's VM is present.

use tracing::debug;

use crate::error::ReconcileError;
use crate::scope::MachineScope;
use crate::services::virtualmachines;

const PROVISIONING_DELETING: &str = "Deleting";
const PROVISIONING_FAILED: &str = "Failed";

/// `Ok(false)` when the VM is absent.
///
/// A VM being deleted yields [`ReconcileError::VmDeleting`]; a failed VM
/// yields [`ReconcileError::UnexpectedObject`] so that Create replaces it.
pub async fn exists(scope: &MachineScope) -> Result<bool, ReconcileError> {
    let name = scope.name();
    let Some(vm) = virtualmachines::get(scope, name).await? else {
        debug!(machine = %name, "VM does not exist");
        return Ok(false);
    };

    match vm.provisioning_state() {
        PROVISIONING_DELETING => Err(ReconcileError::VmDeleting(name.to_string())),
        PROVISIONING_FAILED => Err(ReconcileError::UnexpectedObject(format!(
            "vm {name} is in the Failed provisioning state"
        ))),
        state => {
            debug!(machine = %name, state, "VM exists");
            Ok(true)
        }
    }
}

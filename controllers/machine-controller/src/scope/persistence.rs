//! JSON patches (RFC 6902) from the snapshot taken at scope construction to the scope's copy.

use crds::Machine;
use json_patch::Patch;
use serde_json::{Value, json};

use crate::error::ControllerError;

/// Patch of metadata and spec; the status is left out
pub fn spec_patch(original: &Machine, modified: &Machine) -> Result<Patch, ControllerError> {
    Ok(json_patch::diff(&without_status(original)?, &without_status(modified)?))
}

/// Patch of the status subresource.
///
/// A Machine that has no status yet gets the whole status added, since the
/// server has no `/status` member to descend into.
pub fn status_patch(original: &Machine, modified: &Machine) -> Result<Patch, ControllerError> {
    let Some(status) = &modified.status else {
        return Ok(Patch(Vec::new()));
    };
    let status = serde_json::to_value(status)?;

    let Some(previous) = &original.status else {
        let add = json!([{ "op": "add", "path": "/status", "value": status }]);
        return Ok(serde_json::from_value(add)?);
    };

    let previous = json!({ "status": serde_json::to_value(previous)? });
    Ok(json_patch::diff(&previous, &json!({ "status": status })))
}

/// Whether a patch changes nothing
pub fn is_empty_patch(patch: &Patch) -> bool {
    patch.0.is_empty()
}

fn without_status(machine: &Machine) -> Result<Value, ControllerError> {
    let mut value = serde_json::to_value(machine)?;
    if let Some(object) = value.as_object_mut() {
        object.remove("status");
    }
    Ok(value)
}

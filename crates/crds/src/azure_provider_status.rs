//! AzureMachineProviderStatus
//!
//! Observed state of the Azure virtual machine, carried in
//! `Machine.status.providerStatus`.

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// Kind of the provider status payload
pub const PROVIDER_STATUS_KIND: &str = "AzureMachineProviderStatus";

/// Condition type recording whether the VM was created
pub const MACHINE_CREATED_CONDITION: &str = "MachineCreated";

/// Reason of a successful `MachineCreated` condition
pub const MACHINE_CREATION_SUCCEEDED: &str = "MachineCreationSucceeded";

/// Reason of a failed `MachineCreated` condition
pub const MACHINE_CREATION_FAILED: &str = "MachineCreationFailed";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureMachineProviderStatus {
    /// Schema version of the payload
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    /// Kind of the payload
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    /// Cloud-assigned VM identifier
    #[serde(default, rename = "vmId", skip_serializing_if = "Option::is_none")]
    pub vm_id: Option<String>,

    /// Semantic VM state; absent while unknown
    #[serde(
        default,
        rename = "vmState",
        deserialize_with = "deserialize_vm_state",
        skip_serializing_if = "Option::is_none"
    )]
    pub vm_state: Option<VmState>,

    /// Observations of the machine's current state
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// Semantic VM state derived from the provisioning state and power state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum VmState {
    Creating,
    Updating,
    Starting,
    Running,
    Stopping,
    Stopped,
    Deallocating,
    Deallocated,
    Deleting,
    Succeeded,
    Failed,
    Unknown,
}

impl VmState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Creating => "Creating",
            Self::Updating => "Updating",
            Self::Starting => "Starting",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
            Self::Deallocating => "Deallocating",
            Self::Deallocated => "Deallocated",
            Self::Deleting => "Deleting",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
        }
    }

    /// Parse a wire value; `None` for the empty string and unrecognized values
    pub fn parse(value: &str) -> Option<Self> {
        let state = match value {
            "Creating" => Self::Creating,
            "Updating" => Self::Updating,
            "Starting" => Self::Starting,
            "Running" => Self::Running,
            "Stopping" => Self::Stopping,
            "Stopped" => Self::Stopped,
            "Deallocating" => Self::Deallocating,
            "Deallocated" => Self::Deallocated,
            "Deleting" => Self::Deleting,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            "Unknown" => Self::Unknown,
            _ => return None,
        };
        Some(state)
    }
}

impl fmt::Display for VmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn deserialize_vm_state<'de, D>(deserializer: D) -> Result<Option<VmState>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(VmState::parse))
}

/// A single observation of the machine's state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type, unique within the list
    #[serde(rename = "type")]
    pub condition_type: String,

    /// Whether the condition holds
    pub status: ConditionStatus,

    /// Machine-readable reason for the last transition
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    /// Human-readable details
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// Last time the status changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl AzureMachineProviderStatus {
    /// Look up a condition by type
    pub fn condition(&self, condition_type: &str) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_vm_state_decodes_as_unset() {
        let status: AzureMachineProviderStatus =
            serde_json::from_str(r#"{"vmState":""}"#).unwrap();
        assert_eq!(status.vm_state, None);

        let status: AzureMachineProviderStatus =
            serde_json::from_str(r#"{"vmState":"Running"}"#).unwrap();
        assert_eq!(status.vm_state, Some(VmState::Running));
    }

    #[test]
    fn condition_lookup_by_type() {
        let status = AzureMachineProviderStatus {
            conditions: vec![Condition {
                condition_type: MACHINE_CREATED_CONDITION.to_string(),
                status: ConditionStatus::True,
                reason: MACHINE_CREATION_SUCCEEDED.to_string(),
                message: String::new(),
                last_transition_time: None,
            }],
            ..Default::default()
        };
        assert_eq!(
            status.condition(MACHINE_CREATED_CONDITION).map(|c| c.status),
            Some(ConditionStatus::True)
        );
        assert!(status.condition("Other").is_none());
    }
}

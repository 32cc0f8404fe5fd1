//! Provider spec/status codec
//!
//! Moves [`AzureMachineProviderSpec`] and [`AzureMachineProviderStatus`] in and
//! out of the opaque envelopes carried by a Machine. Encoding produces compact
//! JSON with `apiVersion`/`kind` filled in; decoding accepts JSON or YAML and
//! maps a missing or empty envelope to the zero value.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::azure_provider_spec::{AzureMachineProviderSpec, PROVIDER_API_VERSION, PROVIDER_SPEC_KIND};
use crate::azure_provider_status::{AzureMachineProviderStatus, PROVIDER_STATUS_KIND};

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML decode error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unexpected kind {found:?}, expected {expected:?}")]
    UnexpectedKind { expected: &'static str, found: String },
}

/// Decode a provider spec from the Machine's `providerSpec.value`
pub fn decode_provider_spec(value: Option<&Value>) -> Result<AzureMachineProviderSpec, CodecError> {
    let spec: AzureMachineProviderSpec = decode_value(value)?;
    check_kind(&spec.kind, PROVIDER_SPEC_KIND)?;
    Ok(spec)
}

/// Decode a provider spec from raw JSON or YAML bytes
pub fn decode_provider_spec_bytes(raw: &[u8]) -> Result<AzureMachineProviderSpec, CodecError> {
    let spec: AzureMachineProviderSpec = decode_bytes(raw)?;
    check_kind(&spec.kind, PROVIDER_SPEC_KIND)?;
    Ok(spec)
}

/// Encode a provider spec into an envelope value
pub fn encode_provider_spec(spec: &AzureMachineProviderSpec) -> Result<Value, CodecError> {
    let mut spec = spec.clone();
    fill_type_meta(&mut spec.api_version, &mut spec.kind, PROVIDER_SPEC_KIND);
    Ok(serde_json::to_value(&spec)?)
}

/// Encode a provider spec as compact JSON bytes
pub fn encode_provider_spec_bytes(spec: &AzureMachineProviderSpec) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(&encode_provider_spec(spec)?)?)
}

/// Decode a provider status from the Machine's `status.providerStatus`
pub fn decode_provider_status(value: Option<&Value>) -> Result<AzureMachineProviderStatus, CodecError> {
    let status: AzureMachineProviderStatus = decode_value(value)?;
    check_kind(&status.kind, PROVIDER_STATUS_KIND)?;
    Ok(status)
}

/// Decode a provider status from raw JSON or YAML bytes
pub fn decode_provider_status_bytes(raw: &[u8]) -> Result<AzureMachineProviderStatus, CodecError> {
    let status: AzureMachineProviderStatus = decode_bytes(raw)?;
    check_kind(&status.kind, PROVIDER_STATUS_KIND)?;
    Ok(status)
}

/// Encode a provider status; `None` yields an empty object, never a null envelope
pub fn encode_provider_status(status: Option<&AzureMachineProviderStatus>) -> Result<Value, CodecError> {
    let Some(status) = status else {
        return Ok(Value::Object(Default::default()));
    };
    let mut status = status.clone();
    fill_type_meta(&mut status.api_version, &mut status.kind, PROVIDER_STATUS_KIND);
    Ok(serde_json::to_value(&status)?)
}

/// Encode a provider status as compact JSON bytes
pub fn encode_provider_status_bytes(status: Option<&AzureMachineProviderStatus>) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(&encode_provider_status(status)?)?)
}

fn decode_value<T>(value: Option<&Value>) -> Result<T, CodecError>
where
    T: DeserializeOwned + Default,
{
    match value {
        None | Some(Value::Null) => Ok(T::default()),
        Some(Value::Object(map)) if map.is_empty() => Ok(T::default()),
        Some(value) => Ok(serde_json::from_value(value.clone())?),
    }
}

fn decode_bytes<T>(raw: &[u8]) -> Result<T, CodecError>
where
    T: DeserializeOwned + Default,
{
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    // YAML is a superset of JSON
    let value: Value = serde_yaml::from_slice(raw)?;
    decode_value(Some(&value))
}

fn check_kind(found: &str, expected: &'static str) -> Result<(), CodecError> {
    if found.is_empty() || found == expected {
        Ok(())
    } else {
        Err(CodecError::UnexpectedKind {
            expected,
            found: found.to_string(),
        })
    }
}

fn fill_type_meta(api_version: &mut String, kind: &mut String, expected_kind: &str) {
    if api_version.is_empty() {
        *api_version = PROVIDER_API_VERSION.to_string();
    }
    if kind.is_empty() {
        *kind = expected_kind.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure_provider_spec::*;
    use crate::azure_provider_status::*;
    use serde_json::json;

    #[test]
    fn missing_or_empty_envelopes_decode_to_zero_values() {
        assert_eq!(decode_provider_spec(None).unwrap(), AzureMachineProviderSpec::default());
        assert_eq!(
            decode_provider_spec(Some(&Value::Null)).unwrap(),
            AzureMachineProviderSpec::default()
        );
        assert_eq!(
            decode_provider_spec(Some(&json!({}))).unwrap(),
            AzureMachineProviderSpec::default()
        );
        assert_eq!(decode_provider_spec_bytes(b"").unwrap(), AzureMachineProviderSpec::default());
        assert_eq!(
            decode_provider_status(None).unwrap(),
            AzureMachineProviderStatus::default()
        );
    }

    #[test]
    fn spec_survives_an_encode_decode_cycle() {
        let original = json!({
            "apiVersion": "machine.openshift.io/v1beta1",
            "kind": "AzureMachineProviderSpec",
            "vmSize": "Standard_D4s_v3",
            "location": "eastus2",
            "zone": "2",
            "vnet": "vn1",
            "subnet": "sn1",
            "publicIP": true,
            "natRule": 0,
            "image": {"resourceID": "/resourceGroups/rg/providers/Microsoft.Compute/images/img"},
            "osDisk": {"osType": "Linux", "diskSizeGB": 128, "managedDisk": {"storageAccountType": "Premium_LRS"}},
            "dataDisks": [{"nameSuffix": "etcd", "diskSizeGB": 4, "lun": 0, "cachingType": "None",
                           "deletionPolicy": "Delete", "managedDisk": {"storageAccountType": "UltraSSD_LRS"}}],
            "spotVMOptions": {"maxPrice": "0.5"},
            "ultraSSDCapability": "Enabled",
            "capacityReservationGroupID": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Compute/capacityReservationGroups/g",
            "tags": {"team": "infra"}
        });

        let spec = decode_provider_spec(Some(&original)).unwrap();
        assert_eq!(spec.vm_size, "Standard_D4s_v3");
        assert!(spec.public_ip);
        assert_eq!(spec.nat_rule, Some(0));
        assert_eq!(spec.data_disks[0].caching_type, Some(CachingType::None));
        assert_eq!(spec.ultra_ssd_capability, Some(UltraSsdCapability::Enabled));

        assert_eq!(encode_provider_spec(&spec).unwrap(), original);
    }

    #[test]
    fn unmodelled_members_are_kept_and_defaults_not_added() {
        let original = json!({
            "apiVersion": "machine.openshift.io/v1beta1",
            "kind": "AzureMachineProviderSpec",
            "metadata": {"creationTimestamp": null},
            "vmSize": "Standard_D2s_v3",
            "osDisk": {"osType": "Linux", "diskSizeGB": 64},
            "securityProfile": {"encryptionAtHost": true}
        });

        let spec = decode_provider_spec(Some(&original)).unwrap();
        assert_eq!(spec.extra["metadata"], json!({"creationTimestamp": null}));
        assert_eq!(spec.os_disk.managed_disk, OsDiskManagedDiskParameters::default());

        let encoded = encode_provider_spec(&spec).unwrap();
        assert_eq!(encoded, original);
        assert!(encoded.get("image").is_none());
        assert!(encoded["osDisk"].get("managedDisk").is_none());
    }

    #[test]
    fn yaml_envelopes_are_accepted() {
        let raw = b"kind: AzureMachineProviderSpec\nvmSize: Standard_B2s\nvnet: vn1\n";
        let spec = decode_provider_spec_bytes(raw).unwrap();
        assert_eq!(spec.vm_size, "Standard_B2s");
        assert_eq!(spec.vnet, "vn1");
    }

    #[test]
    fn mismatched_kind_is_rejected() {
        let err = decode_provider_spec(Some(&json!({"kind": "AWSMachineProviderConfig"}))).unwrap_err();
        assert!(matches!(err, CodecError::UnexpectedKind { .. }));
    }

    #[test]
    fn encoding_fills_type_meta_and_is_compact() {
        let bytes = encode_provider_spec_bytes(&AzureMachineProviderSpec::default()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(!text.contains(' '));
        assert!(text.contains(r#""kind":"AzureMachineProviderSpec""#));
        assert!(text.contains(r#""apiVersion":"machine.openshift.io/v1beta1""#));
    }

    #[test]
    fn absent_status_encodes_as_empty_object() {
        assert_eq!(encode_provider_status(None).unwrap(), json!({}));

        let status = AzureMachineProviderStatus {
            vm_id: Some("vm-1".to_string()),
            vm_state: Some(VmState::Running),
            ..Default::default()
        };
        let value = encode_provider_status(Some(&status)).unwrap();
        assert_eq!(value["kind"], "AzureMachineProviderStatus");
        assert_eq!(value["vmState"], "Running");
        assert_eq!(decode_provider_status(Some(&value)).unwrap().vm_id.as_deref(), Some("vm-1"));
    }
}

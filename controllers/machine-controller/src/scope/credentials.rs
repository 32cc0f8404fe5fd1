//! Azure credentials read from the machine's credentials Secret.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use azure_client::ClientCredential;

use crate::error::{ControllerError, ReconcileError};

pub const AZURE_SUBSCRIPTION_ID_KEY: &str = "azure_subscription_id";
pub const AZURE_CLIENT_ID_KEY: &str = "azure_client_id";
pub const AZURE_CLIENT_SECRET_KEY: &str = "azure_client_secret";
pub const AZURE_TENANT_ID_KEY: &str = "azure_tenant_id";
pub const AZURE_RESOURCE_GROUP_KEY: &str = "azure_resourcegroup";
pub const AZURE_REGION_KEY: &str = "azure_region";
pub const AZURE_RESOURCE_PREFIX_KEY: &str = "azure_resource_prefix";

/// Service principal and placement defaults
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub subscription_id: String,
    pub client_id: String,
    /// Absent when authenticating with a federated token
    pub client_secret: Option<String>,
    pub tenant_id: String,
    pub resource_group: String,
    pub region: String,
    pub resource_prefix: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("subscription_id", &self.subscription_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("tenant_id", &self.tenant_id)
            .field("resource_group", &self.resource_group)
            .field("region", &self.region)
            .field("resource_prefix", &self.resource_prefix)
            .finish()
    }
}

impl Credentials {
    /// Read credentials from Secret data.
    ///
    /// Every key is required, except `azure_client_secret` under workload
    /// identity and the optional `azure_resource_prefix`.
    pub fn from_secret(
        secret_name: &str,
        data: &BTreeMap<String, Vec<u8>>,
        workload_identity: bool,
    ) -> Result<Self, ReconcileError> {
        let field = |key: &str| -> Result<String, ReconcileError> {
            optional_field(secret_name, data, key)?.ok_or_else(|| {
                ReconcileError::InvalidConfiguration(format!(
                    "Azure credentials secret {secret_name} did not contain key {key}"
                ))
            })
        };

        let client_secret = if workload_identity {
            optional_field(secret_name, data, AZURE_CLIENT_SECRET_KEY)?
        } else {
            Some(field(AZURE_CLIENT_SECRET_KEY)?)
        };

        Ok(Self {
            subscription_id: field(AZURE_SUBSCRIPTION_ID_KEY)?,
            client_id: field(AZURE_CLIENT_ID_KEY)?,
            client_secret,
            tenant_id: field(AZURE_TENANT_ID_KEY)?,
            resource_group: field(AZURE_RESOURCE_GROUP_KEY)?,
            region: field(AZURE_REGION_KEY)?,
            resource_prefix: optional_field(secret_name, data, AZURE_RESOURCE_PREFIX_KEY)?,
        })
    }

    /// How the service principal proves itself.
    ///
    /// A federated token file takes precedence over the client secret.
    pub fn client_credential(&self, token_file: Option<&Path>) -> Result<ClientCredential, ControllerError> {
        match (token_file, &self.client_secret) {
            (Some(path), _) => Ok(ClientCredential::FederatedTokenFile(path.to_path_buf())),
            (None, Some(secret)) => Ok(ClientCredential::Secret(secret.clone())),
            (None, None) => Err(ControllerError::InvalidConfig(
                "no client secret and workload identity is disabled".to_string(),
            )),
        }
    }
}

fn optional_field(
    secret_name: &str,
    data: &BTreeMap<String, Vec<u8>>,
    key: &str,
) -> Result<Option<String>, ReconcileError> {
    let Some(raw) = data.get(key) else {
        return Ok(None);
    };
    let value = String::from_utf8(raw.clone()).map_err(|_| {
        ReconcileError::InvalidConfiguration(format!(
            "Azure credentials secret {secret_name} key {key} is not valid UTF-8"
        ))
    })?;
    let value = value.trim().to_string();
    Ok((!value.is_empty()).then_some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn secret_data(skip: &str) -> BTreeMap<String, Vec<u8>> {
        [
            (AZURE_SUBSCRIPTION_ID_KEY, "sub-1"),
            (AZURE_CLIENT_ID_KEY, "client-1"),
            (AZURE_CLIENT_SECRET_KEY, "s3cr3t"),
            (AZURE_TENANT_ID_KEY, "tenant-1"),
            (AZURE_RESOURCE_GROUP_KEY, "dummyResourceGroup"),
            (AZURE_REGION_KEY, "eastus2"),
        ]
        .into_iter()
        .filter(|(key, _)| *key != skip)
        .map(|(key, value)| (key.to_string(), value.as_bytes().to_vec()))
        .collect()
    }

    #[test]
    fn test_all_keys_present() {
        let creds = Credentials::from_secret("azure-cloud-credentials", &secret_data(""), false).unwrap();
        assert_eq!(creds.subscription_id, "sub-1");
        assert_eq!(creds.resource_group, "dummyResourceGroup");
        assert_eq!(creds.client_secret.as_deref(), Some("s3cr3t"));
        assert_eq!(creds.resource_prefix, None);
        assert!(!format!("{creds:?}").contains("s3cr3t"));
    }

    #[test]
    fn test_each_key_is_required() {
        for key in [
            AZURE_SUBSCRIPTION_ID_KEY,
            AZURE_CLIENT_ID_KEY,
            AZURE_CLIENT_SECRET_KEY,
            AZURE_TENANT_ID_KEY,
            AZURE_RESOURCE_GROUP_KEY,
            AZURE_REGION_KEY,
        ] {
            let err = Credentials::from_secret("creds", &secret_data(key), false).unwrap_err();
            assert!(err.to_string().contains(key), "{err}");
            assert!(err.is_terminal());
        }
    }

    #[test]
    fn test_workload_identity_does_not_need_client_secret() {
        let creds = Credentials::from_secret("creds", &secret_data(AZURE_CLIENT_SECRET_KEY), true).unwrap();
        assert_eq!(creds.client_secret, None);

        let token = PathBuf::from("/var/run/token");
        assert_eq!(
            creds.client_credential(Some(&token)).unwrap(),
            ClientCredential::FederatedTokenFile(token)
        );
        assert!(creds.client_credential(None).is_err());
    }
}

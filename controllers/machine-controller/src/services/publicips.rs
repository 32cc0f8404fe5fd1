//! Public IP addresses owned by machines with `publicIP: true`.

use azure_client::{PublicIpAddress, PublicIpAddressDnsSettings, PublicIpAddressProperties, PublicIpAddressSku};
use tracing::info;

use crate::error::ReconcileError;
use crate::scope::MachineScope;
use crate::services::{absent_ok, found};

/// Public IP to manage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicIpSpec {
    pub name: String,
}

pub async fn get(scope: &MachineScope, spec: &PublicIpSpec) -> Result<Option<PublicIpAddress>, ReconcileError> {
    found(
        scope
            .client
            .get_public_ip_address(scope.network_resource_group(), &spec.name)
            .await,
    )
    .map_err(|e| ReconcileError::cloud(format!("failed to get public ip {}", spec.name), e))
}

/// Create a static Standard IPv4 address whose DNS label is the lower-cased name
pub async fn create_or_update(scope: &MachineScope, spec: &PublicIpSpec) -> Result<PublicIpAddress, ReconcileError> {
    info!(name = %spec.name, resource_group = %scope.network_resource_group(), "Creating public IP");

    let ip = PublicIpAddress {
        location: scope.location().to_string(),
        tags: scope.tags.clone(),
        sku: Some(PublicIpAddressSku {
            name: "Standard".to_string(),
        }),
        properties: PublicIpAddressProperties {
            public_ip_allocation_method: Some("Static".to_string()),
            public_ip_address_version: Some("IPv4".to_string()),
            dns_settings: Some(PublicIpAddressDnsSettings {
                domain_name_label: Some(spec.name.to_lowercase()),
                fqdn: None,
            }),
            ..Default::default()
        },
        ..Default::default()
    };

    scope
        .client
        .create_or_update_public_ip_address(scope.network_resource_group(), &spec.name, &ip)
        .await
        .map_err(|e| ReconcileError::cloud(format!("cannot create public ip {}", spec.name), e))
}

pub async fn delete(scope: &MachineScope, spec: &PublicIpSpec) -> Result<(), ReconcileError> {
    info!(name = %spec.name, "Deleting public IP");
    absent_ok(
        scope
            .client
            .delete_public_ip_address(scope.network_resource_group(), &spec.name)
            .await,
    )
    .map_err(|e| ReconcileError::cloud(format!("failed to delete public ip {}", spec.name), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TestEnv, machine_builder};

    #[tokio::test]
    async fn test_public_ip_lifecycle() {
        let env = TestEnv::new();
        let scope = env.scope(machine_builder("machine-test").build()).await;
        let spec = PublicIpSpec {
            name: "test-abcd-machine-test-publicip".to_string(),
        };

        assert!(get(&scope, &spec).await.unwrap().is_none());

        let ip = create_or_update(&scope, &spec).await.unwrap();
        assert_eq!(ip.sku.unwrap().name, "Standard");
        assert_eq!(ip.properties.public_ip_allocation_method.as_deref(), Some("Static"));
        assert_eq!(
            ip.properties.dns_settings.unwrap().fqdn.as_deref(),
            Some("test-abcd-machine-test-publicip.eastus2.cloudapp.azure.com")
        );
        assert_eq!(ip.tags["kubernetes.io_cluster.test-abcd"], "owned");

        delete(&scope, &spec).await.unwrap();
        delete(&scope, &spec).await.unwrap();
        assert!(get(&scope, &spec).await.unwrap().is_none());
    }
}

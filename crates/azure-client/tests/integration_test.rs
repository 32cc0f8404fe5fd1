//! Integration tests for the Azure client
//!
//! These tests require a real Azure subscription.
//! Set AZURE_SUBSCRIPTION_ID, AZURE_TENANT_ID, AZURE_CLIENT_ID,
//! AZURE_CLIENT_SECRET and AZURE_RESOURCE_GROUP to run.

use azure_client::{AzureClient, AzureClientTrait, ClientCredential, CloudProfile};

fn client_from_env() -> AzureClient {
    let subscription = std::env::var("AZURE_SUBSCRIPTION_ID")
        .expect("AZURE_SUBSCRIPTION_ID environment variable must be set");
    let tenant = std::env::var("AZURE_TENANT_ID")
        .expect("AZURE_TENANT_ID environment variable must be set");
    let client_id = std::env::var("AZURE_CLIENT_ID")
        .expect("AZURE_CLIENT_ID environment variable must be set");
    let secret = std::env::var("AZURE_CLIENT_SECRET")
        .expect("AZURE_CLIENT_SECRET environment variable must be set");

    AzureClient::new(
        subscription,
        CloudProfile::public(),
        tenant,
        client_id,
        ClientCredential::Secret(secret),
    )
    .expect("Failed to create client")
}

fn resource_group() -> String {
    std::env::var("AZURE_RESOURCE_GROUP")
        .expect("AZURE_RESOURCE_GROUP environment variable must be set")
}

#[tokio::test]
#[ignore] // Requires an Azure subscription
async fn test_list_resource_skus() {
    let client = client_from_env();
    let location = std::env::var("AZURE_LOCATION").unwrap_or_else(|_| "eastus".to_string());

    let skus = client
        .list_resource_skus(Some(&location))
        .await
        .expect("Failed to list resource SKUs");

    println!("Found {} SKUs in {}", skus.len(), location);
    assert!(skus.iter().all(|sku| sku.available_in(&location)));
}

#[tokio::test]
#[ignore]
async fn test_missing_virtual_machine_is_not_found() {
    let client = client_from_env();

    let err = client
        .get_virtual_machine(&resource_group(), "integration-test-does-not-exist")
        .await
        .expect_err("VM should not exist");
    assert!(err.is_not_found(), "unexpected error: {err}");
}

#[tokio::test]
#[ignore]
async fn test_delete_absent_public_ip_succeeds() {
    let client = client_from_env();

    client
        .delete_public_ip_address(&resource_group(), "integration-test-does-not-exist")
        .await
        .expect("Deleting an absent public IP should succeed");
}

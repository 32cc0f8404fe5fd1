//! Azure Resource Manager REST Client
//!
//! A Rust client library for the Azure Resource Manager (ARM) operations the
//! machine controller needs: virtual machines, managed disks, availability
//! sets, VM extensions, the compute SKU catalog, network interfaces, subnets,
//! public IP addresses and load balancers.
//!
//! # Example
//!
//! ```no_run
//! use azure_client::{AzureClient, AzureClientTrait, ClientCredential, CloudProfile};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = AzureClient::new(
//!     "00000000-0000-0000-0000-000000000000",
//!     CloudProfile::public(),
//!     "tenant-id",
//!     "client-id",
//!     ClientCredential::Secret("client-secret".to_string()),
//! )?;
//!
//! let vm = client.get_virtual_machine("my-rg", "my-vm").await?;
//! println!("{} is {}", vm.name.clone().unwrap_or_default(), vm.provisioning_state());
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Cloud profiles**: public, US Government, China and Azure Stack Hub environments
//! - **Authentication**: client secret or workload-identity federated token, cached until near expiry
//! - **Pagination**: list operations follow `nextLink`
//! - **Mocking**: `MockAzureClient` behind the `test-util` feature

pub mod auth;
pub mod client;
pub mod cloud;
pub mod common;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod azure_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use auth::{ClientCredential, TokenCredential};
pub use azure_trait::AzureClientTrait;
pub use client::{AzureClient, build_http_client};
pub use cloud::{ApiVersions, CloudEnvironment, CloudProfile};
pub use common::ResourceId;
pub use error::AzureError;
pub use models::*;
#[cfg(feature = "test-util")]
pub use mock::{MockAzureClient, MockFailure};

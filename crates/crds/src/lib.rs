//! Machine API resource types
//!
//! Kubernetes resource definitions consumed by the Azure machine controller:
//! - `Machine`: the declarative record whose provider spec drives reconciliation
//! - `Infrastructure`: the cluster-wide singleton carrying cluster ID and cloud settings
//! - `AzureMachineProviderSpec` / `AzureMachineProviderStatus`: the payloads carried
//!   in the Machine's opaque provider envelopes, plus the codec that moves them in and out

pub mod azure_provider_spec;
pub mod azure_provider_status;
pub mod codec;
pub mod infrastructure;
pub mod labels;
pub mod machine;

pub use azure_provider_spec::*;
pub use azure_provider_status::*;
pub use codec::*;
pub use infrastructure::*;
pub use machine::*;

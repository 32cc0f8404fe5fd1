//! Azure Resource Manager request and response models
//!
//! Field names follow the ARM wire format (camelCase with a handful of
//! acronym exceptions such as `privateIPAddress` and `diskSizeGB`).

pub mod compute;
pub mod network;
pub mod sku;

pub use compute::*;
pub use network::*;
pub use sku::*;

use serde::{Deserialize, Serialize};

/// Reference to another resource by ID
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubResource {
    pub id: String,
}

impl SubResource {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

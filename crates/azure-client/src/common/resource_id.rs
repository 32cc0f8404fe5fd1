//! Azure resource IDs
//!
//! `/subscriptions/<sub>/resourceGroups/<rg>/providers/<namespace>/<type>/<name>[/<type>/<name>...]`

use std::fmt;

use crate::error::AzureError;

/// A parsed Azure resource ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    pub subscription_id: Option<String>,
    pub resource_group: Option<String>,
    /// Resource provider namespace, e.g. `Microsoft.Compute`
    pub provider: Option<String>,
    /// `(type, name)` pairs below the provider, outermost first
    pub resources: Vec<(String, String)>,
}

impl ResourceId {
    /// Parse and validate a resource ID
    ///
    /// The ID must begin with `/`, its first segment must be `subscriptions`
    /// or `providers`, and every key segment must be followed by a value.
    pub fn parse(id: &str) -> Result<Self, AzureError> {
        let invalid = |reason: &str| AzureError::InvalidRequest(format!("invalid resource ID {:?}: {}", id, reason));

        let Some(rest) = id.strip_prefix('/') else {
            return Err(invalid("must begin with '/'"));
        };
        let rest = rest.trim_end_matches('/');
        if rest.is_empty() {
            return Err(invalid("no path segments"));
        }

        let segments: Vec<&str> = rest.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("empty path segment"));
        }

        let first = segments[0];
        if !first.eq_ignore_ascii_case("subscriptions") && !first.eq_ignore_ascii_case("providers") {
            return Err(invalid("first segment must be 'subscriptions' or 'providers'"));
        }

        if segments.len() % 2 != 0 {
            let last = segments[segments.len() - 1];
            return Err(invalid(&format!("key segment {:?} is not followed by a value", last)));
        }

        let mut parsed = Self {
            subscription_id: None,
            resource_group: None,
            provider: None,
            resources: Vec::new(),
        };

        for pair in segments.chunks(2) {
            let (key, value) = (pair[0], pair[1]);
            if key.eq_ignore_ascii_case("subscriptions") && parsed.subscription_id.is_none() {
                parsed.subscription_id = Some(value.to_string());
            } else if key.eq_ignore_ascii_case("resourceGroups") && parsed.resource_group.is_none() {
                parsed.resource_group = Some(value.to_string());
            } else if key.eq_ignore_ascii_case("providers") && parsed.provider.is_none() {
                parsed.provider = Some(value.to_string());
            } else if parsed.provider.is_some() {
                parsed.resources.push((key.to_string(), value.to_string()));
            } else {
                return Err(invalid(&format!("unexpected key segment {:?}", key)));
            }
        }

        Ok(parsed)
    }

    /// Name of the innermost resource
    pub fn name(&self) -> Option<&str> {
        self.resources.last().map(|(_, name)| name.as_str())
    }

    /// Type of the innermost resource
    pub fn resource_type(&self) -> Option<&str> {
        self.resources.last().map(|(kind, _)| kind.as_str())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sub) = &self.subscription_id {
            write!(f, "/subscriptions/{}", sub)?;
        }
        if let Some(rg) = &self.resource_group {
            write!(f, "/resourceGroups/{}", rg)?;
        }
        if let Some(provider) = &self.provider {
            write!(f, "/providers/{}", provider)?;
        }
        for (kind, name) in &self.resources {
            write!(f, "/{}/{}", kind, name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_nested_resource() {
        let id = ResourceId::parse(
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Network/loadBalancers/lb/backendAddressPools/pool",
        )
        .unwrap();
        assert_eq!(id.subscription_id.as_deref(), Some("sub"));
        assert_eq!(id.resource_group.as_deref(), Some("rg"));
        assert_eq!(id.provider.as_deref(), Some("Microsoft.Network"));
        assert_eq!(id.name(), Some("pool"));
        assert_eq!(id.resource_type(), Some("backendAddressPools"));
        assert_eq!(
            id.to_string(),
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Network/loadBalancers/lb/backendAddressPools/pool"
        );
    }

    #[test]
    fn provider_scoped_ids_are_valid() {
        let id = ResourceId::parse("/providers/Microsoft.Compute/locations/eastus").unwrap();
        assert!(id.subscription_id.is_none());
        assert_eq!(id.name(), Some("eastus"));
    }

    #[test]
    fn malformed_ids_are_rejected() {
        for bad in [
            "",
            "subscriptions/sub",
            "/",
            "/resourceGroups/rg",
            "/subscriptions",
            "/subscriptions/sub/resourceGroups",
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Compute/capacityReservationGroups",
            "/subscriptions//resourceGroups/rg",
        ] {
            assert!(ResourceId::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }
}

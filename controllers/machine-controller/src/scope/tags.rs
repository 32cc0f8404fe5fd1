//! Tags applied to every Azure resource owned by a Machine.

use std::collections::{BTreeMap, HashSet};

use crds::AzureResourceTag;

use crate::error::ReconcileError;

/// Maximum number of tags reserved for the cluster
pub const MAX_RESERVED_TAGS: usize = 5;

/// Maximum number of user-defined tags
pub const MAX_USER_TAGS: usize = 45;

/// Key of the tag marking a resource as owned by the cluster
pub fn cluster_owned_tag_key(cluster_id: &str) -> String {
    format!("kubernetes.io_cluster.{cluster_id}")
}

/// Merge the cluster-reserved, infrastructure and machine tags.
///
/// Precedence from lowest to highest: infrastructure, machine spec,
/// cluster-reserved.
pub fn merge_tags(
    cluster_id: &str,
    infrastructure_tags: &[AzureResourceTag],
    spec_tags: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>, ReconcileError> {
    if cluster_id.is_empty() {
        return Err(ReconcileError::InvalidConfiguration(
            "cluster ID required but not found".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for key in spec_tags.keys() {
        if !seen.insert(key.to_uppercase()) {
            return Err(ReconcileError::InvalidConfiguration(format!(
                "duplicate tag key {key:?} in machine spec (tag keys are case-insensitive)"
            )));
        }
    }

    let reserved = BTreeMap::from([(cluster_owned_tag_key(cluster_id), "owned".to_string())]);

    let mut user: BTreeMap<String, String> = infrastructure_tags
        .iter()
        .map(|tag| (tag.key.clone(), tag.value.clone()))
        .collect();
    user.extend(spec_tags.iter().map(|(k, v)| (k.clone(), v.clone())));
    user.retain(|key, _| !reserved.contains_key(key));

    if reserved.len() > MAX_RESERVED_TAGS {
        return Err(ReconcileError::InvalidConfiguration(format!(
            "reserved tag count {} exceeds the limit of {MAX_RESERVED_TAGS}",
            reserved.len()
        )));
    }
    if user.len() > MAX_USER_TAGS {
        return Err(ReconcileError::InvalidConfiguration(format!(
            "user-defined tag count {} exceeds the limit of {MAX_USER_TAGS}",
            user.len()
        )));
    }

    user.extend(reserved);
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(key: &str, value: &str) -> AzureResourceTag {
        AzureResourceTag {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_merge_precedence() {
        let infra = vec![tag("team", "infra"), tag("env", "prod")];
        let spec = BTreeMap::from([("team".to_string(), "compute".to_string())]);

        let tags = merge_tags("test-abcd", &infra, &spec).unwrap();
        assert_eq!(tags.get("team").map(String::as_str), Some("compute"));
        assert_eq!(tags.get("env").map(String::as_str), Some("prod"));
        assert_eq!(
            tags.get("kubernetes.io_cluster.test-abcd").map(String::as_str),
            Some("owned")
        );
    }

    #[test]
    fn test_reserved_tag_wins() {
        let spec = BTreeMap::from([("kubernetes.io_cluster.test-abcd".to_string(), "shared".to_string())]);
        let tags = merge_tags("test-abcd", &[], &spec).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags["kubernetes.io_cluster.test-abcd"], "owned");
    }

    #[test]
    fn test_cluster_id_required() {
        assert!(merge_tags("", &[], &BTreeMap::new()).is_err());
    }

    #[test]
    fn test_user_tag_limit() {
        let infra: Vec<_> = (0..30).map(|i| tag(&format!("infra{i}"), "v")).collect();
        let spec: BTreeMap<_, _> = (0..15).map(|i| (format!("spec{i}"), "v".to_string())).collect();
        assert_eq!(merge_tags("c", &infra, &spec).unwrap().len(), 46);

        let spec: BTreeMap<_, _> = (0..16).map(|i| (format!("spec{i}"), "v".to_string())).collect();
        let err = merge_tags("c", &infra, &spec).unwrap_err();
        assert!(err.to_string().contains("exceeds the limit of 45"));
    }

    #[test]
    fn test_case_folded_duplicates_rejected() {
        let spec = BTreeMap::from([
            ("Team".to_string(), "a".to_string()),
            ("TEAM".to_string(), "b".to_string()),
        ]);
        assert!(merge_tags("c", &[], &spec).is_err());
    }
}

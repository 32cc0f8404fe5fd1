//! Process configuration loaded from the environment.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ControllerError;

/// Token file projected into the pod when workload identity is enabled
pub const DEFAULT_FEDERATED_TOKEN_FILE: &str = "/var/run/secrets/openshift/serviceaccount/token";

/// Default address of the metrics and health endpoint
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default requeue interval after a transient failure
pub const DEFAULT_REQUEUE_AFTER: Duration = Duration::from_secs(20);

/// Controller settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace whose Machines are reconciled; `None` watches all namespaces
    pub watch_namespace: Option<String>,
    /// Authenticate with a federated token instead of a client secret
    pub workload_identity_enabled: bool,
    /// Federated token file used with workload identity
    pub federated_token_file: PathBuf,
    /// Address the metrics server listens on
    pub metrics_bind_address: SocketAddr,
    /// Requeue interval after a transient failure
    pub requeue_after: Duration,
}

impl ControllerConfig {
    /// Load the configuration from process environment variables
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load the configuration through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let watch_namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty());

        let workload_identity_enabled = match lookup("AZURE_WORKLOAD_IDENTITY_ENABLED") {
            None => false,
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                ControllerError::InvalidConfig(format!(
                    "AZURE_WORKLOAD_IDENTITY_ENABLED must be true or false, got {raw:?}"
                ))
            })?,
        };

        let federated_token_file = lookup("AZURE_FEDERATED_TOKEN_FILE")
            .filter(|path| !path.is_empty())
            .unwrap_or_else(|| DEFAULT_FEDERATED_TOKEN_FILE.to_string())
            .into();

        let metrics_bind_address = lookup("METRICS_BIND_ADDRESS")
            .unwrap_or_else(|| DEFAULT_METRICS_BIND_ADDRESS.to_string());
        let metrics_bind_address = metrics_bind_address.parse().map_err(|e| {
            ControllerError::InvalidConfig(format!(
                "METRICS_BIND_ADDRESS {metrics_bind_address:?} is not a socket address: {e}"
            ))
        })?;

        let requeue_after = match lookup("REQUEUE_AFTER_SECONDS") {
            None => DEFAULT_REQUEUE_AFTER,
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| {
                    ControllerError::InvalidConfig(format!(
                        "REQUEUE_AFTER_SECONDS must be a positive integer, got {raw:?}"
                    ))
                })?,
        };

        Ok(Self {
            watch_namespace,
            workload_identity_enabled,
            federated_token_file,
            metrics_bind_address,
            requeue_after,
        })
    }

    /// Token file to authenticate with, when workload identity is enabled
    pub fn workload_identity_token_file(&self) -> Option<PathBuf> {
        self.workload_identity_enabled
            .then(|| self.federated_token_file.clone())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ControllerConfig, ControllerError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ControllerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.watch_namespace, None);
        assert!(!config.workload_identity_enabled);
        assert_eq!(config.federated_token_file, PathBuf::from(DEFAULT_FEDERATED_TOKEN_FILE));
        assert_eq!(config.metrics_bind_address.port(), 8080);
        assert_eq!(config.requeue_after, Duration::from_secs(20));
        assert_eq!(config.workload_identity_token_file(), None);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("WATCH_NAMESPACE", "openshift-machine-api"),
            ("AZURE_WORKLOAD_IDENTITY_ENABLED", "true"),
            ("AZURE_FEDERATED_TOKEN_FILE", "/tmp/token"),
            ("METRICS_BIND_ADDRESS", "127.0.0.1:9090"),
            ("REQUEUE_AFTER_SECONDS", "60"),
        ])
        .unwrap();
        assert_eq!(config.watch_namespace.as_deref(), Some("openshift-machine-api"));
        assert_eq!(config.workload_identity_token_file(), Some(PathBuf::from("/tmp/token")));
        assert_eq!(config.metrics_bind_address.port(), 9090);
        assert_eq!(config.requeue_after, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(config(&[("AZURE_WORKLOAD_IDENTITY_ENABLED", "maybe")]).is_err());
        assert!(config(&[("METRICS_BIND_ADDRESS", "not-an-address")]).is_err());
        assert!(config(&[("REQUEUE_AFTER_SECONDS", "0")]).is_err());
        assert!(config(&[("REQUEUE_AFTER_SECONDS", "soon")]).is_err());
    }
}

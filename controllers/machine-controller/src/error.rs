//! Controller-specific error types.
//!
//! `ControllerError` covers process-level failures (Kubernetes access,
//! configuration, watch loops). `ReconcileError` is the result of a single
//! reconciler verb and tells the outer runtime whether to give up on the
//! Machine until it changes or to requeue it after a delay.

use std::fmt;
use std::time::Duration;

use azure_client::AzureError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the Azure machine controller process.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Azure API error outside of a reconcile verb
    #[error("Azure error: {0}")]
    Azure(#[from] AzureError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A collaborator could not find the requested object
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization of a Kubernetes object failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

/// Machine error reasons surfaced in events and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineErrorReason {
    InvalidConfiguration,
    CreateError,
    UpdateError,
    DeleteError,
}

impl MachineErrorReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidConfiguration => "InvalidConfiguration",
            Self::CreateError => "CreateError",
            Self::UpdateError => "UpdateError",
            Self::DeleteError => "DeleteError",
        }
    }
}

impl fmt::Display for MachineErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a failed reconciler verb.
///
/// `Cloud` and `Transient` are produced inside the verbs and folded into
/// `InvalidConfiguration` or `RequeueAfter` by
/// [`handle_machine_error`](crate::classify::handle_machine_error) before they
/// leave the reconciler.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// User error in the Machine's provider spec; not retried
    #[error("{0}")]
    InvalidConfiguration(String),

    /// An immutable field differs from the observed VM; not retried
    #[error("{0}")]
    ImmutableField(String),

    /// A resource the verb depends on does not exist; not retried
    #[error("{0}")]
    NotFound(String),

    /// Retry the Machine after `after`
    #[error("{message}: requeue in {after:?}")]
    RequeueAfter {
        after: Duration,
        reason: MachineErrorReason,
        message: String,
    },

    /// The VM is in a state the verb cannot act on
    #[error("{0}")]
    UnexpectedObject(String),

    /// The VM exists but is being deleted
    #[error("vm {0} exists and is being deleted")]
    VmDeleting(String),

    /// Unclassified Azure API failure
    #[error("{context}: {source}")]
    Cloud {
        context: String,
        #[source]
        source: AzureError,
    },

    /// Failure expected to resolve on a later reconcile
    #[error("{0}")]
    Transient(String),
}

impl ReconcileError {
    /// Wrap an Azure error with a resource-qualified context
    pub fn cloud(context: impl Into<String>, source: AzureError) -> Self {
        Self::Cloud {
            context: context.into(),
            source,
        }
    }

    /// Prefix the message with `context`, keeping the error kind
    pub fn context(self, context: impl fmt::Display) -> Self {
        match self {
            Self::InvalidConfiguration(m) => Self::InvalidConfiguration(format!("{context}: {m}")),
            Self::NotFound(m) => Self::NotFound(format!("{context}: {m}")),
            Self::Transient(m) => Self::Transient(format!("{context}: {m}")),
            Self::Cloud { context: inner, source } => Self::Cloud {
                context: format!("{context}: {inner}"),
                source,
            },
            other => other,
        }
    }

    /// Whether the outer runtime should stop retrying until the Machine changes
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfiguration(_) | Self::ImmutableField(_) | Self::NotFound(_)
        )
    }

    /// Requeue delay, if this error asks for one
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            Self::RequeueAfter { after, .. } => Some(*after),
            _ => None,
        }
    }

    /// Reason reported in events and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration(_) | Self::ImmutableField(_) | Self::NotFound(_) => {
                MachineErrorReason::InvalidConfiguration.as_str()
            }
            Self::RequeueAfter { reason, .. } => reason.as_str(),
            Self::UnexpectedObject(_) | Self::VmDeleting(_) => "UnexpectedObject",
            Self::Cloud { .. } | Self::Transient(_) => "Unknown",
        }
    }

    /// Message without the requeue suffix
    pub fn message(&self) -> String {
        match self {
            Self::RequeueAfter { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_keeps_kind() {
        let err = ReconcileError::InvalidConfiguration("vnet is missing".to_string())
            .context("failed to create nic m-nic");
        assert!(matches!(err, ReconcileError::InvalidConfiguration(_)));
        assert_eq!(err.to_string(), "failed to create nic m-nic: vnet is missing");

        let err = ReconcileError::cloud("get vm", AzureError::NotFound("vm".to_string())).context("update");
        assert_eq!(err.to_string(), "update: get vm: Not found: vm");
    }

    #[test]
    fn test_terminal_and_requeue() {
        let requeue = ReconcileError::RequeueAfter {
            after: Duration::from_secs(20),
            reason: MachineErrorReason::CreateError,
            message: "boom".to_string(),
        };
        assert!(!requeue.is_terminal());
        assert_eq!(requeue.requeue_after(), Some(Duration::from_secs(20)));
        assert_eq!(requeue.reason(), "CreateError");
        assert_eq!(requeue.message(), "boom");

        let terminal = ReconcileError::ImmutableField("vmSize".to_string());
        assert!(terminal.is_terminal());
        assert_eq!(terminal.requeue_after(), None);
        assert_eq!(terminal.reason(), "InvalidConfiguration");
    }
}

//! Azure error classification.
//!
//! Maps errors returned by the ARM client onto the small taxonomy the
//! reconciler acts on, and folds unclassified verb failures into terminal or
//! requeue results.

use std::time::Duration;

use azure_client::AzureError;
use tracing::debug;

use crate::error::{MachineErrorReason, ReconcileError};

/// How the reconciler should treat an Azure error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The resource is absent
    ResourceNotFound,
    /// The token issuer or ARM rejected the credentials; they may refresh out of band
    InvalidCredentials,
    /// The request itself is wrong; retrying will not help
    InvalidConfiguration,
    /// Anything else
    Transient,
}

/// Classify an Azure error
pub fn classify(err: &AzureError) -> ErrorClass {
    match err {
        AzureError::NotFound(_) => ErrorClass::ResourceNotFound,
        AzureError::Authentication(_) => ErrorClass::InvalidCredentials,
        AzureError::SendFailure(_) | AzureError::InvalidRequest(_) => ErrorClass::InvalidConfiguration,
        AzureError::Transport(_) => ErrorClass::Transient,
        _ => match err.status() {
            Some(404) => ErrorClass::ResourceNotFound,
            Some(401) => ErrorClass::InvalidCredentials,
            Some(status) if (400..500).contains(&status) => ErrorClass::InvalidConfiguration,
            _ => ErrorClass::Transient,
        },
    }
}

/// Fold a verb failure into the result returned to the outer runtime.
///
/// Terminal kinds pass through. While creating, Azure errors in the 4xx
/// range other than 401 become `InvalidConfiguration`. Everything else,
/// including 4xx failures of update and delete, is retried after `requeue`
/// with the verb's `reason`.
pub fn handle_machine_error(err: ReconcileError, reason: MachineErrorReason, requeue: Duration) -> ReconcileError {
    match err {
        ReconcileError::Cloud { context, source } => match classify(&source) {
            ErrorClass::InvalidConfiguration | ErrorClass::ResourceNotFound
                if reason == MachineErrorReason::CreateError =>
            {
                ReconcileError::InvalidConfiguration(format!("{context}: {source}"))
            }
            class => {
                debug!(?class, error = %source, "Requeueing after Azure error");
                ReconcileError::RequeueAfter {
                    after: requeue,
                    reason,
                    message: format!("{context}: {source}"),
                }
            }
        },
        ReconcileError::Transient(message) => ReconcileError::RequeueAfter {
            after: requeue,
            reason,
            message,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> AzureError {
        AzureError::Api {
            status,
            code: "Code".to_string(),
            message: "message".to_string(),
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&AzureError::NotFound("x".to_string())), ErrorClass::ResourceNotFound);
        assert_eq!(classify(&api(404)), ErrorClass::ResourceNotFound);
        assert_eq!(classify(&api(401)), ErrorClass::InvalidCredentials);
        assert_eq!(classify(&AzureError::Authentication("bad".to_string())), ErrorClass::InvalidCredentials);
        assert_eq!(classify(&api(400)), ErrorClass::InvalidConfiguration);
        assert_eq!(classify(&api(409)), ErrorClass::InvalidConfiguration);
        assert_eq!(
            classify(&AzureError::SendFailure("relative URL without a base".to_string())),
            ErrorClass::InvalidConfiguration
        );
        assert_eq!(
            classify(&AzureError::Transport("operation timed out".to_string())),
            ErrorClass::Transient
        );
        assert_eq!(classify(&api(500)), ErrorClass::Transient);
        assert_eq!(classify(&api(503)), ErrorClass::Transient);
    }

    #[test]
    fn test_handle_machine_error_terminal_for_bad_request() {
        let err = handle_machine_error(
            ReconcileError::cloud("failed to create vm", api(400)),
            MachineErrorReason::CreateError,
            Duration::from_secs(20),
        );
        assert!(matches!(err, ReconcileError::InvalidConfiguration(_)));
        assert!(err.to_string().starts_with("failed to create vm: "));
    }

    #[test]
    fn test_handle_machine_error_requeues_conflict_outside_create() {
        for reason in [MachineErrorReason::DeleteError, MachineErrorReason::UpdateError] {
            let err = handle_machine_error(
                ReconcileError::cloud("failed to delete os disk", api(409)),
                reason,
                Duration::from_secs(20),
            );
            assert_eq!(err.requeue_after(), Some(Duration::from_secs(20)), "{reason:?}");
            assert!(!err.is_terminal());
        }
    }

    #[test]
    fn test_handle_machine_error_requeues_timeouts() {
        let err = handle_machine_error(
            ReconcileError::cloud("failed to create vm", AzureError::Transport("operation timed out".to_string())),
            MachineErrorReason::CreateError,
            Duration::from_secs(20),
        );
        assert_eq!(err.requeue_after(), Some(Duration::from_secs(20)));
    }

    #[test]
    fn test_handle_machine_error_requeues_unauthorized() {
        let err = handle_machine_error(
            ReconcileError::cloud("failed to create vm", api(401)),
            MachineErrorReason::CreateError,
            Duration::from_secs(20),
        );
        match err {
            ReconcileError::RequeueAfter { after, reason, .. } => {
                assert_eq!(after, Duration::from_secs(20));
                assert_eq!(reason, MachineErrorReason::CreateError);
            }
            other => panic!("expected requeue, got {other:?}"),
        }
    }

    #[test]
    fn test_handle_machine_error_passes_terminal_through() {
        let err = handle_machine_error(
            ReconcileError::ImmutableField("vmSize changed".to_string()),
            MachineErrorReason::UpdateError,
            Duration::from_secs(20),
        );
        assert!(matches!(err, ReconcileError::ImmutableField(_)));

        let err = handle_machine_error(
            ReconcileError::Transient("vm is still provisioning".to_string()),
            MachineErrorReason::DeleteError,
            Duration::from_secs(5),
        );
        assert_eq!(err.requeue_after(), Some(Duration::from_secs(5)));
        assert_eq!(err.reason(), "DeleteError");
    }
}

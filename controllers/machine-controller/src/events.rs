//! Kubernetes Event recording for Machines.
//!
//! Events are fire-and-forget: a failed publish is logged and never breaks
//! reconciliation.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::Client;
use kube::Resource;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use tracing::warn;

use crds::Machine;

use crate::error::ReconcileError;

/// Reporting component written on every event
pub const REPORTER: &str = "azure-machine-controller";

/// Event reasons
pub mod reasons {
    /// The instance was created
    pub const CREATED: &str = "Created";
    /// The instance was updated
    pub const UPDATED: &str = "Updated";
    /// The instance was deleted
    pub const DELETED: &str = "Deleted";
    /// Creating the instance failed
    pub const FAILED_CREATE: &str = "FailedCreate";
    /// Updating the instance failed
    pub const FAILED_UPDATE: &str = "FailedUpdate";
    /// Deleting the instance failed
    pub const FAILED_DELETE: &str = "FailedDelete";
}

/// Publishes Kubernetes Events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event about `resource_ref`
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Publisher backed by `kube::runtime::events::Recorder`
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl std::fmt::Debug for KubeEventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeEventPublisher").finish_non_exhaustive()
    }
}

impl KubeEventPublisher {
    pub fn new(client: Client) -> Self {
        let reporter = Reporter {
            controller: REPORTER.to_string(),
            instance: None,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(reason, action, error = %e, "Failed to publish Kubernetes event");
        }
    }
}

/// Normal event for a successful verb
pub async fn machine_succeeded(events: &dyn EventPublisher, machine: &Machine, reason: &str, action: &str) {
    let note = format!("{} machine {}", reason, machine.name());
    events
        .publish(&machine.object_ref(&()), EventType::Normal, reason, action, Some(note))
        .await;
}

/// Warning event for a failed verb.
///
/// The note reads `<reason>: reconciler failed to <action> machine <name>: <cause>`.
pub async fn machine_failed(
    events: &dyn EventPublisher,
    machine: &Machine,
    reason: &str,
    action: &str,
    err: &ReconcileError,
) {
    let note = format!(
        "{}: reconciler failed to {} machine {}: {}",
        err.reason(),
        action,
        machine.name(),
        err.message()
    );
    events
        .publish(&machine.object_ref(&()), EventType::Warning, reason, action, Some(note))
        .await;
}

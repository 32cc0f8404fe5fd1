//! Machine reconciler.
//!
//! Four verbs act on one Machine at a time:
//! - `create`: public IP, network interface, availability set, VM and startup
//!   script, then the same population as `update`
//! - `update`: addresses, provider ID, status and cloud labels from the VM
//! - `exists`: whether the VM is present
//! - `delete`: VM, OS disk, network interface, public IP and availability set
//!
//! [`Reconciler::reconcile`] dispatches between them for the outer runtime and
//! keeps the Machine finalizer in step with the cloud resources.

pub mod conditions;
mod create;
mod delete;
mod exists;
mod update;
mod vmstate;


use std::sync::Arc;
use std::time::Duration;

use crds::labels::MACHINE_FINALIZER;
use crds::{Machine, PROVIDER_SPEC_KIND};
use kube_runtime::controller::Action;
use tracing::{debug, info, warn};

use crate::classify::handle_machine_error;
use crate::error::{ControllerError, MachineErrorReason, ReconcileError};
use crate::events::{self, EventPublisher, reasons};
use crate::metrics::Metrics;
use crate::scope::{MachineScope, ScopeDeps};

/// Resync interval for machines that reconciled cleanly
pub const RESYNC_PERIOD: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb {
    Create,
    Update,
    Delete,
}

impl Verb {
    fn action(self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
        }
    }

    fn error_reason(self) -> MachineErrorReason {
        match self {
            Self::Create => MachineErrorReason::CreateError,
            Self::Update => MachineErrorReason::UpdateError,
            Self::Delete => MachineErrorReason::DeleteError,
        }
    }

    fn succeeded(self) -> &'static str {
        match self {
            Self::Create => reasons::CREATED,
            Self::Update => reasons::UPDATED,
            Self::Delete => reasons::DELETED,
        }
    }

    fn failed(self) -> &'static str {
        match self {
            Self::Create => reasons::FAILED_CREATE,
            Self::Update => reasons::FAILED_UPDATE,
            Self::Delete => reasons::FAILED_DELETE,
        }
    }
}

/// Reconciles Machines into Azure virtual machines.
pub struct Reconciler {
    deps: ScopeDeps,
    events: Arc<dyn EventPublisher>,
    metrics: Arc<Metrics>,
    requeue_after: Duration,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("deps", &self.deps)
            .field("requeue_after", &self.requeue_after)
            .finish_non_exhaustive()
    }
}

fn has_finalizer(machine: &Machine) -> bool {
    machine
        .metadata
        .finalizers
        .as_ref()
        .is_some_and(|finalizers| finalizers.iter().any(|f| f == MACHINE_FINALIZER))
}

fn is_azure_machine(machine: &Machine) -> bool {
    machine
        .spec
        .provider_spec
        .value
        .as_ref()
        .and_then(|value| value.get("kind"))
        .and_then(|kind| kind.as_str())
        == Some(PROVIDER_SPEC_KIND)
}

impl Reconciler {
    pub fn new(deps: ScopeDeps, events: Arc<dyn EventPublisher>, metrics: Arc<Metrics>, requeue_after: Duration) -> Self {
        Self {
            deps,
            events,
            metrics,
            requeue_after,
        }
    }

    /// Create the machine's VM and its dependencies
    pub async fn create(&self, machine: &Machine) -> Result<(), ReconcileError> {
        self.run(machine, Verb::Create).await
    }

    /// Reflect the VM into the machine
    pub async fn update(&self, machine: &Machine) -> Result<(), ReconcileError> {
        self.run(machine, Verb::Update).await
    }

    /// Release the machine's cloud resources
    pub async fn delete(&self, machine: &Machine) -> Result<(), ReconcileError> {
        self.run(machine, Verb::Delete).await
    }

    /// Whether the machine's VM exists
    pub async fn exists(&self, machine: &Machine) -> Result<bool, ReconcileError> {
        let scope = MachineScope::new(machine.clone(), &self.deps)
            .await
            .map_err(|e| handle_machine_error(e, MachineErrorReason::UpdateError, self.requeue_after))?;
        exists::exists(&scope)
            .await
            .map_err(|e| handle_machine_error(e, MachineErrorReason::UpdateError, self.requeue_after))
    }

    async fn run(&self, machine: &Machine, verb: Verb) -> Result<(), ReconcileError> {
        let name = machine.name().to_string();
        info!(machine = %name, namespace = %machine.namespace(), verb = verb.action(), "Reconciling machine");

        let mut scope = match MachineScope::new(machine.clone(), &self.deps).await {
            Ok(scope) => scope,
            Err(e) => {
                let err = handle_machine_error(e, verb.error_reason(), self.requeue_after);
                self.report_failure(machine, verb, &err).await;
                return Err(err);
            }
        };

        let result = match verb {
            Verb::Create => create::create(&mut scope).await,
            Verb::Update => update::update(&mut scope).await,
            Verb::Delete => delete::delete(&mut scope).await,
        };

        if let Err(e) = result {
            let err = handle_machine_error(e, verb.error_reason(), self.requeue_after);
            scope.persist_after_failure().await;
            self.report_failure(&scope.machine, verb, &err).await;
            return Err(err);
        }

        if let Err(e) = scope.persist().await {
            let err = handle_machine_error(
                ReconcileError::Transient(format!("failed to persist machine {name}: {e}")),
                verb.error_reason(),
                self.requeue_after,
            );
            self.report_failure(&scope.machine, verb, &err).await;
            return Err(err);
        }

        events::machine_succeeded(self.events.as_ref(), &scope.machine, verb.succeeded(), verb.action()).await;
        Ok(())
    }

    async fn report_failure(&self, machine: &Machine, verb: Verb, err: &ReconcileError) {
        warn!(
            machine = %machine.name(),
            namespace = %machine.namespace(),
            verb = verb.action(),
            reason = err.reason(),
            error = %err,
            "Machine reconcile failed"
        );
        match verb {
            Verb::Create => self
                .metrics
                .record_failed_create(machine.name(), machine.namespace(), err.reason()),
            Verb::Delete => self
                .metrics
                .record_failed_delete(machine.name(), machine.namespace(), err.reason()),
            Verb::Update => {}
        }
        events::machine_failed(self.events.as_ref(), machine, verb.failed(), verb.action(), err).await;
    }

    /// Action for a failed verb: requeue transient failures, wait for a change otherwise
    fn action_for(&self, err: &ReconcileError) -> Action {
        match err.requeue_after() {
            Some(after) => Action::requeue(after),
            None if err.is_terminal() => Action::await_change(),
            None => Action::requeue(self.requeue_after),
        }
    }

    async fn set_finalizer(&self, machine: &Machine, present: bool) -> Result<Machine, ControllerError> {
        let mut modified = machine.clone();
        let finalizers = modified.metadata.finalizers.get_or_insert_with(Vec::new);
        finalizers.retain(|f| f != MACHINE_FINALIZER);
        if present {
            finalizers.push(MACHINE_FINALIZER.to_string());
        }
        self.deps.store.patch_machine(machine, &modified).await
    }

    /// Drive one Machine towards its desired state
    pub async fn reconcile(&self, machine: Arc<Machine>) -> Result<Action, ControllerError> {
        if !is_azure_machine(&machine) {
            debug!(machine = %machine.name(), "Skipping machine without an Azure provider spec");
            return Ok(Action::await_change());
        }

        if machine.is_being_deleted() {
            return self.reconcile_deletion(&machine).await;
        }

        let machine = if has_finalizer(&machine) {
            machine.as_ref().clone()
        } else {
            debug!(machine = %machine.name(), "Adding finalizer");
            self.set_finalizer(&machine, true).await?
        };

        let result = match self.exists(&machine).await {
            Ok(true) => self.update(&machine).await,
            Ok(false) => self.create(&machine).await,
            Err(ReconcileError::UnexpectedObject(message)) => {
                info!(machine = %machine.name(), %message, "Replacing VM");
                self.create(&machine).await
            }
            Err(e) => Err(e),
        };

        Ok(match result {
            Ok(()) => Action::requeue(RESYNC_PERIOD),
            Err(e) => self.action_for(&e),
        })
    }

    async fn reconcile_deletion(&self, machine: &Machine) -> Result<Action, ControllerError> {
        if !has_finalizer(machine) {
            return Ok(Action::await_change());
        }

        if let Err(e) = self.delete(machine).await {
            return Ok(self.action_for(&e));
        }

        match self.exists(machine).await {
            Ok(false) => {
                info!(machine = %machine.name(), "VM is gone, removing finalizer");
                self.set_finalizer(machine, false).await?;
                Ok(Action::await_change())
            }
            Ok(true) | Err(ReconcileError::VmDeleting(_)) => {
                debug!(machine = %machine.name(), "VM is still being deleted");
                Ok(Action::requeue(self.requeue_after))
            }
            Err(e) => Ok(self.action_for(&e)),
        }
    }
}

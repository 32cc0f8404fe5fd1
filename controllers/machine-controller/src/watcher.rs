//! Machine watcher.
//!
//! Drives the [`Reconciler`] from a `kube_runtime::Controller` over Machine
//! objects. The controller handles reconnection, per-object serialization and
//! requeues; each reconcile returns the `Action` chosen by the reconciler.

use std::sync::Arc;
use std::time::Duration;

use crds::Machine;
use futures::StreamExt;
use kube::Api;
use kube_runtime::controller::{Action, Config as ControllerConfig};
use kube_runtime::{Controller, watcher};
use tracing::{debug, error, info};

use crate::error::ControllerError;
use crate::reconciler::Reconciler;

/// Requeue interval when reconcile fails outside of a verb
const ERROR_REQUEUE: Duration = Duration::from_secs(60);

/// Watches Machines and reconciles them.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    machine_api: Api<Machine>,
}

impl Watcher {
    pub fn new(reconciler: Arc<Reconciler>, machine_api: Api<Machine>) -> Self {
        Self {
            reconciler,
            machine_api,
        }
    }

    /// Watch Machines until the watch stream ends
    pub async fn watch_machines(&self) -> Result<(), ControllerError> {
        info!("Starting Machine watcher");

        let error_policy = |machine: Arc<Machine>, error: &ControllerError, _ctx: Arc<Reconciler>| {
            error!(
                machine = %machine.name(),
                namespace = %machine.namespace(),
                "Reconciliation error: {}",
                error
            );
            Action::requeue(ERROR_REQUEUE)
        };

        let reconcile = |machine: Arc<Machine>, reconciler: Arc<Reconciler>| async move {
            debug!(machine = %machine.name(), namespace = %machine.namespace(), "Reconciling Machine");
            reconciler.reconcile(machine).await
        };

        // Debounce batches the status and spec patches a reconcile issues itself
        let controller_config = ControllerConfig::default()
            .debounce(Duration::from_secs(5))
            .concurrency(3);

        Controller::new(self.machine_api.clone(), watcher::Config::default())
            .with_config(controller_config)
            .run(reconcile, error_policy, self.reconciler.clone())
            .for_each(|res| async move {
                match res {
                    Ok((object, action)) => debug!(machine = %object.name, ?action, "Reconciled Machine"),
                    Err(e) => error!("Controller error for Machine: {}", e),
                }
            })
            .await;

        Ok(())
    }
}

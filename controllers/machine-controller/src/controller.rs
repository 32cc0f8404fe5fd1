//! Main controller implementation.
//!
//! Wires the kube-backed collaborators into the [`Reconciler`], then runs the
//! Machine watcher and the metrics server side by side.

use std::sync::Arc;

use crds::Machine;
use kube::{Api, Client};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::events::KubeEventPublisher;
use crate::metrics::{self, Metrics};
use crate::reconciler::Reconciler;
use crate::scope::ScopeDeps;
use crate::scope::sources::{AzureClientFactory, KubeInfrastructureReader, KubeMachineStore, KubeSecretReader};
use crate::watcher::Watcher;

/// Main controller for Azure Machines.
pub struct Controller {
    machine_watcher: JoinHandle<Result<(), ControllerError>>,
    metrics_server: JoinHandle<anyhow::Result<()>>,
}

impl Controller {
    /// Build the collaborators and start the background tasks
    pub async fn new(config: &ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing Azure Machine Controller");

        let kube_client = Client::try_default().await?;

        let machine_api: Api<Machine> = match &config.watch_namespace {
            Some(ns) => Api::namespaced(kube_client.clone(), ns),
            None => Api::all(kube_client.clone()),
        };

        let deps = ScopeDeps {
            store: Arc::new(KubeMachineStore::new(kube_client.clone())),
            secrets: Arc::new(KubeSecretReader::new(kube_client.clone())),
            infrastructure: Arc::new(KubeInfrastructureReader::new(kube_client.clone())),
            clients: Arc::new(AzureClientFactory::new(config.workload_identity_token_file())?),
            workload_identity_enabled: config.workload_identity_enabled,
        };
        let metrics = Arc::new(Metrics::new()?);
        let reconciler = Arc::new(Reconciler::new(
            deps,
            Arc::new(KubeEventPublisher::new(kube_client)),
            metrics.clone(),
            config.requeue_after,
        ));

        let watcher = Watcher::new(reconciler, machine_api);
        let machine_watcher = tokio::spawn(async move { watcher.watch_machines().await });

        let metrics_server = tokio::spawn(metrics::serve(config.metrics_bind_address, metrics));

        Ok(Self {
            machine_watcher,
            metrics_server,
        })
    }

    /// Runs the controller until either task exits.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Azure Machine Controller running");

        tokio::select! {
            result = &mut self.machine_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Machine watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("Machine watcher error: {}", e)))?;
            }
            result = &mut self.metrics_server => {
                result.map_err(|e| ControllerError::Watch(format!("Metrics server panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("Metrics server error: {}", e)))?;
            }
        }

        Ok(())
    }
}

//! Azure Machine Controller
//!
//! Machine API provider for Azure: reconciles `Machine` objects whose provider
//! spec is an `AzureMachineProviderSpec` into virtual machines and their
//! network interfaces, public IPs, availability sets and disks.

mod classify;
mod config;
mod controller;
mod error;
mod events;
mod metrics;
mod names;
mod reconciler;
mod scope;
mod services;
mod vmspec;
mod watcher;

#[cfg(test)]
mod test_utils;

use config::ControllerConfig;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::ControllerError;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // rustls needs a process-wide provider before any TLS client is built
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        info!("rustls crypto provider already installed");
    }

    info!("Starting Azure Machine Controller");

    let config = ControllerConfig::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", config.watch_namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Workload identity: {}", config.workload_identity_enabled);
    if config.workload_identity_enabled {
        info!("  Federated token file: {}", config.federated_token_file.display());
    }
    info!("  Metrics address: {}", config.metrics_bind_address);
    info!("  Requeue after: {:?}", config.requeue_after);

    let controller = Controller::new(&config).await?;
    controller.run().await?;

    Ok(())
}

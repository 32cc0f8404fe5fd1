//! Prometheus metrics and the HTTP endpoint serving them.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use tower::ServiceBuilder;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, error, info};

use crate::error::ControllerError;

const LABELS: [&str; 3] = ["name", "namespace", "reason"];

/// Counters exported by the controller
#[derive(Debug, Clone)]
pub struct Metrics {
    registry: Registry,
    failed_instance_create: IntCounterVec,
    failed_instance_delete: IntCounterVec,
}

impl Metrics {
    /// Create the counters and register them in a fresh registry
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new();

        let failed_instance_create = IntCounterVec::new(
            Opts::new("failed_instance_create", "Number of times provider instance create has failed."),
            &LABELS,
        )?;
        let failed_instance_delete = IntCounterVec::new(
            Opts::new("failed_instance_delete", "Number of times provider instance delete has failed."),
            &LABELS,
        )?;

        registry.register(Box::new(failed_instance_create.clone()))?;
        registry.register(Box::new(failed_instance_delete.clone()))?;

        Ok(Self {
            registry,
            failed_instance_create,
            failed_instance_delete,
        })
    }

    /// Count a failed create of the machine's instance
    pub fn record_failed_create(&self, name: &str, namespace: &str, reason: &str) {
        self.failed_instance_create
            .with_label_values(&[name, namespace, reason])
            .inc();
    }

    /// Count a failed delete of the machine's instance
    pub fn record_failed_delete(&self, name: &str, namespace: &str, reason: &str) {
        self.failed_instance_delete
            .with_label_values(&[name, namespace, reason])
            .inc();
    }

    /// Current value of the create failure counter
    pub fn failed_create_count(&self, name: &str, namespace: &str, reason: &str) -> u64 {
        self.failed_instance_create
            .with_label_values(&[name, namespace, reason])
            .get()
    }

    /// Current value of the delete failure counter
    pub fn failed_delete_count(&self, name: &str, namespace: &str, reason: &str) -> u64 {
        self.failed_instance_delete
            .with_label_values(&[name, namespace, reason])
            .get()
    }

    /// Render every registered metric in the text exposition format
    pub fn gather(&self) -> Result<String, ControllerError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| ControllerError::InvalidConfig(format!("metrics are not valid UTF-8: {e}")))
    }
}

/// Router exposing `/metrics` and `/healthz`
pub fn router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .route("/healthz", get(healthz))
        .with_state(metrics)
        .layer(
            ServiceBuilder::new().layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                    .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
            ),
        )
}

/// Serve the metrics router until the listener fails
pub async fn serve(addr: SocketAddr, metrics: Arc<Metrics>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);
    axum::serve(listener, router(metrics)).await?;
    Ok(())
}

async fn render_metrics(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    match metrics.gather() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_labelled() {
        let metrics = Metrics::new().unwrap();
        metrics.record_failed_create("machine-test", "default", "InvalidConfiguration");
        metrics.record_failed_create("machine-test", "default", "InvalidConfiguration");
        metrics.record_failed_delete("machine-test", "default", "DeleteError");

        assert_eq!(metrics.failed_create_count("machine-test", "default", "InvalidConfiguration"), 2);
        assert_eq!(metrics.failed_create_count("machine-test", "default", "CreateError"), 0);
        assert_eq!(metrics.failed_delete_count("machine-test", "default", "DeleteError"), 1);
    }

    #[test]
    fn test_gather_renders_text_format() {
        let metrics = Metrics::new().unwrap();
        metrics.record_failed_delete("m1", "openshift-machine-api", "DeleteError");

        let text = metrics.gather().unwrap();
        assert!(text.contains("# TYPE failed_instance_delete counter"));
        assert!(text.contains(r#"failed_instance_delete{name="m1",namespace="openshift-machine-api",reason="DeleteError"} 1"#));
    }
}

//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mux_exchanges_total` (counter): claimed exchanges by handler
//! - `mux_unclaimed_exchanges_total` (counter): exchanges no handler claimed
//! - `mux_push_envelopes_total` (counter): push envelopes by outcome
//!   (`http`, `rpc` or `rejected`)
//! - `mux_open_connections` (gauge): current connection count
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until an
//!   exporter is installed
//! - The Prometheus endpoint listens on its own address, never on the mux port

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;

use crate::config::ObservabilityConfig;

/// Failed to start the metrics endpoint.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("invalid metrics address {0:?}")]
    Address(String),

    #[error("failed to install prometheus exporter: {0}")]
    Install(#[from] BuildError),
}

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
///
/// Must run inside a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Start the exporter if the config enables it. Returns whether it was started.
pub fn init_from_config(config: &ObservabilityConfig) -> Result<bool, MetricsError> {
    if !config.metrics_enabled {
        return Ok(false);
    }
    let addr = config
        .metrics_address
        .parse()
        .map_err(|_| MetricsError::Address(config.metrics_address.clone()))?;
    init_metrics(addr)?;
    Ok(true)
}

//! Prometheus metrics for the gateway client.
//!
//! Recording functions are always safe to call: without an installed
//! recorder they are no-ops.
//!
//! # Example
//!
//! ```ignore
//! use ibkr_web_client::observability::{init_metrics, MetricsConfig};
//!
//! init_metrics(&MetricsConfig::default())?;
//! record_gateway_request("tickle", "200", 0.012);
//! ```

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Configuration for the metrics exporter.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Address to bind the metrics HTTP listener.
    pub listen_addr: SocketAddr,
    /// Histogram buckets for request latency (in seconds).
    pub latency_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 9090)),
            // Gateway round trips range from a few ms to the 30s timeout
            latency_buckets: vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 30.0],
        }
    }
}

impl MetricsConfig {
    /// Create a metrics configuration with a custom address.
    #[must_use]
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            listen_addr: addr,
            ..Default::default()
        }
    }
}

/// Install the Prometheus exporter and serve `/metrics`.
///
/// # Errors
///
/// Returns an error if the exporter fails to start (e.g., port already in use).
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(config.listen_addr)
        .set_buckets(&config.latency_buckets)
        .map_err(|e| MetricsError::Configuration(e.to_string()))?
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!(addr = %config.listen_addr, "Prometheus metrics exporter started");

    Ok(())
}

/// Error type for metrics operations.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Failed to configure metrics exporter.
    #[error("metrics configuration error: {0}")]
    Configuration(String),
    /// Failed to install metrics exporter.
    #[error("metrics installation error: {0}")]
    Installation(String),
}

/// Numeric values of the connection state gauge.
pub mod connection_state {
    /// No session.
    pub const DISCONNECTED: f64 = 0.0;
    /// Session opened, keep-alive pending.
    pub const CONNECTING: f64 = 1.0;
    /// Session validated.
    pub const CONNECTED: f64 = 2.0;
}

/// Record one HTTP round trip.
///
/// * `endpoint` - Logical endpoint name
/// * `outcome` - HTTP status code, or `transport_failure`
/// * `latency_seconds` - Time from send to response
pub fn record_gateway_request(endpoint: &str, outcome: &str, latency_seconds: f64) {
    counter!(
        "gateway_requests_total",
        "endpoint" => endpoint.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        "gateway_request_latency_seconds",
        "endpoint" => endpoint.to_string()
    )
    .record(latency_seconds);
}

/// Record a scheduled retry.
pub fn record_gateway_retry(endpoint: &str, class: &str) {
    counter!(
        "gateway_retries_total",
        "endpoint" => endpoint.to_string(),
        "class" => class.to_string()
    )
    .increment(1);
}

/// Record a dispatch that surfaced an error to the caller.
pub fn record_gateway_failure(endpoint: &str, kind: &str) {
    counter!(
        "gateway_failures_total",
        "endpoint" => endpoint.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record time spent waiting for a pacing slot.
pub fn record_pacing_delay(endpoint: &str, delay_seconds: f64) {
    histogram!(
        "gateway_pacing_delay_seconds",
        "endpoint" => endpoint.to_string()
    )
    .record(delay_seconds);
}

/// Record a failed connect attempt that will be retried.
pub fn record_reconnect_attempt() {
    counter!("gateway_reconnect_attempts_total").increment(1);
}

/// Update the connection state gauge.
///
/// See [`connection_state`] for values.
pub fn record_connection_state(state: f64) {
    gauge!("gateway_connection_state").set(state);
}

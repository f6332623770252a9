//! Observability module for metrics.
//!
//! Tracing setup lives in [`crate::telemetry`].

mod metrics;

pub use metrics::{
    MetricsConfig, MetricsError, connection_state, init_metrics, record_connection_state,
    record_gateway_failure, record_gateway_request, record_gateway_retry, record_pacing_delay,
    record_reconnect_attempt,
};

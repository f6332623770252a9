//! Injected observer for dispatch and session events.
//!
//! The dispatcher and connection manager never log directly; they report to a
//! [`GatewayObserver`]. [`TracingObserver`] turns each event into a `tracing`
//! event plus a metric, [`NoopObserver`] drops everything.

use std::time::Duration;

use reqwest::Method;

use super::connection::ConnectionState;
use super::retry::RetryClass;
use crate::error::GatewayError;
use crate::observability::{
    record_connection_state, record_gateway_failure, record_gateway_request, record_gateway_retry,
    record_pacing_delay, record_reconnect_attempt,
};

/// Receiver of gateway client events. Every hook defaults to a no-op.
pub trait GatewayObserver: Send + Sync + std::fmt::Debug {
    /// The connection state changed.
    fn state_changed(&self, _from: ConnectionState, _to: ConnectionState) {}

    /// An HTTP request completed; `status` is `None` on transport failure.
    fn request_sent(
        &self,
        _endpoint: &str,
        _method: &Method,
        _status: Option<u16>,
        _latency: Duration,
    ) {
    }

    /// A failed attempt will be retried after `delay`.
    fn retry_scheduled(
        &self,
        _endpoint: &str,
        _class: RetryClass,
        _status: u16,
        _attempt: u32,
        _delay: Duration,
    ) {
    }

    /// A dispatch surfaced an error to its caller.
    fn request_failed(&self, _endpoint: &str, _error: &GatewayError) {}

    /// A dispatch waited for its pacing slot.
    fn pacing_delay(&self, _endpoint: &str, _delay: Duration) {}

    /// A connect attempt failed and will be retried after `delay`.
    fn reconnect_scheduled(&self, _attempt: u32, _delay: Duration, _error: &GatewayError) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl GatewayObserver for NoopObserver {}

/// Observer emitting `tracing` events and Prometheus metrics.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl GatewayObserver for TracingObserver {
    fn state_changed(&self, from: ConnectionState, to: ConnectionState) {
        tracing::info!(
            from = from.as_str(),
            to = to.as_str(),
            "Gateway connection state changed"
        );
        record_connection_state(to.gauge_value());
    }

    fn request_sent(&self, endpoint: &str, method: &Method, status: Option<u16>, latency: Duration) {
        let latency_ms = latency.as_millis() as u64;
        if let Some(status) = status {
            tracing::debug!(endpoint, %method, status, latency_ms, "Gateway request completed");
            record_gateway_request(endpoint, &status.to_string(), latency.as_secs_f64());
        } else {
            tracing::debug!(endpoint, %method, latency_ms, "Gateway request failed in transport");
            record_gateway_request(endpoint, "transport_failure", latency.as_secs_f64());
        }
    }

    fn retry_scheduled(
        &self,
        endpoint: &str,
        class: RetryClass,
        status: u16,
        attempt: u32,
        delay: Duration,
    ) {
        tracing::warn!(
            endpoint,
            class = class.as_str(),
            status,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Retrying gateway request"
        );
        record_gateway_retry(endpoint, class.as_str());
    }

    fn request_failed(&self, endpoint: &str, error: &GatewayError) {
        if error.is_programming_error() {
            tracing::error!(endpoint, error = %error, "Invalid gateway request");
        } else {
            tracing::warn!(endpoint, kind = error.kind(), error = %error, "Gateway request failed");
        }
        record_gateway_failure(endpoint, error.kind());
    }

    fn pacing_delay(&self, endpoint: &str, delay: Duration) {
        tracing::trace!(
            endpoint,
            delay_ms = delay.as_millis() as u64,
            "Waiting for pacing slot"
        );
        record_pacing_delay(endpoint, delay.as_secs_f64());
    }

    fn reconnect_scheduled(&self, attempt: u32, delay: Duration, error: &GatewayError) {
        tracing::warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Gateway unreachable, retrying connect"
        );
        record_reconnect_attempt();
    }
}

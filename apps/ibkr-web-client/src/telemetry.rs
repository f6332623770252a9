//! Tracing Setup
//!
//! Console logging through `tracing-subscriber`, plus an optional OTLP span
//! exporter.
//!
//! # Configuration
//!
//! - `RUST_LOG`: filter directives (default: `info`)
//! - `OTEL_ENABLED`: set to `false` to log to the console only
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP gRPC endpoint (default: `http://localhost:4317`)
//! - `OTEL_SERVICE_NAME`: service name for traces (default: `ibkr-web-client`)
//! - `LOG_PRETTY`: set to `true` for colored output without targets
//!
//! # Usage
//!
//! ```rust,ignore
//! use ibkr_web_client::telemetry::init_telemetry;
//!
//! #[tokio::main]
//! async fn main() {
//!     let _guard = init_telemetry();
//!     // ... application code
//! }
//! ```

use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";
const DEFAULT_SERVICE_NAME: &str = "ibkr-web-client";

/// Telemetry switches read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetrySettings {
    /// Export spans over OTLP.
    pub otel_enabled: bool,
    /// OTLP gRPC endpoint.
    pub endpoint: String,
    /// Service name attached to spans.
    pub service_name: String,
    /// Human-oriented console output.
    pub pretty: bool,
}

impl TelemetrySettings {
    /// Read settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            otel_enabled: lookup("OTEL_ENABLED").is_none_or(|v| v != "false"),
            endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_OTLP_ENDPOINT.to_string()),
            service_name: lookup("OTEL_SERVICE_NAME")
                .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
            pretty: lookup("LOG_PRETTY").is_some_and(|v| v == "true"),
        }
    }
}

/// Guard that shuts down the tracer provider on drop.
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Error shutting down tracer provider: {e:?}");
        }
    }
}

/// Install the global subscriber using [`TelemetrySettings::from_env`].
///
/// Returns a guard that flushes and shuts down span export when dropped.
/// A second call leaves the first subscriber in place.
#[must_use]
pub fn init_telemetry() -> TelemetryGuard {
    init_telemetry_with(&TelemetrySettings::from_env())
}

/// Install the global subscriber with explicit settings.
#[must_use]
pub fn init_telemetry_with(settings: &TelemetrySettings) -> TelemetryGuard {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(!settings.pretty)
        .with_ansi(settings.pretty);

    if !settings.otel_enabled {
        let _ = Registry::default()
            .with(env_filter)
            .with(fmt_layer)
            .try_init();
        tracing::info!("OpenTelemetry disabled (OTEL_ENABLED=false), using console logging only");
        return TelemetryGuard { provider: None };
    }

    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&settings.endpoint)
        .build()
    {
        Ok(exporter) => exporter,
        Err(e) => {
            let _ = Registry::default()
                .with(env_filter)
                .with(fmt_layer)
                .try_init();
            tracing::warn!(error = ?e, "Failed to create OTLP exporter, using console logging only");
            return TelemetryGuard { provider: None };
        }
    };

    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(exporter)
        .build();
    let tracer = provider.tracer(settings.service_name.clone());
    let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    let _ = Registry::default()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init();

    tracing::info!(
        service_name = %settings.service_name,
        endpoint = %settings.endpoint,
        "OpenTelemetry initialized"
    );

    TelemetryGuard {
        provider: Some(provider),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_otel() {
        let settings = TelemetrySettings::from_lookup(|_| None);
        assert!(settings.otel_enabled);
        assert_eq!(settings.endpoint, DEFAULT_OTLP_ENDPOINT);
        assert_eq!(settings.service_name, "ibkr-web-client");
        assert!(!settings.pretty);
    }

    #[test]
    fn otel_can_be_disabled() {
        let settings = TelemetrySettings::from_lookup(|key| {
            (key == "OTEL_ENABLED").then(|| "false".to_string())
        });
        assert!(!settings.otel_enabled);
    }

    #[test]
    fn console_only_init_returns_empty_guard() {
        let settings = TelemetrySettings {
            otel_enabled: false,
            ..TelemetrySettings::from_lookup(|_| None)
        };
        let guard = init_telemetry_with(&settings);
        assert!(guard.provider.is_none());
    }
}

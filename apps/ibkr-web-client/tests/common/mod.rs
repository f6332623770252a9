//! Shared helpers for gateway integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use ibkr_web_client::config::{
    AuthRetrySettings, ConnectionSettings, GatewayConfig, RetrySettings, TransientRetrySettings,
};
use ibkr_web_client::gateway::{
    ConnectionState, EndpointRegistry, GatewayObserver, RetryClass, names,
};
use ibkr_web_client::{GatewayClient, GatewayError};

/// Endpoint with a 20 req/s ceiling used by pacing tests.
pub const PACED: &str = "paced";

/// Second endpoint with the same ceiling as [`PACED`].
pub const PACED_OTHER: &str = "paced_other";

/// Config pointing at a mock server with millisecond-scale schedules.
pub fn fast_config(base_url: &str) -> GatewayConfig {
    GatewayConfig::new(base_url)
        .with_connection(
            ConnectionSettings::new(base_url)
                .with_keep_alive_interval(Duration::from_millis(30))
                .with_request_timeout(Duration::from_millis(200))
                .with_reconnect_backoff(Duration::from_millis(10), Duration::from_millis(40)),
        )
        .with_retry(RetrySettings {
            transient: TransientRetrySettings {
                max_attempts: 3,
                initial_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(20),
                ..TransientRetrySettings::default()
            },
            auth: AuthRetrySettings {
                max_attempts: 2,
                initial_delay: Duration::from_millis(5),
                retry_delay: Duration::from_millis(10),
            },
        })
}

/// Registry without pacing except on [`PACED`] and [`PACED_OTHER`].
pub fn test_registry() -> EndpointRegistry {
    EndpointRegistry::builder()
        .endpoint(names::TICKLE, "/tickle", None)
        .endpoint(
            names::ACCOUNT_SUMMARY,
            "/portfolio/{accountId}/summary",
            None,
        )
        .endpoint(names::PORTFOLIO_ACCOUNTS, "/portfolio/accounts", None)
        .endpoint(PACED, "/paced", Some(20.0))
        .endpoint(PACED_OTHER, "/paced-other", Some(20.0))
        .build()
}

/// Client for `base_url` reporting to `observer`.
pub fn client_with(base_url: &str, observer: Arc<dyn GatewayObserver>) -> GatewayClient {
    client_with_config(fast_config(base_url), observer)
}

/// Client for an explicit config with the test registry.
pub fn client_with_config(
    config: GatewayConfig,
    observer: Arc<dyn GatewayObserver>,
) -> GatewayClient {
    GatewayClient::builder(config)
        .registry(test_registry())
        .observer(observer)
        .build()
}

/// Observer that records transitions, reconnects, retries, failures and pacing waits.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    transitions: Mutex<Vec<(ConnectionState, ConnectionState)>>,
    reconnects: Mutex<Vec<u32>>,
    retries: Mutex<Vec<(RetryClass, u32, Duration)>>,
    failures: Mutex<Vec<String>>,
    pacing: Mutex<Vec<(String, Duration)>>,
}

impl RecordingObserver {
    pub fn transitions(&self) -> Vec<(ConnectionState, ConnectionState)> {
        self.transitions.lock().clone()
    }

    pub fn reconnects(&self) -> Vec<u32> {
        self.reconnects.lock().clone()
    }

    /// Scheduled retries as `(class, attempt, delay)`.
    pub fn retries(&self) -> Vec<(RetryClass, u32, Duration)> {
        self.retries.lock().clone()
    }

    pub fn failures(&self) -> Vec<String> {
        self.failures.lock().clone()
    }

    pub fn pacing_delays(&self) -> Vec<(String, Duration)> {
        self.pacing.lock().clone()
    }

    /// Number of times the state entered `to`.
    pub fn entered(&self, to: ConnectionState) -> usize {
        self.transitions
            .lock()
            .iter()
            .filter(|(_, state)| *state == to)
            .count()
    }
}

impl GatewayObserver for RecordingObserver {
    fn state_changed(&self, from: ConnectionState, to: ConnectionState) {
        self.transitions.lock().push((from, to));
    }

    fn retry_scheduled(
        &self,
        _endpoint: &str,
        class: RetryClass,
        _status: u16,
        attempt: u32,
        delay: Duration,
    ) {
        self.retries.lock().push((class, attempt, delay));
    }

    fn request_failed(&self, _endpoint: &str, error: &GatewayError) {
        self.failures.lock().push(error.kind().to_string());
    }

    fn pacing_delay(&self, endpoint: &str, delay: Duration) {
        self.pacing.lock().push((endpoint.to_string(), delay));
    }

    fn reconnect_scheduled(&self, attempt: u32, _delay: Duration, _error: &GatewayError) {
        self.reconnects.lock().push(attempt);
    }
}

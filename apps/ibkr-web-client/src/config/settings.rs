//! Gateway Client Settings
//!
//! Configuration types for the gateway client, built in code or loaded from
//! `IBKR_*` environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// TLS certificate policy for the gateway connection.
///
/// The Client Portal gateway ships with a self-signed certificate, so local
/// deployments usually need [`TlsVerification::AcceptInvalidCerts`]. It is
/// never the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TlsVerification {
    /// Verify the server certificate chain.
    #[default]
    Verify,
    /// Accept any certificate, including self-signed ones.
    AcceptInvalidCerts,
}

impl TlsVerification {
    /// Build the policy from an "accept invalid certificates" flag.
    #[must_use]
    pub const fn from_accept_invalid(accept_invalid: bool) -> Self {
        if accept_invalid {
            Self::AcceptInvalidCerts
        } else {
            Self::Verify
        }
    }

    /// Whether certificate verification is disabled.
    #[must_use]
    pub const fn accepts_invalid_certs(&self) -> bool {
        matches!(self, Self::AcceptInvalidCerts)
    }
}

/// How request pacing timestamps are shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PacingScope {
    /// One timestamp for every endpoint of a client: all requests are serialized.
    #[default]
    Global,
    /// One timestamp per logical endpoint.
    PerEndpoint,
}

impl PacingScope {
    /// Parse the scope from a string, `None` for unrecognized values.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "global" => Some(Self::Global),
            "per-endpoint" | "per_endpoint" | "endpoint" => Some(Self::PerEndpoint),
            _ => None,
        }
    }

    /// Get the scope name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::PerEndpoint => "per-endpoint",
        }
    }
}

/// Session and transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Gateway base URL, e.g. `https://localhost:5000/v1/api`.
    pub base_url: String,
    /// Interval between keep-alive calls.
    pub keep_alive_interval: Duration,
    /// Timeout applied to every HTTP request.
    pub request_timeout: Duration,
    /// First delay of the connect backoff.
    pub reconnect_initial_backoff: Duration,
    /// Ceiling of the connect backoff.
    pub reconnect_max_backoff: Duration,
    /// TLS certificate policy.
    pub tls: TlsVerification,
}

impl ConnectionSettings {
    /// Default keep-alive interval.
    pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(60);
    /// Default request timeout.
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    /// Default first connect backoff.
    pub const DEFAULT_RECONNECT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
    /// Default connect backoff ceiling.
    pub const DEFAULT_RECONNECT_MAX_BACKOFF: Duration = Duration::from_secs(60);

    /// Create settings for a base URL with default timings.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            keep_alive_interval: Self::DEFAULT_KEEP_ALIVE_INTERVAL,
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
            reconnect_initial_backoff: Self::DEFAULT_RECONNECT_INITIAL_BACKOFF,
            reconnect_max_backoff: Self::DEFAULT_RECONNECT_MAX_BACKOFF,
            tls: TlsVerification::Verify,
        }
    }

    /// Set the keep-alive interval.
    #[must_use]
    pub const fn with_keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = interval;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the connect backoff bounds.
    #[must_use]
    pub const fn with_reconnect_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect_initial_backoff = initial;
        self.reconnect_max_backoff = max;
        self
    }

    /// Set the TLS policy.
    #[must_use]
    pub const fn with_tls(mut self, tls: TlsVerification) -> Self {
        self.tls = tls;
        self
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Retry schedule for transient upstream failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransientRetrySettings {
    /// Maximum retries after the first attempt.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub initial_delay: Duration,
    /// Ceiling of the exponential delay.
    pub max_delay: Duration,
    /// Status codes classified as transient.
    pub statuses: Vec<u16>,
}

impl Default for TransientRetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            statuses: vec![429, 502, 503, 504],
        }
    }
}

/// Retry schedule for session-expiry (HTTP 401) failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRetrySettings {
    /// Maximum retries after the first attempt.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Delay before every later retry.
    pub retry_delay: Duration,
}

impl Default for AuthRetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 12,
            initial_delay: Duration::from_secs(60),
            retry_delay: Duration::from_secs(300),
        }
    }
}

/// Retry settings for both failure classes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Transient upstream failures.
    pub transient: TransientRetrySettings,
    /// Session expiry.
    pub auth: AuthRetrySettings,
}

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Session and transport settings.
    pub connection: ConnectionSettings,
    /// Retry schedules.
    #[serde(default)]
    pub retry: RetrySettings,
    /// Pacing timestamp sharing.
    #[serde(default)]
    pub pacing: PacingScope,
}

impl GatewayConfig {
    /// Create a configuration with default schedules for a base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            connection: ConnectionSettings::new(base_url),
            retry: RetrySettings::default(),
            pacing: PacingScope::default(),
        }
    }

    /// Replace the connection settings.
    #[must_use]
    pub fn with_connection(mut self, connection: ConnectionSettings) -> Self {
        self.connection = connection;
        self
    }

    /// Replace the retry settings.
    #[must_use]
    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    /// Set the pacing scope.
    #[must_use]
    pub const fn with_pacing(mut self, pacing: PacingScope) -> Self {
        self.pacing = pacing;
        self
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `IBKR_BASE_URL` is missing or any value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `IBKR_BASE_URL` is missing or any value is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };

        let base_url = env
            .get("IBKR_BASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("IBKR_BASE_URL".to_string()))?;
        if base_url.trim().is_empty() {
            return Err(ConfigError::EmptyValue("IBKR_BASE_URL".to_string()));
        }

        let defaults = ConnectionSettings::new(base_url.trim());
        let connection = ConnectionSettings {
            keep_alive_interval: env
                .duration_secs("IBKR_KEEP_ALIVE_SECS", defaults.keep_alive_interval)?,
            request_timeout: env
                .duration_secs("IBKR_REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
            reconnect_initial_backoff: env.duration_millis(
                "IBKR_RECONNECT_INITIAL_MS",
                defaults.reconnect_initial_backoff,
            )?,
            reconnect_max_backoff: env
                .duration_secs("IBKR_RECONNECT_MAX_SECS", defaults.reconnect_max_backoff)?,
            tls: TlsVerification::from_accept_invalid(
                env.bool("IBKR_ACCEPT_INVALID_CERTS", false)?,
            ),
            ..defaults
        };

        let transient_defaults = TransientRetrySettings::default();
        let transient = TransientRetrySettings {
            max_attempts: env.u32(
                "IBKR_TRANSIENT_MAX_ATTEMPTS",
                transient_defaults.max_attempts,
            )?,
            initial_delay: env.duration_millis(
                "IBKR_TRANSIENT_INITIAL_DELAY_MS",
                transient_defaults.initial_delay,
            )?,
            max_delay: env.duration_secs(
                "IBKR_TRANSIENT_MAX_DELAY_SECS",
                transient_defaults.max_delay,
            )?,
            statuses: env.status_list("IBKR_TRANSIENT_STATUSES", transient_defaults.statuses)?,
        };

        let auth_defaults = AuthRetrySettings::default();
        let auth = AuthRetrySettings {
            max_attempts: env.u32("IBKR_AUTH_MAX_ATTEMPTS", auth_defaults.max_attempts)?,
            initial_delay: env.duration_secs(
                "IBKR_AUTH_INITIAL_DELAY_SECS",
                auth_defaults.initial_delay,
            )?,
            retry_delay: env
                .duration_secs("IBKR_AUTH_RETRY_DELAY_SECS", auth_defaults.retry_delay)?,
        };

        let pacing = match env.get("IBKR_PACING_SCOPE") {
            Some(value) => PacingScope::parse(&value).ok_or_else(|| ConfigError::InvalidValue {
                key: "IBKR_PACING_SCOPE".to_string(),
                value,
            })?,
            None => PacingScope::default(),
        };

        Ok(Self {
            connection,
            retry: RetrySettings { transient, auth },
            pacing,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable could not be parsed.
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
    },
    /// Configuration values are inconsistent.
    #[error("config validation failed: {0}")]
    Validation(String),
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.get(key)
            .map(|value| {
                value
                    .trim()
                    .parse::<T>()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: key.to_string(),
                        value,
                    })
            })
            .transpose()
    }

    fn u32(&self, key: &str, default: u32) -> Result<u32, ConfigError> {
        Ok(self.parsed(key)?.unwrap_or(default))
    }

    fn duration_secs(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        Ok(self.parsed::<u64>(key)?.map_or(default, Duration::from_secs))
    }

    fn duration_millis(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        Ok(self
            .parsed::<u64>(key)?
            .map_or(default, Duration::from_millis))
    }

    fn bool(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => match value.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value,
                }),
            },
        }
    }

    fn status_list(&self, key: &str, default: Vec<u16>) -> Result<Vec<u16>, ConfigError> {
        let Some(value) = self.get(key) else {
            return Ok(default);
        };
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_gateway_schedules() {
        let config = GatewayConfig::new("https://localhost:5000/v1/api");
        assert_eq!(config.connection.keep_alive_interval, Duration::from_secs(60));
        assert_eq!(config.connection.tls, TlsVerification::Verify);
        assert_eq!(config.retry.transient.max_attempts, 3);
        assert_eq!(config.retry.transient.initial_delay, Duration::from_secs(1));
        assert_eq!(config.retry.transient.max_delay, Duration::from_secs(60));
        assert_eq!(config.retry.transient.statuses, vec![429, 502, 503, 504]);
        assert_eq!(config.retry.auth.max_attempts, 12);
        assert_eq!(config.retry.auth.initial_delay, Duration::from_secs(60));
        assert_eq!(config.retry.auth.retry_delay, Duration::from_secs(300));
        assert_eq!(config.pacing, PacingScope::Global);
    }

    #[test]
    fn serializes_for_logging_and_reads_back() {
        let config = GatewayConfig::new("https://localhost:5000/v1/api")
            .with_pacing(PacingScope::PerEndpoint);

        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["pacing"], "per-endpoint");
        assert_eq!(value["connection"]["tls"], "verify");
        assert_eq!(value["retry"]["auth"]["max_attempts"], 12);

        let parsed: GatewayConfig = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn missing_retry_and_pacing_fall_back_to_defaults() {
        let connection =
            serde_json::to_value(ConnectionSettings::new("https://localhost:5000/v1/api")).unwrap();

        let parsed: GatewayConfig =
            serde_json::from_value(serde_json::json!({ "connection": connection })).unwrap();

        assert_eq!(parsed.retry, RetrySettings::default());
        assert_eq!(parsed.pacing, PacingScope::Global);
    }

    #[test]
    fn from_lookup_requires_base_url() {
        let err = GatewayConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "IBKR_BASE_URL"));
    }

    #[test]
    fn from_lookup_reads_overrides() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("IBKR_BASE_URL", "https://192.168.178.118:5010/v1/api/"),
            ("IBKR_KEEP_ALIVE_SECS", "45"),
            ("IBKR_ACCEPT_INVALID_CERTS", "true"),
            ("IBKR_TRANSIENT_STATUSES", "429, 503"),
            ("IBKR_TRANSIENT_INITIAL_DELAY_MS", "250"),
            ("IBKR_AUTH_MAX_ATTEMPTS", "2"),
            ("IBKR_PACING_SCOPE", "per-endpoint"),
        ]))
        .unwrap();

        assert_eq!(
            config.connection.normalized_base_url(),
            "https://192.168.178.118:5010/v1/api"
        );
        assert_eq!(config.connection.keep_alive_interval, Duration::from_secs(45));
        assert!(config.connection.tls.accepts_invalid_certs());
        assert_eq!(config.retry.transient.statuses, vec![429, 503]);
        assert_eq!(
            config.retry.transient.initial_delay,
            Duration::from_millis(250)
        );
        assert_eq!(config.retry.auth.max_attempts, 2);
        assert_eq!(config.pacing, PacingScope::PerEndpoint);
    }

    #[test]
    fn from_lookup_rejects_garbage() {
        let err = GatewayConfig::from_lookup(lookup(&[
            ("IBKR_BASE_URL", "https://localhost:5000/v1/api"),
            ("IBKR_TRANSIENT_STATUSES", "429,abc"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "IBKR_TRANSIENT_STATUSES"));

        let err = GatewayConfig::from_lookup(lookup(&[
            ("IBKR_BASE_URL", "https://localhost:5000/v1/api"),
            ("IBKR_ACCEPT_INVALID_CERTS", "maybe"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn pacing_scope_parsing() {
        assert_eq!(PacingScope::parse("GLOBAL"), Some(PacingScope::Global));
        assert_eq!(
            PacingScope::parse("per_endpoint"),
            Some(PacingScope::PerEndpoint)
        );
        assert_eq!(PacingScope::parse("sometimes"), None);
    }

    #[test]
    fn tls_policy_is_explicit() {
        assert_eq!(TlsVerification::default(), TlsVerification::Verify);
        assert!(TlsVerification::from_accept_invalid(true).accepts_invalid_certs());
    }
}

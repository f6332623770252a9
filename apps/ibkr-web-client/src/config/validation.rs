//! Configuration validation at startup.

use std::time::Duration;

use super::{ConfigError, GatewayConfig};

/// Result of configuration validation.
#[derive(Debug)]
pub struct StartupValidation {
    /// Warning messages (non-fatal).
    pub warnings: Vec<String>,
}

impl StartupValidation {
    /// Whether any warnings were produced.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Validate a configuration before building a client.
///
/// Hard errors:
/// - base URL is not `http://` or `https://`
/// - zero keep-alive interval or request timeout
/// - backoff ceilings below their initial values
/// - a transient status below 400, or 401 listed as transient
///
/// Warnings:
/// - certificate verification disabled
/// - a plain `http://` base URL
pub fn validate_config(config: &GatewayConfig) -> Result<StartupValidation, ConfigError> {
    let mut warnings = Vec::new();
    let connection = &config.connection;
    let base_url = connection.normalized_base_url();

    if let Some(rest) = base_url.strip_prefix("http://") {
        warnings.push(format!("gateway base URL is not TLS protected: http://{rest}"));
    } else if !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "base URL must start with http:// or https://, got '{base_url}'"
        )));
    }

    if connection.keep_alive_interval == Duration::ZERO {
        return Err(ConfigError::Validation(
            "keep-alive interval must be greater than zero".to_string(),
        ));
    }

    if connection.request_timeout == Duration::ZERO {
        return Err(ConfigError::Validation(
            "request timeout must be greater than zero".to_string(),
        ));
    }

    if connection.reconnect_max_backoff < connection.reconnect_initial_backoff {
        return Err(ConfigError::Validation(format!(
            "reconnect max backoff ({:?}) is below the initial backoff ({:?})",
            connection.reconnect_max_backoff, connection.reconnect_initial_backoff
        )));
    }

    let transient = &config.retry.transient;
    if transient.max_delay < transient.initial_delay {
        return Err(ConfigError::Validation(format!(
            "transient max delay ({:?}) is below the initial delay ({:?})",
            transient.max_delay, transient.initial_delay
        )));
    }

    if let Some(status) = transient.statuses.iter().find(|s| **s < 400) {
        return Err(ConfigError::Validation(format!(
            "transient status {status} is not an error status"
        )));
    }

    if transient.statuses.contains(&401) {
        return Err(ConfigError::Validation(
            "401 is handled by the auth-expiry schedule and cannot be transient".to_string(),
        ));
    }

    if connection.tls.accepts_invalid_certs() {
        warnings.push("TLS certificate verification is disabled".to_string());
    }

    Ok(StartupValidation { warnings })
}

impl GatewayConfig {
    /// Check this configuration, see [`validate_config`].
    pub fn validate(&self) -> Result<StartupValidation, ConfigError> {
        validate_config(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionSettings, TlsVerification};

    #[test]
    fn default_config_is_valid() {
        let config = GatewayConfig::new("https://localhost:5000/v1/api");
        let result = config.validate().unwrap();
        assert!(!result.has_warnings());
    }

    #[test]
    fn rejects_unknown_scheme() {
        let config = GatewayConfig::new("localhost:5000/v1/api");
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn warns_on_plain_http_and_disabled_verification() {
        let config = GatewayConfig::new("http://localhost:5000/v1/api").with_connection(
            ConnectionSettings::new("http://localhost:5000/v1/api")
                .with_tls(TlsVerification::AcceptInvalidCerts),
        );
        let result = validate_config(&config).unwrap();
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn rejects_401_as_transient() {
        let mut config = GatewayConfig::new("https://localhost:5000/v1/api");
        config.retry.transient.statuses.push(401);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_inverted_backoff() {
        let config = GatewayConfig::new("https://localhost:5000/v1/api").with_connection(
            ConnectionSettings::new("https://localhost:5000/v1/api")
                .with_reconnect_backoff(Duration::from_secs(10), Duration::from_secs(1)),
        );
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_zero_keep_alive() {
        let config = GatewayConfig::new("https://localhost:5000/v1/api").with_connection(
            ConnectionSettings::new("https://localhost:5000/v1/api")
                .with_keep_alive_interval(Duration::ZERO),
        );
        assert!(validate_config(&config).is_err());
    }
}

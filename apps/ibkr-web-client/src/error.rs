//! Gateway error taxonomy.
//!
//! | Variant | Retried | Cause |
//! |---------|---------|-------|
//! | `UnknownEndpoint` | never | logical name missing from the registry |
//! | `MissingPathParameter` | never | template placeholder without a value |
//! | `NotConnected` | never | dispatch with no active session |
//! | `TransportFailure` | never (forces reconnect) | connection reset, timeout, DNS |
//! | `AuthExpired` | up to the auth budget | HTTP 401 |
//! | `TransientUpstream` | up to the transient budget | HTTP 429/502/503/504 |
//! | `Fatal` | never | any other HTTP 4xx/5xx |

use thiserror::Error;

/// Errors surfaced by the gateway client.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The logical endpoint name is not registered.
    #[error("unknown endpoint: {name}")]
    UnknownEndpoint {
        /// Requested endpoint name.
        name: String,
    },

    /// A `{placeholder}` in the path template had no supplied value.
    #[error("endpoint {endpoint} requires path parameter '{parameter}'")]
    MissingPathParameter {
        /// Endpoint whose template was being resolved.
        endpoint: String,
        /// Name of the missing placeholder.
        parameter: String,
    },

    /// No session is open.
    #[error("not connected to the gateway")]
    NotConnected,

    /// The transport failed before a status code was received.
    #[error("transport failure on {endpoint}: {source}")]
    TransportFailure {
        /// Endpoint being dispatched.
        endpoint: String,
        /// Underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },

    /// The session stayed unauthenticated after the auth-expiry retry budget.
    #[error("session expired on {endpoint} after {attempts} attempts: {status} - {body}")]
    AuthExpired {
        /// Endpoint being dispatched.
        endpoint: String,
        /// Last HTTP status.
        status: u16,
        /// Last response body.
        body: String,
        /// Total number of requests sent.
        attempts: u32,
    },

    /// The upstream kept failing transiently after the retry budget.
    #[error("upstream unavailable on {endpoint} after {attempts} attempts: {status} - {body}")]
    TransientUpstream {
        /// Endpoint being dispatched.
        endpoint: String,
        /// Last HTTP status.
        status: u16,
        /// Last response body.
        body: String,
        /// Total number of requests sent.
        attempts: u32,
    },

    /// Non-retryable HTTP error.
    #[error("request to {endpoint} failed: {status} - {body}")]
    Fatal {
        /// Endpoint being dispatched.
        endpoint: String,
        /// HTTP status.
        status: u16,
        /// Response body.
        body: String,
        /// Total number of requests sent.
        attempts: u32,
    },

    /// A success response carried a body that is not JSON.
    #[error("invalid JSON from {endpoint}: {source}")]
    InvalidResponse {
        /// Endpoint being dispatched.
        endpoint: String,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },

    /// The HTTP client for a new session could not be built.
    #[error("failed to open gateway session: {0}")]
    SessionSetup(#[source] reqwest::Error),
}

impl GatewayError {
    /// Short machine-readable label, used for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnknownEndpoint { .. } => "unknown_endpoint",
            Self::MissingPathParameter { .. } => "missing_path_parameter",
            Self::NotConnected => "not_connected",
            Self::TransportFailure { .. } => "transport_failure",
            Self::AuthExpired { .. } => "auth_expired",
            Self::TransientUpstream { .. } => "transient_upstream",
            Self::Fatal { .. } => "fatal",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::SessionSetup(_) => "session_setup",
        }
    }

    /// HTTP status carried by the error, if the gateway answered at all.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::AuthExpired { status, .. }
            | Self::TransientUpstream { status, .. }
            | Self::Fatal { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this error means the session was lost at the transport level.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::TransportFailure { .. })
    }

    /// Whether the session is gone and a reconnect can recover.
    #[must_use]
    pub const fn is_session_lost(&self) -> bool {
        matches!(self, Self::TransportFailure { .. } | Self::NotConnected)
    }

    /// Whether this error is a caller bug rather than a gateway condition.
    #[must_use]
    pub const fn is_programming_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownEndpoint { .. } | Self::MissingPathParameter { .. }
        )
    }
}

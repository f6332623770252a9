// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::unreadable_literal
    )
)]

//! IBKR Web Client - Client Portal gateway SDK
//!
//! Async client for the Interactive Brokers Client Portal gateway REST API.
//!
//! # Architecture
//!
//! - **Gateway**: the dispatch engine
//!   - `endpoints`: named endpoint table with path templates and rate limits
//!   - `retry`: status classification and per-class retry schedules
//!   - `pacer`: minimum spacing between requests
//!   - `connection`: session lifecycle and reconnect backoff
//!   - `client`: `GatewayClient`, dispatch loop and keep-alive
//!
//! - **Application**: `GatewayPort`, the seam the wrappers depend on
//!
//! - **Api**: portfolio, market data and contract search wrappers
//!
//! - **Config / Observability / Telemetry**: environment configuration,
//!   Prometheus metrics and tracing setup
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use ibkr_web_client::{GatewayClient, GatewayConfig};
//! use ibkr_web_client::api::PortfolioApi;
//!
//! let client = GatewayClient::new(GatewayConfig::from_env()?);
//! let session = Arc::new(client.connect_scoped().await?);
//! let accounts = PortfolioApi::new(session).portfolio_accounts().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Domain wrappers: portfolio, market data, contract search.
pub mod api;

/// Application layer - port definitions.
pub mod application;

/// Configuration loading and validation.
pub mod config;

/// Error taxonomy.
pub mod error;

/// Request dispatch, pacing, retries and session management.
pub mod gateway;

/// Prometheus metrics.
pub mod observability;

/// Tracing and OpenTelemetry setup.
pub mod telemetry;

pub use application::ports::GatewayPort;
pub use config::{ConfigError, GatewayConfig, PacingScope, TlsVerification};
pub use error::GatewayError;
pub use gateway::{
    ApiRequest, ConnectedSession, ConnectionState, GatewayClient, GatewayClientBuilder,
    GatewayObserver, NoopObserver, TracingObserver,
};

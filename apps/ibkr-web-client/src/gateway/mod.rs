//! Gateway Module
//!
//! The resilient request-dispatch engine: endpoint registry, retry policy,
//! rate pacer, connection manager and the dispatching client.
//!
//! # Request lifecycle
//!
//! ```text
//! Building ─▶ Pacing ─▶ Sent ─┬─▶ Resolved
//!                ▲            ├─▶ Retrying ─┐
//!                └────────────┼─────────────┘
//!                             └─▶ Failed
//! ```

mod backoff;
mod client;
mod connection;
mod endpoints;
mod observer;
mod pacer;
mod request;
mod retry;

pub use backoff::ReconnectBackoff;
pub use client::{ConnectedSession, GatewayClient, GatewayClientBuilder};
pub use connection::{Admission, ConnectionManager, ConnectionState, SessionHandle};
pub use endpoints::{
    DEFAULT_RATE_LIMIT, EndpointDescriptor, EndpointRegistry, EndpointRegistryBuilder,
    MAX_MIN_INTERVAL, names,
};
pub use observer::{GatewayObserver, NoopObserver, TracingObserver};
pub use pacer::RatePacer;
pub use request::ApiRequest;
pub use retry::{AUTH_EXPIRED_STATUS, RetryClass, RetryClassParams, RetryPolicy};

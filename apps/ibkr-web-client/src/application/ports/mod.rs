//! Application Ports
//!
//! - **Driven Ports** (Secondary/Outbound): how the wrappers use the gateway

mod gateway_port;

#[cfg(test)]
pub use gateway_port::MockGatewayPort;
pub use gateway_port::GatewayPort;

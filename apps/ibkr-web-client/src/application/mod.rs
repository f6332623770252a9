//! Application Layer
//!
//! Ports through which the domain wrappers reach the gateway.

pub mod ports;

pub use ports::*;

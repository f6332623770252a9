//! Configuration Module
//!
//! Client configuration: session settings, retry schedules, pacing scope,
//! environment loading and validation.

mod settings;
mod validation;

pub use settings::{
    AuthRetrySettings, ConfigError, ConnectionSettings, GatewayConfig, PacingScope,
    RetrySettings, TlsVerification, TransientRetrySettings,
};
pub use validation::{StartupValidation, validate_config};

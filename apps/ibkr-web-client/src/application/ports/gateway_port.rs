//! Gateway Port (Driven Port)
//!
//! The single dispatch entry point used by the domain wrappers. Pacing,
//! retries and session handling live behind it.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::GatewayError;
use crate::gateway::{ApiRequest, ConnectedSession, GatewayClient};

/// Port for sending requests to the gateway.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GatewayPort: Send + Sync {
    /// Dispatch a request and return its JSON body.
    async fn dispatch(&self, request: ApiRequest) -> Result<Value, GatewayError>;
}

#[async_trait]
impl GatewayPort for GatewayClient {
    async fn dispatch(&self, request: ApiRequest) -> Result<Value, GatewayError> {
        Self::dispatch(self, request).await
    }
}

#[async_trait]
impl GatewayPort for ConnectedSession {
    async fn dispatch(&self, request: ApiRequest) -> Result<Value, GatewayError> {
        self.client().dispatch(request).await
    }
}

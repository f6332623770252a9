//! Portfolio endpoints.

use std::sync::Arc;

use serde_json::Value;

use crate::application::ports::GatewayPort;
use crate::error::GatewayError;
use crate::gateway::{ApiRequest, names};

/// Account and portfolio queries.
#[derive(Debug, Clone)]
pub struct PortfolioApi<G: GatewayPort> {
    gateway: Arc<G>,
}

impl<G: GatewayPort> PortfolioApi<G> {
    /// Create the wrapper over a gateway port.
    pub const fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    /// Summary of an account (balances, margin, buying power).
    pub async fn account_summary(&self, account_id: &str) -> Result<Value, GatewayError> {
        self.gateway
            .dispatch(ApiRequest::get(names::ACCOUNT_SUMMARY).path_param("accountId", account_id))
            .await
    }

    /// Accounts visible to the session.
    pub async fn portfolio_accounts(&self) -> Result<Value, GatewayError> {
        self.gateway
            .dispatch(ApiRequest::get(names::PORTFOLIO_ACCOUNTS))
            .await
    }
}

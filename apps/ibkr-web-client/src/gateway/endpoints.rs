//! Endpoint registry: logical operation name → path template + pacing ceiling.
//!
//! The registry is built once and never mutated, so lookups need no locking.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::GatewayError;

/// Ceiling applied to gateway endpoints that publish no explicit limit.
pub const DEFAULT_RATE_LIMIT: f64 = 10.0;

/// Longest spacing a ceiling can impose (30 years).
///
/// Ceilings so small that `1 / rps` exceeds this are clamped to it.
pub const MAX_MIN_INTERVAL: Duration = Duration::from_secs(30 * 365 * 86_400);

/// Logical endpoint names of the default registry.
pub mod names {
    /// Session keep-alive.
    pub const TICKLE: &str = "tickle";
    /// Account summary, `{accountId}`.
    pub const ACCOUNT_SUMMARY: &str = "account_summary";
    /// Portfolio accounts.
    pub const PORTFOLIO_ACCOUNTS: &str = "portfolio_accounts";
    /// Historical market data bars.
    pub const HISTORICAL_DATA: &str = "historical_data";
    /// Contract search by symbol.
    pub const CONTRACT_SEARCH: &str = "contract_search";
    /// Stock information by symbols.
    pub const STOCK_INFO: &str = "stock_info";
    /// Contract details, `{conid}`.
    pub const CONTRACT_DETAILS: &str = "contract_details";
    /// Quick contract info, `{conid}`.
    pub const CONTRACT_INFO: &str = "contract_info";
    /// Trading rules for a contract.
    pub const CONTRACT_RULES: &str = "contract_rules";
    /// Security definition by conid.
    pub const SECDEF: &str = "secdef";
    /// Derivative security definition info.
    pub const SECDEF_INFO: &str = "secdef_info";
    /// All contracts on an exchange.
    pub const ALL_CONIDS: &str = "all_conids";
    /// Option strikes for an underlying and month.
    pub const STRIKES: &str = "strikes";
}

/// Path template and request-rate ceiling of one logical endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointDescriptor {
    path_template: String,
    rate_limit: Option<f64>,
}

impl EndpointDescriptor {
    /// Create a descriptor. A `None` or non-positive ceiling means unconstrained.
    #[must_use]
    pub fn new(path_template: impl Into<String>, rate_limit: Option<f64>) -> Self {
        Self {
            path_template: path_template.into(),
            rate_limit,
        }
    }

    /// Path template, possibly containing `{name}` placeholders.
    #[must_use]
    pub fn path_template(&self) -> &str {
        &self.path_template
    }

    /// Requests-per-second ceiling, if any.
    #[must_use]
    pub const fn rate_limit(&self) -> Option<f64> {
        self.rate_limit
    }

    /// Minimum spacing between two requests to this endpoint.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        match self.rate_limit {
            Some(rps) if rps.is_finite() && rps > 0.0 => Duration::try_from_secs_f64(1.0 / rps)
                .map_or(MAX_MIN_INTERVAL, |interval| interval.min(MAX_MIN_INTERVAL)),
            _ => Duration::ZERO,
        }
    }
}

/// Immutable name → descriptor table.
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    endpoints: HashMap<String, EndpointDescriptor>,
}

impl EndpointRegistry {
    /// Start an empty registry builder.
    #[must_use]
    pub fn builder() -> EndpointRegistryBuilder {
        EndpointRegistryBuilder::default()
    }

    /// Client Portal endpoints used by the bundled wrappers.
    #[must_use]
    pub fn ibkr_default() -> Self {
        let default = Some(DEFAULT_RATE_LIMIT);
        Self::builder()
            .endpoint(names::TICKLE, "/tickle", Some(1.0))
            .endpoint(
                names::ACCOUNT_SUMMARY,
                "/portfolio/{accountId}/summary",
                Some(5.0),
            )
            .endpoint(names::PORTFOLIO_ACCOUNTS, "/portfolio/accounts", default)
            .endpoint(
                names::HISTORICAL_DATA,
                "/iserver/marketdata/history",
                Some(5.0),
            )
            .endpoint(names::CONTRACT_SEARCH, "/iserver/secdef/search", default)
            .endpoint(names::STOCK_INFO, "/trsrv/stocks", default)
            .endpoint(
                names::CONTRACT_DETAILS,
                "/iserver/contract/{conid}/info",
                default,
            )
            .endpoint(
                names::CONTRACT_INFO,
                "/iserver/contract/{conid}/info-quick",
                default,
            )
            .endpoint(names::CONTRACT_RULES, "/iserver/contract/rules", default)
            .endpoint(names::SECDEF, "/trsrv/secdef", default)
            .endpoint(names::SECDEF_INFO, "/iserver/secdef/info", default)
            .endpoint(names::ALL_CONIDS, "/trsrv/all-conids", default)
            .endpoint(names::STRIKES, "/iserver/secdef/strikes", default)
            .build()
    }

    /// Look up a descriptor by logical name.
    pub fn resolve(&self, name: &str) -> Result<&EndpointDescriptor, GatewayError> {
        self.endpoints
            .get(name)
            .ok_or_else(|| GatewayError::UnknownEndpoint {
                name: name.to_string(),
            })
    }

    /// Whether a logical name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.endpoints.contains_key(name)
    }

    /// Number of registered endpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// Builder for [`EndpointRegistry`].
#[derive(Debug, Default)]
pub struct EndpointRegistryBuilder {
    endpoints: HashMap<String, EndpointDescriptor>,
}

impl EndpointRegistryBuilder {
    /// Register (or replace) an endpoint.
    #[must_use]
    pub fn endpoint(
        mut self,
        name: impl Into<String>,
        path_template: impl Into<String>,
        rate_limit: Option<f64>,
    ) -> Self {
        self.endpoints.insert(
            name.into(),
            EndpointDescriptor::new(path_template, rate_limit),
        );
        self
    }

    /// Freeze the table.
    #[must_use]
    pub fn build(self) -> EndpointRegistry {
        EndpointRegistry {
            endpoints: self.endpoints,
        }
    }
}

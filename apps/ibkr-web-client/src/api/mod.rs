//! Domain wrappers over the gateway port.
//!
//! Wrappers only build requests; pacing, retries and session handling are the
//! dispatcher's job. Responses are returned as untyped JSON.

mod contract_search;
mod market_data;
mod portfolio;

pub use contract_search::{AssetClass, ContractSearchApi, SecdefInfoQuery};
pub use market_data::{
    BarSize, HistoricalDataQuery, MarketDataApi, PeriodUnit, START_TIME_FORMAT, TimePeriod,
};
pub use portfolio::PortfolioApi;

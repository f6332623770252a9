//! Contract lookup: search, security definitions, rules and strikes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::application::ports::GatewayPort;
use crate::error::GatewayError;
use crate::gateway::{ApiRequest, names};

/// Security type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetClass {
    /// Stock or ETF.
    Stk,
    /// Option.
    Opt,
    /// Future.
    Fut,
    /// Index.
    Ind,
    /// Futures option.
    Fop,
    /// Forex pair.
    Cash,
    /// Combo.
    Bag,
    /// Warrant.
    War,
    /// Bond.
    Bnd,
    /// Mutual fund.
    Fnd,
    /// Inter-commodity spread.
    Ics,
    /// Contract for difference.
    Cfd,
    /// Forex swap.
    Swp,
}

impl AssetClass {
    /// Gateway representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stk => "STK",
            Self::Opt => "OPT",
            Self::Fut => "FUT",
            Self::Ind => "IND",
            Self::Fop => "FOP",
            Self::Cash => "CASH",
            Self::Bag => "BAG",
            Self::War => "WAR",
            Self::Bnd => "BND",
            Self::Fnd => "FND",
            Self::Ics => "ICS",
            Self::Cfd => "CFD",
            Self::Swp => "SWP",
        }
    }
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derivative contract to validate with [`ContractSearchApi::secdef_info`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SecdefInfoQuery {
    /// Underlying contract.
    pub conid: i64,
    /// Security type, e.g. `OPT`.
    pub sec_type: Option<AssetClass>,
    /// Expiration month, e.g. `JAN25`.
    pub month: Option<String>,
    /// Strike price.
    pub strike: Option<f64>,
    /// `C` or `P`.
    pub right: Option<String>,
}

impl SecdefInfoQuery {
    fn to_request(&self) -> ApiRequest {
        ApiRequest::get(names::SECDEF_INFO)
            .query("conid", self.conid)
            .query_opt("secType", self.sec_type)
            .query_opt("month", self.month.as_deref())
            .query_opt("strike", self.strike)
            .query_opt("right", self.right.as_deref())
    }
}

/// Contract search and definition queries.
#[derive(Debug, Clone)]
pub struct ContractSearchApi<G: GatewayPort> {
    gateway: Arc<G>,
}

impl<G: GatewayPort> ContractSearchApi<G> {
    /// Create the wrapper over a gateway port.
    pub const fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    /// Search stock contracts by symbol or company name.
    pub async fn search_contract(&self, symbol: &str) -> Result<Value, GatewayError> {
        self.gateway
            .dispatch(
                ApiRequest::get(names::CONTRACT_SEARCH)
                    .query("symbol", symbol)
                    .query("name", true)
                    .query("secType", AssetClass::Stk),
            )
            .await
    }

    /// Stock listings for comma-separated symbols, keyed by symbol.
    pub async fn stock_info(&self, symbols: &str) -> Result<Value, GatewayError> {
        self.gateway
            .dispatch(ApiRequest::get(names::STOCK_INFO).query("symbols", symbols))
            .await
    }

    /// Full contract details.
    pub async fn contract_details(&self, conid: i64) -> Result<Value, GatewayError> {
        self.gateway
            .dispatch(ApiRequest::get(names::CONTRACT_DETAILS).path_param("conid", conid))
            .await
    }

    /// Abbreviated contract info.
    pub async fn contract_info(&self, conid: i64) -> Result<Value, GatewayError> {
        self.gateway
            .dispatch(ApiRequest::get(names::CONTRACT_INFO).path_param("conid", conid))
            .await
    }

    /// Trading rules for one side of a contract.
    pub async fn contract_rules(&self, conid: i64, is_buy: bool) -> Result<Value, GatewayError> {
        self.gateway
            .dispatch(
                ApiRequest::post(names::CONTRACT_RULES)
                    .json(json!({ "conid": conid, "isBuy": is_buy })),
            )
            .await
    }

    /// Security definition.
    pub async fn secdef(&self, conid: i64) -> Result<Value, GatewayError> {
        self.gateway
            .dispatch(ApiRequest::get(names::SECDEF).query("conids", conid))
            .await
    }

    /// Validate a derivative contract.
    pub async fn secdef_info(&self, query: &SecdefInfoQuery) -> Result<Value, GatewayError> {
        self.gateway.dispatch(query.to_request()).await
    }

    /// Every contract listed on an exchange.
    ///
    /// Always an array: a single-object response is wrapped.
    pub async fn all_conids(&self, exchange: &str) -> Result<Vec<Value>, GatewayError> {
        let response = self
            .gateway
            .dispatch(ApiRequest::get(names::ALL_CONIDS).query("exchange", exchange))
            .await?;
        Ok(match response {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        })
    }

    /// Strikes for an underlying and expiration month.
    pub async fn strikes(
        &self,
        conid: i64,
        sec_type: AssetClass,
        month: &str,
    ) -> Result<Value, GatewayError> {
        self.gateway
            .dispatch(
                ApiRequest::get(names::STRIKES)
                    .query("conid", conid)
                    .query("secType", sec_type)
                    .query("month", month),
            )
            .await
    }

    /// Conid of a stock on an exchange, if listed there.
    ///
    /// Picks the first `STK` contract whose exchange and US flag match.
    pub async fn contract_for_stock(
        &self,
        symbol: &str,
        exchange: &str,
        is_us: bool,
    ) -> Result<Option<i64>, GatewayError> {
        let info = self.stock_info(symbol).await?;
        Ok(find_stock_conid(&info, symbol, exchange, is_us))
    }
}

fn find_stock_conid(info: &Value, symbol: &str, exchange: &str, is_us: bool) -> Option<i64> {
    info.get(symbol)?
        .as_array()?
        .iter()
        .filter(|stock| stock["assetClass"] == AssetClass::Stk.as_str())
        .filter_map(|stock| stock["contracts"].as_array())
        .flatten()
        .find(|contract| {
            contract["exchange"] == exchange && contract["isUS"].as_bool() == Some(is_us)
        })
        .and_then(|contract| contract["conid"].as_i64())
}

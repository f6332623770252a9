//! Historical market data.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::ports::GatewayPort;
use crate::error::GatewayError;
use crate::gateway::{ApiRequest, names};

/// Format of the `startTime` query parameter.
pub const START_TIME_FORMAT: &str = "%Y%m%d-%H:%M:%S";

/// Width of one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarSize {
    /// 1 minute.
    #[serde(rename = "1min")]
    Min1,
    /// 2 minutes.
    #[serde(rename = "2min")]
    Min2,
    /// 3 minutes.
    #[serde(rename = "3min")]
    Min3,
    /// 5 minutes.
    #[serde(rename = "5min")]
    Min5,
    /// 10 minutes.
    #[serde(rename = "10min")]
    Min10,
    /// 15 minutes.
    #[serde(rename = "15min")]
    Min15,
    /// 30 minutes.
    #[serde(rename = "30min")]
    Min30,
    /// 1 hour.
    #[serde(rename = "1h")]
    Hour1,
    /// 2 hours.
    #[serde(rename = "2h")]
    Hour2,
    /// 3 hours.
    #[serde(rename = "3h")]
    Hour3,
    /// 4 hours.
    #[serde(rename = "4h")]
    Hour4,
    /// 8 hours.
    #[serde(rename = "8h")]
    Hour8,
    /// 1 day.
    #[serde(rename = "1d")]
    Day1,
    /// 1 week.
    #[serde(rename = "1w")]
    Week1,
    /// 1 month.
    #[serde(rename = "1m")]
    Month1,
}

impl BarSize {
    const ALL: [Self; 15] = [
        Self::Min1,
        Self::Min2,
        Self::Min3,
        Self::Min5,
        Self::Min10,
        Self::Min15,
        Self::Min30,
        Self::Hour1,
        Self::Hour2,
        Self::Hour3,
        Self::Hour4,
        Self::Hour8,
        Self::Day1,
        Self::Week1,
        Self::Month1,
    ];

    /// Gateway representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Min1 => "1min",
            Self::Min2 => "2min",
            Self::Min3 => "3min",
            Self::Min5 => "5min",
            Self::Min10 => "10min",
            Self::Min15 => "15min",
            Self::Min30 => "30min",
            Self::Hour1 => "1h",
            Self::Hour2 => "2h",
            Self::Hour3 => "3h",
            Self::Hour4 => "4h",
            Self::Hour8 => "8h",
            Self::Day1 => "1d",
            Self::Week1 => "1w",
            Self::Month1 => "1m",
        }
    }

    /// Parse the gateway representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|bar| bar.as_str() == s)
    }
}

/// Total span of a history request: a count and a unit.
///
/// The gateway accepts `min` (1-30), `h` (1-8), `d`, `w`, `m` and `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimePeriod {
    count: u16,
    unit: PeriodUnit,
}

/// Unit of a [`TimePeriod`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodUnit {
    /// Minutes.
    Minutes,
    /// Hours.
    Hours,
    /// Days.
    Days,
    /// Weeks.
    Weeks,
    /// Months.
    Months,
    /// Years.
    Years,
}

impl PeriodUnit {
    const fn suffix(self) -> &'static str {
        match self {
            Self::Minutes => "min",
            Self::Hours => "h",
            Self::Days => "d",
            Self::Weeks => "w",
            Self::Months => "m",
            Self::Years => "y",
        }
    }

    const fn max_count(self) -> u16 {
        match self {
            Self::Minutes => 30,
            Self::Hours => 8,
            Self::Days => 5,
            Self::Weeks => 4,
            Self::Months => 6,
            Self::Years => 5,
        }
    }
}

impl TimePeriod {
    /// One day.
    pub const DAY: Self = Self {
        count: 1,
        unit: PeriodUnit::Days,
    };
    /// One week (the gateway default).
    pub const WEEK: Self = Self {
        count: 1,
        unit: PeriodUnit::Weeks,
    };
    /// One month.
    pub const MONTH: Self = Self {
        count: 1,
        unit: PeriodUnit::Months,
    };
    /// One year.
    pub const YEAR: Self = Self {
        count: 1,
        unit: PeriodUnit::Years,
    };

    /// Create a period, `None` when the count is outside the unit's range.
    #[must_use]
    pub const fn new(count: u16, unit: PeriodUnit) -> Option<Self> {
        if count == 0 || count > unit.max_count() {
            None
        } else {
            Some(Self { count, unit })
        }
    }

    /// Parse strings like `30min`, `2h`, `1w`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let split = s.find(|c: char| !c.is_ascii_digit())?;
        let (count, suffix) = s.split_at(split);
        let unit = match suffix {
            "min" => PeriodUnit::Minutes,
            "h" => PeriodUnit::Hours,
            "d" => PeriodUnit::Days,
            "w" => PeriodUnit::Weeks,
            "m" => PeriodUnit::Months,
            "y" => PeriodUnit::Years,
            _ => return None,
        };
        Self::new(count.parse().ok()?, unit)
    }
}

impl Default for TimePeriod {
    fn default() -> Self {
        Self::WEEK
    }
}

impl std::fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.count, self.unit.suffix())
    }
}

/// Parameters of a historical data request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricalDataQuery {
    /// Contract identifier.
    pub conid: i64,
    /// Bar width.
    pub bar: BarSize,
    /// Total span.
    pub period: TimePeriod,
    /// Exchange to source data from.
    pub exchange: Option<String>,
    /// Start of the span.
    pub start_time: Option<NaiveDateTime>,
    /// Include bars outside regular trading hours.
    pub outside_rth: bool,
}

impl HistoricalDataQuery {
    /// One week of bars for a contract.
    #[must_use]
    pub fn new(conid: i64, bar: BarSize) -> Self {
        Self {
            conid,
            bar,
            period: TimePeriod::default(),
            exchange: None,
            start_time: None,
            outside_rth: false,
        }
    }

    /// Set the span.
    #[must_use]
    pub const fn with_period(mut self, period: TimePeriod) -> Self {
        self.period = period;
        self
    }

    /// Set the exchange.
    #[must_use]
    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = Some(exchange.into());
        self
    }

    /// Set the start time.
    #[must_use]
    pub const fn with_start_time(mut self, start_time: NaiveDateTime) -> Self {
        self.start_time = Some(start_time);
        self
    }

    /// Include bars outside regular trading hours.
    #[must_use]
    pub const fn with_outside_rth(mut self, outside_rth: bool) -> Self {
        self.outside_rth = outside_rth;
        self
    }

    fn to_request(&self) -> ApiRequest {
        ApiRequest::get(names::HISTORICAL_DATA)
            .query("conid", self.conid)
            .query("bar", self.bar.as_str())
            .query("period", self.period)
            .query("outsideRth", self.outside_rth)
            .query_opt("exchange", self.exchange.as_deref())
            .query_opt(
                "startTime",
                self.start_time
                    .map(|t| t.format(START_TIME_FORMAT).to_string()),
            )
    }
}

/// Market data queries.
#[derive(Debug, Clone)]
pub struct MarketDataApi<G: GatewayPort> {
    gateway: Arc<G>,
}

impl<G: GatewayPort> MarketDataApi<G> {
    /// Create the wrapper over a gateway port.
    pub const fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    /// Historical bars for a contract.
    pub async fn historical_data(&self, query: &HistoricalDataQuery) -> Result<Value, GatewayError> {
        self.gateway.dispatch(query.to_request()).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;
    use crate::application::ports::MockGatewayPort;

    #[test]
    fn bar_size_round_trips_through_gateway_names() {
        assert_eq!(BarSize::parse("1h"), Some(BarSize::Hour1));
        assert_eq!(BarSize::parse("1m"), Some(BarSize::Month1));
        assert_eq!(BarSize::parse("7h"), None);
        assert_eq!(BarSize::Min15.as_str(), "15min");
    }

    #[test]
    fn time_period_bounds() {
        assert_eq!(TimePeriod::parse("29min").unwrap().to_string(), "29min");
        assert_eq!(TimePeriod::parse("5y").unwrap().to_string(), "5y");
        assert_eq!(TimePeriod::parse("9h"), None);
        assert_eq!(TimePeriod::parse("0d"), None);
        assert_eq!(TimePeriod::parse("w"), None);
        assert_eq!(TimePeriod::default().to_string(), "1w");
    }

    #[test]
    fn query_formats_parameters() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let request = HistoricalDataQuery::new(265_598, BarSize::Hour1)
            .with_period(TimePeriod::DAY)
            .with_start_time(start)
            .to_request();

        assert_eq!(request.endpoint(), names::HISTORICAL_DATA);
        assert_eq!(request.query_value("conid"), Some("265598"));
        assert_eq!(request.query_value("bar"), Some("1h"));
        assert_eq!(request.query_value("period"), Some("1d"));
        assert_eq!(request.query_value("outsideRth"), Some("false"));
        assert_eq!(request.query_value("startTime"), Some("20240102-09:30:00"));
        assert_eq!(request.query_value("exchange"), None);
    }

    #[tokio::test]
    async fn historical_data_dispatches_query() {
        let mut gateway = MockGatewayPort::new();
        gateway
            .expect_dispatch()
            .withf(|req| {
                req.query_value("exchange") == Some("NYSE")
                    && req.query_value("outsideRth") == Some("true")
            })
            .times(1)
            .returning(|_| Ok(json!({"symbol": "AAPL", "data": []})));

        let api = MarketDataApi::new(Arc::new(gateway));
        let query = HistoricalDataQuery::new(265_598, BarSize::Day1)
            .with_exchange("NYSE")
            .with_outside_rth(true);
        let data = api.historical_data(&query).await.unwrap();
        assert_eq!(data["symbol"], "AAPL");
    }
}

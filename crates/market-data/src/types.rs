//! Shared types for Market Data

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::MarketDataError;
use crate::Result;

/// Date format used by the provider for daily bars and expirations
pub const PROVIDER_DATE_FORMAT: &str = "%Y%m%d";

/// Option type (Call or Put)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    /// Provider "right" code
    pub fn right(&self) -> &'static str {
        match self {
            OptionType::Call => "C",
            OptionType::Put => "P",
        }
    }
}

/// Inputs for Black-Scholes pricing
#[derive(Debug, Clone, Copy)]
pub struct BSInputs {
    /// Spot price of the underlying
    pub spot: f64,
    /// Strike price
    pub strike: f64,
    /// Time to expiry (in years)
    pub time: f64,
    /// Volatility (as decimal, e.g., 0.2 = 20%)
    pub vol: f64,
    /// Risk-free rate (annualized, decimal)
    pub rate: f64,
    /// Option type
    pub option_type: OptionType,
}

impl BSInputs {
    /// Returns false when σ·√T is zero or any input is non-finite
    pub fn is_priceable(&self) -> bool {
        let finite = [self.spot, self.strike, self.time, self.vol, self.rate]
            .iter()
            .all(|v| v.is_finite());
        finite && self.spot > 0.0 && self.strike > 0.0 && self.vol * self.time.sqrt() > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityType {
    Stock,
    Option,
}

impl SecurityType {
    pub fn code(&self) -> &'static str {
        match self {
            SecurityType::Stock => "STK",
            SecurityType::Option => "OPT",
        }
    }
}

/// Contract description sent with a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub symbol: String,
    pub sec_type: SecurityType,
    pub exchange: String,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub con_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strike: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<OptionType>,
}

impl Contract {
    /// US stock routed through smart routing
    pub fn stock(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            sec_type: SecurityType::Stock,
            exchange: "SMART".to_string(),
            currency: "USD".to_string(),
            con_id: None,
            expiry: None,
            strike: None,
            right: None,
        }
    }

    /// Listed option on a US stock
    pub fn option(symbol: &str, expiry: NaiveDate, strike: f64, right: OptionType) -> Self {
        Self {
            sec_type: SecurityType::Option,
            expiry: Some(expiry),
            strike: Some(strike),
            right: Some(right),
            ..Self::stock(symbol)
        }
    }

    pub fn with_con_id(mut self, con_id: i64) -> Self {
        self.con_id = Some(con_id);
        self
    }
}

/// Contract metadata returned by a contract details lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractMetadata {
    pub symbol: String,
    pub long_name: String,
    pub primary_exchange: String,
    /// Provider's internal instrument identifier
    pub con_id: i64,
}

/// Historical bar. Volatility series reuse this shape: date in `time`,
/// value in `close`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl Bar {
    /// Bar carrying a single dated value
    pub fn sample(time: &str, value: f64) -> Self {
        Self {
            time: time.to_string(),
            open: value,
            high: value,
            low: value,
            close: value,
            volume: 0.0,
        }
    }

    /// Parse the bar's date, ignoring any time-of-day suffix
    pub fn date(&self) -> Result<NaiveDate> {
        parse_provider_date(&self.time)
    }
}

/// Parse a provider date (`yyyyMMdd`, optionally followed by a time)
pub fn parse_provider_date(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    let date_part = trimmed.split_whitespace().next().unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, PROVIDER_DATE_FORMAT).map_err(|e| {
        MarketDataError::InvalidDate {
            value: value.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Price tick field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickField {
    Bid,
    Ask,
    Last,
    Close,
    Mark,
    Other(i32),
}

impl TickField {
    /// Map a provider tick type code. Delayed variants map onto the
    /// real-time field they mirror.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 | 66 => TickField::Bid,
            2 | 67 => TickField::Ask,
            4 | 68 => TickField::Last,
            9 | 75 => TickField::Close,
            37 => TickField::Mark,
            other => TickField::Other(other),
        }
    }

    /// Fields accepted as the underlying's snapshot price
    pub fn is_trade_or_close(&self) -> bool {
        matches!(self, TickField::Last | TickField::Close)
    }
}

/// What a historical data request returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WhatToShow {
    Trades,
    HistoricalVolatility,
    OptionImpliedVolatility,
}

impl WhatToShow {
    pub fn as_str(&self) -> &'static str {
        match self {
            WhatToShow::Trades => "TRADES",
            WhatToShow::HistoricalVolatility => "HISTORICAL_VOLATILITY",
            WhatToShow::OptionImpliedVolatility => "OPTION_IMPLIED_VOLATILITY",
        }
    }
}

/// Parameters of a historical data request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalQuery {
    /// `yyyyMMdd HH:mm:ss`
    pub end_time: String,
    /// e.g. `1 M`, `30 D`
    pub duration: String,
    /// e.g. `1 day`
    pub bar_size: String,
    pub what_to_show: WhatToShow,
    /// Regular trading hours only
    pub use_rth: bool,
}

impl HistoricalQuery {
    /// Daily query ending at today's close
    pub fn ending_on(today: NaiveDate, duration: &str, bar_size: &str, what_to_show: WhatToShow) -> Self {
        Self {
            end_time: format!("{} 16:00:00", today.format(PROVIDER_DATE_FORMAT)),
            duration: duration.to_string(),
            bar_size: bar_size.to_string(),
            what_to_show,
            use_rth: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_parse_provider_date() {
        let date = parse_provider_date("20240315").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());

        let with_time = parse_provider_date("20240315 16:00:00").unwrap();
        assert_eq!(with_time, date);
    }

    #[test]
    fn test_parse_provider_date_malformed() {
        assert_matches!(
            parse_provider_date("2024-13-45"),
            Err(MarketDataError::InvalidDate { .. })
        );
        assert!(parse_provider_date("").is_err());
    }

    #[test]
    fn test_tick_field_codes() {
        assert_eq!(TickField::from_code(4), TickField::Last);
        assert_eq!(TickField::from_code(68), TickField::Last);
        assert_eq!(TickField::from_code(9), TickField::Close);
        assert_eq!(TickField::from_code(1), TickField::Bid);
        assert_eq!(TickField::from_code(14), TickField::Other(14));
        assert!(TickField::Close.is_trade_or_close());
        assert!(!TickField::Bid.is_trade_or_close());
    }

    #[test]
    fn test_option_contract() {
        let expiry = NaiveDate::from_ymd_opt(2024, 4, 19).unwrap();
        let contract = Contract::option("MSFT", expiry, 400.0, OptionType::Call);
        assert_eq!(contract.sec_type.code(), "OPT");
        assert_eq!(contract.exchange, "SMART");
        assert_eq!(contract.right.map(|r| r.right()), Some("C"));
    }

    #[test]
    fn test_historical_query_end_time() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let query = HistoricalQuery::ending_on(today, "30 D", "1 day", WhatToShow::HistoricalVolatility);
        assert_eq!(query.end_time, "20240315 16:00:00");
        assert_eq!(query.what_to_show.as_str(), "HISTORICAL_VOLATILITY");
    }

    #[test]
    fn test_bs_inputs_priceable() {
        let mut inputs = BSInputs {
            spot: 100.0,
            strike: 100.0,
            time: 1.0,
            vol: 0.2,
            rate: 0.05,
            option_type: OptionType::Call,
        };
        assert!(inputs.is_priceable());
        inputs.time = 0.0;
        assert!(!inputs.is_priceable());
    }
}

//! Common types used across SigmaFlow
//!
//! This module provides the fundamental domain types shared by the
//! correlation engine, the providers and the binary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Ticker symbol, the unit of work for a run
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticker(String);

impl Ticker {
    /// Parse a ticker symbol, trimming whitespace and surrounding quotes
    pub fn parse(raw: &str) -> Result<Self> {
        let symbol = raw.trim().trim_matches('"').trim();
        if symbol.is_empty() {
            return Err(Error::invalid_input("empty ticker symbol"));
        }
        if symbol.chars().any(char::is_whitespace) {
            return Err(Error::invalid_input(format!(
                "ticker symbol contains whitespace: {:?}",
                symbol
            )));
        }
        Ok(Self(symbol.to_string()))
    }

    /// Get the symbol as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Ticker {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for Ticker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Correlation token binding an issued request to its callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl RequestId {
    /// Get the raw identifier
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Kind of data a request asks the provider for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Contract lookup for the ticker symbol
    ContractDetails,
    /// Snapshot of the underlying last/close price
    UnderlyingPrice,
    /// Option chain expirations and strikes
    OptionChainParameters,
    /// Daily trade bars
    HistoricalBars,
    /// Daily historical volatility samples
    HistoricalVolatility,
    /// Daily option implied volatility samples
    ImpliedVolatility,
    /// Snapshot of a single option's price
    OptionSnapshotPrice,
}

impl RequestKind {
    /// All request kinds, in pipeline order
    pub const ALL: [RequestKind; 7] = [
        RequestKind::ContractDetails,
        RequestKind::UnderlyingPrice,
        RequestKind::OptionChainParameters,
        RequestKind::HistoricalBars,
        RequestKind::HistoricalVolatility,
        RequestKind::ImpliedVolatility,
        RequestKind::OptionSnapshotPrice,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::ContractDetails => "contract_details",
            RequestKind::UnderlyingPrice => "underlying_price",
            RequestKind::OptionChainParameters => "option_chain_parameters",
            RequestKind::HistoricalBars => "historical_bars",
            RequestKind::HistoricalVolatility => "historical_volatility",
            RequestKind::ImpliedVolatility => "implied_volatility",
            RequestKind::OptionSnapshotPrice => "option_snapshot_price",
        }
    }

    /// Returns true for one-shot requests that must be cancelled after the first value
    pub fn is_snapshot(&self) -> bool {
        matches!(
            self,
            RequestKind::UnderlyingPrice | RequestKind::OptionSnapshotPrice
        )
    }

    /// Returns true for requests answered by a bar stream and an end signal
    pub fn is_historical_series(&self) -> bool {
        matches!(
            self,
            RequestKind::HistoricalBars
                | RequestKind::HistoricalVolatility
                | RequestKind::ImpliedVolatility
        )
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_parse_trims_quotes() {
        let ticker = Ticker::parse(" \"MSFT\" ").unwrap();
        assert_eq!(ticker.as_str(), "MSFT");
    }

    #[test]
    fn test_ticker_parse_rejects_empty() {
        assert!(Ticker::parse("   ").is_err());
        assert!(Ticker::parse("\"\"").is_err());
        assert!("BRK B".parse::<Ticker>().is_err());
    }

    #[test]
    fn test_request_kind_snapshot() {
        assert!(RequestKind::UnderlyingPrice.is_snapshot());
        assert!(RequestKind::OptionSnapshotPrice.is_snapshot());
        assert!(!RequestKind::HistoricalBars.is_snapshot());
        assert!(RequestKind::ImpliedVolatility.is_historical_series());
        assert!(!RequestKind::ContractDetails.is_historical_series());
    }

    #[test]
    fn test_request_kind_serialization() {
        let json = serde_json::to_string(&RequestKind::HistoricalVolatility).unwrap();
        assert_eq!(json, "\"historical_volatility\"");
        assert_eq!(RequestKind::ALL.len(), 7);
    }

    #[test]
    fn test_request_id_display() {
        assert_eq!(RequestId(42).to_string(), "42");
        assert_eq!(RequestId::from(7).value(), 7);
    }
}

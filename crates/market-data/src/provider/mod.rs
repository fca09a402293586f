//! Market data providers
//!
//! Requests go out through the `MarketDataProvider` trait; callbacks come
//! back as `ProviderEvent`s on an unbounded channel drained by the runner.

mod bridge;
mod event;
mod simulated;

pub use bridge::{BridgeConfig, LineBridgeProvider};
pub use event::{is_notice, ProviderEvent, NOTICE_CODES};
pub use simulated::SimulatedProvider;

use common::RequestId;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::types::{Contract, HistoricalQuery};
use crate::Result;

pub type EventSender = mpsc::UnboundedSender<ProviderEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ProviderEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Request side of a market data provider
///
/// Calls never block on the response; results arrive as events tagged with
/// the request id.
pub trait MarketDataProvider: Send + Sync {
    fn request_contract_details(&self, id: RequestId, contract: &Contract) -> Result<()>;

    /// Subscribe to price ticks; a snapshot ends after the first values
    fn request_market_data(&self, id: RequestId, contract: &Contract, snapshot: bool) -> Result<()>;

    fn cancel_market_data(&self, id: RequestId) -> Result<()>;

    fn request_historical_data(&self, id: RequestId, contract: &Contract, query: &HistoricalQuery) -> Result<()>;

    fn request_option_parameters(&self, id: RequestId, symbol: &str, underlying_con_id: i64) -> Result<()>;
}

/// A provider call captured as data, sent once the caller has released
/// its locks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum ProviderRequest {
    ContractDetails {
        id: RequestId,
        contract: Contract,
    },
    MarketData {
        id: RequestId,
        contract: Contract,
        snapshot: bool,
    },
    CancelMarketData {
        id: RequestId,
    },
    HistoricalData {
        id: RequestId,
        contract: Contract,
        query: HistoricalQuery,
    },
    OptionParameters {
        id: RequestId,
        symbol: String,
        underlying_con_id: i64,
    },
}

impl ProviderRequest {
    pub fn id(&self) -> RequestId {
        match self {
            ProviderRequest::ContractDetails { id, .. }
            | ProviderRequest::MarketData { id, .. }
            | ProviderRequest::CancelMarketData { id }
            | ProviderRequest::HistoricalData { id, .. }
            | ProviderRequest::OptionParameters { id, .. } => *id,
        }
    }

    /// Cancellations do not expect any callback
    pub fn is_cancel(&self) -> bool {
        matches!(self, ProviderRequest::CancelMarketData { .. })
    }

    pub fn dispatch(&self, provider: &dyn MarketDataProvider) -> Result<()> {
        match self {
            ProviderRequest::ContractDetails { id, contract } => provider.request_contract_details(*id, contract),
            ProviderRequest::MarketData { id, contract, snapshot } => {
                provider.request_market_data(*id, contract, *snapshot)
            }
            ProviderRequest::CancelMarketData { id } => provider.cancel_market_data(*id),
            ProviderRequest::HistoricalData { id, contract, query } => {
                provider.request_historical_data(*id, contract, query)
            }
            ProviderRequest::OptionParameters {
                id,
                symbol,
                underlying_con_id,
            } => provider.request_option_parameters(*id, symbol, *underlying_con_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingProvider;
    use crate::types::WhatToShow;
    use chrono::NaiveDate;

    #[test]
    fn test_dispatch() {
        let provider = RecordingProvider::default();
        let today = NaiveDate::from_ymd_opt(2024, 3, 13).unwrap();
        let requests = vec![
            ProviderRequest::ContractDetails {
                id: RequestId(1),
                contract: Contract::stock("MSFT"),
            },
            ProviderRequest::MarketData {
                id: RequestId(2),
                contract: Contract::stock("MSFT").with_con_id(272093),
                snapshot: true,
            },
            ProviderRequest::CancelMarketData { id: RequestId(2) },
            ProviderRequest::HistoricalData {
                id: RequestId(3),
                contract: Contract::stock("MSFT"),
                query: HistoricalQuery::ending_on(today, "30 D", "1 day", WhatToShow::OptionImpliedVolatility),
            },
            ProviderRequest::OptionParameters {
                id: RequestId(4),
                symbol: "MSFT".into(),
                underlying_con_id: 272093,
            },
        ];
        for request in &requests {
            request.dispatch(&provider).unwrap();
        }

        assert_eq!(provider.requests(), requests);
        assert!(requests[2].is_cancel());
        assert_eq!(requests[4].id(), RequestId(4));
    }

    #[test]
    fn test_dispatch_error_propagates() {
        let provider = RecordingProvider::default();
        provider.fail();
        let request = ProviderRequest::CancelMarketData { id: RequestId(1) };
        assert!(request.dispatch(&provider).is_err());
    }

    #[test]
    fn test_request_serialization() {
        let request = ProviderRequest::CancelMarketData { id: RequestId(9) };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"request":"cancel_market_data","id":9}"#);
    }
}

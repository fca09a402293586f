//! Test support shared by the session, correlator and runner tests

use common::{RequestId, RequestKind, Ticker};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::MarketDataError;
use crate::provider::{MarketDataProvider, ProviderRequest};
use crate::report::CollectingSink;
use crate::session::{Session, SessionSettings};
use crate::types::{Contract, HistoricalQuery};
use crate::Result;

/// Records every request and never answers
#[derive(Default)]
pub struct RecordingProvider {
    requests: Mutex<Vec<ProviderRequest>>,
    failing: AtomicBool,
}

impl RecordingProvider {
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().clone()
    }

    /// Make every subsequent request fail
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    fn record(&self, request: ProviderRequest) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MarketDataError::Connection("not connected".to_string()));
        }
        self.requests.lock().push(request);
        Ok(())
    }
}

impl MarketDataProvider for RecordingProvider {
    fn request_contract_details(&self, id: RequestId, contract: &Contract) -> Result<()> {
        self.record(ProviderRequest::ContractDetails {
            id,
            contract: contract.clone(),
        })
    }

    fn request_market_data(&self, id: RequestId, contract: &Contract, snapshot: bool) -> Result<()> {
        self.record(ProviderRequest::MarketData {
            id,
            contract: contract.clone(),
            snapshot,
        })
    }

    fn cancel_market_data(&self, id: RequestId) -> Result<()> {
        self.record(ProviderRequest::CancelMarketData { id })
    }

    fn request_historical_data(&self, id: RequestId, contract: &Contract, query: &HistoricalQuery) -> Result<()> {
        self.record(ProviderRequest::HistoricalData {
            id,
            contract: contract.clone(),
            query: query.clone(),
        })
    }

    fn request_option_parameters(&self, id: RequestId, symbol: &str, underlying_con_id: i64) -> Result<()> {
        self.record(ProviderRequest::OptionParameters {
            id,
            symbol: symbol.to_string(),
            underlying_con_id,
        })
    }
}

pub fn ticker(symbol: &str) -> Ticker {
    Ticker::parse(symbol).unwrap()
}

pub fn settings() -> SessionSettings {
    SessionSettings {
        today: chrono::NaiveDate::from_ymd_opt(2024, 3, 13).unwrap(),
        request_option_snapshot: false,
        ..SessionSettings::default()
    }
}

pub struct Harness {
    pub session: Session,
    pub provider: Arc<RecordingProvider>,
    pub sink: Arc<CollectingSink>,
}

pub fn harness(symbols: &[&str], settings: SessionSettings) -> Harness {
    let provider = Arc::new(RecordingProvider::default());
    let sink = Arc::new(CollectingSink::new());
    let session = Session::new(
        symbols.iter().map(|s| ticker(s)).collect(),
        provider.clone(),
        sink.clone(),
        settings,
    );
    Harness {
        session,
        provider,
        sink,
    }
}

/// Id of the live request of `kind` for `ticker`
pub fn live_id(session: &Session, ticker: &Ticker, kind: RequestKind) -> RequestId {
    session
        .registry()
        .pending_for(ticker)
        .into_iter()
        .find(|record| record.kind == kind)
        .map(|record| record.id)
        .unwrap_or_else(|| panic!("no live {} request for {}", kind, ticker))
}

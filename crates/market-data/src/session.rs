//! Correlation session
//!
//! One `Session` per run owns the request registry, every ticker's state and
//! the report aggregator. The ticker map is fixed at construction; each
//! ticker's state sits behind its own lock, so handlers for different
//! tickers never contend. Lock order is always ticker, then registry.

use chrono::{Local, NaiveDate};
use common::{RequestId, RequestKind, Ticker};
use observability::SessionMetrics;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dataset::{TickerOutcome, TickerState};
use crate::error::MarketDataError;
use crate::option_chain::ChainFilter;
use crate::provider::{MarketDataProvider, ProviderRequest};
use crate::registry::RequestRegistry;
use crate::report::{ReportAggregator, ReportSink};
use crate::types::Contract;
use crate::Result;

/// Per-run settings
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub expiry_horizon_months: u32,
    /// Fraction of the underlying price, e.g. 0.2
    pub strike_band: f64,
    pub ticker_timeout: Duration,
    pub risk_free_rate: f64,
    /// Request the ATM call's market price once the option chain is known
    pub request_option_snapshot: bool,
    pub bar_duration: String,
    pub bar_size: String,
    pub volatility_duration: String,
    pub today: NaiveDate,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            expiry_horizon_months: 1,
            strike_band: 0.2,
            ticker_timeout: Duration::from_secs(120),
            risk_free_rate: 0.05,
            request_option_snapshot: true,
            bar_duration: "1 M".to_string(),
            bar_size: "1 day".to_string(),
            volatility_duration: "30 D".to_string(),
            today: Local::now().date_naive(),
        }
    }
}

impl SessionSettings {
    pub fn chain_filter(&self) -> ChainFilter {
        ChainFilter {
            today: self.today,
            horizon_months: self.expiry_horizon_months,
            strike_band: self.strike_band,
        }
    }
}

pub struct Session {
    tickers: Vec<Ticker>,
    states: HashMap<Ticker, Mutex<TickerState>>,
    pub(crate) registry: RequestRegistry,
    pub(crate) aggregator: ReportAggregator,
    pub(crate) provider: Arc<dyn MarketDataProvider>,
    pub(crate) settings: SessionSettings,
    pub(crate) metrics: SessionMetrics,
}

impl Session {
    /// Create a session. Duplicate tickers are collapsed, keeping the first
    /// occurrence's position.
    pub fn new(
        tickers: Vec<Ticker>,
        provider: Arc<dyn MarketDataProvider>,
        sink: Arc<dyn ReportSink>,
        settings: SessionSettings,
    ) -> Self {
        let mut seen = HashSet::new();
        let tickers: Vec<Ticker> = tickers.into_iter().filter(|t| seen.insert(t.clone())).collect();
        let states = tickers
            .iter()
            .map(|t| (t.clone(), Mutex::new(TickerState::default())))
            .collect();
        let metrics = SessionMetrics::new();
        let aggregator = ReportAggregator::new(
            tickers.clone(),
            sink,
            settings.risk_free_rate,
            settings.today,
            metrics.clone(),
        );

        Self {
            tickers,
            states,
            registry: RequestRegistry::new(),
            aggregator,
            provider,
            settings,
            metrics,
        }
    }

    /// Issue the contract lookup for every ticker
    ///
    /// Fails only if no request could be sent at all.
    pub fn start(&self) -> Result<()> {
        info!(tickers = self.tickers.len(), "Starting session");
        let requests: Vec<ProviderRequest> = self
            .tickers
            .iter()
            .map(|ticker| ProviderRequest::ContractDetails {
                id: self.issue(ticker, RequestKind::ContractDetails),
                contract: Contract::stock(ticker.as_str()),
            })
            .collect();

        let failed = self.send(requests);
        if !self.tickers.is_empty() && failed == self.tickers.len() {
            return Err(MarketDataError::Provider(
                "no contract details request could be sent".to_string(),
            ));
        }
        Ok(())
    }

    /// Settle every pending ticker and release its requests. A ticker that
    /// only lacks the ATM quote is reported without it; any other pending
    /// ticker times out. Returns whether the session is finished.
    pub fn expire_incomplete(&self) -> bool {
        let mut cancellations = Vec::new();
        for ticker in &self.tickers {
            let Some(cell) = self.states.get(ticker) else {
                continue;
            };
            let mut state = cell.lock();
            if state.outcome.is_terminal() {
                continue;
            }
            let reported = if state.dataset.is_complete() {
                info!(ticker = %ticker, "No ATM option price before the deadline, reporting without it");
                state.dataset.settle_option_quote();
                self.aggregator.check_completion(ticker, &mut state)
            } else {
                false
            };
            if !reported {
                self.aggregator.mark_timed_out(ticker, &mut state);
            }
            for record in self.registry.pending_for(ticker) {
                warn!(ticker = %ticker, req_id = %record.id, kind = %record.kind, "Request still in flight at deadline");
                if record.kind.is_snapshot() {
                    cancellations.push(ProviderRequest::CancelMarketData { id: record.id });
                }
                self.release(record.id);
            }
        }
        self.send(cancellations);
        self.aggregator.finished().is_cancelled()
    }

    /// Cancel open snapshot subscriptions and release every request
    pub fn cancel_pending(&self) {
        let mut cancellations = Vec::new();
        for ticker in &self.tickers {
            if let Some(cell) = self.states.get(ticker) {
                let _state = cell.lock();
                for record in self.registry.pending_for(ticker) {
                    if record.kind.is_snapshot() {
                        cancellations.push(ProviderRequest::CancelMarketData { id: record.id });
                    }
                    self.release(record.id);
                }
            }
        }
        debug!(cancelled = cancellations.len(), "Released pending requests");
        self.send(cancellations);
    }

    /// Cancelled once every ticker is complete or timed out
    pub fn finished(&self) -> CancellationToken {
        self.aggregator.finished()
    }

    pub fn tickers(&self) -> &[Ticker] {
        &self.tickers
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn registry(&self) -> &RequestRegistry {
        &self.registry
    }

    pub fn aggregator(&self) -> &ReportAggregator {
        &self.aggregator
    }

    pub fn outcome(&self, ticker: &Ticker) -> Result<TickerOutcome> {
        Ok(self.state(ticker)?.lock().outcome)
    }

    /// Run `f` with the ticker's state locked
    pub fn with_state<R>(&self, ticker: &Ticker, f: impl FnOnce(&TickerState) -> R) -> Result<R> {
        let state = self.state(ticker)?.lock();
        Ok(f(&*state))
    }

    pub(crate) fn state(&self, ticker: &Ticker) -> Result<&Mutex<TickerState>> {
        self.states
            .get(ticker)
            .ok_or_else(|| MarketDataError::UnknownTicker(ticker.clone()))
    }

    pub(crate) fn issue(&self, ticker: &Ticker, kind: RequestKind) -> RequestId {
        let id = self.registry.issue(ticker, kind);
        self.metrics.request_issued(kind.as_str());
        debug!(ticker = %ticker, req_id = %id, kind = %kind, "Issued request");
        id
    }

    pub(crate) fn release(&self, id: RequestId) {
        if self.registry.release(id) {
            self.metrics.request_released();
        }
    }

    /// Send requests produced under a ticker lock. A request that cannot be
    /// sent is logged and released. Returns the number of failures.
    pub(crate) fn send(&self, requests: Vec<ProviderRequest>) -> usize {
        let mut failed = 0;
        for request in requests {
            if let Err(e) = request.dispatch(self.provider.as_ref()) {
                failed += 1;
                error!(req_id = %request.id(), error = %e, "Failed to send request");
                if !request.is_cancel() {
                    self.abandon(request.id());
                }
            }
        }
        failed
    }

    /// Release a request that never reached the provider. A lost ATM quote
    /// request stops holding its ticker's report back.
    fn abandon(&self, id: RequestId) {
        let record = self.registry.resolve(id).ok();
        self.release(id);
        let Some(record) = record.filter(|r| r.kind == RequestKind::OptionSnapshotPrice) else {
            return;
        };
        if let Ok(cell) = self.state(&record.ticker) {
            let mut state = cell.lock();
            state.dataset.settle_option_quote();
            self.aggregator.check_completion(&record.ticker, &mut state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{harness, settings, ticker};
    use assert_matches::assert_matches;

    #[test]
    fn test_duplicate_tickers_collapse() {
        let h = harness(&["MSFT", "NVDA", "MSFT"], settings());
        assert_eq!(h.session.tickers(), &[ticker("MSFT"), ticker("NVDA")]);
    }

    #[test]
    fn test_start_issues_contract_details() {
        let h = harness(&["MSFT", "NVDA"], settings());
        h.session.start().unwrap();

        let requests = h.provider.requests();
        assert_eq!(requests.len(), 2);
        assert_matches!(
            &requests[0],
            ProviderRequest::ContractDetails { id: RequestId(1), contract } if contract.symbol == "MSFT"
        );
        assert_eq!(h.session.registry().in_flight(), 2);
    }

    #[test]
    fn test_start_fails_when_provider_is_down() {
        let h = harness(&["MSFT"], settings());
        h.provider.fail();
        assert_matches!(h.session.start(), Err(MarketDataError::Provider(_)));
        assert_eq!(h.session.registry().in_flight(), 0);
    }

    #[test]
    fn test_expire_incomplete() {
        let h = harness(&["MSFT", "NVDA"], settings());
        h.session.start().unwrap();

        assert!(h.session.expire_incomplete());
        assert_eq!(h.session.outcome(&ticker("MSFT")).unwrap(), TickerOutcome::TimedOut);
        assert_eq!(h.session.registry().in_flight(), 0);
        assert_eq!(h.sink.timed_out(), vec![ticker("MSFT"), ticker("NVDA")]);
        assert!(h.sink.emitted_statistics().is_empty());

        // Second call has nothing left to expire
        assert!(h.session.expire_incomplete());
        assert_eq!(h.sink.timed_out().len(), 2);
    }

    #[test]
    fn test_unknown_ticker() {
        let h = harness(&["MSFT"], settings());
        assert_matches!(
            h.session.outcome(&ticker("AAPL")),
            Err(MarketDataError::UnknownTicker(_))
        );
    }

    #[test]
    fn test_empty_session_is_finished() {
        let h = harness(&[], settings());
        h.session.start().unwrap();
        assert!(h.session.finished().is_cancelled());
    }
}

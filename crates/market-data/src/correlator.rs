//! Callback correlation
//!
//! Routes each provider callback to the ticker and request it answers,
//! updates that ticker's state and issues the follow-on requests the
//! pipeline calls for:
//!
//! ```text
//! contract details ─▶ underlying price ─┬▶ option chain ─▶ (ATM option price)
//!                                       ├▶ historical bars
//!                                       ├▶ historical volatility
//!                                       └▶ implied volatility
//! ```
//!
//! Handlers are synchronous. Follow-on requests are collected while the
//! ticker is locked and sent once it is unlocked.

use common::{RequestId, RequestKind, Ticker};
use tracing::{debug, error, info, trace, warn};

use crate::dataset::{AtmOptionQuote, DatedSeries, TickerDataset, TickerState};
use crate::provider::{is_notice, ProviderEvent, ProviderRequest};
use crate::registry::RequestRecord;
use crate::session::Session;
use crate::types::{Bar, Contract, ContractMetadata, HistoricalQuery, OptionType, TickField, WhatToShow};

/// Result of applying one callback to a ticker's state
enum Applied {
    /// State may have changed; send these once the ticker is unlocked
    Updated(Vec<ProviderRequest>),
    /// The callback does not fit the request it resolved to
    Mismatched,
}

fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

fn volatility_series(dataset: &mut TickerDataset, kind: RequestKind) -> Option<&mut DatedSeries> {
    match kind {
        RequestKind::HistoricalVolatility => Some(&mut dataset.historical_volatility),
        RequestKind::ImpliedVolatility => Some(&mut dataset.implied_volatility),
        _ => None,
    }
}

impl Session {
    /// Handle one provider callback
    pub fn handle(&self, event: ProviderEvent) {
        self.metrics.callback_received();

        let Some(id) = event.req_id() else {
            self.handle_unrouted(&event);
            return;
        };
        let name = event.name();

        let ticker = match self.registry.resolve(id) {
            Ok(record) => record.ticker,
            Err(_) => {
                self.drop_callback(id, name, "unknown or released request");
                return;
            }
        };
        let cell = match self.state(&ticker) {
            Ok(cell) => cell,
            Err(e) => {
                warn!(req_id = %id, error = %e, "Request resolved to a ticker outside the session");
                return;
            }
        };

        let follow_ups = {
            let mut state = cell.lock();
            // Another handler may have released the request while we waited for the lock
            let record = match self.registry.resolve(id) {
                Ok(record) => record,
                Err(_) => {
                    self.drop_callback(id, name, "released while waiting");
                    return;
                }
            };
            match self.apply(&record, &mut state, event) {
                Applied::Updated(requests) => {
                    self.aggregator.check_completion(&record.ticker, &mut state);
                    requests
                }
                Applied::Mismatched => {
                    self.drop_callback(id, name, record.kind.as_str());
                    return;
                }
            }
        };

        self.send(follow_ups);
    }

    fn handle_unrouted(&self, event: &ProviderEvent) {
        match event {
            ProviderEvent::Error { code, message, .. } if is_notice(*code) => {
                info!(code, %message, "Provider notice");
            }
            ProviderEvent::Error { code, message, .. } => {
                error!(code, %message, "Provider error");
            }
            ProviderEvent::ConnectionClosed => warn!("Provider connection closed"),
            other => trace!(event = other.name(), "Callback without request id"),
        }
    }

    fn drop_callback(&self, id: RequestId, event: &'static str, reason: &str) {
        trace!(req_id = %id, event, reason, "Dropping callback");
        self.metrics.callback_dropped();
    }

    fn apply(&self, record: &RequestRecord, state: &mut TickerState, event: ProviderEvent) -> Applied {
        match (record.kind, event) {
            (RequestKind::ContractDetails, ProviderEvent::ContractDetails { details, .. }) => {
                self.on_contract_details(record, state, details)
            }
            (RequestKind::ContractDetails, ProviderEvent::ContractDetailsEnd { .. }) => {
                if state.dataset.contract.is_none() {
                    warn!(ticker = %record.ticker, "Contract lookup returned no details");
                }
                self.release(record.id);
                Applied::Updated(Vec::new())
            }
            (RequestKind::UnderlyingPrice, ProviderEvent::TickPrice { field, price, .. }) => {
                self.on_underlying_tick(record, state, field, price)
            }
            (
                RequestKind::OptionChainParameters,
                ProviderEvent::OptionParameters {
                    expirations, strikes, ..
                },
            ) => self.on_option_parameters(record, state, &expirations, &strikes),
            (RequestKind::OptionChainParameters, ProviderEvent::OptionParametersEnd { .. }) => {
                self.release(record.id);
                Applied::Updated(Vec::new())
            }
            (RequestKind::HistoricalBars, ProviderEvent::Bar { bar, .. }) => {
                if !state.dataset.bars.push(bar) {
                    trace!(ticker = %record.ticker, "Bar after end of series");
                }
                Applied::Updated(Vec::new())
            }
            (kind @ (RequestKind::HistoricalVolatility | RequestKind::ImpliedVolatility), ProviderEvent::Bar { bar, .. }) => {
                self.on_volatility_sample(record, state, kind, bar)
            }
            (kind, ProviderEvent::HistoricalDataEnd { .. }) if kind.is_historical_series() => {
                let samples = match volatility_series(&mut state.dataset, kind) {
                    Some(series) => {
                        series.finalize();
                        series.len()
                    }
                    None => {
                        state.dataset.bars.finalize();
                        state.dataset.bars.len()
                    }
                };
                info!(ticker = %record.ticker, kind = %kind, samples, "Series complete");
                self.release(record.id);
                Applied::Updated(Vec::new())
            }
            (RequestKind::OptionSnapshotPrice, ProviderEvent::TickPrice { field, price, .. }) => {
                self.on_option_tick(record, state, field, price)
            }
            (_, ProviderEvent::Error { code, message, .. }) => self.on_request_error(record, state, code, &message),
            _ => Applied::Mismatched,
        }
    }

    fn stock_contract(ticker: &Ticker, state: &TickerState) -> Contract {
        let contract = Contract::stock(ticker.as_str());
        match &state.dataset.contract {
            Some(details) => contract.with_con_id(details.con_id),
            None => contract,
        }
    }

    fn on_contract_details(&self, record: &RequestRecord, state: &mut TickerState, details: ContractMetadata) -> Applied {
        if state.dataset.contract.is_some() {
            debug!(ticker = %record.ticker, con_id = details.con_id, "Ignoring additional contract details");
            return Applied::Updated(Vec::new());
        }
        info!(
            ticker = %record.ticker,
            con_id = details.con_id,
            name = %details.long_name,
            exchange = %details.primary_exchange,
            "Contract details received"
        );
        state.dataset.contract = Some(details);

        let id = self.issue(&record.ticker, RequestKind::UnderlyingPrice);
        Applied::Updated(vec![ProviderRequest::MarketData {
            id,
            contract: Self::stock_contract(&record.ticker, state),
            snapshot: true,
        }])
    }

    /// The first trade or close price fans out the remaining requests
    fn on_underlying_tick(&self, record: &RequestRecord, state: &mut TickerState, field: TickField, price: f64) -> Applied {
        if !field.is_trade_or_close() || !is_valid_price(price) || state.dataset.underlying_price.is_some() {
            trace!(ticker = %record.ticker, field = ?field, price, "Ignoring tick");
            return Applied::Updated(Vec::new());
        }
        info!(ticker = %record.ticker, field = ?field, price, "Underlying price received");
        state.dataset.underlying_price = Some(price);

        let ticker = &record.ticker;
        let settings = &self.settings;
        let contract = Self::stock_contract(ticker, state);
        let historical = |kind: RequestKind, duration: &str, what: WhatToShow| ProviderRequest::HistoricalData {
            id: self.issue(ticker, kind),
            contract: contract.clone(),
            query: HistoricalQuery::ending_on(settings.today, duration, settings.bar_size.as_str(), what),
        };

        let requests = vec![
            ProviderRequest::OptionParameters {
                id: self.issue(ticker, RequestKind::OptionChainParameters),
                symbol: ticker.to_string(),
                underlying_con_id: contract.con_id.unwrap_or_default(),
            },
            historical(RequestKind::HistoricalBars, settings.bar_duration.as_str(), WhatToShow::Trades),
            historical(
                RequestKind::HistoricalVolatility,
                settings.volatility_duration.as_str(),
                WhatToShow::HistoricalVolatility,
            ),
            historical(
                RequestKind::ImpliedVolatility,
                settings.volatility_duration.as_str(),
                WhatToShow::OptionImpliedVolatility,
            ),
            ProviderRequest::CancelMarketData { id: record.id },
        ];
        self.release(record.id);
        Applied::Updated(requests)
    }

    fn on_option_parameters(
        &self,
        record: &RequestRecord,
        state: &mut TickerState,
        expirations: &[String],
        strikes: &[f64],
    ) -> Applied {
        let ticker = &record.ticker;
        self.release(record.id);

        let Some(price) = state.dataset.underlying_price else {
            warn!(ticker = %ticker, "Option parameters arrived without an underlying price");
            return Applied::Updated(Vec::new());
        };
        let summary = self.settings.chain_filter().apply(price, expirations, strikes);
        debug!(
            ticker = %ticker,
            expirations = summary.expirations.len(),
            strikes = summary.strikes.len(),
            "Option chain filtered"
        );

        let mut requests = Vec::new();
        if self.settings.request_option_snapshot {
            if let (Some(expiry), Some(strike)) = (summary.nearest_expiration(), summary.atm_strike(price)) {
                let id = self.issue(ticker, RequestKind::OptionSnapshotPrice);
                state.dataset.atm_option = Some(AtmOptionQuote::requested(expiry, strike));
                requests.push(ProviderRequest::MarketData {
                    id,
                    contract: Contract::option(ticker.as_str(), expiry, strike, OptionType::Call),
                    snapshot: true,
                });
            }
        }
        state.dataset.option_chain = Some(summary);
        Applied::Updated(requests)
    }

    fn on_volatility_sample(&self, record: &RequestRecord, state: &mut TickerState, kind: RequestKind, bar: Bar) -> Applied {
        let date = match bar.date() {
            Ok(date) => date,
            Err(e) => {
                warn!(ticker = %record.ticker, kind = %kind, error = %e, "Skipping volatility sample");
                return Applied::Updated(Vec::new());
            }
        };
        if let Some(series) = volatility_series(&mut state.dataset, kind) {
            if !series.insert(date, bar.close) {
                trace!(ticker = %record.ticker, kind = %kind, "Sample after end of series");
            }
        }
        Applied::Updated(Vec::new())
    }

    fn on_option_tick(&self, record: &RequestRecord, state: &mut TickerState, field: TickField, price: f64) -> Applied {
        let accepted = matches!(field, TickField::Last | TickField::Close | TickField::Mark);
        if !accepted || !is_valid_price(price) {
            trace!(ticker = %record.ticker, field = ?field, price, "Ignoring option tick");
            return Applied::Updated(Vec::new());
        }
        if let Some(quote) = state.dataset.atm_option.as_mut() {
            quote.price.get_or_insert(price);
            quote.settled = true;
            info!(ticker = %record.ticker, strike = quote.strike, expiry = %quote.expiry, price, "ATM option price received");
        }
        self.release(record.id);
        Applied::Updated(vec![ProviderRequest::CancelMarketData { id: record.id }])
    }

    /// Failed requests are released without retry
    fn on_request_error(&self, record: &RequestRecord, state: &mut TickerState, code: i32, message: &str) -> Applied {
        if is_notice(code) {
            info!(ticker = %record.ticker, req_id = %record.id, code, %message, "Provider notice");
            return Applied::Updated(Vec::new());
        }
        error!(
            ticker = %record.ticker,
            req_id = %record.id,
            kind = %record.kind,
            code,
            %message,
            "Request failed"
        );
        let mut requests = Vec::new();
        if record.kind.is_snapshot() {
            requests.push(ProviderRequest::CancelMarketData { id: record.id });
        }
        if record.kind == RequestKind::OptionSnapshotPrice {
            state.dataset.settle_option_quote();
        }
        self.release(record.id);
        Applied::Updated(requests)
    }
}

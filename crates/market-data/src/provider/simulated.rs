//! Simulated provider
//!
//! Answers every request with deterministic synthetic data, seeded by the
//! ticker symbol, through the same event channel a live provider uses.

use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, Weekday};
use common::RequestId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::debug;

use super::{EventSender, MarketDataProvider, ProviderEvent};
use crate::black_scholes::black_scholes_price;
use crate::error::MarketDataError;
use crate::types::{
    BSInputs, Bar, Contract, ContractMetadata, HistoricalQuery, OptionType, SecurityType, TickField, WhatToShow,
    PROVIDER_DATE_FORMAT,
};
use crate::Result;

const BAR_COUNT: usize = 22;
const VOLATILITY_SAMPLES: usize = 30;
const WEEKLY_EXPIRATIONS: i64 = 8;

/// Reference price for a symbol
pub fn base_price(symbol: &str) -> f64 {
    match symbol {
        "MSFT" => 400.0,
        "NVDA" => 900.0,
        "TSLA" => 180.0,
        _ => 100.0,
    }
}

fn company_name(symbol: &str) -> String {
    match symbol {
        "MSFT" => "MICROSOFT CORP".to_string(),
        "NVDA" => "NVIDIA CORP".to_string(),
        "TSLA" => "TESLA INC".to_string(),
        other => format!("{} SIMULATED INC", other),
    }
}

/// FNV-1a over the symbol
fn symbol_seed(symbol: &str) -> u64 {
    symbol
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325, |hash, byte| (hash ^ byte as u64).wrapping_mul(0x0100_0000_01b3))
}

/// The last `count` weekdays up to and including `end`, oldest first
fn trailing_weekdays(end: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut days = Vec::with_capacity(count);
    let mut day = end;
    while days.len() < count {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            days.push(day);
        }
        day -= ChronoDuration::days(1);
    }
    days.reverse();
    days
}

fn format_date(date: NaiveDate) -> String {
    date.format(PROVIDER_DATE_FORMAT).to_string()
}

pub struct SimulatedProvider {
    events: EventSender,
    today: NaiveDate,
    latency: Option<(Duration, Handle)>,
}

impl SimulatedProvider {
    pub fn new(events: EventSender, today: NaiveDate) -> Self {
        Self {
            events,
            today,
            latency: None,
        }
    }

    /// Deliver each response after `delay` on the given runtime instead of
    /// synchronously from the request call
    pub fn with_latency(mut self, delay: Duration, handle: Handle) -> Self {
        self.latency = Some((delay, handle));
        self
    }

    fn emit(&self, events: Vec<ProviderEvent>) -> Result<()> {
        match &self.latency {
            Some((delay, handle)) => {
                let sender = self.events.clone();
                let delay = *delay;
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    for event in events {
                        if sender.send(event).is_err() {
                            debug!("Event channel closed, dropping simulated response");
                            return;
                        }
                    }
                });
                Ok(())
            }
            None => {
                for event in events {
                    self.events
                        .send(event)
                        .map_err(|_| MarketDataError::Connection("event channel closed".to_string()))?;
                }
                Ok(())
            }
        }
    }

    fn rng(symbol: &str, salt: u64) -> StdRng {
        StdRng::seed_from_u64(symbol_seed(symbol) ^ salt)
    }

    /// Typical volatility level for a symbol, between 20% and 50%
    fn volatility_level(symbol: &str) -> f64 {
        0.20 + (symbol_seed(symbol) % 300) as f64 / 1000.0
    }

    fn historical_bars(&self, id: RequestId, symbol: &str) -> Vec<ProviderEvent> {
        let mut rng = Self::rng(symbol, 0x01);
        let daily_move = Self::volatility_level(symbol) / 252f64.sqrt();
        let mut close = base_price(symbol);

        trailing_weekdays(self.today, BAR_COUNT)
            .into_iter()
            .map(|day| {
                let open = close;
                close = open * (1.0 + rng.random_range(-daily_move..daily_move) * 1.7);
                let high = open.max(close) * (1.0 + rng.random_range(0.0..daily_move));
                let low = open.min(close) * (1.0 - rng.random_range(0.0..daily_move));
                ProviderEvent::Bar {
                    req_id: id,
                    bar: Bar {
                        time: format_date(day),
                        open,
                        high,
                        low,
                        close,
                        volume: rng.random_range(1.0e6..5.0e7_f64).round(),
                    },
                }
            })
            .collect()
    }

    fn volatility_samples(&self, id: RequestId, symbol: &str, what: WhatToShow) -> Vec<ProviderEvent> {
        let (salt, premium) = match what {
            WhatToShow::OptionImpliedVolatility => (0x03, 0.03),
            _ => (0x02, 0.0),
        };
        let mut rng = Self::rng(symbol, salt);
        let level = Self::volatility_level(symbol) + premium;

        trailing_weekdays(self.today, VOLATILITY_SAMPLES)
            .into_iter()
            .map(|day| {
                let value = level * (1.0 + rng.random_range(-0.1..0.1));
                ProviderEvent::Bar {
                    req_id: id,
                    bar: Bar::sample(&format_date(day), value),
                }
            })
            .collect()
    }

    fn option_price(&self, contract: &Contract) -> Option<f64> {
        let expiry = contract.expiry?;
        let inputs = BSInputs {
            spot: base_price(&contract.symbol),
            strike: contract.strike?,
            time: (expiry - self.today).num_days() as f64 / 365.0,
            vol: Self::volatility_level(&contract.symbol) + 0.03,
            rate: 0.05,
            option_type: contract.right.unwrap_or(OptionType::Call),
        };
        inputs.is_priceable().then(|| black_scholes_price(inputs))
    }
}

impl MarketDataProvider for SimulatedProvider {
    fn request_contract_details(&self, id: RequestId, contract: &Contract) -> Result<()> {
        let symbol = contract.symbol.as_str();
        let details = ContractMetadata {
            symbol: symbol.to_string(),
            long_name: company_name(symbol),
            primary_exchange: "NASDAQ".to_string(),
            con_id: 100_000 + (symbol_seed(symbol) % 900_000) as i64,
        };
        self.emit(vec![
            ProviderEvent::ContractDetails { req_id: id, details },
            ProviderEvent::ContractDetailsEnd { req_id: id },
        ])
    }

    fn request_market_data(&self, id: RequestId, contract: &Contract, _snapshot: bool) -> Result<()> {
        let events = match contract.sec_type {
            SecurityType::Stock => {
                let price = base_price(&contract.symbol);
                vec![
                    ProviderEvent::TickPrice {
                        req_id: id,
                        field: TickField::Bid,
                        price: price - 0.05,
                    },
                    ProviderEvent::TickPrice {
                        req_id: id,
                        field: TickField::Last,
                        price,
                    },
                    ProviderEvent::TickPrice {
                        req_id: id,
                        field: TickField::Close,
                        price: price * 0.995,
                    },
                ]
            }
            SecurityType::Option => match self.option_price(contract) {
                Some(price) => vec![ProviderEvent::TickPrice {
                    req_id: id,
                    field: TickField::Mark,
                    price,
                }],
                None => vec![ProviderEvent::Error {
                    req_id: Some(id),
                    code: 200,
                    message: "No security definition has been found for the request".to_string(),
                }],
            },
        };
        self.emit(events)
    }

    fn cancel_market_data(&self, id: RequestId) -> Result<()> {
        debug!(req_id = %id, "Simulated market data cancelled");
        Ok(())
    }

    fn request_historical_data(&self, id: RequestId, contract: &Contract, query: &HistoricalQuery) -> Result<()> {
        let mut events = match query.what_to_show {
            WhatToShow::Trades => self.historical_bars(id, &contract.symbol),
            what => self.volatility_samples(id, &contract.symbol, what),
        };
        let start = match events.first() {
            Some(ProviderEvent::Bar { bar, .. }) => bar.time.clone(),
            _ => format_date(self.today),
        };
        events.push(ProviderEvent::HistoricalDataEnd {
            req_id: id,
            start,
            end: format_date(self.today),
        });
        self.emit(events)
    }

    fn request_option_parameters(&self, id: RequestId, symbol: &str, _underlying_con_id: i64) -> Result<()> {
        let days_to_friday = (Weekday::Fri.num_days_from_monday() as i64
            - self.today.weekday().num_days_from_monday() as i64)
            .rem_euclid(7);
        let first_friday = self.today + ChronoDuration::days(days_to_friday);
        let mut expirations: Vec<String> = (0..WEEKLY_EXPIRATIONS)
            .map(|week| format_date(first_friday + ChronoDuration::weeks(week)))
            .collect();
        expirations.push(format_date(first_friday + ChronoDuration::weeks(26)));

        let price = base_price(symbol);
        let step = (price / 40.0).round().max(1.0);
        let lowest = (price * 0.5 / step).ceil() * step;
        let mut strikes = Vec::new();
        let mut strike = lowest;
        while strike <= price * 1.5 {
            strikes.push(strike);
            strike += step;
        }

        self.emit(vec![
            ProviderEvent::OptionParameters {
                req_id: id,
                exchange: "SMART".to_string(),
                expirations,
                strikes,
            },
            ProviderEvent::OptionParametersEnd { req_id: id },
        ])
    }
}

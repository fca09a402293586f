//! Per-ticker accumulated data
//!
//! Every field starts empty and fills monotonically. Historical series are
//! accumulated in two phases: `Streaming` while samples arrive, `Finalized`
//! once the provider signals the end of the series.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::option_chain::OptionChainSummary;
use crate::types::{Bar, ContractMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeriesPhase {
    #[default]
    Streaming,
    Finalized,
}

/// Historical bars in arrival order
#[derive(Debug, Clone, Default)]
pub struct BarSeries {
    bars: Vec<Bar>,
    phase: SeriesPhase,
}

impl BarSeries {
    /// Append a bar. Returns false if the series is already finalized.
    pub fn push(&mut self, bar: Bar) -> bool {
        if self.phase == SeriesPhase::Finalized {
            return false;
        }
        self.bars.push(bar);
        true
    }

    pub fn finalize(&mut self) {
        self.phase = SeriesPhase::Finalized;
    }

    pub fn phase(&self) -> SeriesPhase {
        self.phase
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Finalized and non-empty
    pub fn is_complete(&self) -> bool {
        self.phase == SeriesPhase::Finalized && !self.bars.is_empty()
    }
}

/// Date-keyed samples (HV or IV)
#[derive(Debug, Clone, Default)]
pub struct DatedSeries {
    samples: BTreeMap<NaiveDate, f64>,
    phase: SeriesPhase,
}

impl DatedSeries {
    /// Insert a sample; a repeated date overwrites. Returns false if the
    /// series is already finalized.
    pub fn insert(&mut self, date: NaiveDate, value: f64) -> bool {
        if self.phase == SeriesPhase::Finalized {
            return false;
        }
        self.samples.insert(date, value);
        true
    }

    pub fn finalize(&mut self) {
        self.phase = SeriesPhase::Finalized;
    }

    pub fn phase(&self) -> SeriesPhase {
        self.phase
    }

    pub fn first(&self) -> Option<(NaiveDate, f64)> {
        self.samples.iter().next().map(|(d, v)| (*d, *v))
    }

    pub fn last(&self) -> Option<(NaiveDate, f64)> {
        self.samples.iter().next_back().map(|(d, v)| (*d, *v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &f64)> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.phase == SeriesPhase::Finalized && !self.samples.is_empty()
    }
}

/// Market price of the ATM call requested after the option chain arrives
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtmOptionQuote {
    pub expiry: NaiveDate,
    pub strike: f64,
    pub price: Option<f64>,
    /// Set once a price arrived or the request was given up on
    pub settled: bool,
}

impl AtmOptionQuote {
    pub fn requested(expiry: NaiveDate, strike: f64) -> Self {
        Self {
            expiry,
            strike,
            price: None,
            settled: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TickerDataset {
    pub contract: Option<ContractMetadata>,
    pub underlying_price: Option<f64>,
    pub bars: BarSeries,
    pub historical_volatility: DatedSeries,
    pub implied_volatility: DatedSeries,
    pub option_chain: Option<OptionChainSummary>,
    pub atm_option: Option<AtmOptionQuote>,
}

impl TickerDataset {
    /// Presence checks only; the ATM option quote is not part of it
    pub fn is_complete(&self) -> bool {
        self.contract.is_some()
            && self.bars.is_complete()
            && self.historical_volatility.is_complete()
            && self.implied_volatility.is_complete()
            && self.option_chain.is_some()
    }

    /// An ATM quote was requested and has not been answered yet
    pub fn awaiting_option_quote(&self) -> bool {
        self.atm_option.is_some_and(|quote| !quote.settled)
    }

    /// Complete and not waiting on the ATM quote
    pub fn is_ready(&self) -> bool {
        self.is_complete() && !self.awaiting_option_quote()
    }

    /// Stop waiting for the ATM quote, keeping any price already received
    pub fn settle_option_quote(&mut self) {
        if let Some(quote) = self.atm_option.as_mut() {
            quote.settled = true;
        }
    }

    /// Names of the parts still missing, for timeout diagnostics
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.contract.is_none() {
            missing.push("contract");
        }
        if self.underlying_price.is_none() {
            missing.push("underlying_price");
        }
        if !self.bars.is_complete() {
            missing.push("bars");
        }
        if !self.historical_volatility.is_complete() {
            missing.push("historical_volatility");
        }
        if !self.implied_volatility.is_complete() {
            missing.push("implied_volatility");
        }
        if self.option_chain.is_none() {
            missing.push("option_chain");
        }
        if self.awaiting_option_quote() {
            missing.push("atm_option_price");
        }
        missing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickerOutcome {
    #[default]
    Pending,
    Complete,
    TimedOut,
}

impl TickerOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TickerOutcome::Pending)
    }
}

/// Everything the session holds for one ticker, behind that ticker's lock
#[derive(Debug, Default)]
pub struct TickerState {
    pub dataset: TickerDataset,
    pub outcome: TickerOutcome,
}

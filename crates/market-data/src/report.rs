//! Ticker reports and cross-ticker statistics
//!
//! The `ReportAggregator` is consulted after every ticker mutation. It emits
//! a ticker's report the first time its dataset is complete and the
//! statistics table once every requested ticker has completed.

use chrono::NaiveDate;
use common::Ticker;
use observability::SessionMetrics;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::black_scholes::black_scholes_price;
use crate::dataset::{DatedSeries, TickerDataset, TickerOutcome, TickerState};
use crate::option_chain::OptionChainSummary;
use crate::types::{BSInputs, Bar, ContractMetadata, OptionType};
use crate::volatility::historical_volatility;

const DAYS_PER_YEAR: f64 = 365.0;
const BLOCK_RULE: &str = "==================================================";
const SECTION_RULE: &str = "--------------------------------------------------";
const TABLE_RULE: &str = "====================================================================================================";
const TABLE_SECTION_RULE: &str = "----------------------------------------------------------------------------------------------------";

/// First and last sample of a dated series
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesExtent {
    pub first: (NaiveDate, f64),
    pub last: (NaiveDate, f64),
    pub points: usize,
}

impl SeriesExtent {
    fn of(series: &DatedSeries) -> Option<Self> {
        Some(Self {
            first: series.first()?,
            last: series.last()?,
            points: series.len(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AtmSection {
    pub strike: f64,
    pub expiry: NaiveDate,
    pub days_to_expiry: i64,
    /// Black-Scholes call at the last implied volatility; `None` when σ or T is zero
    pub theoretical_call: Option<f64>,
    pub market_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickerReport {
    pub ticker: Ticker,
    pub contract: ContractMetadata,
    pub underlying_price: Option<f64>,
    pub bar_count: usize,
    pub first_bar: Option<Bar>,
    pub last_bar: Option<Bar>,
    /// Annualized close-to-close volatility of the bar series
    pub realized_volatility: f64,
    pub historical_volatility: Option<SeriesExtent>,
    pub implied_volatility: Option<SeriesExtent>,
    pub option_chain: OptionChainSummary,
    pub atm: Option<AtmSection>,
}

impl TickerReport {
    /// Build the report for a complete dataset. Returns `None` if the
    /// contract or option chain is missing.
    pub fn build(ticker: &Ticker, dataset: &TickerDataset, risk_free_rate: f64, today: NaiveDate) -> Option<Self> {
        let contract = dataset.contract.clone()?;
        let option_chain = dataset.option_chain.clone()?;
        let implied_volatility = SeriesExtent::of(&dataset.implied_volatility);

        let atm = match (dataset.underlying_price, option_chain.nearest_expiration()) {
            (Some(spot), Some(expiry)) => option_chain.atm_strike(spot).map(|strike| {
                let days_to_expiry = (expiry - today).num_days();
                let inputs = BSInputs {
                    spot,
                    strike,
                    time: days_to_expiry as f64 / DAYS_PER_YEAR,
                    vol: implied_volatility.as_ref().map(|iv| iv.last.1).unwrap_or(0.0),
                    rate: risk_free_rate,
                    option_type: OptionType::Call,
                };
                let theoretical_call = inputs.is_priceable().then(|| black_scholes_price(inputs));
                let market_price = dataset
                    .atm_option
                    .filter(|quote| quote.expiry == expiry && quote.strike == strike)
                    .and_then(|quote| quote.price);
                AtmSection {
                    strike,
                    expiry,
                    days_to_expiry,
                    theoretical_call,
                    market_price,
                }
            }),
            _ => None,
        };

        let bars = dataset.bars.bars();
        Some(Self {
            ticker: ticker.clone(),
            contract,
            underlying_price: dataset.underlying_price,
            bar_count: bars.len(),
            first_bar: bars.first().cloned(),
            last_bar: bars.last().cloned(),
            realized_volatility: historical_volatility(&dataset.bars.closes()),
            historical_volatility: SeriesExtent::of(&dataset.historical_volatility),
            implied_volatility,
            option_chain,
            atm,
        })
    }

    pub fn vol_summary(&self) -> VolSummary {
        VolSummary {
            first_iv: self.implied_volatility.as_ref().map(|iv| iv.first.1),
            last_iv: self.implied_volatility.as_ref().map(|iv| iv.last.1),
            last_hv: self.historical_volatility.as_ref().map(|hv| hv.last.1),
        }
    }
}

fn write_series(f: &mut fmt::Formatter<'_>, title: &str, series: &Option<SeriesExtent>) -> fmt::Result {
    match series {
        Some(extent) => {
            writeln!(f, "{}:", title)?;
            writeln!(f, "   First Date: {} Value: {}", extent.first.0, extent.first.1)?;
            writeln!(f, "   Last Date:  {} Value: {}", extent.last.0, extent.last.1)?;
            writeln!(f, "   Data Points: {}", extent.points)
        }
        None => writeln!(f, "{}: N/A", title),
    }
}

impl fmt::Display for TickerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", BLOCK_RULE)?;
        writeln!(f, "REPORT FOR TICKER: {}", self.ticker)?;
        writeln!(f, "{}", BLOCK_RULE)?;
        writeln!(f, "1. Contract Details:")?;
        writeln!(f, "   Company Name: {}", self.contract.long_name)?;
        writeln!(f, "   Primary Exchange: {}", self.contract.primary_exchange)?;
        if let Some(price) = self.underlying_price {
            writeln!(f, "   Underlying Price: {:.2}", price)?;
        }
        writeln!(f, "{}", SECTION_RULE)?;
        writeln!(f, "2. Historical Daily Prices:")?;
        writeln!(f, "   Total Bars: {}", self.bar_count)?;
        if let (Some(first), Some(last)) = (&self.first_bar, &self.last_bar) {
            writeln!(f, "   First Bar: {} Close: {}", first.time, first.close)?;
            writeln!(f, "   Last Bar:  {} Close: {}", last.time, last.close)?;
        }
        writeln!(f, "   Realized Volatility: {:.4}", self.realized_volatility)?;
        writeln!(f, "{}", SECTION_RULE)?;
        write_series(f, "3. Historical Volatility", &self.historical_volatility)?;
        writeln!(f, "{}", SECTION_RULE)?;
        write_series(f, "4. Implied Volatility", &self.implied_volatility)?;
        writeln!(f, "{}", SECTION_RULE)?;
        writeln!(f, "5. Underlying Option Chain (Filtered):")?;
        writeln!(f, "{}", self.option_chain)?;
        if let Some(atm) = &self.atm {
            writeln!(f, "{}", SECTION_RULE)?;
            writeln!(f, "6. ATM Call:")?;
            writeln!(
                f,
                "   Strike: {} Expiry: {} ({} days)",
                atm.strike, atm.expiry, atm.days_to_expiry
            )?;
            match atm.theoretical_call {
                Some(price) => writeln!(f, "   Theoretical Price (Black-Scholes): {:.4}", price)?,
                None => writeln!(f, "   Theoretical Price (Black-Scholes): N/A")?,
            }
            if let Some(price) = atm.market_price {
                writeln!(f, "   Market Price: {:.4}", price)?;
            }
        }
        write!(f, "{}", BLOCK_RULE)
    }
}

/// The volatility figures the statistics table needs from one ticker
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VolSummary {
    pub first_iv: Option<f64>,
    pub last_iv: Option<f64>,
    pub last_hv: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsRow {
    pub ticker: Ticker,
    /// Last IV minus first IV
    pub diff_a: f64,
    /// Last IV minus last HV
    pub diff_b: f64,
    /// Last IV minus the industry average
    pub diff_c: f64,
    pub sum: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrossTickerStatistics {
    pub industry_average_iv: f64,
    pub rows: Vec<StatisticsRow>,
}

impl CrossTickerStatistics {
    /// Rows follow the order of `summaries`
    pub fn compute(summaries: &[(Ticker, VolSummary)]) -> Self {
        let last_ivs: Vec<f64> = summaries.iter().filter_map(|(_, s)| s.last_iv).collect();
        let industry_average_iv = if last_ivs.is_empty() {
            0.0
        } else {
            last_ivs.iter().sum::<f64>() / last_ivs.len() as f64
        };

        let rows = summaries
            .iter()
            .map(|(ticker, summary)| {
                let (diff_a, diff_b, diff_c) = match (summary.first_iv, summary.last_iv) {
                    (Some(first), Some(last)) => (
                        last - first,
                        summary.last_hv.map(|hv| last - hv).unwrap_or(0.0),
                        last - industry_average_iv,
                    ),
                    _ => (0.0, 0.0, 0.0),
                };
                StatisticsRow {
                    ticker: ticker.clone(),
                    diff_a,
                    diff_b,
                    diff_c,
                    sum: diff_a + diff_b + diff_c,
                }
            })
            .collect();

        Self {
            industry_average_iv,
            rows,
        }
    }

    pub fn row(&self, ticker: &Ticker) -> Option<&StatisticsRow> {
        self.rows.iter().find(|row| &row.ticker == ticker)
    }
}

impl fmt::Display for CrossTickerStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", TABLE_RULE)?;
        writeln!(f, "FINAL STATISTICS TABLE")?;
        writeln!(f, "{}", TABLE_RULE)?;
        writeln!(
            f,
            "{:<10} | {:<24} | {:<24} | {:<24} | {:<10}",
            "Ticker", "Diff A (Last-First IV)", "Diff B (Last IV-HV)", "Diff C (Last IV-Ind Avg)", "Sum"
        )?;
        writeln!(f, "{}", TABLE_SECTION_RULE)?;
        writeln!(f, "Industry Average Implied Volatility: {:.4}", self.industry_average_iv)?;
        writeln!(f, "{}", TABLE_SECTION_RULE)?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<10} | {:<24.4} | {:<24.4} | {:<24.4} | {:<10.4}",
                row.ticker.as_str(),
                row.diff_a,
                row.diff_b,
                row.diff_c,
                row.sum
            )?;
        }
        write!(f, "{}", TABLE_RULE)
    }
}

/// Destination for reports
pub trait ReportSink: Send + Sync {
    fn ticker_report(&self, report: &TickerReport);

    fn statistics(&self, statistics: &CrossTickerStatistics);

    fn ticker_timed_out(&self, ticker: &Ticker, missing: &[&'static str]);
}

/// Prints human-readable blocks to stdout
#[derive(Debug, Default)]
pub struct StdoutSink;

impl ReportSink for StdoutSink {
    fn ticker_report(&self, report: &TickerReport) {
        println!("\n{}\n", report);
    }

    fn statistics(&self, statistics: &CrossTickerStatistics) {
        println!("\n{}\n", statistics);
    }

    fn ticker_timed_out(&self, ticker: &Ticker, missing: &[&'static str]) {
        println!("\nTIMED OUT: {} (missing: {})\n", ticker, missing.join(", "));
    }
}

/// Keeps structured reports in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    reports: Mutex<Vec<TickerReport>>,
    statistics: Mutex<Vec<CrossTickerStatistics>>,
    timed_out: Mutex<Vec<Ticker>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<TickerReport> {
        self.reports.lock().clone()
    }

    /// Every statistics table emitted; at most one per session
    pub fn emitted_statistics(&self) -> Vec<CrossTickerStatistics> {
        self.statistics.lock().clone()
    }

    pub fn timed_out(&self) -> Vec<Ticker> {
        self.timed_out.lock().clone()
    }
}

impl ReportSink for CollectingSink {
    fn ticker_report(&self, report: &TickerReport) {
        self.reports.lock().push(report.clone());
    }

    fn statistics(&self, statistics: &CrossTickerStatistics) {
        self.statistics.lock().push(statistics.clone());
    }

    fn ticker_timed_out(&self, ticker: &Ticker, _missing: &[&'static str]) {
        self.timed_out.lock().push(ticker.clone());
    }
}

#[derive(Debug, Default)]
struct Progress {
    /// Completion set, in completion order
    completed: Vec<(Ticker, VolSummary)>,
    timed_out: Vec<Ticker>,
}

impl Progress {
    fn terminal(&self) -> usize {
        self.completed.len() + self.timed_out.len()
    }
}

/// Decides completion and emits reports exactly once
pub struct ReportAggregator {
    requested: Vec<Ticker>,
    progress: Mutex<Progress>,
    statistics_emitted: AtomicBool,
    finished: CancellationToken,
    sink: Arc<dyn ReportSink>,
    risk_free_rate: f64,
    today: NaiveDate,
    metrics: SessionMetrics,
}

impl ReportAggregator {
    pub fn new(
        requested: Vec<Ticker>,
        sink: Arc<dyn ReportSink>,
        risk_free_rate: f64,
        today: NaiveDate,
        metrics: SessionMetrics,
    ) -> Self {
        let finished = CancellationToken::new();
        if requested.is_empty() {
            finished.cancel();
        }
        Self {
            requested,
            progress: Mutex::new(Progress::default()),
            statistics_emitted: AtomicBool::new(false),
            finished,
            sink,
            risk_free_rate,
            today,
            metrics,
        }
    }

    /// Called with the ticker's lock held after every mutation. Returns true
    /// if this call completed the ticker. An outstanding ATM quote holds the
    /// report back until it is settled.
    pub fn check_completion(&self, ticker: &Ticker, state: &mut TickerState) -> bool {
        if state.outcome != TickerOutcome::Pending || !state.dataset.is_ready() {
            return false;
        }
        let Some(report) = TickerReport::build(ticker, &state.dataset, self.risk_free_rate, self.today) else {
            return false;
        };
        state.outcome = TickerOutcome::Complete;

        info!(ticker = %ticker, bars = report.bar_count, "Ticker complete");
        self.metrics.ticker_completed();
        self.sink.ticker_report(&report);

        let (completed, terminal) = {
            let mut progress = self.progress.lock();
            progress.completed.push((ticker.clone(), report.vol_summary()));
            let completed = (progress.completed.len() == self.requested.len()).then(|| progress.completed.clone());
            (completed, progress.terminal())
        };

        if let Some(completed) = completed {
            self.emit_statistics(&completed);
        }
        if terminal == self.requested.len() {
            self.finished.cancel();
        }
        true
    }

    /// Mark a pending ticker as timed out. Returns false if it already
    /// reached a terminal outcome.
    pub fn mark_timed_out(&self, ticker: &Ticker, state: &mut TickerState) -> bool {
        if state.outcome != TickerOutcome::Pending {
            return false;
        }
        state.outcome = TickerOutcome::TimedOut;

        let missing = state.dataset.missing();
        warn!(ticker = %ticker, missing = ?missing, "Ticker timed out");
        self.metrics.ticker_timed_out();
        self.sink.ticker_timed_out(ticker, &missing);

        let terminal = {
            let mut progress = self.progress.lock();
            progress.timed_out.push(ticker.clone());
            progress.terminal()
        };
        if terminal == self.requested.len() {
            self.finished.cancel();
        }
        true
    }

    fn emit_statistics(&self, completed: &[(Ticker, VolSummary)]) {
        if self
            .statistics_emitted
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let summaries: Vec<(Ticker, VolSummary)> = self
            .requested
            .iter()
            .filter_map(|ticker| completed.iter().find(|(t, _)| t == ticker).cloned())
            .collect();
        let statistics = CrossTickerStatistics::compute(&summaries);
        info!(
            tickers = summaries.len(),
            industry_average_iv = statistics.industry_average_iv,
            "Emitting cross-ticker statistics"
        );
        self.sink.statistics(&statistics);
    }

    pub fn requested(&self) -> &[Ticker] {
        &self.requested
    }

    pub fn completed_count(&self) -> usize {
        self.progress.lock().completed.len()
    }

    pub fn timed_out(&self) -> Vec<Ticker> {
        self.progress.lock().timed_out.clone()
    }

    pub fn statistics_emitted(&self) -> bool {
        self.statistics_emitted.load(Ordering::Acquire)
    }

    /// Cancelled once every requested ticker is complete or timed out
    pub fn finished(&self) -> CancellationToken {
        self.finished.clone()
    }
}

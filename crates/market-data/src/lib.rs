//! Market data correlation engine for SigmaFlow
//!
//! Issues causally chained requests per ticker to an asynchronous market
//! data provider, routes the out-of-order callbacks back to the ticker and
//! request they answer, and emits a report per ticker plus one cross-ticker
//! statistics table once every ticker's data has arrived.
//!
//! # Core Components
//!
//! - [`volatility`] / [`black_scholes`] - Historical volatility and option pricing
//! - [`registry`] - In-flight request registry
//! - [`session`] - Per-run aggregate owning every ticker's state
//! - [`correlator`] - Callback routing and follow-on requests
//! - [`report`] - Completion detection, reports and statistics
//! - [`provider`] - Provider trait, callback events, simulated and bridge providers
//! - [`runner`] - Event pump with deadline and shutdown handling
//!
//! # Key Invariants
//!
//! - Request ids strictly increase and are never reused within a session
//! - A released request never mutates ticker state again
//! - Each ticker's report is emitted at most once
//! - Statistics are emitted at most once, and only when every ticker completed

pub mod black_scholes;
pub mod correlator;
pub mod dataset;
pub mod error;
pub mod option_chain;
pub mod provider;
pub mod registry;
pub mod report;
pub mod runner;
pub mod session;
pub mod tickers;
pub mod types;
pub mod volatility;

#[cfg(test)]
mod testing;

pub use dataset::{TickerDataset, TickerOutcome};
pub use error::MarketDataError;
pub use provider::{
    event_channel, BridgeConfig, EventReceiver, EventSender, LineBridgeProvider, MarketDataProvider, ProviderEvent,
    SimulatedProvider,
};
pub use registry::{RequestRecord, RequestRegistry};
pub use report::{CollectingSink, CrossTickerStatistics, ReportSink, StdoutSink, TickerReport};
pub use runner::{run_session, RunOutcome};
pub use session::{Session, SessionSettings};
pub use types::{BSInputs, OptionType};

pub type Result<T> = std::result::Result<T, MarketDataError>;

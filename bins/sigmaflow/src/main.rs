//! SigmaFlow binary
//!
//! Resolves the ticker list, connects the configured market data source and
//! runs one correlation session, printing a report per ticker and the final
//! statistics table.

mod shutdown;

use anyhow::{Context, Result};
use cli::{Cli, DataMode, TickerSource};
use config::{generate_default_config, load_config, validate_config, SigmaflowConfig};
use market_data::tickers::{load_tickers_from_file, parse_symbols};
use market_data::{
    event_channel, run_session, BridgeConfig, LineBridgeProvider, MarketDataProvider, RunOutcome, Session,
    SessionSettings, SimulatedProvider, StdoutSink,
};
use observability::{init_logging, init_metrics, LogFormat};
use shutdown::ShutdownController;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const DEFAULT_CONFIG_PATH: &str = "sigmaflow.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    let config = load_or_default(&cli.config)?;

    let logging = config.logging();
    let format_name = cli.log_format.as_deref().unwrap_or(&logging.format);
    let format: LogFormat = format_name.parse().map_err(anyhow::Error::msg)?;
    init_logging("sigmaflow", format, &logging.level)?;

    info!(mode = cli.mode().as_str(), "SigmaFlow starting...");
    debug!(?cli, "CLI arguments parsed");

    check_config(&config)?;

    let metrics = config.metrics();
    if metrics.enabled {
        init_metrics(metrics.port).context("Failed to start metrics exporter")?;
    }

    let tickers = match cli.ticker_source() {
        TickerSource::File(path) => load_tickers_from_file(&path)
            .with_context(|| format!("Failed to read tickers from {}", path.display()))?,
        TickerSource::Symbols(symbols) => parse_symbols(&symbols).context("Invalid ticker symbol")?,
    };
    if tickers.is_empty() {
        anyhow::bail!("No tickers found. Exiting.");
    }
    let symbols: Vec<&str> = tickers.iter().map(|t| t.as_str()).collect();
    info!(tickers = ?symbols, "Tickers");

    let settings = session_settings(&config, cli.timeout);
    let (events_tx, events_rx) = event_channel();
    let provider: Arc<dyn MarketDataProvider> = match cli.mode() {
        DataMode::Simulated => Arc::new(SimulatedProvider::new(events_tx, settings.today)),
        DataMode::Live => {
            let provider_config = config.provider();
            let bridge = BridgeConfig {
                host: provider_config.host,
                port: provider_config.port,
                client_id: provider_config.client_id,
                connect_timeout: Duration::from_secs(provider_config.connect_timeout_secs),
            };
            let provider = LineBridgeProvider::connect(&bridge, events_tx)
                .await
                .with_context(|| format!("Cannot reach the market data gateway at {}", bridge.address()))?;
            Arc::new(provider)
        }
    };

    let shutdown = ShutdownController::with_ctrl_c();
    let session = Session::new(tickers, provider, Arc::new(StdoutSink), settings);
    session.start().context("Failed to issue initial requests")?;

    match run_session(&session, events_rx, shutdown.token()).await {
        RunOutcome::Completed => info!("All reports emitted"),
        RunOutcome::TimedOut => {
            let timed_out: Vec<String> = session
                .aggregator()
                .timed_out()
                .iter()
                .map(|t| t.to_string())
                .collect();
            warn!(?timed_out, "Some tickers did not complete before the deadline");
        }
        RunOutcome::Stopped => info!("Session stopped before completion"),
        RunOutcome::Disconnected => {
            anyhow::bail!("Market data provider disconnected before all tickers completed");
        }
    }

    info!("SigmaFlow shutting down.");
    Ok(())
}

/// Load the config file; a missing default file means built-in defaults
fn load_or_default(path: &Path) -> Result<SigmaflowConfig> {
    if path.exists() {
        return load_config(path);
    }
    if path == Path::new(DEFAULT_CONFIG_PATH) {
        return Ok(generate_default_config());
    }
    anyhow::bail!("Config file not found: {}", path.display())
}

fn check_config(config: &SigmaflowConfig) -> Result<()> {
    let report = validate_config(config);

    for default in &report.defaults_applied {
        debug!(field = %default.field, value = %default.value, "Using default");
    }
    if !report.warnings.is_empty() {
        warn!("Configuration warnings:");
        for warning in &report.warnings {
            warn!(field = %warning.field, message = %warning.message);
        }
    }

    if !report.is_valid() {
        error!(error_count = report.errors.len(), "Configuration validation failed");
        for err in &report.errors {
            error!("{}", err);
        }
        anyhow::bail!("Cannot start due to configuration errors");
    }
    Ok(())
}

fn session_settings(config: &SigmaflowConfig, timeout_override: Option<u64>) -> SessionSettings {
    let session = config.session();
    SessionSettings {
        expiry_horizon_months: session.expiry_horizon_months,
        strike_band: session.strike_band_pct / 100.0,
        ticker_timeout: Duration::from_secs(timeout_override.unwrap_or(session.ticker_timeout_secs)),
        risk_free_rate: session.risk_free_rate,
        request_option_snapshot: session.request_option_snapshot,
        bar_duration: session.bar_duration,
        bar_size: session.bar_size,
        volatility_duration: session.volatility_duration,
        ..SessionSettings::default()
    }
}

use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

/// File extensions accepted as a ticker list
pub const TABULAR_EXTENSIONS: &[&str] = &["csv", "tsv"];

/// Tickers used when none are given on the command line
pub const DEFAULT_TICKERS: &[&str] = &["MSFT", "NVDA", "TSLA"];

#[derive(Parser, Debug)]
#[command(name = "sigmaflow")]
#[command(about = "SigmaFlow - volatility report over a set of tickers")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// Optional mode (live or simulated, default simulated), then a .csv/.tsv
    /// file (first column, header skipped) or a list of ticker symbols
    #[arg(value_name = "[MODE] FILE|TICKER")]
    pub args: Vec<String>,

    /// Path to the configuration file
    #[arg(short, long, default_value = "sigmaflow.yaml")]
    pub config: PathBuf,

    /// Override the configured log format (pretty, json, compact)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Override the configured per-ticker timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataMode {
    /// Connect to the market-data gateway
    Live,

    /// Deterministic synthetic data, no connection required
    Simulated,
}

impl DataMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataMode::Live => "live",
            DataMode::Simulated => "simulated",
        }
    }
}

/// Where the ticker list comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickerSource {
    File(PathBuf),
    Symbols(Vec<String>),
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    fn leading_mode(&self) -> Option<DataMode> {
        self.args
            .first()
            .and_then(|first| DataMode::from_str(first, true).ok())
    }

    /// Mode named by the first positional, simulated when there is none
    pub fn mode(&self) -> DataMode {
        self.leading_mode().unwrap_or(DataMode::Simulated)
    }

    /// Positionals after the mode word, if one was given
    pub fn inputs(&self) -> &[String] {
        let skip = usize::from(self.leading_mode().is_some());
        &self.args[skip..]
    }

    /// Resolve the positional inputs into a ticker source
    ///
    /// A first input with a tabular extension is read as a file; otherwise
    /// every input is a symbol. No inputs yields the default tickers.
    pub fn ticker_source(&self) -> TickerSource {
        let inputs = self.inputs();
        match inputs.first() {
            None => TickerSource::Symbols(DEFAULT_TICKERS.iter().map(|s| s.to_string()).collect()),
            Some(first) if is_tabular_file(Path::new(first)) => {
                TickerSource::File(PathBuf::from(first))
            }
            Some(_) => TickerSource::Symbols(inputs.to_vec()),
        }
    }
}

/// Returns true if the path has a recognized tabular-data extension
pub fn is_tabular_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            TABULAR_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["sigmaflow"]).unwrap();
        assert_eq!(cli.mode(), DataMode::Simulated);
        assert_eq!(
            cli.ticker_source(),
            TickerSource::Symbols(vec!["MSFT".into(), "NVDA".into(), "TSLA".into()])
        );
    }

    #[test]
    fn test_live_with_symbols() {
        let cli = Cli::try_parse_from(["sigmaflow", "LIVE", "AAPL", "AMD"]).unwrap();
        assert_eq!(cli.mode(), DataMode::Live);
        assert_eq!(
            cli.ticker_source(),
            TickerSource::Symbols(vec!["AAPL".into(), "AMD".into()])
        );
    }

    #[test]
    fn test_file_input() {
        let cli = Cli::try_parse_from(["sigmaflow", "simulated", "data/finviz.CSV"]).unwrap();
        assert_eq!(
            cli.ticker_source(),
            TickerSource::File(PathBuf::from("data/finviz.CSV"))
        );
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "sigmaflow",
            "simulated",
            "--log-format",
            "json",
            "--timeout",
            "15",
            "--config",
            "custom.yaml",
        ])
        .unwrap();
        assert_eq!(cli.log_format.as_deref(), Some("json"));
        assert_eq!(cli.timeout, Some(15));
        assert_eq!(cli.config, PathBuf::from("custom.yaml"));
    }

    #[test]
    fn test_symbols_without_mode() {
        let cli = Cli::try_parse_from(["sigmaflow", "AAPL", "AMD"]).unwrap();
        assert_eq!(cli.mode(), DataMode::Simulated);
        assert_eq!(
            cli.ticker_source(),
            TickerSource::Symbols(vec!["AAPL".into(), "AMD".into()])
        );
    }

    #[test]
    fn test_file_without_mode() {
        let cli = Cli::try_parse_from(["sigmaflow", "tickers.tsv"]).unwrap();
        assert_eq!(cli.mode(), DataMode::Simulated);
        assert_eq!(cli.ticker_source(), TickerSource::File(PathBuf::from("tickers.tsv")));
    }

    #[test]
    fn test_mode_only() {
        let cli = Cli::try_parse_from(["sigmaflow", "live"]).unwrap();
        assert_eq!(cli.mode(), DataMode::Live);
        assert!(cli.inputs().is_empty());
    }

    #[test]
    fn test_is_tabular_file() {
        assert!(is_tabular_file(Path::new("tickers.tsv")));
        assert!(!is_tabular_file(Path::new("tickers.txt")));
        assert!(!is_tabular_file(Path::new("MSFT")));
    }
}

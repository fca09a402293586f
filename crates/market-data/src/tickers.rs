//! Ticker list input
//!
//! Tickers come either from the command line or from the first column of a
//! delimited file with a header row.

use common::Ticker;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::MarketDataError;
use crate::Result;

fn delimiter_for(path: &Path) -> char {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => '\t',
        _ => ',',
    }
}

/// Read tickers from the first column of a CSV/TSV file, skipping the header
pub fn load_tickers_from_file(path: &Path) -> Result<Vec<Ticker>> {
    let content = std::fs::read_to_string(path).map_err(|e| MarketDataError::TickerFile {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let delimiter = delimiter_for(path);

    let mut tickers = Vec::new();
    for (line_no, line) in content.lines().enumerate().skip(1) {
        let first = line.split(delimiter).next().unwrap_or_default();
        if first.trim().trim_matches('"').trim().is_empty() {
            continue;
        }
        match Ticker::parse(first) {
            Ok(ticker) => tickers.push(ticker),
            Err(e) => warn!(path = %path.display(), line = line_no + 1, error = %e, "Skipping ticker"),
        }
    }

    debug!(path = %path.display(), count = tickers.len(), "Loaded tickers from file");
    Ok(dedupe(tickers))
}

/// Parse ticker symbols given on the command line
pub fn parse_symbols<I, S>(symbols: I) -> Result<Vec<Ticker>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let tickers = symbols
        .into_iter()
        .map(|s| Ticker::parse(s.as_ref()))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(dedupe(tickers))
}

/// Drop repeated tickers, keeping first occurrences in order
pub fn dedupe(tickers: Vec<Ticker>) -> Vec<Ticker> {
    let mut seen = HashSet::new();
    tickers.into_iter().filter(|t| seen.insert(t.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::path::PathBuf;

    fn write_temp(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("sigmaflow-{}-{}", std::process::id(), name));
        std::fs::write(&path, content).unwrap();
        path
    }

    fn symbols(tickers: &[Ticker]) -> Vec<&str> {
        tickers.iter().map(|t| t.as_str()).collect()
    }

    #[test]
    fn test_load_csv_first_column() {
        let path = write_temp(
            "screen.csv",
            "\"Ticker\",\"Company\",\"Sector\"\n\"MSFT\",\"Microsoft\",\"Technology\"\nNVDA,NVIDIA,Technology\n\n\"\",\"blank\"\nMSFT,dup,x\n",
        );
        let tickers = load_tickers_from_file(&path).unwrap();
        assert_eq!(symbols(&tickers), vec!["MSFT", "NVDA"]);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_tsv() {
        let path = write_temp("screen.tsv", "Ticker\tName\nTSLA\tTesla\nAAPL\tApple\n");
        let tickers = load_tickers_from_file(&path).unwrap();
        assert_eq!(symbols(&tickers), vec!["TSLA", "AAPL"]);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_header_only_file_is_empty() {
        let path = write_temp("header.csv", "Ticker,Company\n");
        assert!(load_tickers_from_file(&path).unwrap().is_empty());
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_missing_file() {
        let path = std::env::temp_dir().join("sigmaflow-does-not-exist.csv");
        assert_matches!(load_tickers_from_file(&path), Err(MarketDataError::TickerFile { .. }));
    }

    #[test]
    fn test_parse_symbols() {
        let tickers = parse_symbols(["MSFT", "TSLA", "MSFT"]).unwrap();
        assert_eq!(symbols(&tickers), vec!["MSFT", "TSLA"]);
        assert_matches!(parse_symbols(["MSFT", " "]), Err(MarketDataError::Common(_)));
    }
}

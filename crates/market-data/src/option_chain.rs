//! Option chain filtering
//!
//! Keeps expirations within a horizon from today and strikes within a band
//! around the underlying price.

use chrono::{Months, NaiveDate};
use ordered_float::OrderedFloat;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

use crate::types::parse_provider_date;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainFilter {
    pub today: NaiveDate,
    pub horizon_months: u32,
    /// Fraction of the underlying price, e.g. 0.2 for ±20%
    pub strike_band: f64,
}

impl ChainFilter {
    pub fn horizon_end(&self) -> NaiveDate {
        self.today
            .checked_add_months(Months::new(self.horizon_months))
            .unwrap_or(NaiveDate::MAX)
    }

    /// Filter raw provider expirations (`yyyyMMdd`) and strikes
    pub fn apply(&self, underlying_price: f64, expirations: &[String], strikes: &[f64]) -> OptionChainSummary {
        let horizon_end = self.horizon_end();
        let expirations: BTreeSet<NaiveDate> = expirations
            .iter()
            .filter_map(|raw| match parse_provider_date(raw) {
                Ok(date) => Some(date),
                Err(e) => {
                    debug!(expiration = %raw, error = %e, "Skipping unparseable expiration");
                    None
                }
            })
            .filter(|date| *date >= self.today && *date <= horizon_end)
            .collect();

        let lower = underlying_price * (1.0 - self.strike_band);
        let upper = underlying_price * (1.0 + self.strike_band);
        let strikes: BTreeSet<OrderedFloat<f64>> = strikes
            .iter()
            .copied()
            .filter(|k| k.is_finite() && *k >= lower && *k <= upper)
            .map(OrderedFloat)
            .collect();

        OptionChainSummary {
            expirations,
            strikes,
            horizon_months: self.horizon_months,
            strike_band: self.strike_band,
        }
    }
}

/// Filtered option chain for one ticker
#[derive(Debug, Clone, PartialEq)]
pub struct OptionChainSummary {
    pub expirations: BTreeSet<NaiveDate>,
    pub strikes: BTreeSet<OrderedFloat<f64>>,
    pub horizon_months: u32,
    pub strike_band: f64,
}

impl OptionChainSummary {
    pub fn nearest_expiration(&self) -> Option<NaiveDate> {
        self.expirations.iter().next().copied()
    }

    /// Strike nearest the underlying price; ties go to the lower strike
    pub fn atm_strike(&self, underlying_price: f64) -> Option<f64> {
        self.strikes
            .iter()
            .map(|k| k.into_inner())
            .min_by(|a, b| {
                let da = OrderedFloat((a - underlying_price).abs());
                let db = OrderedFloat((b - underlying_price).abs());
                da.cmp(&db).then(OrderedFloat(*a).cmp(&OrderedFloat(*b)))
            })
    }
}

impl fmt::Display for OptionChainSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let months = if self.horizon_months == 1 { "Month" } else { "Months" };
        let expirations: Vec<String> = self
            .expirations
            .iter()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .collect();
        let strikes: Vec<String> = self.strikes.iter().map(|k| format!("{}", k)).collect();

        writeln!(
            f,
            "   Expirations (<= {} {}): [{}]",
            self.horizon_months,
            months,
            expirations.join(", ")
        )?;
        write!(
            f,
            "   Strikes (+/- {:.0}%): [{}]",
            self.strike_band * 100.0,
            strikes.join(", ")
        )
    }
}

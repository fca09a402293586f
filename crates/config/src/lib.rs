//! Configuration for SigmaFlow
//!
//! The configuration is a YAML document with four optional sections.
//! Missing sections fall back to the defaults in [`defaults`]; the
//! validator records which defaults were applied.
//!
//! ```yaml
//! provider:
//!   host: 127.0.0.1
//!   port: 7496
//!   client_id: 0
//! session:
//!   expiry_horizon_months: 1
//!   strike_band_pct: 20.0
//!   ticker_timeout_secs: 120
//! logging:
//!   format: pretty
//! metrics:
//!   enabled: false
//! ```

use serde::{Deserialize, Serialize};

pub mod defaults;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use defaults::*;
pub use parser::*;
pub use substitution::*;
pub use validator::*;

/// Root configuration document
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SigmaflowConfig {
    #[serde(default)]
    pub provider: Option<ProviderConfig>,
    #[serde(default)]
    pub session: Option<SessionConfig>,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
}

impl SigmaflowConfig {
    pub fn provider(&self) -> ProviderConfig {
        self.provider.clone().unwrap_or_default()
    }

    pub fn session(&self) -> SessionConfig {
        self.session.clone().unwrap_or_default()
    }

    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    pub fn metrics(&self) -> MetricsConfig {
        self.metrics.clone().unwrap_or_default()
    }
}

/// Market-data gateway connection used in live mode
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_host")]
    pub host: String,
    /// 7496 for TWS, 7497 for paper trading, 4002 for the gateway
    #[serde(default = "default_provider_port")]
    pub port: u16,
    #[serde(default)]
    pub client_id: i32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            host: default_provider_host(),
            port: default_provider_port(),
            client_id: 0,
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Correlation session tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Option expirations later than today + this many months are dropped
    #[serde(default = "default_expiry_horizon_months")]
    pub expiry_horizon_months: u32,
    /// Strikes outside underlying ± this percentage are dropped
    #[serde(default = "default_strike_band_pct")]
    pub strike_band_pct: f64,
    /// Tickers still incomplete after this many seconds are marked timed out
    #[serde(default = "default_ticker_timeout_secs")]
    pub ticker_timeout_secs: u64,
    /// Annualized rate used for the theoretical ATM price
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    /// Request a snapshot price of the ATM call once the chain is known
    #[serde(default = "default_enabled")]
    pub request_option_snapshot: bool,
    #[serde(default = "default_bar_duration")]
    pub bar_duration: String,
    #[serde(default = "default_bar_size")]
    pub bar_size: String,
    #[serde(default = "default_volatility_duration")]
    pub volatility_duration: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiry_horizon_months: default_expiry_horizon_months(),
            strike_band_pct: default_strike_band_pct(),
            ticker_timeout_secs: default_ticker_timeout_secs(),
            risk_free_rate: default_risk_free_rate(),
            request_option_snapshot: default_enabled(),
            bar_duration: default_bar_duration(),
            bar_size: default_bar_size(),
            volatility_duration: default_volatility_duration(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

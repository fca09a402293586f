pub fn default_enabled() -> bool {
    true
}

pub fn default_provider_host() -> String {
    "127.0.0.1".to_string()
}

pub fn default_provider_port() -> u16 {
    7496
}

pub fn default_connect_timeout_secs() -> u64 {
    5
}

pub fn default_expiry_horizon_months() -> u32 {
    1
}

pub fn default_strike_band_pct() -> f64 {
    20.0
}

pub fn default_ticker_timeout_secs() -> u64 {
    120
}

pub fn default_risk_free_rate() -> f64 {
    0.05
}

pub fn default_bar_duration() -> String {
    "1 M".to_string()
}

pub fn default_bar_size() -> String {
    "1 day".to_string()
}

pub fn default_volatility_duration() -> String {
    "30 D".to_string()
}

pub fn default_log_format() -> String {
    "pretty".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_metrics_port() -> u16 {
    9090
}

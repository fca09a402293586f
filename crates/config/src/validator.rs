use crate::*;
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    #[error("Provider host is required")]
    MissingProviderHost,

    #[error("{field} must be a positive integer")]
    InvalidPositiveInteger { field: String },

    #[error("{field} must be between 0 and 100 (exclusive), got {value}")]
    InvalidPercentageRange { field: String, value: f64 },

    #[error("{field} must be a finite number, got {value}")]
    NonFiniteNumber { field: String, value: f64 },

    #[error("Invalid duration '{value}' for {field}. Expected '<n> <S|D|W|M|Y>' (e.g. 30 D)")]
    InvalidDuration { field: String, value: String },

    #[error("Invalid bar size '{0}'. Expected e.g. '1 day', '1 hour', '5 mins'")]
    InvalidBarSize(String),

    #[error("Invalid log format: {0}. Must be one of: pretty, json, compact")]
    InvalidLogFormat(String),

    #[error("Environment variable placeholder in {field} is unresolved: {value}")]
    UnresolvedEnvVar { field: String, value: String },
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DefaultApplied {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub defaults_applied: Vec<DefaultApplied>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            defaults_applied: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_default(&mut self, field: &str, value: &str) {
        self.defaults_applied.push(DefaultApplied {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_config(config: &SigmaflowConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    if config.provider.is_none() {
        report.add_default("provider", "127.0.0.1:7496 (client 0)");
    }
    if config.session.is_none() {
        report.add_default("session", "1 month horizon, ±20% strikes, 120s timeout");
    }
    if config.logging.is_none() {
        report.add_default("logging", "pretty, info");
    }
    if config.metrics.is_none() {
        report.add_default("metrics", "disabled");
    }

    validate_provider(&config.provider(), &mut report);
    validate_session(&config.session(), &mut report);
    validate_logging(&config.logging(), &mut report);
    validate_metrics(&config.metrics(), &mut report);

    report
}

fn validate_provider(provider: &ProviderConfig, report: &mut ValidationReport) {
    if provider.host.trim().is_empty() {
        report.add_error(ValidationError::MissingProviderHost);
    } else if has_unresolved_env_vars(&provider.host) {
        report.add_error(ValidationError::UnresolvedEnvVar {
            field: "provider.host".to_string(),
            value: provider.host.clone(),
        });
    }

    if provider.port == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "provider.port".to_string(),
        });
    }

    if provider.connect_timeout_secs == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "provider.connect_timeout_secs".to_string(),
        });
    }

    if provider.client_id < 0 {
        report.add_warning(
            "provider.client_id",
            "Negative client ids are rejected by most gateways",
        );
    }
}

fn validate_session(session: &SessionConfig, report: &mut ValidationReport) {
    if session.expiry_horizon_months == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "session.expiry_horizon_months".to_string(),
        });
    } else if session.expiry_horizon_months > 12 {
        report.add_warning(
            "session.expiry_horizon_months",
            "Horizons beyond a year produce very large option chain summaries",
        );
    }

    if !session.strike_band_pct.is_finite()
        || session.strike_band_pct <= 0.0
        || session.strike_band_pct >= 100.0
    {
        report.add_error(ValidationError::InvalidPercentageRange {
            field: "session.strike_band_pct".to_string(),
            value: session.strike_band_pct,
        });
    }

    if session.ticker_timeout_secs == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "session.ticker_timeout_secs".to_string(),
        });
    }

    if !session.risk_free_rate.is_finite() {
        report.add_error(ValidationError::NonFiniteNumber {
            field: "session.risk_free_rate".to_string(),
            value: session.risk_free_rate,
        });
    } else if !(0.0..=0.25).contains(&session.risk_free_rate) {
        report.add_warning(
            "session.risk_free_rate",
            "Rate is expressed as a decimal (0.05 = 5%); value looks out of range",
        );
    }

    let duration_regex = Regex::new(r"^\d+ [SDWMY]$").unwrap();
    for (field, value) in [
        ("session.bar_duration", &session.bar_duration),
        ("session.volatility_duration", &session.volatility_duration),
    ] {
        if !duration_regex.is_match(value) {
            report.add_error(ValidationError::InvalidDuration {
                field: field.to_string(),
                value: value.clone(),
            });
        }
    }

    let bar_size_regex =
        Regex::new(r"^\d+ (secs?|mins?|hours?|day|days|week|weeks|month|months)$").unwrap();
    if !bar_size_regex.is_match(&session.bar_size) {
        report.add_error(ValidationError::InvalidBarSize(session.bar_size.clone()));
    } else if session.bar_size != "1 day" {
        report.add_warning(
            "session.bar_size",
            "Realized volatility is annualized with 252 periods and assumes daily bars",
        );
    }
}

fn validate_logging(logging: &LoggingConfig, report: &mut ValidationReport) {
    let valid_formats = ["pretty", "json", "compact"];
    if !valid_formats.contains(&logging.format.to_lowercase().as_str()) {
        report.add_error(ValidationError::InvalidLogFormat(logging.format.clone()));
    }
}

fn validate_metrics(metrics: &MetricsConfig, report: &mut ValidationReport) {
    if metrics.enabled && metrics.port == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "metrics.port".to_string(),
        });
    }
}

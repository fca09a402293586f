//! Market data error types

use common::{RequestId, Ticker};
use thiserror::Error;

/// Errors that can occur during market data operations
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// Request id is unknown or already released
    #[error("Request not found: {0}")]
    RequestNotFound(RequestId),

    /// Ticker is not part of this session
    #[error("Unknown ticker: {0}")]
    UnknownTicker(Ticker),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Provider rejected or could not accept a request
    #[error("Provider error: {0}")]
    Provider(String),

    /// Date field could not be parsed
    #[error("Invalid date '{value}': {reason}")]
    InvalidDate { value: String, reason: String },

    /// Ticker list file could not be used
    #[error("Ticker file {path}: {message}")]
    TickerFile { path: String, message: String },

    #[error(transparent)]
    Common(#[from] common::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

//! Provider callbacks
//!
//! The closed set of callbacks the correlation engine understands. Provider
//! adapters translate their native callbacks into these and discard the rest.

use common::RequestId;
use serde::{Deserialize, Serialize};

use crate::types::{Bar, ContractMetadata, TickField};

/// Error codes in this range are connectivity and data-farm notices
pub const NOTICE_CODES: std::ops::RangeInclusive<i32> = 2100..=2199;

/// Sent with a request id when delayed data is served instead of live data
pub const DELAYED_DATA_NOTICE: i32 = 10167;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderEvent {
    ContractDetails {
        req_id: RequestId,
        details: ContractMetadata,
    },
    ContractDetailsEnd {
        req_id: RequestId,
    },
    TickPrice {
        req_id: RequestId,
        field: TickField,
        price: f64,
    },
    /// One historical bar, or one dated HV/IV sample
    Bar {
        req_id: RequestId,
        bar: Bar,
    },
    HistoricalDataEnd {
        req_id: RequestId,
        start: String,
        end: String,
    },
    OptionParameters {
        req_id: RequestId,
        exchange: String,
        expirations: Vec<String>,
        strikes: Vec<f64>,
    },
    OptionParametersEnd {
        req_id: RequestId,
    },
    Error {
        #[serde(default)]
        req_id: Option<RequestId>,
        code: i32,
        message: String,
    },
    ConnectionClosed,
}

impl ProviderEvent {
    /// Request the callback belongs to, if any
    pub fn req_id(&self) -> Option<RequestId> {
        match self {
            ProviderEvent::ContractDetails { req_id, .. }
            | ProviderEvent::ContractDetailsEnd { req_id }
            | ProviderEvent::TickPrice { req_id, .. }
            | ProviderEvent::Bar { req_id, .. }
            | ProviderEvent::HistoricalDataEnd { req_id, .. }
            | ProviderEvent::OptionParameters { req_id, .. }
            | ProviderEvent::OptionParametersEnd { req_id } => Some(*req_id),
            ProviderEvent::Error { req_id, .. } => *req_id,
            ProviderEvent::ConnectionClosed => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProviderEvent::ContractDetails { .. } => "contract_details",
            ProviderEvent::ContractDetailsEnd { .. } => "contract_details_end",
            ProviderEvent::TickPrice { .. } => "tick_price",
            ProviderEvent::Bar { .. } => "bar",
            ProviderEvent::HistoricalDataEnd { .. } => "historical_data_end",
            ProviderEvent::OptionParameters { .. } => "option_parameters",
            ProviderEvent::OptionParametersEnd { .. } => "option_parameters_end",
            ProviderEvent::Error { .. } => "error",
            ProviderEvent::ConnectionClosed => "connection_closed",
        }
    }
}

/// True for informational provider codes that do not indicate a failed request
pub fn is_notice(code: i32) -> bool {
    NOTICE_CODES.contains(&code) || code == DELAYED_DATA_NOTICE
}

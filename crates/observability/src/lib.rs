//! Observability infrastructure for SigmaFlow
//!
//! This crate provides:
//! - Structured logging via tracing
//! - Prometheus metrics for the correlation session
//!
//! # Quick Start
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("sigmaflow", LogFormat::Pretty, "info")?;
//!
//! // Optional Prometheus endpoint
//! observability::metrics::init_metrics(9090)?;
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::{init_metrics, SessionMetrics};

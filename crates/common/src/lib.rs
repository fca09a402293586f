//! Common types and utilities for SigmaFlow
//!
//! This crate provides shared types used across all SigmaFlow crates.
//!
//! # Modules
//!
//! - [`error`] - Common error types
//! - [`types`] - Shared domain types (Ticker, RequestId, RequestKind)

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

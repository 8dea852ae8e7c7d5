//! Common types module for the payment sync system.
//!
//! This module defines the core data types shared by the contract
//! collaborators, the slippage calculator and the sync/recovery core. It
//! provides a single location for these types so every component agrees on
//! the same lifecycle vocabulary.

/// Cleanup strategies, failure reasons and recovery operations.
pub mod cleanup;
/// Event types published on the payment sync event bus.
pub mod events;
/// Payment lifecycle types: frontend state, contract status and snapshots.
pub mod payment;
/// Retry policy shared by contract reads and cleanup execution.
pub mod retry;
/// Slippage recommendation types.
pub mod slippage;
/// Utility functions for formatting and time.
pub mod utils;

pub use cleanup::*;
pub use events::*;
pub use payment::*;
pub use retry::RetryPolicy;
pub use slippage::*;
pub use utils::{current_timestamp, format_bps, format_token_amount, truncate_id, with_0x_prefix};

// Re-exported so downstream crates name EVM primitives through one path.
pub use alloy_primitives::{Address, TxHash, U256};

use thiserror::Error;

/// Error returned when parsing one of the string-backed enums fails.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown {kind}: '{value}'")]
pub struct ParseEnumError {
	pub kind: &'static str,
	pub value: String,
}

impl ParseEnumError {
	pub fn new(kind: &'static str, value: &str) -> Self {
		Self {
			kind,
			value: value.to_string(),
		}
	}
}

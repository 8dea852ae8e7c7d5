//! Slippage recommendation for the payment sync system.
//!
//! Classifies token pairs against known-address allowlists, scales a base
//! slippage by market volatility, trade size and user preference, and keeps
//! the applied amount bit-exact with the payment contract.

use thiserror::Error;

/// Slippage calculation and the on-chain slippage formula.
pub mod calculator;
/// Oracle-backed market data and volatility tracking.
pub mod market;
/// Per-flow slippage state.
pub mod service;
/// Stable/native token allowlists.
pub mod tokens;

pub use calculator::{apply_slippage_protection, SlippageCalculator, BPS_DENOMINATOR};
pub use market::{eth_price_from_quote, MarketDataService, VolatilityTracker};
pub use service::{SlippageService, DEFAULT_SLIPPAGE_BPS};
pub use tokens::TokenRegistry;

/// Errors that can occur during slippage operations.
#[derive(Debug, Error)]
pub enum PricingError {
	/// Slippage outside `0..=10000` basis points.
	#[error("Invalid slippage: {0} bps")]
	InvalidSlippage(u32),
	/// The price oracle could not be read.
	#[error("Oracle error: {0}")]
	Oracle(String),
	/// An amount could not be converted for pricing.
	#[error("Conversion error: {0}")]
	Conversion(String),
}

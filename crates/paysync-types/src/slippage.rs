//! Slippage recommendation types.
//!
//! All slippage values are integer basis points (10000 bps = 100%), the unit
//! the payment contract applies on-chain.

use alloy_primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ParseEnumError;

/// Liquidity/volatility profile of a single token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenClass {
	Stable,
	Native,
	Exotic,
}

/// Classification of a token pair used to pick a base slippage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PairType {
	StableStable,
	StableNative,
	NativeNative,
	ExoticStable,
	ExoticNative,
	Unknown,
}

impl PairType {
	/// Classifies a pair regardless of direction.
	pub fn classify(from: TokenClass, to: TokenClass) -> Self {
		use TokenClass::*;
		match (from, to) {
			(Stable, Stable) => Self::StableStable,
			(Stable, Native) | (Native, Stable) => Self::StableNative,
			(Native, Native) => Self::NativeNative,
			(Exotic, Stable) | (Stable, Exotic) => Self::ExoticStable,
			(Exotic, Native) | (Native, Exotic) => Self::ExoticNative,
			(Exotic, Exotic) => Self::Unknown,
		}
	}

	pub fn base_slippage_bps(&self) -> u32 {
		match self {
			Self::StableStable => 10,
			Self::StableNative => 50,
			Self::NativeNative => 30,
			Self::ExoticStable => 150,
			Self::ExoticNative => 100,
			Self::Unknown => 250,
		}
	}

	pub fn is_known(&self) -> bool {
		!matches!(self, Self::Unknown)
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::StableStable => "stable-stable",
			Self::StableNative => "stable-native",
			Self::NativeNative => "native-native",
			Self::ExoticStable => "exotic-stable",
			Self::ExoticNative => "exotic-native",
			Self::Unknown => "unknown",
		}
	}
}

impl fmt::Display for PairType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Market volatility bucket derived from the rolling ETH price deviation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketVolatility {
	VeryLow,
	Low,
	#[default]
	Medium,
	High,
	Extreme,
}

impl MarketVolatility {
	/// Buckets a price deviation expressed in percent.
	pub fn from_deviation_pct(deviation_pct: Decimal) -> Self {
		let deviation = deviation_pct.abs();
		if deviation < Decimal::new(5, 1) {
			Self::VeryLow
		} else if deviation < Decimal::new(15, 1) {
			Self::Low
		} else if deviation < Decimal::from(3) {
			Self::Medium
		} else if deviation < Decimal::from(6) {
			Self::High
		} else {
			Self::Extreme
		}
	}

	/// Multiplier applied to the base slippage, between 0.5x and 2.0x.
	pub fn multiplier(&self) -> Decimal {
		match self {
			Self::VeryLow => Decimal::new(5, 1),
			Self::Low => Decimal::new(75, 2),
			Self::Medium => Decimal::ONE,
			Self::High => Decimal::new(15, 1),
			Self::Extreme => Decimal::TWO,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::VeryLow => "very low",
			Self::Low => "low",
			Self::Medium => "medium",
			Self::High => "high",
			Self::Extreme => "extreme",
		}
	}
}

impl fmt::Display for MarketVolatility {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Slippage tolerance level, used both for explicit user preferences and
/// to label a computed recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlippageTolerance {
	Minimal,
	Low,
	Standard,
	High,
	Maximum,
}

impl SlippageTolerance {
	pub const ALL: [SlippageTolerance; 5] = [
		Self::Minimal,
		Self::Low,
		Self::Standard,
		Self::High,
		Self::Maximum,
	];

	/// Preference multiplier, between 0.1x and 5.0x.
	pub fn multiplier(&self) -> Decimal {
		match self {
			Self::Minimal => Decimal::new(1, 1),
			Self::Low => Decimal::new(5, 1),
			Self::Standard => Decimal::ONE,
			Self::High => Decimal::TWO,
			Self::Maximum => Decimal::from(5),
		}
	}

	/// Labels a final slippage value.
	pub fn from_bps(bps: u32) -> Self {
		match bps {
			0..=20 => Self::Minimal,
			21..=50 => Self::Low,
			51..=150 => Self::Standard,
			151..=300 => Self::High,
			_ => Self::Maximum,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Minimal => "minimal",
			Self::Low => "low",
			Self::Standard => "standard",
			Self::High => "high",
			Self::Maximum => "maximum",
		}
	}
}

impl fmt::Display for SlippageTolerance {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for SlippageTolerance {
	type Err = ParseEnumError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let normalized = s.trim().to_lowercase();
		Self::ALL
			.into_iter()
			.find(|level| level.as_str() == normalized)
			.ok_or_else(|| ParseEnumError::new("slippage tolerance", s))
	}
}

/// How the user is paying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
	Eth,
	Usdc,
	Token,
}

impl FromStr for PaymentMethod {
	type Err = ParseEnumError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_lowercase().as_str() {
			"eth" => Ok(Self::Eth),
			"usdc" => Ok(Self::Usdc),
			"token" | "other_token" => Ok(Self::Token),
			_ => Err(ParseEnumError::new("payment method", s)),
		}
	}
}

/// Input of a slippage recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlippageRequest {
	pub from_token: Address,
	pub to_token: Address,
	/// Amount in the smallest unit of `from_token`.
	pub from_amount: U256,
	pub payment_method: PaymentMethod,
	pub user_preference: Option<SlippageTolerance>,
}

/// Pool fee tiers advertised by the price oracle, in hundredths of a bip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolFeeTiers {
	pub default_fee: u32,
	pub stable_fee: u32,
	pub high_fee: u32,
}

impl PoolFeeTiers {
	pub fn for_pair(&self, pair: PairType) -> u32 {
		match pair {
			PairType::StableStable => self.stable_fee,
			PairType::ExoticStable | PairType::ExoticNative | PairType::Unknown => self.high_fee,
			PairType::StableNative | PairType::NativeNative => self.default_fee,
		}
	}
}

/// Cached market state used by the calculator, refreshed on an interval.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RealTimeSlippageData {
	pub eth_price_usd: Option<Decimal>,
	pub price_deviation_pct: Option<Decimal>,
	pub volatility: MarketVolatility,
	pub contract_default_slippage_bps: Option<u32>,
	pub pool_fees: Option<PoolFeeTiers>,
	pub last_updated: Option<u64>,
}

impl RealTimeSlippageData {
	/// True once at least one oracle refresh succeeded.
	pub fn is_live(&self) -> bool {
		self.last_updated.is_some() && self.eth_price_usd.is_some()
	}
}

/// A slippage recommendation. `minimum <= recommended <= maximum` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlippageRecommendation {
	pub recommended: u32,
	pub minimum: u32,
	pub maximum: u32,
	pub level: SlippageTolerance,
	pub reasoning: String,
	pub market_volatility: MarketVolatility,
	pub pair_type: PairType,
	/// 0 to 100.
	pub confidence: u8,
	pub pool_fee: Option<u32>,
	pub contract_default_slippage_bps: Option<u32>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_pair_classification_is_symmetric() {
		use TokenClass::*;
		for (a, b) in [
			(Stable, Native),
			(Exotic, Stable),
			(Exotic, Native),
			(Native, Native),
		] {
			assert_eq!(PairType::classify(a, b), PairType::classify(b, a));
		}
		assert_eq!(PairType::classify(Exotic, Exotic), PairType::Unknown);
		assert_eq!(PairType::StableStable.base_slippage_bps(), 10);
		assert_eq!(PairType::Unknown.base_slippage_bps(), 250);
	}

	#[test]
	fn test_volatility_buckets() {
		assert_eq!(
			MarketVolatility::from_deviation_pct(Decimal::new(2, 1)),
			MarketVolatility::VeryLow
		);
		assert_eq!(
			MarketVolatility::from_deviation_pct(Decimal::ONE),
			MarketVolatility::Low
		);
		assert_eq!(
			MarketVolatility::from_deviation_pct(Decimal::new(-25, 1)),
			MarketVolatility::Medium
		);
		assert_eq!(
			MarketVolatility::from_deviation_pct(Decimal::from(5)),
			MarketVolatility::High
		);
		assert_eq!(
			MarketVolatility::from_deviation_pct(Decimal::from(12)),
			MarketVolatility::Extreme
		);
	}

	#[test]
	fn test_multiplier_ranges() {
		assert_eq!(MarketVolatility::VeryLow.multiplier(), Decimal::new(5, 1));
		assert_eq!(MarketVolatility::Extreme.multiplier(), Decimal::TWO);
		assert_eq!(SlippageTolerance::Minimal.multiplier(), Decimal::new(1, 1));
		assert_eq!(SlippageTolerance::Maximum.multiplier(), Decimal::from(5));
	}

	#[test]
	fn test_fee_tier_selection() {
		let tiers = PoolFeeTiers {
			default_fee: 3000,
			stable_fee: 500,
			high_fee: 10000,
		};
		assert_eq!(tiers.for_pair(PairType::StableStable), 500);
		assert_eq!(tiers.for_pair(PairType::StableNative), 3000);
		assert_eq!(tiers.for_pair(PairType::Unknown), 10000);
	}

	#[test]
	fn test_tolerance_labels() {
		assert_eq!(SlippageTolerance::from_bps(15), SlippageTolerance::Minimal);
		assert_eq!(SlippageTolerance::from_bps(60), SlippageTolerance::Standard);
		assert_eq!(SlippageTolerance::from_bps(500), SlippageTolerance::Maximum);
		assert_eq!(
			"HIGH".parse::<SlippageTolerance>(),
			Ok(SlippageTolerance::High)
		);
	}
}

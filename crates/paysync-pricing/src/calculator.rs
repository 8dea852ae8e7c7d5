//! Slippage recommendation and the on-chain slippage formula.
//!
//! The recommendation is a heuristic; [`apply_slippage_protection`] is not.
//! It must produce exactly the minimum output the payment contract computes,
//! otherwise the execution reverts or the user receives less than quoted.

use crate::{PricingError, TokenRegistry};
use alloy_primitives::U256;
use paysync_config::SlippageConfig;
use paysync_types::{
	format_bps, MarketVolatility, PairType, PaymentMethod, RealTimeSlippageData, SlippageRecommendation,
	SlippageRequest, SlippageTolerance, TokenClass,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Basis point denominator used by the contract.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Minimum output after slippage, bit-exact with the contract.
///
/// Computes `amount * (10000 - bps) / 10000` with floor division and never
/// returns less than 1 for a non-zero amount. The product is split into
/// quotient and remainder so it cannot overflow for any `U256`.
pub fn apply_slippage_protection(amount: U256, slippage_bps: u32) -> Result<U256, PricingError> {
	if slippage_bps > BPS_DENOMINATOR {
		return Err(PricingError::InvalidSlippage(slippage_bps));
	}
	if amount.is_zero() {
		return Ok(U256::ZERO);
	}

	let denominator = U256::from(BPS_DENOMINATOR);
	let multiplier = U256::from(BPS_DENOMINATOR - slippage_bps);
	let quotient = amount / denominator;
	let remainder = amount % denominator;
	let protected = quotient * multiplier + remainder * multiplier / denominator;

	Ok(protected.max(U256::from(1)))
}

/// Pure slippage recommendation over the configured allowlists and limits.
#[derive(Debug, Clone)]
pub struct SlippageCalculator {
	registry: TokenRegistry,
	max_auto_slippage_bps: u32,
	safety_buffer_bps: u32,
	fallback_eth_price_usd: Decimal,
}

impl SlippageCalculator {
	/// The slippage ceiling is kept within `1..=10000` even for an
	/// unvalidated config.
	pub fn new(config: &SlippageConfig) -> Self {
		Self {
			registry: TokenRegistry::from_config(config),
			max_auto_slippage_bps: config.max_auto_slippage_bps.clamp(1, BPS_DENOMINATOR),
			safety_buffer_bps: config.safety_buffer_bps,
			fallback_eth_price_usd: config.fallback_eth_price_usd,
		}
	}

	pub fn registry(&self) -> &TokenRegistry {
		&self.registry
	}

	pub fn max_auto_slippage_bps(&self) -> u32 {
		self.max_auto_slippage_bps
	}

	pub fn classify_pair(&self, request: &SlippageRequest) -> PairType {
		PairType::classify(
			self.registry.classify(&request.from_token),
			self.registry.classify(&request.to_token),
		)
	}

	/// Recommends a slippage for `request` given the cached market state.
	pub fn calculate(
		&self,
		request: &SlippageRequest,
		market: &RealTimeSlippageData,
	) -> SlippageRecommendation {
		let pair_type = self.classify_pair(request);
		let base = pair_type.base_slippage_bps();
		let volatility = market.volatility;
		let notional = self.notional_usd(request, market);
		let size_multiplier = trade_size_multiplier(notional);
		let preference_multiplier = request
			.user_preference
			.map(|level| level.multiplier())
			.unwrap_or(Decimal::ONE);

		let scaled = (Decimal::from(base) * volatility.multiplier() * size_multiplier
			* preference_multiplier)
			.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
			.to_u32()
			.unwrap_or(self.max_auto_slippage_bps);

		let recommended = scaled
			.saturating_add(self.safety_buffer_bps)
			.clamp(1, self.max_auto_slippage_bps);
		let minimum = (recommended / 2).max(1);
		let maximum = self.max_auto_slippage_bps.min(recommended.saturating_mul(2));

		let confidence = confidence_score(pair_type, market, volatility);

		let mut reasoning = format!(
			"{} pair starts at {}, {} volatility ({}x), ",
			pair_type,
			format_bps(base),
			volatility,
			volatility.multiplier().normalize()
		);
		match notional {
			Some(usd) if usd < Decimal::MAX => reasoning.push_str(&format!(
				"trade size ~${} ({}x), ",
				usd.round_dp(2),
				size_multiplier.normalize()
			)),
			Some(_) => reasoning.push_str(&format!(
				"very large trade ({}x), ",
				size_multiplier.normalize()
			)),
			None => reasoning.push_str("trade size not priced (1x), "),
		}
		if let Some(level) = request.user_preference {
			reasoning.push_str(&format!(
				"{} preference ({}x), ",
				level,
				level.multiplier().normalize()
			));
		}
		reasoning.push_str(&format!(
			"plus {} safety buffer",
			format_bps(self.safety_buffer_bps)
		));
		if recommended == self.max_auto_slippage_bps {
			reasoning.push_str(&format!(
				", capped at {}",
				format_bps(self.max_auto_slippage_bps)
			));
		}

		SlippageRecommendation {
			recommended,
			minimum,
			maximum,
			level: SlippageTolerance::from_bps(recommended),
			reasoning,
			market_volatility: volatility,
			pair_type,
			confidence,
			pool_fee: market.pool_fees.map(|tiers| tiers.for_pair(pair_type)),
			contract_default_slippage_bps: market.contract_default_slippage_bps,
		}
	}

	/// USD value of the input amount; `None` when the token cannot be priced.
	///
	/// Amounts too large for `Decimal` are reported as `Decimal::MAX`.
	fn notional_usd(&self, request: &SlippageRequest, market: &RealTimeSlippageData) -> Option<Decimal> {
		let class = self.registry.classify(&request.from_token);
		let decimals = self
			.registry
			.decimals(&request.from_token)
			.unwrap_or(match request.payment_method {
				PaymentMethod::Usdc => 6,
				PaymentMethod::Eth | PaymentMethod::Token => 18,
			});
		let amount = match token_amount(request.from_amount, decimals) {
			Some(amount) => amount,
			None => return Some(Decimal::MAX),
		};
		let eth_price = market.eth_price_usd.unwrap_or(self.fallback_eth_price_usd);

		match (class, request.payment_method) {
			(TokenClass::Stable, _) | (TokenClass::Exotic, PaymentMethod::Usdc) => Some(amount),
			(TokenClass::Native, _) | (TokenClass::Exotic, PaymentMethod::Eth) => {
				Some(amount.checked_mul(eth_price).unwrap_or(Decimal::MAX))
			},
			(TokenClass::Exotic, PaymentMethod::Token) => None,
		}
	}
}

/// Converts a raw token amount into whole units.
fn token_amount(raw: U256, decimals: u8) -> Option<Decimal> {
	let mut amount = Decimal::from_str(&raw.to_string()).ok()?;
	amount.set_scale(u32::from(decimals)).ok()?;
	Some(amount)
}

/// 1.0x below $1k, 1.1x below $10k, 1.25x below $50k, 1.5x above.
fn trade_size_multiplier(notional_usd: Option<Decimal>) -> Decimal {
	match notional_usd {
		None => Decimal::ONE,
		Some(usd) if usd < Decimal::from(1_000) => Decimal::ONE,
		Some(usd) if usd < Decimal::from(10_000) => Decimal::new(11, 1),
		Some(usd) if usd < Decimal::from(50_000) => Decimal::new(125, 2),
		Some(_) => Decimal::new(15, 1),
	}
}

fn confidence_score(pair: PairType, market: &RealTimeSlippageData, volatility: MarketVolatility) -> u8 {
	let mut score: i32 = 50;
	score += if pair.is_known() { 20 } else { -20 };
	score += if market.is_live() { 15 } else { -15 };
	if volatility == MarketVolatility::Extreme {
		score -= 25;
	}
	score.clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{address, Address};
	use paysync_types::PoolFeeTiers;

	const USDC: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");
	const DAI: Address = address!("50c5725949A6F0c72E6C4a641F24049A917DB0Cb");
	const WETH: Address = address!("4200000000000000000000000000000000000006");
	const EXOTIC: Address = address!("000000000000000000000000000000000000dEaD");
	const EXOTIC_2: Address = address!("000000000000000000000000000000000000bEEF");

	fn calculator() -> SlippageCalculator {
		SlippageCalculator::new(&SlippageConfig::default())
	}

	fn request(from: Address, to: Address, amount: U256, method: PaymentMethod) -> SlippageRequest {
		SlippageRequest {
			from_token: from,
			to_token: to,
			from_amount: amount,
			payment_method: method,
			user_preference: None,
		}
	}

	fn usdc(units: u64) -> U256 {
		U256::from(units) * U256::from(1_000_000u64)
	}

	fn live(volatility: MarketVolatility) -> RealTimeSlippageData {
		RealTimeSlippageData {
			eth_price_usd: Some(Decimal::from(3000)),
			price_deviation_pct: Some(Decimal::ONE),
			volatility,
			contract_default_slippage_bps: Some(100),
			pool_fees: Some(PoolFeeTiers {
				default_fee: 3000,
				stable_fee: 500,
				high_fee: 10000,
			}),
			last_updated: Some(1_700_000_000),
		}
	}

	#[test]
	fn test_slippage_protection_matches_contract_formula() {
		let amount = U256::from(1_000_000u64);
		assert_eq!(
			apply_slippage_protection(amount, 50).unwrap(),
			U256::from(995_000u64)
		);
		assert_eq!(apply_slippage_protection(amount, 0).unwrap(), amount);

		// floor division
		assert_eq!(
			apply_slippage_protection(U256::from(12_345u64), 33).unwrap(),
			U256::from(12_345u64 * 9_967 / 10_000)
		);
	}

	#[test]
	fn test_slippage_protection_edge_cases() {
		assert_eq!(
			apply_slippage_protection(U256::from(1u64), 500).unwrap(),
			U256::from(1u64)
		);
		assert_eq!(
			apply_slippage_protection(U256::from(5u64), 10_000).unwrap(),
			U256::from(1u64)
		);
		assert_eq!(
			apply_slippage_protection(U256::ZERO, 100).unwrap(),
			U256::ZERO
		);
		assert!(matches!(
			apply_slippage_protection(U256::from(100u64), 10_001),
			Err(PricingError::InvalidSlippage(10_001))
		));
	}

	#[test]
	fn test_slippage_protection_does_not_overflow() {
		let expected = U256::MAX / U256::from(10_000u64) * U256::from(9_900u64)
			+ (U256::MAX % U256::from(10_000u64)) * U256::from(9_900u64) / U256::from(10_000u64);
		assert_eq!(apply_slippage_protection(U256::MAX, 100).unwrap(), expected);
		assert!(expected < U256::MAX);
	}

	#[test]
	fn test_slippage_protection_exhaustive_small_amounts() {
		for amount in [1u64, 2, 9_999, 10_000, 10_001, 123_456_789] {
			for bps in [0u32, 1, 10, 50, 499, 5_000, 9_999, 10_000] {
				let floor = amount as u128 * (10_000 - bps) as u128 / 10_000;
				let expected = U256::from(floor.max(1));
				assert_eq!(
					apply_slippage_protection(U256::from(amount), bps).unwrap(),
					expected,
					"amount={amount} bps={bps}"
				);
			}
		}
	}

	#[test]
	fn test_stable_pair_in_calm_market() {
		let calc = calculator();
		let rec = calc.calculate(
			&request(USDC, DAI, usdc(100), PaymentMethod::Usdc),
			&live(MarketVolatility::VeryLow),
		);
		assert_eq!(rec.pair_type, PairType::StableStable);
		// 10 bps * 0.5 + 10 bps buffer
		assert_eq!(rec.recommended, 15);
		assert!((10..=20).contains(&rec.recommended));
		assert_eq!(rec.minimum, 7);
		assert_eq!(rec.maximum, 30);
		assert_eq!(rec.level, SlippageTolerance::Minimal);
		assert_eq!(rec.pool_fee, Some(500));
		assert_eq!(rec.contract_default_slippage_bps, Some(100));
		assert_eq!(rec.confidence, 85);
	}

	#[test]
	fn test_stable_pair_without_market_data() {
		let rec = calculator().calculate(
			&request(USDC, DAI, usdc(100), PaymentMethod::Usdc),
			&RealTimeSlippageData::default(),
		);
		// Medium volatility by default: 10 * 1.0 + 10
		assert_eq!(rec.recommended, 20);
		assert_eq!(rec.confidence, 55);
		assert_eq!(rec.pool_fee, None);
	}

	#[test]
	fn test_trade_size_scales_eth_payments() {
		let calc = calculator();
		let one_eth = U256::from(10u64).pow(U256::from(18u64));
		// 1 ETH at $3000 lands in the 1.1x bucket
		let rec = calc.calculate(
			&request(Address::ZERO, USDC, one_eth, PaymentMethod::Eth),
			&live(MarketVolatility::Medium),
		);
		assert_eq!(rec.pair_type, PairType::StableNative);
		assert_eq!(rec.recommended, 55 + 10);

		// 20 ETH is $60k, the 1.5x bucket
		let rec = calc.calculate(
			&request(Address::ZERO, USDC, one_eth * U256::from(20u64), PaymentMethod::Eth),
			&live(MarketVolatility::Medium),
		);
		assert_eq!(rec.recommended, 75 + 10);
	}

	#[test]
	fn test_fallback_eth_price_is_used_without_oracle() {
		let calc = calculator();
		let four_eth = U256::from(4u64) * U256::from(10u64).pow(U256::from(18u64));
		// 4 ETH at the $2400 fallback is $9600, still below $10k
		let rec = calc.calculate(
			&request(WETH, USDC, four_eth, PaymentMethod::Eth),
			&RealTimeSlippageData::default(),
		);
		assert_eq!(rec.recommended, 55 + 10);
		assert!(rec.reasoning.contains("9600"));
	}

	#[test]
	fn test_unknown_pair_is_capped_and_penalized() {
		let calc = calculator();
		let mut req = request(EXOTIC, EXOTIC_2, U256::from(1u64), PaymentMethod::Token);
		req.user_preference = Some(SlippageTolerance::Maximum);
		let rec = calc.calculate(&req, &live(MarketVolatility::Extreme));

		assert_eq!(rec.pair_type, PairType::Unknown);
		assert_eq!(rec.recommended, 500);
		assert_eq!(rec.maximum, 500);
		assert_eq!(rec.level, SlippageTolerance::Maximum);
		assert!(rec.reasoning.contains("capped"));
		// 50 - 20 + 15 - 25
		assert_eq!(rec.confidence, 20);
		assert_eq!(rec.pool_fee, Some(10000));
	}

	#[test]
	fn test_minimal_preference_never_goes_below_one() {
		let config = SlippageConfig {
			safety_buffer_bps: 0,
			..SlippageConfig::default()
		};
		let calc = SlippageCalculator::new(&config);
		let mut req = request(USDC, DAI, usdc(1), PaymentMethod::Usdc);
		req.user_preference = Some(SlippageTolerance::Minimal);
		let rec = calc.calculate(&req, &live(MarketVolatility::VeryLow));
		assert_eq!(rec.recommended, 1);
		assert_eq!(rec.minimum, 1);
		assert_eq!(rec.maximum, 2);
	}

	#[test]
	fn test_degenerate_ceiling_is_normalized() {
		let calc = SlippageCalculator::new(&SlippageConfig {
			max_auto_slippage_bps: 0,
			..SlippageConfig::default()
		});
		assert_eq!(calc.max_auto_slippage_bps(), 1);
		let rec = calc.calculate(
			&request(EXOTIC, EXOTIC_2, usdc(100), PaymentMethod::Token),
			&live(MarketVolatility::Extreme),
		);
		assert_eq!(rec.recommended, 1);
		assert_eq!(rec.minimum, 1);
		assert_eq!(rec.maximum, 1);

		let calc = SlippageCalculator::new(&SlippageConfig {
			max_auto_slippage_bps: 20_000,
			..SlippageConfig::default()
		});
		assert_eq!(calc.max_auto_slippage_bps(), BPS_DENOMINATOR);
	}

	#[test]
	fn test_bounds_hold_across_inputs() {
		let calc = calculator();
		let tokens = [USDC, DAI, WETH, Address::ZERO, EXOTIC, EXOTIC_2];
		let amounts = [
			U256::from(1u64),
			usdc(500),
			usdc(20_000),
			U256::from(10u64).pow(U256::from(24u64)),
			U256::MAX,
		];
		let volatilities = [
			MarketVolatility::VeryLow,
			MarketVolatility::Medium,
			MarketVolatility::Extreme,
		];
		let preferences = [
			None,
			Some(SlippageTolerance::Minimal),
			Some(SlippageTolerance::Maximum),
		];
		for from in tokens {
			for to in tokens {
				for amount in amounts {
					for volatility in volatilities {
						for preference in preferences {
							let mut req = request(from, to, amount, PaymentMethod::Eth);
							req.user_preference = preference;
							let rec = calc.calculate(&req, &live(volatility));
							assert!(rec.minimum <= rec.recommended);
							assert!(rec.recommended <= rec.maximum);
							assert!(rec.recommended >= 1);
							assert!(rec.recommended <= calc.max_auto_slippage_bps());
							assert!(rec.confidence <= 100);
						}
					}
				}
			}
		}
	}
}

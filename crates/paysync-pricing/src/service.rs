//! Slippage state for one payment flow: last recommendation, custom override
//! and the value actually applied to the payment amount.

use crate::{
	apply_slippage_protection, MarketDataService, PricingError, SlippageCalculator,
	BPS_DENOMINATOR,
};
use alloy_primitives::U256;
use paysync_types::{RealTimeSlippageData, SlippageRecommendation, SlippageRequest};
use std::sync::Mutex;
use std::time::Duration;

/// Slippage applied before any recommendation or override exists.
pub const DEFAULT_SLIPPAGE_BPS: u32 = 100;

#[derive(Debug, Default)]
struct SlippageState {
	recommendation: Option<SlippageRecommendation>,
	custom_bps: Option<u32>,
}

/// Combines the calculator with live market data and the user's override.
pub struct SlippageService {
	calculator: SlippageCalculator,
	market: Option<MarketDataService>,
	state: Mutex<SlippageState>,
}

impl SlippageService {
	pub fn new(calculator: SlippageCalculator, market: Option<MarketDataService>) -> Self {
		Self {
			calculator,
			market,
			state: Mutex::new(SlippageState::default()),
		}
	}

	fn state(&self) -> std::sync::MutexGuard<'_, SlippageState> {
		match self.state.lock() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		}
	}

	pub fn market_data(&self) -> RealTimeSlippageData {
		self.market
			.as_ref()
			.map(MarketDataService::current)
			.unwrap_or_default()
	}

	/// Refreshes market data once, if an oracle is attached.
	pub async fn refresh_market_data(&self) -> Result<(), PricingError> {
		if let Some(market) = &self.market {
			market.refresh().await?;
		}
		Ok(())
	}

	/// Keeps market data fresh in the background until the service is dropped.
	pub fn start_market_refresh(&mut self, interval: Duration) {
		if let Some(market) = self.market.as_mut() {
			market.start(interval);
		}
	}

	/// Computes and stores a recommendation for `request`.
	pub fn recommend(&self, request: &SlippageRequest) -> SlippageRecommendation {
		let recommendation = self.calculator.calculate(request, &self.market_data());
		tracing::debug!(
			pair = %recommendation.pair_type,
			recommended = recommendation.recommended,
			confidence = recommendation.confidence,
			"Slippage recommendation"
		);
		self.state().recommendation = Some(recommendation.clone());
		recommendation
	}

	pub fn recommendation(&self) -> Option<SlippageRecommendation> {
		self.state().recommendation.clone()
	}

	/// Overrides the recommendation with an explicit value.
	pub fn set_custom_slippage(&self, bps: u32) -> Result<(), PricingError> {
		if bps == 0 || bps > BPS_DENOMINATOR {
			return Err(PricingError::InvalidSlippage(bps));
		}
		if bps > self.calculator.max_auto_slippage_bps() {
			tracing::warn!(
				bps,
				max_auto = self.calculator.max_auto_slippage_bps(),
				"Custom slippage above the automatic maximum"
			);
		}
		self.state().custom_bps = Some(bps);
		Ok(())
	}

	pub fn clear_custom_slippage(&self) {
		self.state().custom_bps = None;
	}

	/// Custom override, else the last recommendation, else the contract
	/// default, else [`DEFAULT_SLIPPAGE_BPS`].
	pub fn current_slippage(&self) -> u32 {
		let state = self.state();
		state
			.custom_bps
			.or_else(|| state.recommendation.as_ref().map(|r| r.recommended))
			.or_else(|| self.market_data().contract_default_slippage_bps)
			.unwrap_or(DEFAULT_SLIPPAGE_BPS)
	}

	/// Minimum acceptable output for `amount` at the current slippage.
	pub fn protect_amount(&self, amount: U256) -> Result<U256, PricingError> {
		apply_slippage_protection(amount, self.current_slippage())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;
	use paysync_config::SlippageConfig;
	use paysync_contracts::MockPriceOracleInterface;
	use paysync_types::PaymentMethod;
	use std::sync::Arc;

	fn stable_request() -> SlippageRequest {
		SlippageRequest {
			from_token: address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
			to_token: address!("50c5725949A6F0c72E6C4a641F24049A917DB0Cb"),
			from_amount: U256::from(100_000_000u64),
			payment_method: PaymentMethod::Usdc,
			user_preference: None,
		}
	}

	fn service() -> SlippageService {
		SlippageService::new(SlippageCalculator::new(&SlippageConfig::default()), None)
	}

	#[test]
	fn test_current_slippage_precedence() {
		let service = service();
		assert_eq!(service.current_slippage(), DEFAULT_SLIPPAGE_BPS);

		let rec = service.recommend(&stable_request());
		assert_eq!(service.current_slippage(), rec.recommended);
		assert_eq!(service.recommendation(), Some(rec.clone()));

		service.set_custom_slippage(250).unwrap();
		assert_eq!(service.current_slippage(), 250);

		service.clear_custom_slippage();
		assert_eq!(service.current_slippage(), rec.recommended);
	}

	#[test]
	fn test_custom_slippage_validation() {
		let service = service();
		assert!(matches!(
			service.set_custom_slippage(0),
			Err(PricingError::InvalidSlippage(0))
		));
		assert!(service.set_custom_slippage(10_001).is_err());
		assert!(service.set_custom_slippage(10_000).is_ok());
	}

	#[test]
	fn test_protect_amount_uses_current_slippage() {
		let service = service();
		service.set_custom_slippage(50).unwrap();
		assert_eq!(
			service.protect_amount(U256::from(1_000_000u64)).unwrap(),
			U256::from(995_000u64)
		);
	}

	#[tokio::test]
	async fn test_contract_default_applies_before_recommendation() {
		let mut mock = MockPriceOracleInterface::new();
		mock.expect_get_eth_price().returning(|_| {
			Box::pin(async { Ok(U256::from(400_000_000_000_000_000u64)) })
		});
		mock.expect_default_slippage()
			.returning(|| Box::pin(async { Ok(75) }));
		mock.expect_default_pool_fee()
			.returning(|| Box::pin(async { Ok(3000) }));
		mock.expect_stable_pool_fee()
			.returning(|| Box::pin(async { Ok(500) }));
		mock.expect_high_fee()
			.returning(|| Box::pin(async { Ok(10000) }));

		let market = MarketDataService::new(Arc::new(mock), 20);
		let service = SlippageService::new(
			SlippageCalculator::new(&SlippageConfig::default()),
			Some(market),
		);
		service.refresh_market_data().await.unwrap();

		assert_eq!(service.current_slippage(), 75);
		let rec = service.recommend(&stable_request());
		assert_eq!(rec.pool_fee, Some(500));
		assert_eq!(rec.contract_default_slippage_bps, Some(75));
	}
}

//! Market data cache refreshed from the price oracle.
//!
//! The ETH price is sampled on every refresh into a rolling window; the spread
//! of that window is the volatility signal the calculator scales by.

use crate::PricingError;
use alloy_primitives::U256;
use paysync_contracts::PriceOracleInterface;
use paysync_types::{current_timestamp, MarketVolatility, PoolFeeTiers, RealTimeSlippageData};
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// USDC amount quoted against the oracle, 1000 USDC with 6 decimals.
const QUOTE_USDC_UNITS: u64 = 1_000;
const USDC_DECIMALS: u32 = 6;
const WEI_DECIMALS: u32 = 18;

/// Rolling window of ETH prices.
#[derive(Debug, Clone)]
pub struct VolatilityTracker {
	window: usize,
	prices: VecDeque<Decimal>,
}

impl VolatilityTracker {
	pub fn new(window: usize) -> Self {
		let window = window.max(2);
		Self {
			window,
			prices: VecDeque::with_capacity(window),
		}
	}

	pub fn record(&mut self, price: Decimal) {
		if self.prices.len() == self.window {
			self.prices.pop_front();
		}
		self.prices.push_back(price);
	}

	pub fn len(&self) -> usize {
		self.prices.len()
	}

	pub fn is_empty(&self) -> bool {
		self.prices.is_empty()
	}

	/// `(max - min) / mean * 100`, once at least two samples exist.
	pub fn deviation_pct(&self) -> Option<Decimal> {
		if self.prices.len() < 2 {
			return None;
		}
		let max = self.prices.iter().max()?;
		let min = self.prices.iter().min()?;
		let sum: Decimal = self.prices.iter().sum();
		let mean = sum / Decimal::from(self.prices.len());
		if mean.is_zero() {
			return None;
		}
		Some((max - min) / mean * Decimal::ONE_HUNDRED)
	}

	/// Medium until there is enough history to say otherwise.
	pub fn volatility(&self) -> MarketVolatility {
		self.deviation_pct()
			.map(MarketVolatility::from_deviation_pct)
			.unwrap_or_default()
	}
}

/// ETH price in USD implied by `wei` being the cost of 1000 USDC.
pub fn eth_price_from_quote(wei: U256) -> Result<Decimal, PricingError> {
	if wei.is_zero() {
		return Err(PricingError::Oracle("getETHPrice returned zero".into()));
	}
	let mut eth = Decimal::from_str(&wei.to_string())
		.map_err(|e| PricingError::Conversion(format!("Failed to parse wei amount {wei}: {e}")))?;
	eth.set_scale(WEI_DECIMALS)
		.map_err(|e| PricingError::Conversion(e.to_string()))?;
	Decimal::from(QUOTE_USDC_UNITS)
		.checked_div(eth)
		.ok_or_else(|| PricingError::Conversion(format!("ETH price overflow for {wei} wei")))
}

struct MarketState {
	oracle: Arc<dyn PriceOracleInterface>,
	tracker: Mutex<VolatilityTracker>,
	data: watch::Sender<RealTimeSlippageData>,
}

impl MarketState {
	async fn refresh(&self) -> Result<RealTimeSlippageData, PricingError> {
		let quote = U256::from(QUOTE_USDC_UNITS) * U256::from(10u64).pow(U256::from(USDC_DECIMALS));
		let (eth_price, default_slippage, default_fee, stable_fee, high_fee) = tokio::join!(
			self.oracle.get_eth_price(quote),
			self.oracle.default_slippage(),
			self.oracle.default_pool_fee(),
			self.oracle.stable_pool_fee(),
			self.oracle.high_fee(),
		);

		let wei = eth_price.map_err(|e| PricingError::Oracle(e.to_string()))?;
		let price = eth_price_from_quote(wei)?;

		let (deviation, volatility) = {
			let mut tracker = match self.tracker.lock() {
				Ok(guard) => guard,
				Err(poisoned) => poisoned.into_inner(),
			};
			tracker.record(price);
			(tracker.deviation_pct(), tracker.volatility())
		};

		let previous = self.data.borrow().clone();
		let pool_fees = match (default_fee, stable_fee, high_fee) {
			(Ok(default_fee), Ok(stable_fee), Ok(high_fee)) => Some(PoolFeeTiers {
				default_fee,
				stable_fee,
				high_fee,
			}),
			_ => {
				tracing::warn!("Pool fee tiers unavailable, keeping previous values");
				previous.pool_fees
			},
		};
		let contract_default_slippage_bps = match default_slippage {
			Ok(bps) => Some(bps),
			Err(e) => {
				tracing::warn!("defaultSlippage unavailable: {}", e);
				previous.contract_default_slippage_bps
			},
		};

		let data = RealTimeSlippageData {
			eth_price_usd: Some(price),
			price_deviation_pct: deviation,
			volatility,
			contract_default_slippage_bps,
			pool_fees,
			last_updated: Some(current_timestamp()),
		};
		tracing::debug!(
			eth_price_usd = %price,
			volatility = %volatility,
			"Refreshed market data"
		);
		self.data.send_replace(data.clone());
		Ok(data)
	}
}

/// Oracle-backed market data with an optional refresh ticker.
///
/// The ticker task is owned by the service and aborted when it is dropped.
pub struct MarketDataService {
	state: Arc<MarketState>,
	ticker: Option<JoinHandle<()>>,
}

impl MarketDataService {
	pub fn new(oracle: Arc<dyn PriceOracleInterface>, volatility_window: usize) -> Self {
		let (data, _) = watch::channel(RealTimeSlippageData::default());
		Self {
			state: Arc::new(MarketState {
				oracle,
				tracker: Mutex::new(VolatilityTracker::new(volatility_window)),
				data,
			}),
			ticker: None,
		}
	}

	/// Latest cached market data; defaults until the first refresh succeeds.
	pub fn current(&self) -> RealTimeSlippageData {
		self.state.data.borrow().clone()
	}

	pub fn subscribe(&self) -> watch::Receiver<RealTimeSlippageData> {
		self.state.data.subscribe()
	}

	/// Fetches fresh oracle data once. Failures leave the cache untouched.
	pub async fn refresh(&self) -> Result<RealTimeSlippageData, PricingError> {
		self.state.refresh().await
	}

	/// Starts refreshing every `interval`, replacing a running ticker.
	pub fn start(&mut self, interval: Duration) {
		self.stop();
		let state = Arc::clone(&self.state);
		self.ticker = Some(tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
			loop {
				ticker.tick().await;
				if let Err(e) = state.refresh().await {
					tracing::warn!("Market data refresh failed: {}", e);
				}
			}
		}));
	}

	pub fn stop(&mut self) {
		if let Some(handle) = self.ticker.take() {
			handle.abort();
		}
	}

	pub fn is_running(&self) -> bool {
		self.ticker.as_ref().is_some_and(|handle| !handle.is_finished())
	}
}

impl Drop for MarketDataService {
	fn drop(&mut self) {
		self.stop();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use paysync_contracts::{ContractError, MockPriceOracleInterface};
	use std::sync::atomic::{AtomicU64, Ordering};

	/// Wei charged for 1000 USDC at the given ETH price.
	fn wei_for_price(price_usd: u64) -> U256 {
		U256::from(1_000u64) * U256::from(10u64).pow(U256::from(18u64)) / U256::from(price_usd)
	}

	fn oracle_with_fees(mock: &mut MockPriceOracleInterface) {
		mock.expect_default_slippage()
			.returning(|| Box::pin(async { Ok(100) }));
		mock.expect_default_pool_fee()
			.returning(|| Box::pin(async { Ok(3000) }));
		mock.expect_stable_pool_fee()
			.returning(|| Box::pin(async { Ok(500) }));
		mock.expect_high_fee()
			.returning(|| Box::pin(async { Ok(10000) }));
	}

	#[test]
	fn test_tracker_deviation() {
		let mut tracker = VolatilityTracker::new(3);
		assert_eq!(tracker.deviation_pct(), None);
		assert_eq!(tracker.volatility(), MarketVolatility::Medium);

		tracker.record(Decimal::from(100));
		tracker.record(Decimal::from(100));
		assert_eq!(tracker.deviation_pct(), Some(Decimal::ZERO));
		assert_eq!(tracker.volatility(), MarketVolatility::VeryLow);

		tracker.record(Decimal::from(110));
		tracker.record(Decimal::from(90));
		// Window keeps the last three: 100, 110, 90
		assert_eq!(tracker.len(), 3);
		assert_eq!(tracker.deviation_pct(), Some(Decimal::from(20)));
		assert_eq!(tracker.volatility(), MarketVolatility::Extreme);
	}

	#[test]
	fn test_eth_price_from_quote() {
		assert_eq!(
			eth_price_from_quote(wei_for_price(2500)).unwrap(),
			Decimal::from(2500)
		);
		assert!(eth_price_from_quote(U256::ZERO).is_err());
	}

	#[tokio::test]
	async fn test_refresh_populates_market_data() {
		let mut mock = MockPriceOracleInterface::new();
		mock.expect_get_eth_price()
			.withf(|amount| *amount == U256::from(1_000_000_000u64))
			.returning(|_| Box::pin(async { Ok(wei_for_price(2000)) }));
		oracle_with_fees(&mut mock);

		let service = MarketDataService::new(Arc::new(mock), 20);
		assert!(!service.current().is_live());

		let data = service.refresh().await.unwrap();
		assert!(data.is_live());
		assert_eq!(data.eth_price_usd, Some(Decimal::from(2000)));
		assert_eq!(data.contract_default_slippage_bps, Some(100));
		assert_eq!(
			data.pool_fees,
			Some(PoolFeeTiers {
				default_fee: 3000,
				stable_fee: 500,
				high_fee: 10000,
			})
		);
		assert_eq!(service.current(), data);
	}

	#[tokio::test]
	async fn test_failed_price_read_keeps_cache() {
		let mut mock = MockPriceOracleInterface::new();
		mock.expect_get_eth_price()
			.returning(|_| Box::pin(async { Err(ContractError::Network("down".into())) }));
		oracle_with_fees(&mut mock);

		let service = MarketDataService::new(Arc::new(mock), 20);
		assert!(matches!(service.refresh().await, Err(PricingError::Oracle(_))));
		assert_eq!(service.current(), RealTimeSlippageData::default());
	}

	#[tokio::test(start_paused = true)]
	async fn test_ticker_refreshes_until_dropped() {
		let calls = Arc::new(AtomicU64::new(0));
		let counter = Arc::clone(&calls);
		let mut mock = MockPriceOracleInterface::new();
		mock.expect_get_eth_price().returning(move |_| {
			counter.fetch_add(1, Ordering::SeqCst);
			Box::pin(async { Ok(wei_for_price(2400)) })
		});
		oracle_with_fees(&mut mock);

		let mut service = MarketDataService::new(Arc::new(mock), 20);
		let mut updates = service.subscribe();
		service.start(Duration::from_secs(30));
		assert!(service.is_running());

		updates.changed().await.unwrap();
		tokio::time::sleep(Duration::from_secs(61)).await;
		assert_eq!(calls.load(Ordering::SeqCst), 3);

		drop(service);
		tokio::time::sleep(Duration::from_secs(120)).await;
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}
}

//! Configuration builder for creating test and development configurations.
//!
//! Builds a single-network `Config` with sensible defaults so tests do not
//! have to go through TOML.

use alloy_primitives::{address, Address};
use rust_decimal::Decimal;

use crate::{CleanupConfig, Config, NetworkConfig, SlippageConfig, SyncConfig};
use std::collections::HashMap;

/// Chain id used when no other chain is specified (Base mainnet).
pub const DEFAULT_CHAIN_ID: u64 = 8453;

/// Builder for creating `Config` instances with a fluent API.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	chain_id: u64,
	rpc_url: String,
	payment_contract: Address,
	price_oracle: Option<Address>,
	account: Option<Address>,
	sync: SyncConfig,
	cleanup: CleanupConfig,
	slippage: SlippageConfig,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a new `ConfigBuilder` with default values suitable for testing.
	pub fn new() -> Self {
		Self {
			chain_id: DEFAULT_CHAIN_ID,
			rpc_url: "http://localhost:8545".to_string(),
			payment_contract: address!("1234567890123456789012345678901234567890"),
			price_oracle: None,
			account: None,
			sync: SyncConfig::default(),
			cleanup: CleanupConfig::default(),
			slippage: SlippageConfig::default(),
		}
	}

	/// Sets the chain id of the single configured network.
	pub fn chain_id(mut self, chain_id: u64) -> Self {
		self.chain_id = chain_id;
		self
	}

	pub fn rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
		self.rpc_url = rpc_url.into();
		self
	}

	pub fn payment_contract(mut self, contract: Address) -> Self {
		self.payment_contract = contract;
		self
	}

	pub fn price_oracle(mut self, oracle: Address) -> Self {
		self.price_oracle = Some(oracle);
		self
	}

	/// Sets the connected account used for cleanup transactions.
	pub fn account(mut self, account: Address) -> Self {
		self.account = Some(account);
		self
	}

	pub fn auto_recovery(mut self, enabled: bool) -> Self {
		self.sync.auto_recovery = enabled;
		self
	}

	pub fn sync_interval_ms(mut self, interval_ms: u64) -> Self {
		self.sync.sync_interval_ms = interval_ms;
		self
	}

	pub fn recovery_debounce_ms(mut self, debounce_ms: u64) -> Self {
		self.sync.recovery_debounce_ms = debounce_ms;
		self
	}

	pub fn max_retry_attempts(mut self, attempts: u32) -> Self {
		self.cleanup.max_retry_attempts = attempts;
		self
	}

	pub fn cleanup_timeout_ms(mut self, timeout_ms: u64) -> Self {
		self.cleanup.cleanup_timeout_ms = timeout_ms;
		self
	}

	pub fn fund_safety_mode(mut self, enabled: bool) -> Self {
		self.cleanup.fund_safety_mode = enabled;
		self
	}

	pub fn max_auto_slippage_bps(mut self, bps: u32) -> Self {
		self.slippage.max_auto_slippage_bps = bps;
		self
	}

	pub fn fallback_eth_price_usd(mut self, price: Decimal) -> Self {
		self.slippage.fallback_eth_price_usd = price;
		self
	}

	/// Builds the `Config` with the configured values.
	pub fn build(self) -> Config {
		let mut networks = HashMap::new();
		networks.insert(
			self.chain_id,
			NetworkConfig {
				rpc_url: self.rpc_url,
				payment_contract: self.payment_contract,
				price_oracle: self.price_oracle,
				account: self.account,
			},
		);
		Config {
			sync: self.sync,
			cleanup: self.cleanup,
			slippage: self.slippage,
			networks,
		}
	}
}

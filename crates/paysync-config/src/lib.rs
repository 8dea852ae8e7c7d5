//! Configuration module for the payment sync system.
//!
//! This module provides structures and utilities for managing configuration.
//! It supports loading configuration from TOML files, resolves `${VAR}`
//! environment references and validates the result before handing it out.
//!
//! Contract addresses are resolved once per chain id into [`ChainContracts`]
//! and injected into each component, so nothing reads ambient global state.

pub mod builders;

pub use builders::config::ConfigBuilder;

use alloy_primitives::{address, Address};
use paysync_types::RetryPolicy;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
	/// The requested chain has no `[networks.<id>]` section.
	#[error("Network {0} is not configured")]
	UnknownNetwork(u64),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Contract state polling and reconciliation.
	#[serde(default)]
	pub sync: SyncConfig,
	/// Recovery execution.
	#[serde(default)]
	pub cleanup: CleanupConfig,
	/// Slippage recommendation.
	#[serde(default)]
	pub slippage: SlippageConfig,
	/// Per-chain contract deployments, keyed by chain id.
	pub networks: HashMap<u64, NetworkConfig>,
}

/// Contract state polling and reconciliation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
	/// Interval between contract state polls.
	#[serde(default = "default_sync_interval_ms")]
	pub sync_interval_ms: u64,
	/// Whether out-of-sync payments are analyzed and cleaned up automatically.
	#[serde(default = "default_true")]
	pub auto_recovery: bool,
	/// Quiet period before auto-recovery fires.
	#[serde(default = "default_recovery_debounce_ms")]
	pub recovery_debounce_ms: u64,
	/// Retry policy applied to each contract read.
	#[serde(default = "RetryPolicy::contract_reads")]
	pub read_retry: RetryPolicy,
}

impl SyncConfig {
	pub fn sync_interval(&self) -> Duration {
		Duration::from_millis(self.sync_interval_ms)
	}

	pub fn recovery_debounce(&self) -> Duration {
		Duration::from_millis(self.recovery_debounce_ms)
	}
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			sync_interval_ms: default_sync_interval_ms(),
			auto_recovery: true,
			recovery_debounce_ms: default_recovery_debounce_ms(),
			read_retry: RetryPolicy::contract_reads(),
		}
	}
}

/// Recovery execution settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CleanupConfig {
	/// Failed cleanups allowed before manual action is required.
	#[serde(default = "default_max_retry_attempts")]
	pub max_retry_attempts: u32,
	/// How long a cleanup transaction may take to confirm.
	#[serde(default = "default_cleanup_timeout_ms")]
	pub cleanup_timeout_ms: u64,
	/// Prefer refunds over cancellation when funds may be committed.
	#[serde(default = "default_true")]
	pub fund_safety_mode: bool,
	/// Append technical details to user-facing messages.
	#[serde(default)]
	pub show_technical_details: bool,
	/// Confirmations required for a cleanup transaction.
	#[serde(default = "default_confirmations")]
	pub confirmations: u64,
}

impl CleanupConfig {
	pub fn cleanup_timeout(&self) -> Duration {
		Duration::from_millis(self.cleanup_timeout_ms)
	}

	/// Retry budget expressed through the shared retry policy.
	pub fn retry_policy(&self) -> RetryPolicy {
		RetryPolicy {
			max_attempts: self.max_retry_attempts,
			..RetryPolicy::cleanup_budget()
		}
	}
}

impl Default for CleanupConfig {
	fn default() -> Self {
		Self {
			max_retry_attempts: default_max_retry_attempts(),
			cleanup_timeout_ms: default_cleanup_timeout_ms(),
			fund_safety_mode: true,
			show_technical_details: false,
			confirmations: default_confirmations(),
		}
	}
}

/// A token known to the pair classifier.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TokenConfig {
	pub address: Address,
	pub symbol: String,
	pub decimals: u8,
}

/// Slippage recommendation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SlippageConfig {
	/// Upper bound for any automatic recommendation.
	#[serde(default = "default_max_auto_slippage_bps")]
	pub max_auto_slippage_bps: u32,
	/// Fixed buffer added on top of the scaled base slippage.
	#[serde(default = "default_safety_buffer_bps")]
	pub safety_buffer_bps: u32,
	/// ETH price used for trade-size estimates while the oracle is unavailable.
	#[serde(default = "default_fallback_eth_price_usd")]
	pub fallback_eth_price_usd: Decimal,
	/// Interval between oracle refreshes of the market data.
	#[serde(default = "default_refresh_interval_ms")]
	pub refresh_interval_ms: u64,
	/// Number of ETH price samples in the rolling volatility window.
	#[serde(default = "default_volatility_window")]
	pub volatility_window: usize,
	#[serde(default = "default_stable_tokens")]
	pub stable_tokens: Vec<TokenConfig>,
	#[serde(default = "default_native_tokens")]
	pub native_tokens: Vec<TokenConfig>,
}

impl SlippageConfig {
	pub fn refresh_interval(&self) -> Duration {
		Duration::from_millis(self.refresh_interval_ms)
	}
}

impl Default for SlippageConfig {
	fn default() -> Self {
		Self {
			max_auto_slippage_bps: default_max_auto_slippage_bps(),
			safety_buffer_bps: default_safety_buffer_bps(),
			fallback_eth_price_usd: default_fallback_eth_price_usd(),
			refresh_interval_ms: default_refresh_interval_ms(),
			volatility_window: default_volatility_window(),
			stable_tokens: default_stable_tokens(),
			native_tokens: default_native_tokens(),
		}
	}
}

/// Contract deployment on one chain.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
	pub rpc_url: String,
	/// Payment contract exposing the intent reads and `requestRefund`.
	pub payment_contract: Address,
	/// Price oracle used for slippage alignment.
	#[serde(default)]
	pub price_oracle: Option<Address>,
	/// Connected account used for cleanup transactions.
	#[serde(default)]
	pub account: Option<Address>,
}

/// Contract addresses resolved for a single chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainContracts {
	pub chain_id: u64,
	pub rpc_url: String,
	pub payment_contract: Address,
	pub price_oracle: Option<Address>,
	pub account: Option<Address>,
}

fn default_sync_interval_ms() -> u64 {
	2000
}

fn default_recovery_debounce_ms() -> u64 {
	1000
}

fn default_max_retry_attempts() -> u32 {
	2
}

fn default_cleanup_timeout_ms() -> u64 {
	30_000
}

fn default_confirmations() -> u64 {
	1
}

fn default_max_auto_slippage_bps() -> u32 {
	500
}

fn default_safety_buffer_bps() -> u32 {
	10
}

fn default_fallback_eth_price_usd() -> Decimal {
	Decimal::from(2400)
}

fn default_refresh_interval_ms() -> u64 {
	30_000
}

fn default_volatility_window() -> usize {
	20
}

fn default_true() -> bool {
	true
}

/// Base mainnet stablecoins.
fn default_stable_tokens() -> Vec<TokenConfig> {
	vec![
		TokenConfig {
			address: address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
			symbol: "USDC".to_string(),
			decimals: 6,
		},
		TokenConfig {
			address: address!("d9aAEc86B65D86f6A7B5B1b0c42FFA531710b6CA"),
			symbol: "USDbC".to_string(),
			decimals: 6,
		},
		TokenConfig {
			address: address!("50c5725949A6F0c72E6C4a641F24049A917DB0Cb"),
			symbol: "DAI".to_string(),
			decimals: 18,
		},
	]
}

/// Native ETH (zero address) and WETH on Base.
fn default_native_tokens() -> Vec<TokenConfig> {
	vec![
		TokenConfig {
			address: Address::ZERO,
			symbol: "ETH".to_string(),
			decimals: 18,
		},
		TokenConfig {
			address: address!("4200000000000000000000000000000000000006"),
			symbol: "WETH".to_string(),
			decimals: 18,
		},
	]
}

/// `${NAME}` or `${NAME:-default}`, with bounded name and default lengths.
static ENV_REFERENCE: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}").unwrap()
});

/// Largest configuration text accepted for interpolation.
const MAX_CONFIG_BYTES: usize = 1024 * 1024;

/// Substitutes environment references in configuration text.
///
/// Substituted values are not expanded again. The first reference with
/// neither a set variable nor a default is reported.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	if input.len() > MAX_CONFIG_BYTES {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {MAX_CONFIG_BYTES} bytes)",
			input.len()
		)));
	}

	let mut missing: Option<String> = None;
	let resolved = ENV_REFERENCE.replace_all(input, |caps: &Captures<'_>| {
		let name = &caps[1];
		match (std::env::var(name), caps.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				missing.get_or_insert_with(|| name.to_string());
				String::new()
			},
		}
	});

	match missing {
		Some(name) => Err(ConfigError::Validation(format!(
			"Environment variable '{name}' not found"
		))),
		None => Ok(resolved.into_owned()),
	}
}

impl Config {
	/// Loads configuration from a TOML file, resolving environment references.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let contents = tokio::fs::read_to_string(path).await?;
		contents.parse()
	}

	/// Resolves the contract deployment for `chain_id`.
	pub fn contracts_for(&self, chain_id: u64) -> Result<ChainContracts, ConfigError> {
		let network = self
			.networks
			.get(&chain_id)
			.ok_or(ConfigError::UnknownNetwork(chain_id))?;
		Ok(ChainContracts {
			chain_id,
			rpc_url: network.rpc_url.clone(),
			payment_contract: network.payment_contract,
			price_oracle: network.price_oracle,
			account: network.account,
		})
	}

	/// Validates the configuration to ensure all values are usable.
	///
	/// - At least one network with an RPC URL and a non-zero payment contract
	/// - Non-zero poll, debounce, timeout and refresh intervals
	/// - A retry budget of at least one attempt
	/// - Slippage bounds within 1..=10000 bps with the buffer below the cap
	fn validate(&self) -> Result<(), ConfigError> {
		if self.networks.is_empty() {
			return Err(ConfigError::Validation(
				"Networks configuration cannot be empty".into(),
			));
		}
		for (chain_id, network) in &self.networks {
			if network.rpc_url.trim().is_empty() {
				return Err(ConfigError::Validation(format!(
					"Network {chain_id} must have rpc_url"
				)));
			}
			if network.payment_contract == Address::ZERO {
				return Err(ConfigError::Validation(format!(
					"Network {chain_id} must have a non-zero payment_contract"
				)));
			}
		}

		if self.sync.sync_interval_ms == 0 {
			return Err(ConfigError::Validation(
				"sync_interval_ms must be greater than 0".into(),
			));
		}
		if self.sync.recovery_debounce_ms == 0 {
			return Err(ConfigError::Validation(
				"recovery_debounce_ms must be greater than 0".into(),
			));
		}
		if self.sync.read_retry.max_attempts == 0 {
			return Err(ConfigError::Validation(
				"read_retry.max_attempts must be at least 1".into(),
			));
		}

		if self.cleanup.max_retry_attempts == 0 {
			return Err(ConfigError::Validation(
				"max_retry_attempts must be at least 1".into(),
			));
		}
		if self.cleanup.cleanup_timeout_ms == 0 {
			return Err(ConfigError::Validation(
				"cleanup_timeout_ms must be greater than 0".into(),
			));
		}

		let slippage = &self.slippage;
		if slippage.max_auto_slippage_bps == 0 || slippage.max_auto_slippage_bps > 10_000 {
			return Err(ConfigError::Validation(format!(
				"max_auto_slippage_bps must be within 1..=10000, got {}",
				slippage.max_auto_slippage_bps
			)));
		}
		if slippage.safety_buffer_bps >= slippage.max_auto_slippage_bps {
			return Err(ConfigError::Validation(format!(
				"safety_buffer_bps ({}) must be below max_auto_slippage_bps ({})",
				slippage.safety_buffer_bps, slippage.max_auto_slippage_bps
			)));
		}
		if slippage.fallback_eth_price_usd <= Decimal::ZERO {
			return Err(ConfigError::Validation(
				"fallback_eth_price_usd must be positive".into(),
			));
		}
		if slippage.refresh_interval_ms == 0 {
			return Err(ConfigError::Validation(
				"refresh_interval_ms must be greater than 0".into(),
			));
		}
		if slippage.volatility_window < 2 {
			return Err(ConfigError::Validation(
				"volatility_window must hold at least 2 samples".into(),
			));
		}

		Ok(())
	}
}

/// Parses TOML, resolving environment variables and validating the result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

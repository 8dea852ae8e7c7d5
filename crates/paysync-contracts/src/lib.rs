//! Contract collaborators for the payment sync system.
//!
//! This module defines the read and write boundaries to the deployed payment
//! contract and the price oracle. The sync core and the slippage calculator
//! only ever talk to these traits; the alloy implementation speaks the actual
//! contract ABIs.

use alloy_primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use paysync_types::{IntentId, PaymentContext};
use std::time::Duration;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

/// Errors that can occur while talking to the contracts.
#[derive(Debug, Error)]
pub enum ContractError {
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// The call reverted or its return data could not be decoded.
	#[error("Call failed: {0}")]
	CallFailed(String),
	/// A write was attempted without a connected account.
	#[error("No connected account")]
	NoAccount,
	/// The confirmation watcher gave up before the transaction was mined.
	#[error("Transaction {0} was not confirmed in time")]
	ConfirmationTimeout(TxHash),
	/// The implementation could not be built from its configuration.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Final outcome of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionOutcome {
	pub hash: TxHash,
	pub success: bool,
	pub block_number: Option<u64>,
}

/// Typed read calls against the payment contract.
#[async_trait]
#[cfg_attr(feature = "testing", mockall::automock)]
pub trait IntentReaderInterface: Send + Sync {
	/// `getPaymentContext(intentId)`. Unknown intents come back zeroed.
	async fn get_payment_context(&self, intent_id: IntentId)
		-> Result<PaymentContext, ContractError>;

	/// `intentDeadlines(intentId)`, a unix timestamp or 0 when unset.
	async fn intent_deadline(&self, intent_id: IntentId) -> Result<u64, ContractError>;

	/// `processedIntents(intentId)`.
	async fn processed_intent(&self, intent_id: IntentId) -> Result<bool, ContractError>;

	/// `hasSignature(intentId)`.
	async fn has_signature(&self, intent_id: IntentId) -> Result<bool, ContractError>;

	/// Receipt status of a transaction: `None` while it is not mined yet.
	async fn transaction_status(&self, tx_hash: TxHash) -> Result<Option<bool>, ContractError>;
}

/// The single on-chain mutation used by recovery plus its confirmation watcher.
#[async_trait]
#[cfg_attr(feature = "testing", mockall::automock)]
pub trait IntentWriterInterface: Send + Sync {
	/// Account that signs cleanup transactions, if one is connected.
	fn account(&self) -> Option<Address>;

	/// Payment contract the writer targets, if resolved for the current chain.
	fn contract_address(&self) -> Option<Address>;

	/// Submits `requestRefund(intentId, reason)` and returns the transaction hash.
	async fn request_refund(&self, intent_id: IntentId, reason: String)
		-> Result<TxHash, ContractError>;

	/// Waits until `tx_hash` is mined or `timeout` elapses.
	async fn wait_for_confirmation(
		&self,
		tx_hash: TxHash,
		timeout: Duration,
	) -> Result<TransactionOutcome, ContractError>;
}

/// Price oracle reads used to keep slippage aligned with the contracts.
#[async_trait]
#[cfg_attr(feature = "testing", mockall::automock)]
pub trait PriceOracleInterface: Send + Sync {
	/// `getETHPrice(usdcAmount)`: wei needed for `usdc_amount` (6 decimals).
	async fn get_eth_price(&self, usdc_amount: U256) -> Result<U256, ContractError>;

	/// `defaultSlippage()` in basis points.
	async fn default_slippage(&self) -> Result<u32, ContractError>;

	async fn default_pool_fee(&self) -> Result<u32, ContractError>;

	async fn stable_pool_fee(&self) -> Result<u32, ContractError>;

	async fn high_fee(&self) -> Result<u32, ContractError>;
}

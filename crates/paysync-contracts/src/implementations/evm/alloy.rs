//! Alloy-based EVM implementations of the contract collaborators.
//!
//! The payment contract and the price oracle are reached through `sol!`
//! bindings over a retrying HTTP provider. A signer is only needed for the
//! refund write; without one the payment contract is read-only and every
//! write fails closed with [`ContractError::NoAccount`].

use crate::{
	ContractError, IntentReaderInterface, IntentWriterInterface, PriceOracleInterface,
	TransactionOutcome,
};
use alloy_network::EthereumWallet;
use alloy_primitives::{Address, TxHash, TxKind, U256};
use alloy_provider::{DynProvider, PendingTransactionConfig, Provider, ProviderBuilder};
use alloy_rpc_client::RpcClient;
use alloy_rpc_types::TransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{sol, SolCall};
use alloy_transport::layers::RetryBackoffLayer;
use async_trait::async_trait;
use paysync_config::ChainContracts;
use paysync_types::{truncate_id, with_0x_prefix, IntentId, PaymentContext};
use std::time::Duration;

sol! {
	interface ICommerceProtocolIntegration {
		/// Full payment context stored per intent. Zeroed for unknown intents.
		struct PaymentContext {
			uint8 paymentType;
			address user;
			address creator;
			uint256 contentId;
			uint256 platformFee;
			uint256 creatorAmount;
			uint256 operatorFee;
			uint256 timestamp;
			bool processed;
			address paymentToken;
			uint256 expectedAmount;
			bytes16 intentId;
		}

		function getPaymentContext(bytes16 intentId) external view returns (PaymentContext memory);
		function intentDeadlines(bytes16 intentId) external view returns (uint256);
		function processedIntents(bytes16 intentId) external view returns (bool);
		function hasSignature(bytes16 intentId) external view returns (bool);
		function requestRefund(bytes16 intentId, string reason) external;
	}

	interface IPriceOracle {
		function getETHPrice(uint256 usdcAmount) external view returns (uint256);
		function defaultSlippage() external view returns (uint256);
		function DEFAULT_POOL_FEE() external view returns (uint24);
		function STABLE_POOL_FEE() external view returns (uint24);
		function HIGH_FEE() external view returns (uint24);
	}
}

impl From<ICommerceProtocolIntegration::PaymentContext> for PaymentContext {
	fn from(raw: ICommerceProtocolIntegration::PaymentContext) -> Self {
		Self {
			user: raw.user,
			creator: raw.creator,
			payment_token: raw.paymentToken,
			expected_amount: raw.expectedAmount,
			processed: raw.processed,
		}
	}
}

/// Parses a hex private key, with or without the 0x prefix.
pub fn parse_signer(private_key: &str) -> Result<PrivateKeySigner, ContractError> {
	private_key
		.trim()
		.parse()
		.map_err(|e| ContractError::Configuration(format!("Invalid private key: {e}")))
}

/// Builds a retrying HTTP provider, with a wallet when a signer is given.
fn build_provider(
	contracts: &ChainContracts,
	signer: Option<PrivateKeySigner>,
) -> Result<DynProvider, ContractError> {
	let url = contracts.rpc_url.parse().map_err(|e| {
		ContractError::Configuration(format!(
			"Invalid RPC URL for network {}: {}",
			contracts.chain_id, e
		))
	})?;

	// Retry up to 5 times with a 1s initial backoff, 10 compute units per second
	let retry_layer = RetryBackoffLayer::new(5, 1000, 10);
	let client = RpcClient::builder().layer(retry_layer).http(url);

	let provider = match signer {
		Some(signer) => {
			let wallet = EthereumWallet::from(signer.with_chain_id(Some(contracts.chain_id)));
			ProviderBuilder::new()
				.wallet(wallet)
				.connect_client(client)
				.erased()
		},
		None => ProviderBuilder::new().connect_client(client).erased(),
	};
	Ok(provider)
}

/// Payment contract reads and the `requestRefund` write.
pub struct AlloyPaymentContract {
	provider: DynProvider,
	contract: Address,
	account: Option<Address>,
	confirmations: u64,
}

impl AlloyPaymentContract {
	/// Connects to the payment contract of `contracts`.
	///
	/// When both a signer and a configured account are present they must match.
	pub fn new(
		contracts: &ChainContracts,
		signer: Option<PrivateKeySigner>,
	) -> Result<Self, ContractError> {
		let account = match (&signer, contracts.account) {
			(Some(signer), Some(configured)) if signer.address() != configured => {
				return Err(ContractError::Configuration(format!(
					"Signer {} does not match configured account {} on network {}",
					signer.address(),
					configured,
					contracts.chain_id
				)));
			},
			(Some(signer), _) => Some(signer.address()),
			(None, Some(configured)) => {
				tracing::warn!(
					chain_id = contracts.chain_id,
					account = %configured,
					"Account configured without a signing key, cleanups will not be submitted"
				);
				None
			},
			(None, None) => None,
		};

		Ok(Self {
			provider: build_provider(contracts, signer)?,
			contract: contracts.payment_contract,
			account,
			confirmations: 1,
		})
	}

	/// Confirmations awaited by `wait_for_confirmation`, at least one.
	pub fn with_confirmations(mut self, confirmations: u64) -> Self {
		self.confirmations = confirmations.max(1);
		self
	}

	async fn view<C: SolCall>(&self, call: C) -> Result<C::Return, ContractError> {
		let request = TransactionRequest {
			to: Some(TxKind::Call(self.contract)),
			input: call.abi_encode().into(),
			..Default::default()
		};
		let result = self.provider.call(request).await.map_err(|e| {
			ContractError::Network(format!("Failed to call {}: {}", C::SIGNATURE, e))
		})?;
		C::abi_decode_returns(&result).map_err(|e| {
			ContractError::CallFailed(format!("Failed to decode {}: {}", C::SIGNATURE, e))
		})
	}
}

#[async_trait]
impl IntentReaderInterface for AlloyPaymentContract {
	async fn get_payment_context(
		&self,
		intent_id: IntentId,
	) -> Result<PaymentContext, ContractError> {
		let raw = self
			.view(ICommerceProtocolIntegration::getPaymentContextCall { intentId: intent_id })
			.await?;
		Ok(raw.into())
	}

	async fn intent_deadline(&self, intent_id: IntentId) -> Result<u64, ContractError> {
		let deadline = self
			.view(ICommerceProtocolIntegration::intentDeadlinesCall { intentId: intent_id })
			.await?;
		// A deadline beyond u64 is effectively never
		Ok(u64::try_from(deadline).unwrap_or(u64::MAX))
	}

	async fn processed_intent(&self, intent_id: IntentId) -> Result<bool, ContractError> {
		self.view(ICommerceProtocolIntegration::processedIntentsCall { intentId: intent_id })
			.await
	}

	async fn has_signature(&self, intent_id: IntentId) -> Result<bool, ContractError> {
		self.view(ICommerceProtocolIntegration::hasSignatureCall { intentId: intent_id })
			.await
	}

	async fn transaction_status(&self, tx_hash: TxHash) -> Result<Option<bool>, ContractError> {
		let receipt = self
			.provider
			.get_transaction_receipt(tx_hash)
			.await
			.map_err(|e| ContractError::Network(format!("Failed to get receipt: {e}")))?;
		Ok(receipt.map(|receipt| receipt.status()))
	}
}

#[async_trait]
impl IntentWriterInterface for AlloyPaymentContract {
	fn account(&self) -> Option<Address> {
		self.account
	}

	fn contract_address(&self) -> Option<Address> {
		(self.contract != Address::ZERO).then_some(self.contract)
	}

	async fn request_refund(
		&self,
		intent_id: IntentId,
		reason: String,
	) -> Result<TxHash, ContractError> {
		let account = self.account.ok_or(ContractError::NoAccount)?;
		let call = ICommerceProtocolIntegration::requestRefundCall {
			intentId: intent_id,
			reason,
		};
		let request = TransactionRequest {
			from: Some(account),
			to: Some(TxKind::Call(self.contract)),
			input: call.abi_encode().into(),
			..Default::default()
		};

		let pending = self.provider.send_transaction(request).await.map_err(|e| {
			tracing::error!(
				intent_id = %truncate_id(&intent_id.to_string()),
				"requestRefund submission failed: {}",
				e
			);
			ContractError::Network(format!("Failed to send transaction: {e}"))
		})?;

		let tx_hash = *pending.tx_hash();
		tracing::info!(
			intent_id = %truncate_id(&intent_id.to_string()),
			tx_hash = %with_0x_prefix(&hex::encode(tx_hash.0)),
			"Submitted requestRefund"
		);
		Ok(tx_hash)
	}

	async fn wait_for_confirmation(
		&self,
		tx_hash: TxHash,
		timeout: Duration,
	) -> Result<TransactionOutcome, ContractError> {
		let config = PendingTransactionConfig::new(tx_hash)
			.with_required_confirmations(self.confirmations)
			.with_timeout(Some(timeout));

		let watch = async {
			let pending = self
				.provider
				.watch_pending_transaction(config)
				.await
				.map_err(|e| ContractError::Network(format!("Transaction watch failed: {e}")))?;
			pending
				.await
				.map_err(|e| ContractError::Network(format!("Failed to confirm transaction: {e}")))
		};

		let confirmed = tokio::time::timeout(timeout, watch)
			.await
			.map_err(|_| ContractError::ConfirmationTimeout(tx_hash))??;

		let receipt = self
			.provider
			.get_transaction_receipt(confirmed)
			.await
			.map_err(|e| ContractError::Network(format!("Failed to get receipt: {e}")))?
			.ok_or_else(|| ContractError::Network(format!("Receipt for {confirmed} not found")))?;

		Ok(TransactionOutcome {
			hash: confirmed,
			success: receipt.status(),
			block_number: receipt.block_number,
		})
	}
}

/// Price oracle reads.
pub struct AlloyPriceOracle {
	provider: DynProvider,
	oracle: Address,
}

impl AlloyPriceOracle {
	/// Connects to the price oracle of `contracts`; fails when none is configured.
	pub fn new(contracts: &ChainContracts) -> Result<Self, ContractError> {
		let oracle = contracts.price_oracle.ok_or_else(|| {
			ContractError::Configuration(format!(
				"No price oracle configured for network {}",
				contracts.chain_id
			))
		})?;
		Ok(Self {
			provider: build_provider(contracts, None)?,
			oracle,
		})
	}

	async fn view<C: SolCall>(&self, call: C) -> Result<C::Return, ContractError> {
		let request = TransactionRequest {
			to: Some(TxKind::Call(self.oracle)),
			input: call.abi_encode().into(),
			..Default::default()
		};
		let result = self.provider.call(request).await.map_err(|e| {
			ContractError::Network(format!("Failed to call {}: {}", C::SIGNATURE, e))
		})?;
		C::abi_decode_returns(&result).map_err(|e| {
			ContractError::CallFailed(format!("Failed to decode {}: {}", C::SIGNATURE, e))
		})
	}
}

#[async_trait]
impl PriceOracleInterface for AlloyPriceOracle {
	async fn get_eth_price(&self, usdc_amount: U256) -> Result<U256, ContractError> {
		self.view(IPriceOracle::getETHPriceCall {
			usdcAmount: usdc_amount,
		})
		.await
	}

	async fn default_slippage(&self) -> Result<u32, ContractError> {
		let bps = self.view(IPriceOracle::defaultSlippageCall {}).await?;
		u32::try_from(bps)
			.map_err(|_| ContractError::CallFailed(format!("defaultSlippage out of range: {bps}")))
	}

	async fn default_pool_fee(&self) -> Result<u32, ContractError> {
		let fee = self.view(IPriceOracle::DEFAULT_POOL_FEECall {}).await?;
		Ok(fee.to::<u32>())
	}

	async fn stable_pool_fee(&self) -> Result<u32, ContractError> {
		let fee = self.view(IPriceOracle::STABLE_POOL_FEECall {}).await?;
		Ok(fee.to::<u32>())
	}

	async fn high_fee(&self) -> Result<u32, ContractError> {
		let fee = self.view(IPriceOracle::HIGH_FEECall {}).await?;
		Ok(fee.to::<u32>())
	}
}

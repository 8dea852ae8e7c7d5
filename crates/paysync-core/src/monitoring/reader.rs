//! Single read of an intent's contract state.

use alloy_primitives::TxHash;
use paysync_contracts::IntentReaderInterface;
use paysync_types::{
	current_timestamp, truncate_id, ContractIntentState, ContractSnapshot, ExecutionObservation,
	IntentId, PaymentIntentStatus, RetryPolicy,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Errors raised while monitoring an intent.
#[derive(Debug, Error)]
pub enum MonitorError {
	/// A contract read failed after exhausting its retries.
	#[error("Contract read failed: {0}")]
	Read(String),
	/// The monitor task is no longer running.
	#[error("Monitor stopped")]
	Stopped,
}

/// Performs every read needed to derive an intent's status.
///
/// Each read is retried independently with the configured policy.
pub struct ContractStateReader {
	reader: Arc<dyn IntentReaderInterface>,
	retry: RetryPolicy,
}

impl ContractStateReader {
	pub fn new(reader: Arc<dyn IntentReaderInterface>, retry: RetryPolicy) -> Self {
		Self { reader, retry }
	}

	/// Reads the intent and, when known, the receipt of its execution transaction.
	#[instrument(skip_all, fields(intent_id = %truncate_id(&intent_id.to_string())))]
	pub async fn read(
		&self,
		intent_id: IntentId,
		execution_tx: Option<TxHash>,
	) -> Result<ContractSnapshot, MonitorError> {
		let reader = &self.reader;
		let retry = &self.retry;
		let (context, deadline, processed, has_signature, execution) = tokio::try_join!(
			retry.run(|_| reader.get_payment_context(intent_id)),
			retry.run(|_| reader.intent_deadline(intent_id)),
			retry.run(|_| reader.processed_intent(intent_id)),
			retry.run(|_| reader.has_signature(intent_id)),
			self.observe_execution(execution_tx),
		)
		.map_err(|e| MonitorError::Read(e.to_string()))?;

		let now = current_timestamp();
		let state = ContractIntentState::from_reads(&context, deadline, processed, has_signature, now);
		let status = PaymentIntentStatus::derive(&state, &execution, now);
		tracing::debug!(status = %status, expired = state.is_expired, "Read intent state");

		Ok(ContractSnapshot {
			intent_id: Some(intent_id),
			state: Some(state),
			execution,
			status: Some(status),
			is_loading: false,
			error: None,
			fetched_at: Some(now),
		})
	}

	async fn observe_execution(
		&self,
		execution_tx: Option<TxHash>,
	) -> Result<ExecutionObservation, paysync_contracts::ContractError> {
		let Some(tx_hash) = execution_tx else {
			return Ok(ExecutionObservation::None);
		};
		let receipt = self
			.retry
			.run(|_| self.reader.transaction_status(tx_hash))
			.await?;
		Ok(match receipt {
			None => ExecutionObservation::Pending(tx_hash),
			Some(true) => ExecutionObservation::Confirmed(tx_hash),
			Some(false) => ExecutionObservation::Reverted(tx_hash),
		})
	}
}

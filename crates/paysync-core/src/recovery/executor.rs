//! Cleanup execution.
//!
//! Carries out the operation chosen by the failure analyzer. Local strategies
//! only touch the sync state; contract strategies submit exactly one
//! `requestRefund` transaction per attempt and wait for it with a timeout.
//! An intent can have at most one contract cleanup in flight, and failed
//! attempts count against a retry budget shared by every strategy.

use crate::engine::event_bus::EventBus;
use crate::short_intent_id;
use crate::state::{SyncEvent, SyncStateMachine};
use alloy_primitives::{Address, TxHash};
use paysync_config::CleanupConfig;
use paysync_contracts::{ContractError, IntentWriterInterface};
use paysync_types::{
	CleanupEvent, CleanupOperation, CleanupReason, CleanupStrategy, IntentId, PaymentSyncEvent,
	RetryPolicy,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::watch;
use tracing::instrument;

/// Errors that can occur while executing a cleanup.
#[derive(Debug, Error)]
pub enum CleanupError {
	#[error("No connected account to sign the cleanup transaction")]
	NoAccount,
	#[error("Payment contract address is not resolved")]
	NoContract,
	#[error("Cleanup already in flight for intent {0}")]
	AlreadyInFlight(IntentId),
	#[error("Cleanup failed {attempts} times, manual action required")]
	RetryBudgetExhausted { attempts: u32 },
	#[error("Manual review pending, automated cleanup is blocked")]
	ManualReviewPending,
	#[error("Failed to submit cleanup transaction: {0}")]
	Submission(String),
	#[error("Failed to confirm cleanup transaction: {0}")]
	Confirmation(String),
	#[error("Cleanup transaction {0} reverted")]
	Reverted(TxHash),
	#[error("Cleanup transaction {0} was not confirmed in time")]
	ConfirmationTimeout(TxHash),
	#[error("Invalid cleanup operation: {0}")]
	InvalidOperation(String),
}

/// Observable executor state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupState {
	pub is_cleaning_up: bool,
	pub cleanup_error: Option<String>,
	pub last_operation: Option<CleanupOperation>,
	/// Set by a manual intervention; blocks automation until resolved.
	pub pending_review: Option<CleanupOperation>,
	/// Failed attempts counted against the retry budget.
	pub retry_count: u32,
	pub last_tx_hash: Option<TxHash>,
}

/// Removes its intent from the in-flight set when dropped.
struct InFlightGuard<'a> {
	in_flight: &'a Mutex<HashSet<IntentId>>,
	intent_id: IntentId,
}

impl Drop for InFlightGuard<'_> {
	fn drop(&mut self) {
		lock(self.in_flight).remove(&self.intent_id);
	}
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	match mutex.lock() {
		Ok(guard) => guard,
		Err(poisoned) => poisoned.into_inner(),
	}
}

/// Executes cleanup operations against the sync state and the contract.
pub struct CleanupExecutor {
	writer: Arc<dyn IntentWriterInterface>,
	state_machine: Arc<SyncStateMachine>,
	event_bus: EventBus,
	config: CleanupConfig,
	budget: RetryPolicy,
	in_flight: Mutex<HashSet<IntentId>>,
	state: watch::Sender<CleanupState>,
}

impl CleanupExecutor {
	pub fn new(
		writer: Arc<dyn IntentWriterInterface>,
		state_machine: Arc<SyncStateMachine>,
		event_bus: EventBus,
		config: CleanupConfig,
	) -> Self {
		let (state, _) = watch::channel(CleanupState::default());
		Self {
			writer,
			state_machine,
			event_bus,
			budget: config.retry_policy(),
			config,
			in_flight: Mutex::new(HashSet::new()),
			state,
		}
	}

	pub fn state(&self) -> CleanupState {
		self.state.borrow().clone()
	}

	pub fn subscribe(&self) -> watch::Receiver<CleanupState> {
		self.state.subscribe()
	}

	pub fn is_in_flight(&self, intent_id: &IntentId) -> bool {
		lock(&self.in_flight).contains(intent_id)
	}

	/// True when an automatic cleanup would not be rejected outright.
	pub fn auto_recovery_allowed(&self) -> bool {
		let state = self.state.borrow();
		state.pending_review.is_none()
			&& !state.is_cleaning_up
			&& state.retry_count < self.budget.max_attempts
	}

	/// Single entry point for analyzer output. Returns whether it succeeded.
	pub async fn trigger_cleanup(&self, operation: CleanupOperation) -> bool {
		match self.execute(operation).await {
			Ok(_) => true,
			Err(e) => {
				tracing::debug!(error = %e, "Cleanup not completed");
				false
			},
		}
	}

	/// Like [`Self::trigger_cleanup`], returning the failure and the hash of
	/// the cleanup transaction when one was needed.
	#[instrument(skip_all, fields(
		intent_id = %short_intent_id(operation.intent_id()),
		strategy = %operation.strategy(),
		reason = %operation.reason(),
	))]
	pub async fn execute(&self, operation: CleanupOperation) -> Result<Option<TxHash>, CleanupError> {
		let (pending_review, retry_count) = {
			let state = self.state.borrow();
			(state.pending_review.is_some(), state.retry_count)
		};
		if pending_review {
			tracing::warn!("Rejecting cleanup while a manual review is pending");
			return Err(CleanupError::ManualReviewPending);
		}
		if retry_count >= self.budget.max_attempts {
			let error = CleanupError::RetryBudgetExhausted {
				attempts: retry_count,
			};
			tracing::error!(attempts = retry_count, "Cleanup retry budget exhausted");
			self.record_failure(&operation, &error, false);
			return Err(error);
		}
		if let Some(intent_id) = operation.intent_id() {
			if self.is_in_flight(&intent_id) {
				tracing::warn!("Cleanup already in flight");
				return Err(CleanupError::AlreadyInFlight(intent_id));
			}
		}

		match operation.strategy() {
			CleanupStrategy::SoftReset => {
				self.apply_soft_reset(operation);
				Ok(None)
			},
			CleanupStrategy::AutoRetry => {
				self.state.send_modify(|state| {
					state.retry_count = state.retry_count.saturating_add(1);
				});
				tracing::info!(attempt = retry_count + 1, "Resetting for automatic retry");
				self.apply_soft_reset(operation);
				Ok(None)
			},
			CleanupStrategy::ManualIntervention => {
				self.escalate(operation);
				Err(CleanupError::ManualReviewPending)
			},
			CleanupStrategy::HardCleanup | CleanupStrategy::RefundEligible => {
				self.contract_cleanup(operation).await.map(Some)
			},
		}
	}

	/// Frontend-only reset. Never touches the contract.
	pub fn soft_reset(&self, reason: CleanupReason, message: impl Into<String>) {
		let intent_id = self.state_machine.get_state().intent_id;
		self.apply_soft_reset(CleanupOperation::soft_reset(
			reason,
			intent_id,
			message,
			String::new(),
		));
	}

	/// Cancels `intent_id` on-chain.
	pub async fn hard_cleanup(
		&self,
		intent_id: IntentId,
		reason: CleanupReason,
	) -> Result<TxHash, CleanupError> {
		let operation = CleanupOperation::new(
			CleanupStrategy::HardCleanup,
			reason,
			Some(intent_id),
			"Your payment was cancelled. Nothing was charged.",
			format!("hard cleanup requested, reason={reason}"),
		)
		.map_err(|e| CleanupError::InvalidOperation(e.to_string()))?;
		self.execute_contract(operation).await
	}

	/// Requests a refund for funds `user` may already have committed.
	pub async fn process_refund(&self, intent_id: IntentId, user: Address) -> Result<TxHash, CleanupError> {
		let operation = CleanupOperation::new(
			CleanupStrategy::RefundEligible,
			CleanupReason::TransactionFailed,
			Some(intent_id),
			"We're returning your funds. This usually takes less than a minute.",
			format!("refund requested for {user}"),
		)
		.map_err(|e| CleanupError::InvalidOperation(e.to_string()))?;
		self.execute_contract(operation).await
	}

	async fn execute_contract(&self, operation: CleanupOperation) -> Result<TxHash, CleanupError> {
		self.execute(operation).await?.ok_or_else(|| {
			CleanupError::InvalidOperation("contract cleanup produced no transaction".into())
		})
	}

	/// Clears a pending manual review. Called by an operator action.
	pub fn resolve_manual_review(&self) -> Option<CleanupOperation> {
		let mut resolved = None;
		self.state.send_if_modified(|state| {
			resolved = state.pending_review.take();
			if resolved.is_some() {
				state.cleanup_error = None;
			}
			resolved.is_some()
		});
		if let Some(operation) = &resolved {
			tracing::info!(
				intent_id = %short_intent_id(operation.intent_id()),
				"Manual review resolved"
			);
			self.state_machine
				.dispatch(SyncEvent::RecoveryFinished { error: None });
		}
		resolved
	}

	/// Clears the retry budget and the last error. A pending review survives.
	pub fn reset(&self) {
		self.state.send_modify(|state| {
			state.retry_count = 0;
			state.cleanup_error = None;
			state.last_tx_hash = None;
		});
	}

	fn apply_soft_reset(&self, operation: CleanupOperation) {
		let message = operation.display_message(self.config.show_technical_details);
		tracing::info!(
			intent_id = %short_intent_id(operation.intent_id()),
			reason = %operation.reason(),
			"Soft reset"
		);
		self.state_machine
			.dispatch(SyncEvent::SoftReset { message });
		self.event_bus
			.publish(PaymentSyncEvent::Cleanup(CleanupEvent::Completed {
				intent_id: operation.intent_id(),
				strategy: operation.strategy(),
				tx_hash: None,
			}))
			.ok();
		self.state.send_modify(|state| {
			state.cleanup_error = None;
			state.last_operation = Some(operation);
		});
	}

	fn escalate(&self, operation: CleanupOperation) {
		let message = operation.display_message(self.config.show_technical_details);
		tracing::error!(
			intent_id = %short_intent_id(operation.intent_id()),
			details = operation.technical_details(),
			"Manual intervention required"
		);
		self.event_bus
			.publish(PaymentSyncEvent::Cleanup(CleanupEvent::ManualReviewRequired {
				operation: operation.clone(),
			}))
			.ok();
		self.state_machine.dispatch(SyncEvent::RecoveryFinished {
			error: Some(message.clone()),
		});
		self.state.send_modify(|state| {
			state.cleanup_error = Some(message);
			state.last_operation = Some(operation.clone());
			state.pending_review = Some(operation);
		});
	}

	async fn contract_cleanup(&self, operation: CleanupOperation) -> Result<TxHash, CleanupError> {
		let intent_id = operation.intent_id().ok_or_else(|| {
			CleanupError::InvalidOperation(format!("{} without an intent id", operation.strategy()))
		})?;
		let _guard = self.claim(intent_id)?;

		let missing = if self.writer.account().is_none() {
			Some(CleanupError::NoAccount)
		} else if self.writer.contract_address().is_none() {
			Some(CleanupError::NoContract)
		} else {
			None
		};
		if let Some(error) = missing {
			tracing::error!(error = %error, "Cleanup cannot be submitted");
			self.record_failure(&operation, &error, true);
			return Err(error);
		}

		self.state.send_modify(|state| {
			state.is_cleaning_up = true;
			state.last_operation = Some(operation.clone());
		});
		self.event_bus
			.publish(PaymentSyncEvent::Cleanup(CleanupEvent::Started {
				intent_id: Some(intent_id),
				strategy: operation.strategy(),
				reason: operation.reason(),
			}))
			.ok();
		self.state_machine.dispatch(SyncEvent::RecoveryStarted);

		match self.submit_and_confirm(intent_id, operation.reason()).await {
			Ok(tx_hash) => {
				tracing::info!(tx_hash = %tx_hash, "Cleanup confirmed");
				self.state.send_modify(|state| {
					state.is_cleaning_up = false;
					state.cleanup_error = None;
					state.retry_count = 0;
					state.last_tx_hash = Some(tx_hash);
				});
				self.event_bus
					.publish(PaymentSyncEvent::Cleanup(CleanupEvent::Completed {
						intent_id: Some(intent_id),
						strategy: operation.strategy(),
						tx_hash: Some(tx_hash),
					}))
					.ok();
				self.state_machine
					.dispatch(SyncEvent::RecoveryFinished { error: None });
				self.state_machine.dispatch(SyncEvent::CleanupSucceeded {
					message: operation.display_message(self.config.show_technical_details),
				});
				Ok(tx_hash)
			},
			Err(error) => {
				tracing::error!(error = %error, "Cleanup failed");
				self.record_failure(&operation, &error, true);
				Err(error)
			},
		}
	}

	fn claim(&self, intent_id: IntentId) -> Result<InFlightGuard<'_>, CleanupError> {
		if !lock(&self.in_flight).insert(intent_id) {
			return Err(CleanupError::AlreadyInFlight(intent_id));
		}
		Ok(InFlightGuard {
			in_flight: &self.in_flight,
			intent_id,
		})
	}

	async fn submit_and_confirm(
		&self,
		intent_id: IntentId,
		reason: CleanupReason,
	) -> Result<TxHash, CleanupError> {
		let tx_hash = self
			.writer
			.request_refund(intent_id, reason.to_string())
			.await
			.map_err(|e| match e {
				ContractError::NoAccount => CleanupError::NoAccount,
				other => CleanupError::Submission(other.to_string()),
			})?;

		self.state
			.send_modify(|state| state.last_tx_hash = Some(tx_hash));
		self.event_bus
			.publish(PaymentSyncEvent::Cleanup(CleanupEvent::TransactionSubmitted {
				intent_id,
				tx_hash,
			}))
			.ok();

		let timeout = self.config.cleanup_timeout();
		let outcome = tokio::time::timeout(timeout, self.writer.wait_for_confirmation(tx_hash, timeout))
			.await
			.map_err(|_| CleanupError::ConfirmationTimeout(tx_hash))?
			.map_err(|e| match e {
				ContractError::ConfirmationTimeout(hash) => CleanupError::ConfirmationTimeout(hash),
				other => CleanupError::Confirmation(other.to_string()),
			})?;

		if !outcome.success {
			return Err(CleanupError::Reverted(tx_hash));
		}
		Ok(tx_hash)
	}

	/// Records a failed cleanup, counting it against the budget when `counts`.
	fn record_failure(&self, operation: &CleanupOperation, error: &CleanupError, counts: bool) {
		let message = error.to_string();
		self.state.send_modify(|state| {
			state.is_cleaning_up = false;
			state.cleanup_error = Some(message.clone());
			if counts {
				state.retry_count = state.retry_count.saturating_add(1);
			}
		});
		self.event_bus
			.publish(PaymentSyncEvent::Cleanup(CleanupEvent::Failed {
				intent_id: operation.intent_id(),
				strategy: operation.strategy(),
				error: message.clone(),
			}))
			.ok();
		self.state_machine
			.dispatch(SyncEvent::RecoveryFinished { error: Some(message) });
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::state::PaymentSyncState;
	use alloy_primitives::address;
	use paysync_contracts::{MockIntentWriterInterface, TransactionOutcome};
	use paysync_types::FrontendPaymentState;
	use std::time::Duration;

	const INTENT: IntentId = IntentId::repeat_byte(0x5a);
	const ACCOUNT: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
	const CONTRACT: Address = address!("9999999999999999999999999999999999999999");

	fn tx() -> TxHash {
		TxHash::repeat_byte(0xc1)
	}

	fn connected_writer() -> MockIntentWriterInterface {
		let mut mock = MockIntentWriterInterface::new();
		mock.expect_account().returning(|| Some(ACCOUNT));
		mock.expect_contract_address().returning(|| Some(CONTRACT));
		mock
	}

	fn confirm_with(mock: &mut MockIntentWriterInterface, success: bool) {
		mock.expect_wait_for_confirmation().returning(move |hash, _| {
			Box::pin(async move {
				Ok(TransactionOutcome {
					hash,
					success,
					block_number: Some(10),
				})
			})
		});
	}

	fn executor(mock: MockIntentWriterInterface) -> (CleanupExecutor, Arc<SyncStateMachine>, EventBus) {
		let bus = EventBus::new(64);
		let machine = Arc::new(SyncStateMachine::new(bus.clone()));
		machine.dispatch(SyncEvent::TrackIntent(Some(INTENT)));
		machine.dispatch(SyncEvent::SetFrontendState(
			FrontendPaymentState::WaitingSignature,
		));
		let executor = CleanupExecutor::new(
			Arc::new(mock),
			Arc::clone(&machine),
			bus.clone(),
			CleanupConfig::default(),
		);
		(executor, machine, bus)
	}

	fn hard_op() -> CleanupOperation {
		CleanupOperation::new(
			CleanupStrategy::HardCleanup,
			CleanupReason::UserCancelled,
			Some(INTENT),
			"cancelled",
			"test",
		)
		.unwrap()
	}

	#[tokio::test]
	async fn test_hard_cleanup_cancels_payment() {
		let mut mock = connected_writer();
		mock.expect_request_refund()
			.withf(|id, reason| *id == INTENT && reason == "user_cancelled")
			.times(1)
			.returning(|_, _| Box::pin(async { Ok(tx()) }));
		confirm_with(&mut mock, true);
		let (executor, machine, bus) = executor(mock);
		let mut events = bus.subscribe();

		let hash = executor
			.hard_cleanup(INTENT, CleanupReason::UserCancelled)
			.await
			.unwrap();
		assert_eq!(hash, tx());

		let state = executor.state();
		assert!(!state.is_cleaning_up);
		assert!(state.cleanup_error.is_none());
		assert_eq!(state.last_tx_hash, Some(tx()));
		assert!(!executor.is_in_flight(&INTENT));

		let sync: PaymentSyncState = machine.get_state();
		assert_eq!(sync.frontend_state, FrontendPaymentState::Cancelled);
		assert_eq!(sync.intent_id, None);

		let mut saw_completed = false;
		while let Ok(event) = events.try_recv() {
			if let PaymentSyncEvent::Cleanup(CleanupEvent::Completed { tx_hash, .. }) = event {
				assert_eq!(tx_hash, Some(tx()));
				saw_completed = true;
			}
		}
		assert!(saw_completed);
	}

	#[tokio::test(start_paused = true)]
	async fn test_double_trigger_issues_one_contract_call() {
		let mut mock = connected_writer();
		mock.expect_request_refund().times(1).returning(|_, _| {
			Box::pin(async {
				tokio::time::sleep(Duration::from_millis(500)).await;
				Ok(tx())
			})
		});
		confirm_with(&mut mock, true);
		let (executor, _, _) = executor(mock);

		let (first, second) = tokio::join!(
			executor.trigger_cleanup(hard_op()),
			executor.trigger_cleanup(hard_op())
		);
		assert!(first);
		assert!(!second);
	}

	#[tokio::test]
	async fn test_retry_ceiling_blocks_further_calls() {
		let mut mock = connected_writer();
		mock.expect_request_refund().times(2).returning(|_, _| {
			Box::pin(async { Err(ContractError::Network("nonce too low".into())) })
		});
		let (executor, machine, _) = executor(mock);

		assert!(!executor.trigger_cleanup(hard_op()).await);
		assert!(!executor.trigger_cleanup(hard_op()).await);
		assert_eq!(executor.state().retry_count, 2);
		assert!(!executor.auto_recovery_allowed());

		// Third attempt is rejected without touching the contract
		assert!(matches!(
			executor.execute(hard_op()).await,
			Err(CleanupError::RetryBudgetExhausted { attempts: 2 })
		));
		let error = executor.state().cleanup_error.unwrap();
		assert!(error.contains("manual action required"));
		assert!(machine.get_state().error.is_some());
		assert!(!machine.get_state().can_proceed());
	}

	#[tokio::test]
	async fn test_manual_review_blocks_automation() {
		let (executor, machine, bus) = executor(connected_writer());
		let mut events = bus.subscribe();
		let manual = CleanupOperation::new(
			CleanupStrategy::ManualIntervention,
			CleanupReason::SyncMismatch,
			Some(INTENT),
			"reviewing",
			"frontend completed, contract created",
		)
		.unwrap();

		assert!(!executor.trigger_cleanup(manual.clone()).await);
		assert_eq!(executor.state().pending_review, Some(manual.clone()));
		assert!(machine.get_state().error.is_some());
		assert!(matches!(
			events.recv().await.unwrap(),
			PaymentSyncEvent::Cleanup(CleanupEvent::ManualReviewRequired { .. })
		));

		let soft = CleanupOperation::soft_reset(CleanupReason::NetworkError, None, "retry", "");
		assert!(!executor.trigger_cleanup(soft.clone()).await);
		assert!(!executor.auto_recovery_allowed());

		assert_eq!(executor.resolve_manual_review(), Some(manual));
		assert!(executor.resolve_manual_review().is_none());
		assert!(executor.trigger_cleanup(soft).await);
		assert_eq!(
			machine.get_state().frontend_state,
			FrontendPaymentState::Idle
		);
	}

	#[tokio::test]
	async fn test_missing_account_fails_closed() {
		let mut mock = MockIntentWriterInterface::new();
		mock.expect_account().returning(|| None);
		mock.expect_contract_address().returning(|| Some(CONTRACT));
		mock.expect_request_refund().never();
		let (executor, _, _) = executor(mock);

		assert!(matches!(
			executor.hard_cleanup(INTENT, CleanupReason::UserCancelled).await,
			Err(CleanupError::NoAccount)
		));
		let state = executor.state();
		assert!(state.cleanup_error.is_some());
		assert_eq!(state.retry_count, 1);
		assert!(!executor.is_in_flight(&INTENT));
	}

	#[tokio::test]
	async fn test_missing_contract_fails_closed() {
		let mut mock = MockIntentWriterInterface::new();
		mock.expect_account().returning(|| Some(ACCOUNT));
		mock.expect_contract_address().returning(|| None);
		mock.expect_request_refund().never();
		let (executor, _, _) = executor(mock);

		assert!(matches!(
			executor.process_refund(INTENT, ACCOUNT).await,
			Err(CleanupError::NoContract)
		));
	}

	#[tokio::test]
	async fn test_reverted_cleanup_counts_against_budget() {
		let mut mock = connected_writer();
		mock.expect_request_refund()
			.returning(|_, _| Box::pin(async { Ok(tx()) }));
		confirm_with(&mut mock, false);
		let (executor, machine, _) = executor(mock);

		let result = executor.process_refund(INTENT, ACCOUNT).await;
		assert!(matches!(result, Err(CleanupError::Reverted(hash)) if hash == tx()));
		assert_eq!(executor.state().retry_count, 1);
		let sync = machine.get_state();
		assert!(!sync.recovering);
		assert!(sync.error.is_some());
		assert_eq!(sync.frontend_state, FrontendPaymentState::WaitingSignature);
	}

	#[tokio::test(start_paused = true)]
	async fn test_confirmation_timeout_clears_in_flight_marker() {
		let mut mock = connected_writer();
		mock.expect_request_refund()
			.times(2)
			.returning(|_, _| Box::pin(async { Ok(tx()) }));
		mock.expect_wait_for_confirmation().returning(|hash, _| {
			Box::pin(async move {
				tokio::time::sleep(Duration::from_secs(3600)).await;
				Ok(TransactionOutcome {
					hash,
					success: true,
					block_number: None,
				})
			})
		});
		let (executor, _, _) = executor(mock);

		assert!(matches!(
			executor.execute(hard_op()).await,
			Err(CleanupError::ConfirmationTimeout(_))
		));
		assert!(!executor.is_in_flight(&INTENT));

		// A later attempt is not blocked by the first one
		assert!(matches!(
			executor.execute(hard_op()).await,
			Err(CleanupError::ConfirmationTimeout(_))
		));
		assert_eq!(executor.state().retry_count, 2);
	}

	#[tokio::test]
	async fn test_auto_retry_spends_budget() {
		let (executor, machine, _) = executor(connected_writer());
		let retry = CleanupOperation::new(
			CleanupStrategy::AutoRetry,
			CleanupReason::SlippageExceeded,
			Some(INTENT),
			"Prices moved",
			"slippage",
		)
		.unwrap();

		assert!(executor.trigger_cleanup(retry.clone()).await);
		assert_eq!(executor.state().retry_count, 1);
		assert_eq!(machine.get_state().notice.as_deref(), Some("Prices moved"));

		assert!(executor.trigger_cleanup(retry.clone()).await);
		assert!(!executor.trigger_cleanup(retry).await);

		executor.reset();
		assert!(executor.auto_recovery_allowed());
	}

	#[test]
	fn test_soft_reset_never_touches_contract() {
		let mut mock = MockIntentWriterInterface::new();
		mock.expect_request_refund().never();
		let (executor, machine, _) = executor(mock);

		executor.soft_reset(CleanupReason::UserCancelled, "Start over");
		let sync = machine.get_state();
		assert_eq!(sync.frontend_state, FrontendPaymentState::Idle);
		assert_eq!(sync.notice.as_deref(), Some("Start over"));
		assert_eq!(
			executor.state().last_operation.map(|op| op.strategy()),
			Some(CleanupStrategy::SoftReset)
		);
	}
}

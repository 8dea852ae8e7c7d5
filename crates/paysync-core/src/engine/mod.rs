//! Payment sync engine that keeps one payment flow aligned with the contract.
//!
//! The engine wires the intent monitor, the sync state machine, the failure
//! analyzer and the cleanup executor together. Callers drive the frontend
//! state through it and gate contract-mutating actions on
//! [`PaymentSyncState::can_proceed`]. [`PaymentSyncEngine::run`] must be
//! polled for contract updates and automatic recovery to happen.

pub mod event_bus;

use self::event_bus::EventBus;
use crate::monitoring::{ContractStateReader, IntentMonitor};
use crate::recovery::{CleanupError, CleanupExecutor, CleanupState, FailureAnalyzer};
use crate::state::{PaymentSyncState, SyncEvent, SyncStateMachine};
use crate::short_intent_id;
use alloy_primitives::{Address, TxHash};
use paysync_config::{CleanupConfig, Config, SyncConfig};
use paysync_contracts::{IntentReaderInterface, IntentWriterInterface};
use paysync_types::{
	CleanupOperation, CleanupReason, FrontendPaymentState, IntentId, PaymentIntentStatus,
	PaymentSyncEvent, StatusEvent,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::instrument;

/// Buffered events per subscriber before the slowest one starts lagging.
const EVENT_BUS_CAPACITY: usize = 1000;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Service error: {0}")]
	Service(String),
}

/// Orchestrates monitoring, sync classification and recovery for one payment.
pub struct PaymentSyncEngine {
	config: SyncConfig,
	state_machine: Arc<SyncStateMachine>,
	executor: Arc<CleanupExecutor>,
	analyzer: FailureAnalyzer,
	monitor: IntentMonitor,
	event_bus: EventBus,
}

impl PaymentSyncEngine {
	/// Builds the engine and starts polling. Must be called inside a tokio runtime.
	pub fn new(
		sync: SyncConfig,
		cleanup: CleanupConfig,
		reader: Arc<dyn IntentReaderInterface>,
		writer: Arc<dyn IntentWriterInterface>,
	) -> Result<Self, EngineError> {
		if sync.sync_interval_ms == 0 {
			return Err(EngineError::Config(
				"sync_interval_ms must be greater than zero".into(),
			));
		}
		if cleanup.max_retry_attempts == 0 {
			return Err(EngineError::Config(
				"max_retry_attempts must be greater than zero".into(),
			));
		}

		let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
		let state_machine = Arc::new(SyncStateMachine::new(event_bus.clone()));
		let analyzer = FailureAnalyzer::new(cleanup.fund_safety_mode);
		let executor = Arc::new(CleanupExecutor::new(
			writer,
			Arc::clone(&state_machine),
			event_bus.clone(),
			cleanup,
		));
		let monitor = IntentMonitor::spawn(
			ContractStateReader::new(reader, sync.read_retry),
			sync.sync_interval(),
			None,
		);

		Ok(Self {
			config: sync,
			state_machine,
			executor,
			analyzer,
			monitor,
			event_bus,
		})
	}

	pub fn from_config(
		config: &Config,
		reader: Arc<dyn IntentReaderInterface>,
		writer: Arc<dyn IntentWriterInterface>,
	) -> Result<Self, EngineError> {
		Self::new(config.sync.clone(), config.cleanup.clone(), reader, writer)
	}

	pub fn get_state(&self) -> PaymentSyncState {
		self.state_machine.get_state()
	}

	pub fn subscribe(&self) -> watch::Receiver<PaymentSyncState> {
		self.state_machine.subscribe()
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	pub fn cleanup_state(&self) -> CleanupState {
		self.executor.state()
	}

	pub fn set_frontend_state(&self, state: FrontendPaymentState) {
		self.state_machine.dispatch(SyncEvent::SetFrontendState(state));
	}

	/// Starts watching `intent_id`; `None` stops watching.
	pub fn track_intent(&self, intent_id: Option<IntentId>) {
		self.state_machine.dispatch(SyncEvent::TrackIntent(intent_id));
	}

	/// Reports the transaction executing the payment so its receipt is followed.
	pub fn execution_submitted(&self, tx_hash: TxHash) {
		self.state_machine
			.dispatch(SyncEvent::ExecutionSubmitted(tx_hash));
	}

	/// Re-reads the contract now and resets the out-of-sync counter.
	pub async fn force_sync_check(&self) -> Result<(), EngineError> {
		self.state_machine.dispatch(SyncEvent::ForceSyncCheck);
		self.monitor
			.refresh()
			.await
			.map_err(|e| EngineError::Service(e.to_string()))
	}

	/// Back to `idle`/`unknown` with errors and the cleanup budget cleared.
	pub fn reset_sync_state(&self) {
		self.state_machine.dispatch(SyncEvent::Reset);
		self.executor.reset();
	}

	pub async fn trigger_cleanup(&self, operation: CleanupOperation) -> bool {
		self.executor.trigger_cleanup(operation).await
	}

	pub fn soft_reset(&self, reason: CleanupReason, message: impl Into<String>) {
		self.executor.soft_reset(reason, message);
	}

	pub async fn hard_cleanup(
		&self,
		intent_id: IntentId,
		reason: CleanupReason,
	) -> Result<TxHash, CleanupError> {
		self.executor.hard_cleanup(intent_id, reason).await
	}

	pub async fn process_refund(&self, intent_id: IntentId, user: Address) -> Result<TxHash, CleanupError> {
		self.executor.process_refund(intent_id, user).await
	}

	pub fn resolve_manual_review(&self) -> Option<CleanupOperation> {
		self.executor.resolve_manual_review()
	}

	/// Analyzes the current state and runs the chosen cleanup.
	///
	/// `error` is the caller's error text, if any. When the last contract read
	/// failed the contract status is treated as unknown, and without a caller
	/// error nothing is done until a read succeeds.
	#[instrument(skip_all, fields(intent_id = %short_intent_id(self.get_state().intent_id)))]
	pub async fn recover(&self, error: Option<&str>) -> bool {
		let state = self.state_machine.get_state();
		let read_error = state.contract.error.as_deref();
		if let (Some(read_error), None) = (read_error, error) {
			tracing::warn!(error = %read_error, "Contract state unreadable, not recovering");
			return false;
		}
		let contract_status = if read_error.is_some() {
			None
		} else {
			state.contract_status
		};

		if contract_status == Some(PaymentIntentStatus::Completed) {
			tracing::info!("Contract reports completion, aligning frontend state");
			self.state_machine.dispatch(SyncEvent::AlignWithContract);
			return true;
		}

		let operation = self.analyzer.analyze(
			state.frontend_state,
			contract_status,
			error.or(read_error),
			state.intent_id,
		);
		tracing::info!(
			strategy = %operation.strategy(),
			reason = %operation.reason(),
			"Recovery triggered"
		);
		self.event_bus
			.publish(PaymentSyncEvent::Status(StatusEvent::RecoveryTriggered {
				operation: operation.clone(),
			}))
			.ok();

		if contract_status.is_some_and(|status| status.is_terminal()) {
			self.state_machine.dispatch(SyncEvent::AlignWithContract);
		}
		self.executor.trigger_cleanup(operation).await
	}

	/// Automatic recovery only acts on a terminal contract status. Intermediate
	/// mismatches stay out of sync until the caller recovers with an error.
	fn auto_recovery_due(&self, state: &PaymentSyncState) -> bool {
		let terminal = state.contract.error.is_none()
			&& state
				.contract_status
				.is_some_and(|status| status.is_terminal());
		self.config.auto_recovery
			&& terminal
			&& state.needs_recovery()
			&& self.executor.auto_recovery_allowed()
	}

	/// Feeds contract snapshots into the state machine and runs debounced
	/// automatic recovery. Returns only if one of its channels closes.
	#[instrument(skip_all)]
	pub async fn run(&self) -> Result<(), EngineError> {
		let mut snapshots = self.monitor.subscribe();
		let mut states = self.state_machine.subscribe();
		let mut tracked = Tracked::default();
		let mut recovery_at: Option<Instant> = None;
		let mut recovering: Option<Recovery<'_>> = None;

		let initial = states.borrow_and_update().clone();
		tracked.sync(&self.monitor, &initial).await?;
		tracing::info!(
			sync_interval_ms = self.config.sync_interval_ms,
			auto_recovery = self.config.auto_recovery,
			"Payment sync engine started"
		);

		loop {
			tokio::select! {
				changed = snapshots.changed() => {
					changed.map_err(|_| EngineError::Service("Intent monitor stopped".into()))?;
					let snapshot = snapshots.borrow_and_update().clone();
					self.state_machine.dispatch(SyncEvent::ContractUpdated(snapshot));
				}
				changed = states.changed() => {
					changed.map_err(|_| EngineError::Service("Sync state machine dropped".into()))?;
					let state = states.borrow_and_update().clone();
					tracked.sync(&self.monitor, &state).await?;
					if self.auto_recovery_due(&state) {
						if recovery_at.is_none() {
							tracing::debug!(
								debounce_ms = self.config.recovery_debounce_ms,
								"Scheduling automatic recovery"
							);
							recovery_at = Some(Instant::now() + self.config.recovery_debounce());
						}
					} else {
						recovery_at = None;
					}
				}
				_ = wait_until(recovery_at) => {
					recovery_at = None;
					let state = self.state_machine.get_state();
					if recovering.is_none() && self.auto_recovery_due(&state) {
						recovering = Some(Box::pin(self.recover(None)));
					}
				}
				recovered = finish(&mut recovering) => {
					recovering = None;
					tracing::debug!(recovered, "Automatic recovery finished");
				}
			}
		}
	}
}

/// What the monitor was last told to follow.
#[derive(Debug, Default)]
struct Tracked {
	intent_id: Option<IntentId>,
	execution_tx: Option<TxHash>,
}

impl Tracked {
	async fn sync(&mut self, monitor: &IntentMonitor, state: &PaymentSyncState) -> Result<(), EngineError> {
		if state.intent_id != self.intent_id {
			monitor
				.track(state.intent_id)
				.await
				.map_err(|e| EngineError::Service(e.to_string()))?;
			self.intent_id = state.intent_id;
			self.execution_tx = None;
		}
		if state.execution_tx != self.execution_tx {
			monitor
				.track_execution(state.execution_tx)
				.await
				.map_err(|e| EngineError::Service(e.to_string()))?;
			self.execution_tx = state.execution_tx;
		}
		Ok(())
	}
}

/// An automatic recovery in progress, polled alongside the run loop.
type Recovery<'a> = Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

async fn finish(recovery: &mut Option<Recovery<'_>>) -> bool {
	match recovery {
		Some(recovery) => recovery.await,
		None => std::future::pending().await,
	}
}

async fn wait_until(deadline: Option<Instant>) {
	match deadline {
		Some(deadline) => tokio::time::sleep_until(deadline).await,
		None => std::future::pending().await,
	}
}

//! Frontend/contract sync state machine.
//!
//! The frontend state is only ever advanced by the caller. The machine decides
//! whether that state can be trusted given the latest contract snapshot, and
//! only overwrites it to match a terminal contract status.

use crate::engine::event_bus::EventBus;
use crate::short_intent_id;
use alloy_primitives::TxHash;
use once_cell::sync::Lazy;
use paysync_types::{
	current_timestamp, ContractSnapshot, FrontendPaymentState, IntentId,
	PaymentIntentStatus, PaymentSyncEvent, StatusEvent, SyncStatus,
};
use std::collections::{HashMap, HashSet};
use tokio::sync::watch;

/// Contract statuses consistent with a frontend state.
fn consistent_statuses(state: FrontendPaymentState) -> &'static [PaymentIntentStatus] {
	use FrontendPaymentState as F;
	use PaymentIntentStatus as S;
	match state {
		F::Idle | F::PriceCalculating => &[S::NotFound],
		F::CreatingIntent => &[S::NotFound, S::Created],
		F::WaitingSignature => &[S::Created],
		F::ExecutingPayment => &[S::Signed, S::Executing],
		F::Completed => &[S::Completed],
		F::Error => &[S::Failed, S::Expired, S::NotFound],
		F::Cancelled => &[S::NotFound, S::Expired, S::Failed],
	}
}

static VALID_CONTRACT_STATUSES: Lazy<HashMap<FrontendPaymentState, HashSet<PaymentIntentStatus>>> =
	Lazy::new(|| {
		FrontendPaymentState::ALL
			.into_iter()
			.map(|state| (state, consistent_statuses(state).iter().copied().collect()))
			.collect()
	});

/// True when `status` is one of the statuses valid for `state`.
pub fn is_consistent(state: FrontendPaymentState, status: PaymentIntentStatus) -> bool {
	VALID_CONTRACT_STATUSES
		.get(&state)
		.is_some_and(|valid| valid.contains(&status))
}

/// Classifies a frontend state against a contract snapshot.
///
/// A read error is out of sync, a pending read is unknown, otherwise the
/// contract status is looked up in the consistency table.
pub fn determine_sync_status(
	frontend_state: FrontendPaymentState,
	contract: &ContractSnapshot,
) -> SyncStatus {
	if contract.error.is_some() {
		return SyncStatus::OutOfSync;
	}
	if contract.is_loading {
		return SyncStatus::Unknown;
	}
	match contract.status {
		Some(status) if is_consistent(frontend_state, status) => SyncStatus::InSync,
		Some(_) => SyncStatus::OutOfSync,
		None => SyncStatus::Unknown,
	}
}

/// Everything a caller needs to render status and gate actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSyncState {
	pub intent_id: Option<IntentId>,
	pub frontend_state: FrontendPaymentState,
	pub contract_status: Option<PaymentIntentStatus>,
	pub sync_status: SyncStatus,
	pub contract: ContractSnapshot,
	/// Payment execution transaction reported by the caller.
	pub execution_tx: Option<TxHash>,
	pub is_expired: bool,
	/// Recovery error; blocks `can_proceed` until cleared.
	pub error: Option<String>,
	/// User-facing message from the last local reset.
	pub notice: Option<String>,
	pub recovering: bool,
	/// Consecutive polls that came back out of sync.
	pub sync_retry_count: u32,
	pub last_sync_at: Option<u64>,
}

impl Default for PaymentSyncState {
	fn default() -> Self {
		Self {
			intent_id: None,
			frontend_state: FrontendPaymentState::Idle,
			contract_status: None,
			sync_status: SyncStatus::Unknown,
			contract: ContractSnapshot::disabled(),
			execution_tx: None,
			is_expired: false,
			error: None,
			notice: None,
			recovering: false,
			sync_retry_count: 0,
			last_sync_at: None,
		}
	}
}

impl PaymentSyncState {
	/// Contract-mutating actions must be gated on this.
	pub fn can_proceed(&self) -> bool {
		self.is_in_sync() && self.error.is_none() && !self.is_expired
	}

	pub fn needs_recovery(&self) -> bool {
		self.sync_status == SyncStatus::OutOfSync
	}

	pub fn is_in_sync(&self) -> bool {
		self.sync_status == SyncStatus::InSync
	}

	pub fn is_loading(&self) -> bool {
		self.contract.is_loading
	}
}

/// Inputs of the state machine.
#[derive(Debug, Clone)]
pub enum SyncEvent {
	/// The caller advanced its payment flow.
	SetFrontendState(FrontendPaymentState),
	/// Start (or stop) watching an intent.
	TrackIntent(Option<IntentId>),
	/// The caller submitted the transaction executing the payment.
	ExecutionSubmitted(TxHash),
	/// New output of the contract state reader.
	ContractUpdated(ContractSnapshot),
	ForceSyncCheck,
	/// Back to idle/unknown with no error.
	Reset,
	/// Local-only recovery; the intent is dropped without touching the contract.
	SoftReset { message: String },
	RecoveryStarted,
	RecoveryFinished { error: Option<String> },
	/// A contract cleanup was confirmed; the payment is cancelled.
	CleanupSucceeded { message: String },
	/// Overwrite a non-terminal frontend state with a terminal contract status.
	AlignWithContract,
}

/// State machine exposing `get_state`, `dispatch` and a `watch` subscription.
pub struct SyncStateMachine {
	state: watch::Sender<PaymentSyncState>,
	event_bus: EventBus,
}

impl SyncStateMachine {
	pub fn new(event_bus: EventBus) -> Self {
		let (state, _) = watch::channel(PaymentSyncState::default());
		Self { state, event_bus }
	}

	pub fn get_state(&self) -> PaymentSyncState {
		self.state.borrow().clone()
	}

	pub fn subscribe(&self) -> watch::Receiver<PaymentSyncState> {
		self.state.subscribe()
	}

	/// Applies `event`; subscribers are only notified when the state changed.
	pub fn dispatch(&self, event: SyncEvent) {
		let mut published = Vec::new();
		self.state.send_if_modified(|state| {
			let before = state.clone();
			apply(state, event, &mut published);
			*state != before
		});
		for event in published {
			self.event_bus.publish(event).ok();
		}
	}
}

fn apply(state: &mut PaymentSyncState, event: SyncEvent, published: &mut Vec<PaymentSyncEvent>) {
	match event {
		SyncEvent::SetFrontendState(frontend_state) => {
			tracing::debug!(from = %state.frontend_state, to = %frontend_state, "Frontend state set");
			state.frontend_state = frontend_state;
		},
		SyncEvent::TrackIntent(intent_id) => {
			if intent_id == state.intent_id {
				return;
			}
			state.intent_id = intent_id;
			state.contract = intent_id
				.map(ContractSnapshot::loading)
				.unwrap_or_else(ContractSnapshot::disabled);
			state.execution_tx = None;
			state.sync_retry_count = 0;
			state.last_sync_at = None;
		},
		SyncEvent::ExecutionSubmitted(tx_hash) => {
			state.execution_tx = Some(tx_hash);
		},
		SyncEvent::ContractUpdated(snapshot) => {
			if snapshot.intent_id != state.intent_id {
				tracing::debug!("Ignoring snapshot for an intent that is no longer tracked");
				return;
			}
			state.last_sync_at = snapshot.fetched_at.or(state.last_sync_at);
			state.contract = snapshot;
			let polled = derive(state);
			if polled == SyncStatus::OutOfSync {
				state.sync_retry_count = state.sync_retry_count.saturating_add(1);
			} else if polled == SyncStatus::InSync {
				state.sync_retry_count = 0;
			}
		},
		SyncEvent::ForceSyncCheck => {
			state.sync_retry_count = 0;
		},
		SyncEvent::Reset => {
			reset(state, None, published);
			return;
		},
		SyncEvent::SoftReset { message } => {
			reset(state, Some(message), published);
			return;
		},
		SyncEvent::RecoveryStarted => {
			state.recovering = true;
		},
		SyncEvent::RecoveryFinished { error } => {
			state.recovering = false;
			state.error = error;
		},
		SyncEvent::CleanupSucceeded { message } => {
			let from = state.frontend_state;
			*state = PaymentSyncState {
				frontend_state: FrontendPaymentState::Cancelled,
				notice: Some(message),
				..PaymentSyncState::default()
			};
			tracing::info!(from = %from, "Payment cancelled after cleanup");
		},
		SyncEvent::AlignWithContract => align_with_contract(state, published),
	}

	let next = derive(state);
	publish_status(state, next, published);
}

fn reset(state: &mut PaymentSyncState, notice: Option<String>, published: &mut Vec<PaymentSyncEvent>) {
	let previous = state.sync_status;
	*state = PaymentSyncState {
		notice,
		sync_status: previous,
		..PaymentSyncState::default()
	};
	publish_status(state, SyncStatus::Unknown, published);
}

fn derive(state: &mut PaymentSyncState) -> SyncStatus {
	state.contract_status = state.contract.status;
	state.is_expired = state.contract.is_expired(current_timestamp());
	if state.recovering {
		SyncStatus::Recovering
	} else {
		determine_sync_status(state.frontend_state, &state.contract)
	}
}

fn publish_status(state: &mut PaymentSyncState, next: SyncStatus, published: &mut Vec<PaymentSyncEvent>) {
	if state.sync_status == next {
		return;
	}
	let from = state.sync_status;
	state.sync_status = next;
	match next {
		SyncStatus::OutOfSync => tracing::warn!(
			intent_id = %short_intent_id(state.intent_id),
			frontend_state = %state.frontend_state,
			contract_status = ?state.contract_status,
			"Payment out of sync"
		),
		_ => tracing::info!(
			intent_id = %short_intent_id(state.intent_id),
			from = %from,
			to = %next,
			"Sync status changed"
		),
	}
	published.push(PaymentSyncEvent::Status(StatusEvent::SyncStatusChanged {
		intent_id: state.intent_id,
		from,
		to: next,
		contract_status: state.contract_status,
	}));
}

/// Completed forces `completed` over any other frontend state. Expired or
/// failed forces `error`, but only over a non-terminal frontend state so a
/// completed payment is never silently downgraded.
///
/// Intermediate contract statuses are left alone.
fn align_with_contract(state: &mut PaymentSyncState, published: &mut Vec<PaymentSyncEvent>) {
	let Some(status) = state.contract.status else {
		return;
	};
	let applies = match status {
		PaymentIntentStatus::Completed => state.frontend_state != FrontendPaymentState::Completed,
		PaymentIntentStatus::Expired | PaymentIntentStatus::Failed => {
			!state.frontend_state.is_terminal()
		},
		_ => false,
	};
	if !applies {
		return;
	}
	let (forced, error) = match status {
		PaymentIntentStatus::Completed => (FrontendPaymentState::Completed, None),
		PaymentIntentStatus::Expired => (
			FrontendPaymentState::Error,
			Some("Payment intent expired on-chain".to_string()),
		),
		_ => (
			FrontendPaymentState::Error,
			Some("Payment failed on-chain".to_string()),
		),
	};
	let from = state.frontend_state;
	state.frontend_state = forced;
	if error.is_some() {
		state.error = error;
	}
	tracing::info!(
		intent_id = %short_intent_id(state.intent_id),
		from = %from,
		to = %forced,
		contract_status = %status,
		"Frontend state aligned with contract"
	);
	published.push(PaymentSyncEvent::Status(StatusEvent::FrontendStateForced {
		intent_id: state.intent_id,
		from,
		to: forced,
		contract_status: status,
	}));
}

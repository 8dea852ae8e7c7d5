//! Event types for notifying subscribers about sync and recovery progress.
//!
//! Events flow through the core event bus so that callers can react to state
//! changes without polling the state machine.

use crate::{
	CleanupOperation, CleanupReason, CleanupStrategy, FrontendPaymentState, IntentId,
	PaymentIntentStatus, SyncStatus,
};
use alloy_primitives::TxHash;
use serde::Serialize;

/// Main event type encompassing all payment sync events.
#[derive(Debug, Clone, Serialize)]
pub enum PaymentSyncEvent {
	/// Events from the sync state machine.
	Status(StatusEvent),
	/// Events from the cleanup executor.
	Cleanup(CleanupEvent),
}

/// Events related to frontend/contract agreement.
#[derive(Debug, Clone, Serialize)]
pub enum StatusEvent {
	/// The derived sync status changed.
	SyncStatusChanged {
		intent_id: Option<IntentId>,
		from: SyncStatus,
		to: SyncStatus,
		contract_status: Option<PaymentIntentStatus>,
	},
	/// The frontend state was overwritten to match a terminal contract status.
	FrontendStateForced {
		intent_id: Option<IntentId>,
		from: FrontendPaymentState,
		to: FrontendPaymentState,
		contract_status: PaymentIntentStatus,
	},
	/// An out-of-sync payment was handed to the failure analyzer.
	RecoveryTriggered { operation: CleanupOperation },
}

/// Events related to cleanup execution.
#[derive(Debug, Clone, Serialize)]
pub enum CleanupEvent {
	Started {
		intent_id: Option<IntentId>,
		strategy: CleanupStrategy,
		reason: CleanupReason,
	},
	/// A cleanup transaction was submitted and awaits confirmation.
	TransactionSubmitted { intent_id: IntentId, tx_hash: TxHash },
	Completed {
		intent_id: Option<IntentId>,
		strategy: CleanupStrategy,
		tx_hash: Option<TxHash>,
	},
	Failed {
		intent_id: Option<IntentId>,
		strategy: CleanupStrategy,
		error: String,
	},
	/// Automated recovery is blocked until an operator resolves the review.
	ManualReviewRequired { operation: CleanupOperation },
}

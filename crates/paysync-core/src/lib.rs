//! Core payment sync engine.
//!
//! This crate reconciles the locally tracked state of a payment flow with the
//! authoritative state of its on-chain payment intent. It polls the payment
//! contract, classifies the two views as in or out of sync, and recovers
//! inconsistent payments through soft resets, on-chain cleanups or an
//! escalation to manual review.

pub mod engine;
pub mod monitoring;
pub mod recovery;
pub mod state;

pub use engine::event_bus::EventBus;
pub use engine::{EngineError, PaymentSyncEngine};
pub use monitoring::{ContractStateReader, IntentMonitor, MonitorError};
pub use recovery::{CleanupError, CleanupExecutor, CleanupState, FailureAnalyzer};
pub use state::{
	determine_sync_status, is_consistent, PaymentSyncState, SyncEvent, SyncStateMachine,
};

use paysync_types::{truncate_id, IntentId};

/// Short form of an optional intent id for log fields.
pub(crate) fn short_intent_id(intent_id: Option<IntentId>) -> String {
	intent_id
		.map(|id| truncate_id(&id.to_string()))
		.unwrap_or_else(|| "none".to_string())
}

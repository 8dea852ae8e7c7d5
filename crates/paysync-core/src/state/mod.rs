//! Sync state between the caller's payment flow and the contract.

pub mod sync;

pub use sync::{
	determine_sync_status, is_consistent, PaymentSyncState, SyncEvent, SyncStateMachine,
};

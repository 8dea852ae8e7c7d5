//! Payment lifecycle types.
//!
//! Two views of a payment coexist: the locally tracked [`FrontendPaymentState`]
//! driven by the caller's flow, and the authoritative [`PaymentIntentStatus`]
//! derived from contract reads. The sync core compares the two.

use crate::ParseEnumError;
use alloy_primitives::{Address, TxHash, B128, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of an on-chain payment intent (`bytes16` in the contract ABI).
pub type IntentId = B128;

/// Locally tracked state of a payment attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrontendPaymentState {
	#[default]
	Idle,
	PriceCalculating,
	CreatingIntent,
	WaitingSignature,
	ExecutingPayment,
	Completed,
	Error,
	Cancelled,
}

impl FrontendPaymentState {
	pub const ALL: [FrontendPaymentState; 8] = [
		Self::Idle,
		Self::PriceCalculating,
		Self::CreatingIntent,
		Self::WaitingSignature,
		Self::ExecutingPayment,
		Self::Completed,
		Self::Error,
		Self::Cancelled,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Idle => "idle",
			Self::PriceCalculating => "price_calculating",
			Self::CreatingIntent => "creating_intent",
			Self::WaitingSignature => "waiting_signature",
			Self::ExecutingPayment => "executing_payment",
			Self::Completed => "completed",
			Self::Error => "error",
			Self::Cancelled => "cancelled",
		}
	}

	/// Terminal states are never overwritten by contract alignment.
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Completed | Self::Error | Self::Cancelled)
	}
}

impl fmt::Display for FrontendPaymentState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for FrontendPaymentState {
	type Err = ParseEnumError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let normalized = s.trim().to_lowercase().replace('-', "_");
		Self::ALL
			.into_iter()
			.find(|state| state.as_str() == normalized)
			.ok_or_else(|| ParseEnumError::new("frontend payment state", s))
	}
}

/// Status of a payment intent as derived from contract state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentIntentStatus {
	NotFound,
	Created,
	Signed,
	Executing,
	Completed,
	Failed,
	Expired,
}

impl PaymentIntentStatus {
	pub const ALL: [PaymentIntentStatus; 7] = [
		Self::NotFound,
		Self::Created,
		Self::Signed,
		Self::Executing,
		Self::Completed,
		Self::Failed,
		Self::Expired,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::NotFound => "NOT_FOUND",
			Self::Created => "CREATED",
			Self::Signed => "SIGNED",
			Self::Executing => "EXECUTING",
			Self::Completed => "COMPLETED",
			Self::Failed => "FAILED",
			Self::Expired => "EXPIRED",
		}
	}

	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Completed | Self::Failed | Self::Expired)
	}

	/// Derives the intent status from the latest contract reads.
	///
	/// Precedence: existence, processed flag, deadline, then the tracked
	/// execution transaction, then the signature flag.
	pub fn derive(state: &ContractIntentState, execution: &ExecutionObservation, now: u64) -> Self {
		if !state.exists {
			return Self::NotFound;
		}
		if state.is_processed {
			return Self::Completed;
		}
		if state.expired_at(now) {
			return Self::Expired;
		}
		match execution {
			ExecutionObservation::Reverted(_) => return Self::Failed,
			ExecutionObservation::Pending(_) | ExecutionObservation::Confirmed(_) => {
				return Self::Executing
			},
			ExecutionObservation::None => {},
		}
		if state.has_signature {
			Self::Signed
		} else {
			Self::Created
		}
	}
}

impl fmt::Display for PaymentIntentStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for PaymentIntentStatus {
	type Err = ParseEnumError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let normalized = s.trim().to_uppercase().replace('-', "_");
		Self::ALL
			.into_iter()
			.find(|status| status.as_str() == normalized)
			.ok_or_else(|| ParseEnumError::new("payment intent status", s))
	}
}

/// Agreement between the frontend state and the contract status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
	InSync,
	OutOfSync,
	#[default]
	Unknown,
	Recovering,
}

impl fmt::Display for SyncStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Self::InSync => "in_sync",
			Self::OutOfSync => "out_of_sync",
			Self::Unknown => "unknown",
			Self::Recovering => "recovering",
		};
		f.write_str(s)
	}
}

/// Result of the `getPaymentContext` contract read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentContext {
	pub user: Address,
	pub creator: Address,
	pub payment_token: Address,
	pub expected_amount: U256,
	pub processed: bool,
}

impl PaymentContext {
	/// The contract returns a zeroed struct for unknown intents.
	pub fn exists(&self) -> bool {
		self.creator != Address::ZERO
	}
}

/// Authoritative view of a payment intent assembled from contract reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractIntentState {
	pub exists: bool,
	pub creator: Address,
	pub expected_amount: U256,
	/// Unix timestamp after which the contract ignores the intent.
	pub deadline: Option<u64>,
	pub is_expired: bool,
	pub payment_token: Address,
	pub is_processed: bool,
	pub has_signature: bool,
}

impl ContractIntentState {
	/// Assembles the state from the individual reads, computing expiry against `now`.
	pub fn from_reads(
		context: &PaymentContext,
		deadline: u64,
		processed: bool,
		has_signature: bool,
		now: u64,
	) -> Self {
		let mut state = Self {
			exists: context.exists(),
			creator: context.creator,
			expected_amount: context.expected_amount,
			deadline: (deadline != 0).then_some(deadline),
			is_expired: false,
			payment_token: context.payment_token,
			is_processed: processed || context.processed,
			has_signature,
		};
		state.is_expired = state.expired_at(now);
		state
	}

	/// Recomputes expiry; a cached `is_expired = false` is never trusted past the deadline.
	pub fn expired_at(&self, now: u64) -> bool {
		self.exists && self.deadline.is_some_and(|deadline| now > deadline)
	}
}

/// What is known about the transaction executing the payment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "tx_hash", rename_all = "snake_case")]
pub enum ExecutionObservation {
	#[default]
	None,
	Pending(TxHash),
	Confirmed(TxHash),
	Reverted(TxHash),
}

impl ExecutionObservation {
	pub fn tx_hash(&self) -> Option<TxHash> {
		match self {
			Self::None => None,
			Self::Pending(hash) | Self::Confirmed(hash) | Self::Reverted(hash) => Some(*hash),
		}
	}
}

/// Latest output of the contract state reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSnapshot {
	pub intent_id: Option<IntentId>,
	pub state: Option<ContractIntentState>,
	pub execution: ExecutionObservation,
	pub status: Option<PaymentIntentStatus>,
	pub is_loading: bool,
	pub error: Option<String>,
	pub fetched_at: Option<u64>,
}

impl ContractSnapshot {
	/// Snapshot for a reader with no intent to watch.
	pub fn disabled() -> Self {
		Self {
			intent_id: None,
			state: None,
			execution: ExecutionObservation::None,
			status: Some(PaymentIntentStatus::NotFound),
			is_loading: false,
			error: None,
			fetched_at: None,
		}
	}

	/// Snapshot for an intent whose first read has not completed.
	pub fn loading(intent_id: IntentId) -> Self {
		Self {
			intent_id: Some(intent_id),
			state: None,
			execution: ExecutionObservation::None,
			status: None,
			is_loading: true,
			error: None,
			fetched_at: None,
		}
	}

	pub fn is_expired(&self, now: u64) -> bool {
		self.state.as_ref().is_some_and(|state| state.expired_at(now))
	}
}

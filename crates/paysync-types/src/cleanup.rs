//! Recovery vocabulary: how a failed payment is cleaned up and why.

use crate::{IntentId, ParseEnumError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How a failed or inconsistent payment should be recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupStrategy {
	/// Reset local state only; the contract is never touched.
	SoftReset,
	/// Cancel the intent on-chain.
	HardCleanup,
	/// Reset local state so the flow can be attempted again.
	AutoRetry,
	/// Request a refund for funds that may already be committed.
	RefundEligible,
	/// Escalate to a human; no automated action is taken.
	ManualIntervention,
}

impl CleanupStrategy {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::SoftReset => "soft_reset",
			Self::HardCleanup => "hard_cleanup",
			Self::AutoRetry => "auto_retry",
			Self::RefundEligible => "refund_eligible",
			Self::ManualIntervention => "manual_intervention",
		}
	}

	pub fn requires_contract_call(&self) -> bool {
		matches!(self, Self::HardCleanup | Self::RefundEligible)
	}
}

impl fmt::Display for CleanupStrategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Why a cleanup is needed. Doubles as the failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupReason {
	UserCancelled,
	TimeoutExpired,
	TransactionFailed,
	SignatureTimeout,
	InsufficientFunds,
	SlippageExceeded,
	NetworkError,
	ContractRevert,
	SyncMismatch,
	IntentExpired,
}

impl CleanupReason {
	pub const ALL: [CleanupReason; 10] = [
		Self::UserCancelled,
		Self::TimeoutExpired,
		Self::TransactionFailed,
		Self::SignatureTimeout,
		Self::InsufficientFunds,
		Self::SlippageExceeded,
		Self::NetworkError,
		Self::ContractRevert,
		Self::SyncMismatch,
		Self::IntentExpired,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::UserCancelled => "user_cancelled",
			Self::TimeoutExpired => "timeout_expired",
			Self::TransactionFailed => "transaction_failed",
			Self::SignatureTimeout => "signature_timeout",
			Self::InsufficientFunds => "insufficient_funds",
			Self::SlippageExceeded => "slippage_exceeded",
			Self::NetworkError => "network_error",
			Self::ContractRevert => "contract_revert",
			Self::SyncMismatch => "sync_mismatch",
			Self::IntentExpired => "intent_expired",
		}
	}
}

impl fmt::Display for CleanupReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for CleanupReason {
	type Err = ParseEnumError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let normalized = s.trim().to_lowercase();
		Self::ALL
			.into_iter()
			.find(|reason| reason.as_str() == normalized)
			.ok_or_else(|| ParseEnumError::new("cleanup reason", s))
	}
}

/// Raised when a cleanup operation would violate its invariants.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CleanupOperationError {
	#[error("Strategy {0} requires an intent id")]
	MissingIntentId(CleanupStrategy),
}

/// One proposed recovery attempt. Recreated on every analysis, never persisted.
///
/// Fields are private so that an operation requiring a contract call can
/// only be built with an intent id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupOperation {
	strategy: CleanupStrategy,
	reason: CleanupReason,
	intent_id: Option<IntentId>,
	requires_contract_call: bool,
	user_message: String,
	technical_details: String,
}

impl CleanupOperation {
	pub fn new(
		strategy: CleanupStrategy,
		reason: CleanupReason,
		intent_id: Option<IntentId>,
		user_message: impl Into<String>,
		technical_details: impl Into<String>,
	) -> Result<Self, CleanupOperationError> {
		let requires_contract_call = strategy.requires_contract_call();
		if requires_contract_call && intent_id.is_none() {
			return Err(CleanupOperationError::MissingIntentId(strategy));
		}
		Ok(Self {
			strategy,
			reason,
			intent_id,
			requires_contract_call,
			user_message: user_message.into(),
			technical_details: technical_details.into(),
		})
	}

	/// Local-only reset. Valid with or without an intent id.
	pub fn soft_reset(
		reason: CleanupReason,
		intent_id: Option<IntentId>,
		user_message: impl Into<String>,
		technical_details: impl Into<String>,
	) -> Self {
		Self {
			strategy: CleanupStrategy::SoftReset,
			reason,
			intent_id,
			requires_contract_call: false,
			user_message: user_message.into(),
			technical_details: technical_details.into(),
		}
	}

	pub fn strategy(&self) -> CleanupStrategy {
		self.strategy
	}

	pub fn reason(&self) -> CleanupReason {
		self.reason
	}

	pub fn intent_id(&self) -> Option<IntentId> {
		self.intent_id
	}

	pub fn requires_contract_call(&self) -> bool {
		self.requires_contract_call
	}

	pub fn user_message(&self) -> &str {
		&self.user_message
	}

	pub fn technical_details(&self) -> &str {
		&self.technical_details
	}

	/// Message shown to the user; technical detail only behind the debug flag.
	pub fn display_message(&self, show_technical_details: bool) -> String {
		if show_technical_details && !self.technical_details.is_empty() {
			format!("{} ({})", self.user_message, self.technical_details)
		} else {
			self.user_message.clone()
		}
	}
}

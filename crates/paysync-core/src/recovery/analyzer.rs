//! Failure analysis: picks the recovery strategy for an inconsistent payment.
//!
//! The rules are evaluated in priority order and the first match wins. The
//! analyzer is pure; it never reads the chain or touches state.

use once_cell::sync::Lazy;
use paysync_types::{
	CleanupOperation, CleanupReason, CleanupStrategy, FrontendPaymentState, IntentId,
	PaymentIntentStatus,
};
use regex::Regex;

static INSUFFICIENT_FUNDS: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"(?i)insufficient funds|insufficient balance|exceeds balance").unwrap());

static SLIPPAGE: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"(?i)slippage|price impact|too little received|insufficient_output_amount").unwrap()
});

fn mentions_timeout(error: &str) -> bool {
	error.to_lowercase().contains("timeout")
}

/// Maps `(frontend state, contract status, error text)` to a cleanup operation.
#[derive(Debug, Clone, Copy)]
pub struct FailureAnalyzer {
	fund_safety_mode: bool,
}

impl FailureAnalyzer {
	/// With `fund_safety_mode` a reverted execution is handled as a refund.
	pub fn new(fund_safety_mode: bool) -> Self {
		Self { fund_safety_mode }
	}

	pub fn analyze(
		&self,
		frontend_state: FrontendPaymentState,
		contract_status: Option<PaymentIntentStatus>,
		error: Option<&str>,
		intent_id: Option<IntentId>,
	) -> CleanupOperation {
		use FrontendPaymentState as F;
		use PaymentIntentStatus as S;

		let error_text = error.unwrap_or_default();
		let status_label = contract_status
			.map(|status| status.to_string())
			.unwrap_or_else(|| "UNKNOWN".to_string());
		let observed = if error_text.is_empty() {
			format!("frontend={frontend_state} contract={status_label}")
		} else {
			format!("frontend={frontend_state} contract={status_label} error={error_text}")
		};

		if frontend_state == F::WaitingSignature && contract_status == Some(S::Created) {
			return contract_operation(
				CleanupStrategy::HardCleanup,
				CleanupReason::UserCancelled,
				intent_id,
				"Your payment was cancelled. Nothing was charged.",
				format!("{observed}: intent created but never signed, cancelling on-chain"),
			);
		}

		if frontend_state == F::ExecutingPayment
			&& contract_status == Some(S::Signed)
			&& mentions_timeout(error_text)
		{
			return local_operation(
				CleanupStrategy::AutoRetry,
				CleanupReason::TimeoutExpired,
				intent_id,
				"That took longer than expected. Let's give it another try.",
				format!("{observed}: signed intent timed out during execution"),
			);
		}

		if contract_status == Some(S::Expired) {
			return CleanupOperation::soft_reset(
				CleanupReason::IntentExpired,
				intent_id,
				"This payment request expired. Start a new one whenever you're ready.",
				format!("{observed}: contract ignores expired intents, no call needed"),
			);
		}

		if INSUFFICIENT_FUNDS.is_match(error_text) {
			return CleanupOperation::soft_reset(
				CleanupReason::InsufficientFunds,
				intent_id,
				"Your wallet doesn't have enough funds for this payment. Add funds or pick a smaller amount, then try again.",
				format!("{observed}: balance too low"),
			);
		}

		if SLIPPAGE.is_match(error_text) {
			return local_operation(
				CleanupStrategy::AutoRetry,
				CleanupReason::SlippageExceeded,
				intent_id,
				"Prices moved while we were processing. We'll refresh the quote and try again.",
				format!("{observed}: slippage tolerance exceeded"),
			);
		}

		if frontend_state == F::ExecutingPayment && contract_status == Some(S::Failed) {
			let strategy = if self.fund_safety_mode {
				CleanupStrategy::RefundEligible
			} else {
				CleanupStrategy::HardCleanup
			};
			return contract_operation(
				strategy,
				CleanupReason::ContractRevert,
				intent_id,
				"The payment didn't go through. We're making sure your funds are returned.",
				format!("{observed}: execution reverted, strategy={strategy}"),
			);
		}

		if frontend_state == F::Completed && contract_status.is_some_and(|s| s != S::Completed) {
			return local_operation(
				CleanupStrategy::ManualIntervention,
				CleanupReason::SyncMismatch,
				intent_id,
				"We're double-checking this payment. Our team will review it shortly; no action is needed from you.",
				format!("{observed}: frontend completed but contract disagrees, needs review"),
			);
		}

		CleanupOperation::soft_reset(
			CleanupReason::NetworkError,
			intent_id,
			"We're popular right now and the network is busy. Please try again in a moment.",
			observed,
		)
	}
}

/// Strategies with no contract call never fail construction.
fn local_operation(
	strategy: CleanupStrategy,
	reason: CleanupReason,
	intent_id: Option<IntentId>,
	user_message: &str,
	technical_details: String,
) -> CleanupOperation {
	CleanupOperation::new(strategy, reason, intent_id, user_message, technical_details.clone())
		.unwrap_or_else(|_| {
			CleanupOperation::soft_reset(reason, intent_id, user_message, technical_details)
		})
}

/// Contract strategies degrade to a soft reset when no intent id is known.
fn contract_operation(
	strategy: CleanupStrategy,
	reason: CleanupReason,
	intent_id: Option<IntentId>,
	user_message: &str,
	technical_details: String,
) -> CleanupOperation {
	match CleanupOperation::new(strategy, reason, intent_id, user_message, technical_details.clone()) {
		Ok(operation) => operation,
		Err(e) => {
			tracing::warn!(strategy = %strategy, error = %e, "Degrading to soft reset");
			CleanupOperation::soft_reset(
				reason,
				None,
				user_message,
				format!("{technical_details} (no intent id, contract call skipped)"),
			)
		},
	}
}

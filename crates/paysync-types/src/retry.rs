//! Retry policy shared by contract reads and cleanup execution.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// How often and how patiently a fallible operation is retried.
///
/// `max_attempts` counts every attempt including the first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
	pub max_attempts: u32,
	pub delay_ms: u64,
	#[serde(default)]
	pub jitter_ms: u64,
}

impl RetryPolicy {
	/// Contract reads: the initial read plus 3 retries, 1s apart.
	pub fn contract_reads() -> Self {
		Self {
			max_attempts: 4,
			delay_ms: 1000,
			jitter_ms: 0,
		}
	}

	/// Cleanup budget: two attempts, no delay between them.
	pub fn cleanup_budget() -> Self {
		Self {
			max_attempts: 2,
			delay_ms: 0,
			jitter_ms: 0,
		}
	}

	/// Single attempt, no retry.
	pub fn none() -> Self {
		Self {
			max_attempts: 1,
			delay_ms: 0,
			jitter_ms: 0,
		}
	}

	/// Delay before the next attempt.
	pub fn delay(&self) -> Duration {
		let jitter = if self.jitter_ms > 0 {
			rand::thread_rng().gen_range(0..=self.jitter_ms)
		} else {
			0
		};
		Duration::from_millis(self.delay_ms.saturating_add(jitter))
	}

	/// Runs `op` until it succeeds or the attempts are exhausted.
	///
	/// The closure receives the 1-based attempt number.
	pub async fn run<F, Fut, T, E>(&self, mut op: F) -> Result<T, E>
	where
		F: FnMut(u32) -> Fut,
		Fut: Future<Output = Result<T, E>>,
	{
		let attempts = self.max_attempts.max(1);
		let mut attempt = 1;
		loop {
			match op(attempt).await {
				Ok(value) => return Ok(value),
				Err(_) if attempt < attempts => {
					tokio::time::sleep(self.delay()).await;
					attempt += 1;
				},
				Err(e) => return Err(e),
			}
		}
	}
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self::contract_reads()
	}
}

//! Interval-driven polling of the tracked intent.
//!
//! The monitor owns its ticker task. Commands reach it over an mpsc channel
//! and every read lands in a `watch` channel holding the latest snapshot.

use super::reader::{ContractStateReader, MonitorError};
use alloy_primitives::TxHash;
use paysync_types::{truncate_id, ContractSnapshot, IntentId};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug)]
enum Command {
	Refresh,
	Track(Option<IntentId>),
	TrackExecution(Option<TxHash>),
}

struct PollLoop {
	reader: ContractStateReader,
	intent_id: Option<IntentId>,
	execution_tx: Option<TxHash>,
	snapshot: watch::Sender<ContractSnapshot>,
}

impl PollLoop {
	async fn run(mut self, interval: Duration, mut commands: mpsc::Receiver<Command>) {
		let mut ticker = tokio::time::interval(interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
		loop {
			tokio::select! {
				_ = ticker.tick() => self.poll().await,
				command = commands.recv() => {
					let Some(command) = command else {
						break;
					};
					if self.apply(command) {
						self.poll().await;
						ticker.reset();
					}
				}
			}
		}
		tracing::debug!("Intent monitor stopped");
	}

	/// Returns true when an immediate read is needed.
	fn apply(&mut self, command: Command) -> bool {
		match command {
			Command::Refresh => true,
			Command::Track(intent_id) => {
				if intent_id == self.intent_id {
					return false;
				}
				self.intent_id = intent_id;
				self.execution_tx = None;
				self.snapshot.send_replace(initial_snapshot(intent_id));
				intent_id.is_some()
			},
			Command::TrackExecution(tx_hash) => {
				if tx_hash == self.execution_tx {
					return false;
				}
				self.execution_tx = tx_hash;
				true
			},
		}
	}

	async fn poll(&mut self) {
		let Some(intent_id) = self.intent_id else {
			return;
		};
		match self.reader.read(intent_id, self.execution_tx).await {
			Ok(snapshot) => {
				self.snapshot.send_replace(snapshot);
			},
			Err(e) => {
				tracing::warn!(
					intent_id = %truncate_id(&intent_id.to_string()),
					error = %e,
					"Intent read failed"
				);
				self.snapshot.send_modify(|snapshot| {
					snapshot.is_loading = false;
					snapshot.error = Some(e.to_string());
				});
			},
		}
	}
}

fn initial_snapshot(intent_id: Option<IntentId>) -> ContractSnapshot {
	intent_id
		.map(ContractSnapshot::loading)
		.unwrap_or_else(ContractSnapshot::disabled)
}

/// Polls the contract for one intent at a fixed interval.
///
/// With no intent tracked the monitor is idle and publishes a disabled
/// snapshot. Dropping the monitor stops the task.
pub struct IntentMonitor {
	commands: mpsc::Sender<Command>,
	snapshot: watch::Receiver<ContractSnapshot>,
	handle: JoinHandle<()>,
}

impl IntentMonitor {
	pub fn spawn(reader: ContractStateReader, interval: Duration, intent_id: Option<IntentId>) -> Self {
		let (snapshot_tx, snapshot) = watch::channel(initial_snapshot(intent_id));
		let (commands, command_rx) = mpsc::channel(32);
		let poll_loop = PollLoop {
			reader,
			intent_id,
			execution_tx: None,
			snapshot: snapshot_tx,
		};
		let handle = tokio::spawn(poll_loop.run(interval, command_rx));
		Self {
			commands,
			snapshot,
			handle,
		}
	}

	async fn send(&self, command: Command) -> Result<(), MonitorError> {
		self.commands
			.send(command)
			.await
			.map_err(|_| MonitorError::Stopped)
	}

	/// Switches the tracked intent; `None` disables polling.
	pub async fn track(&self, intent_id: Option<IntentId>) -> Result<(), MonitorError> {
		self.send(Command::Track(intent_id)).await
	}

	/// Follows the receipt of the payment execution transaction.
	pub async fn track_execution(&self, tx_hash: Option<TxHash>) -> Result<(), MonitorError> {
		self.send(Command::TrackExecution(tx_hash)).await
	}

	/// Reads immediately instead of waiting for the next tick.
	pub async fn refresh(&self) -> Result<(), MonitorError> {
		self.send(Command::Refresh).await
	}

	pub fn subscribe(&self) -> watch::Receiver<ContractSnapshot> {
		self.snapshot.clone()
	}

	pub fn latest(&self) -> ContractSnapshot {
		self.snapshot.borrow().clone()
	}
}

impl Drop for IntentMonitor {
	fn drop(&mut self) {
		self.handle.abort();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::monitoring::reader::tests::{existing_context, mock_reader};
	use paysync_contracts::{ContractError, MockIntentReaderInterface};
	use paysync_types::{current_timestamp, PaymentIntentStatus, RetryPolicy};
	use std::sync::atomic::{AtomicU32, Ordering};
	use std::sync::Arc;

	const INTENT: IntentId = IntentId::repeat_byte(0x09);

	fn monitor(mock: MockIntentReaderInterface, intent_id: Option<IntentId>) -> IntentMonitor {
		IntentMonitor::spawn(
			ContractStateReader::new(Arc::new(mock), RetryPolicy::none()),
			Duration::from_millis(2000),
			intent_id,
		)
	}

	#[tokio::test(start_paused = true)]
	async fn test_disabled_without_intent() {
		let monitor = monitor(MockIntentReaderInterface::new(), None);
		tokio::time::sleep(Duration::from_secs(10)).await;
		let latest = monitor.latest();
		assert_eq!(latest.status, Some(PaymentIntentStatus::NotFound));
		assert!(!latest.is_loading);
	}

	#[tokio::test(start_paused = true)]
	async fn test_first_tick_replaces_loading_snapshot() {
		let monitor = monitor(
			mock_reader(true, current_timestamp() + 3600, false, false),
			Some(INTENT),
		);
		let mut updates = monitor.subscribe();
		assert!(updates.borrow().is_loading);

		updates.changed().await.unwrap();
		let latest = updates.borrow_and_update().clone();
		assert_eq!(latest.status, Some(PaymentIntentStatus::Created));
		assert!(!latest.is_loading);
	}

	#[tokio::test(start_paused = true)]
	async fn test_polls_on_interval() {
		let reads = Arc::new(AtomicU32::new(0));
		let counter = Arc::clone(&reads);
		let mut mock_counting = MockIntentReaderInterface::new();
		mock_counting.expect_get_payment_context().returning(move |_| {
			counter.fetch_add(1, Ordering::SeqCst);
			Box::pin(async { Ok(existing_context()) })
		});
		mock_counting
			.expect_intent_deadline()
			.returning(|_| Box::pin(async { Ok(0) }));
		mock_counting
			.expect_processed_intent()
			.returning(|_| Box::pin(async { Ok(false) }));
		mock_counting
			.expect_has_signature()
			.returning(|_| Box::pin(async { Ok(false) }));

		let monitor = monitor(mock_counting, Some(INTENT));
		tokio::time::sleep(Duration::from_millis(4500)).await;
		// Immediate first tick, then at 2s and 4s
		assert_eq!(reads.load(Ordering::SeqCst), 3);

		drop(monitor);
		tokio::time::sleep(Duration::from_secs(10)).await;
		assert_eq!(reads.load(Ordering::SeqCst), 3);
	}

	#[tokio::test(start_paused = true)]
	async fn test_read_error_keeps_previous_state() {
		let fail = Arc::new(AtomicU32::new(0));
		let calls = Arc::clone(&fail);
		let mut mock = MockIntentReaderInterface::new();
		mock.expect_get_payment_context().returning(move |_| {
			let first = calls.fetch_add(1, Ordering::SeqCst) == 0;
			Box::pin(async move {
				if first {
					Ok(existing_context())
				} else {
					Err(ContractError::Network("rpc down".into()))
				}
			})
		});
		mock.expect_intent_deadline()
			.returning(|_| Box::pin(async { Ok(0) }));
		mock.expect_processed_intent()
			.returning(|_| Box::pin(async { Ok(false) }));
		mock.expect_has_signature()
			.returning(|_| Box::pin(async { Ok(true) }));

		let monitor = monitor(mock, Some(INTENT));
		let mut updates = monitor.subscribe();
		updates.changed().await.unwrap();
		assert_eq!(
			updates.borrow_and_update().status,
			Some(PaymentIntentStatus::Signed)
		);

		updates.changed().await.unwrap();
		let latest = updates.borrow_and_update().clone();
		assert_eq!(latest.status, Some(PaymentIntentStatus::Signed));
		assert!(latest.error.is_some());
	}

	#[tokio::test(start_paused = true)]
	async fn test_track_switches_intent_and_reads_immediately() {
		let monitor = monitor(mock_reader(true, 0, true, true), None);
		let mut updates = monitor.subscribe();

		monitor.track(Some(INTENT)).await.unwrap();
		loop {
			updates.changed().await.unwrap();
			if !updates.borrow_and_update().is_loading {
				break;
			}
		}
		let latest = monitor.latest();
		assert_eq!(latest.intent_id, Some(INTENT));
		assert_eq!(latest.status, Some(PaymentIntentStatus::Completed));

		monitor.track(None).await.unwrap();
		updates.changed().await.unwrap();
		assert_eq!(monitor.latest(), ContractSnapshot::disabled());
	}
}

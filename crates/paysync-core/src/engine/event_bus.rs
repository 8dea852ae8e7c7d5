//! Event bus implementation for sync and recovery notifications.
//!
//! This module provides a broadcast-based event bus that lets callers observe
//! status changes and cleanup progress without polling the state machine.

use paysync_types::PaymentSyncEvent;
use tokio::sync::broadcast;

/// Event bus for broadcasting payment sync events to multiple subscribers.
pub struct EventBus {
	/// The broadcast sender used to publish events.
	sender: broadcast::Sender<PaymentSyncEvent>,
}

impl EventBus {
	/// Creates a new EventBus with the specified channel capacity.
	///
	/// The capacity determines how many events can be buffered in the channel
	/// before old events start being dropped when the channel is full.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Creates a new subscriber to receive events published from now on.
	pub fn subscribe(&self) -> broadcast::Receiver<PaymentSyncEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event to all current subscribers.
	///
	/// Returns an error if there are no active subscribers, which callers
	/// treat as non-critical.
	pub fn publish(
		&self,
		event: PaymentSyncEvent,
	) -> Result<(), broadcast::error::SendError<PaymentSyncEvent>> {
		self.sender.send(event)?;
		Ok(())
	}
}

/// Cloning creates a new handle to the same underlying broadcast channel.
impl Clone for EventBus {
	fn clone(&self) -> Self {
		Self {
			sender: self.sender.clone(),
		}
	}
}

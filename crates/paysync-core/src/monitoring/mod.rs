//! Contract state monitoring for the tracked payment intent.

pub mod intent;
pub mod reader;

pub use intent::IntentMonitor;
pub use reader::{ContractStateReader, MonitorError};

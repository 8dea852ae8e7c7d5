//! Recovery of payments whose frontend state disagrees with the contract.
//!
//! The analyzer decides what to do; the executor does it.

pub mod analyzer;
pub mod executor;

pub use analyzer::FailureAnalyzer;
pub use executor::{CleanupError, CleanupExecutor, CleanupState};

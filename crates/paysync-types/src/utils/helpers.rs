//! Time helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix timestamp in seconds, 0 if the clock is before the epoch.
pub fn current_timestamp() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or(0)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_current_timestamp_is_after_2024() {
		assert!(current_timestamp() > 1_704_067_200);
	}
}

//! String formatting utilities.
//!
//! Provides functions for formatting strings for display, including
//! hex string prefix management, token amounts, basis points and truncation
//! of identifiers for log output.

/// Truncates a hex string for display purposes.
///
/// Shows only the first 10 characters followed by ".." for longer strings,
/// which keeps the `0x` prefix plus four bytes of an intent id.
pub fn truncate_id(id: &str) -> String {
	if id.len() <= 10 {
		id.to_string()
	} else {
		format!("{}..", &id[..10])
	}
}

/// Adds "0x" prefix to a hex string if it doesn't already have one.
pub fn with_0x_prefix(hex_str: &str) -> String {
	if hex_str.to_lowercase().starts_with("0x") {
		hex_str.to_string()
	} else {
		format!("0x{}", hex_str)
	}
}

/// Formats a raw token amount (as stored on-chain) with decimal places.
///
/// Returns strings like "1.5" or "1000".
pub fn format_token_amount(amount: &str, decimals: u8) -> String {
	if decimals == 0 {
		return amount.to_string();
	}

	let decimal_places = decimals as usize;

	let (integer_part, decimal_part) = if amount.len() <= decimal_places {
		let decimal_str = format!("{:0>width$}", amount, width = decimal_places);
		("0".to_string(), decimal_str)
	} else {
		let split_pos = amount.len() - decimal_places;
		(
			amount[..split_pos].to_string(),
			amount[split_pos..].to_string(),
		)
	};

	let decimal_trimmed = decimal_part.trim_end_matches('0');

	if decimal_trimmed.is_empty() {
		integer_part
	} else {
		format!("{}.{}", integer_part, decimal_trimmed)
	}
}

/// Formats basis points as a percentage, e.g. 50 -> "0.50%".
pub fn format_bps(bps: u32) -> String {
	format!("{}.{:02}%", bps / 100, bps % 100)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_truncate_id() {
		assert_eq!(truncate_id("0x12345678"), "0x12345678");
		assert_eq!(truncate_id("0x1234567890abcdef"), "0x12345678..");
	}

	#[test]
	fn test_prefix_helpers() {
		assert_eq!(with_0x_prefix("abcd"), "0xabcd");
		assert_eq!(with_0x_prefix("0Xabcd"), "0Xabcd");
	}

	#[test]
	fn test_format_token_amount() {
		assert_eq!(format_token_amount("1500000", 6), "1.5");
		assert_eq!(format_token_amount("1000000000", 6), "1000");
		assert_eq!(format_token_amount("5", 6), "0.000005");
		assert_eq!(format_token_amount("42", 0), "42");
	}

	#[test]
	fn test_format_bps() {
		assert_eq!(format_bps(50), "0.50%");
		assert_eq!(format_bps(5), "0.05%");
		assert_eq!(format_bps(250), "2.50%");
		assert_eq!(format_bps(10000), "100.00%");
	}
}

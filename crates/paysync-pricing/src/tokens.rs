//! Known-address allowlist used for pair classification.

use alloy_primitives::Address;
use paysync_config::{SlippageConfig, TokenConfig};
use paysync_types::TokenClass;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct KnownToken {
	class: TokenClass,
	symbol: String,
	decimals: u8,
}

/// Stable and native token allowlists keyed by address.
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
	tokens: HashMap<Address, KnownToken>,
}

impl TokenRegistry {
	pub fn new(stable: &[TokenConfig], native: &[TokenConfig]) -> Self {
		let mut tokens = HashMap::new();
		for (class, list) in [(TokenClass::Stable, stable), (TokenClass::Native, native)] {
			for token in list {
				tokens.insert(
					token.address,
					KnownToken {
						class,
						symbol: token.symbol.clone(),
						decimals: token.decimals,
					},
				);
			}
		}
		Self { tokens }
	}

	pub fn from_config(config: &SlippageConfig) -> Self {
		Self::new(&config.stable_tokens, &config.native_tokens)
	}

	/// Anything outside the allowlists is exotic.
	pub fn classify(&self, token: &Address) -> TokenClass {
		self.tokens
			.get(token)
			.map(|known| known.class)
			.unwrap_or(TokenClass::Exotic)
	}

	pub fn decimals(&self, token: &Address) -> Option<u8> {
		self.tokens.get(token).map(|known| known.decimals)
	}

	pub fn symbol(&self, token: &Address) -> Option<&str> {
		self.tokens.get(token).map(|known| known.symbol.as_str())
	}
}

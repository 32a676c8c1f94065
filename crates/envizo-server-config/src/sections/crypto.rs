// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Master key configuration.

use envizo_common_secret::SecretString;
use serde::Deserialize;

/// A 256-bit master key encoded as hex.
pub const MASTER_KEY_HEX_LEN: usize = 64;

/// Crypto configuration (runtime, fully resolved).
#[derive(Debug, Clone, Default)]
pub struct CryptoConfig {
	/// Hex-encoded master key. `None` means an ephemeral key is generated at startup.
	pub master_key: Option<SecretString>,
}

impl CryptoConfig {
	pub fn has_master_key(&self) -> bool {
		self.master_key.is_some()
	}
}

/// Crypto configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CryptoConfigLayer {
	#[serde(default)]
	pub master_key: Option<SecretString>,
}

impl CryptoConfigLayer {
	pub fn merge(&mut self, other: CryptoConfigLayer) {
		if other.master_key.is_some() {
			self.master_key = other.master_key;
		}
	}

	pub fn finalize(self) -> CryptoConfig {
		CryptoConfig {
			master_key: self.master_key,
		}
	}
}

/// Shape check only; decoding happens where the key is used.
pub(crate) fn is_valid_master_key_hex(value: &str) -> bool {
	value.len() == MASTER_KEY_HEX_LEN && value.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_has_no_key() {
		assert!(!CryptoConfigLayer::default().finalize().has_master_key());
	}

	#[test]
	fn test_merge_overrides_key() {
		let mut base = CryptoConfigLayer {
			master_key: Some(SecretString::from("a".repeat(64))),
		};
		base.merge(CryptoConfigLayer {
			master_key: Some(SecretString::from("b".repeat(64))),
		});
		let config = base.finalize();
		assert_eq!(config.master_key.unwrap().expose(), &"b".repeat(64));
	}

	#[test]
	fn test_merge_keeps_key_when_other_empty() {
		let mut base = CryptoConfigLayer {
			master_key: Some(SecretString::from("a".repeat(64))),
		};
		base.merge(CryptoConfigLayer::default());
		assert!(base.finalize().has_master_key());
	}

	#[test]
	fn test_key_shape() {
		assert!(is_valid_master_key_hex(&"0f".repeat(32)));
		assert!(!is_valid_master_key_hex("0f"));
		assert!(!is_valid_master_key_hex(&"zz".repeat(32)));
	}

	#[test]
	fn test_debug_redacts_key() {
		let config = CryptoConfig {
			master_key: Some(SecretString::from("0f".repeat(32))),
		};
		assert!(!format!("{config:?}").contains("0f0f"));
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secret store tuning.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_WRITE_LOCK_TIMEOUT_MS: u64 = 5000;

/// Store configuration (runtime, fully resolved).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
	/// How long a write waits for the per-key lock before giving up.
	pub write_lock_timeout_ms: u64,
}

impl StoreConfig {
	pub fn write_lock_timeout(&self) -> Duration {
		Duration::from_millis(self.write_lock_timeout_ms)
	}
}

impl Default for StoreConfig {
	fn default() -> Self {
		Self {
			write_lock_timeout_ms: DEFAULT_WRITE_LOCK_TIMEOUT_MS,
		}
	}
}

/// Store configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfigLayer {
	#[serde(default)]
	pub write_lock_timeout_ms: Option<u64>,
}

impl StoreConfigLayer {
	pub fn merge(&mut self, other: StoreConfigLayer) {
		if other.write_lock_timeout_ms.is_some() {
			self.write_lock_timeout_ms = other.write_lock_timeout_ms;
		}
	}

	pub fn finalize(self) -> StoreConfig {
		StoreConfig {
			write_lock_timeout_ms: self
				.write_lock_timeout_ms
				.unwrap_or(DEFAULT_WRITE_LOCK_TIMEOUT_MS),
		}
	}
}

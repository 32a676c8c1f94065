// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Deployment environment (`ENVIZO_SERVER_ENV`).

use serde::Deserialize;

const DEFAULT_ENVIRONMENT: &str = "development";

/// Deployment configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct DeploymentConfig {
	pub environment: String,
}

impl DeploymentConfig {
	pub fn is_production(&self) -> bool {
		self.environment.eq_ignore_ascii_case("production")
	}
}

impl Default for DeploymentConfig {
	fn default() -> Self {
		Self {
			environment: DEFAULT_ENVIRONMENT.to_string(),
		}
	}
}

/// Deployment configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeploymentConfigLayer {
	#[serde(default)]
	pub environment: Option<String>,
}

impl DeploymentConfigLayer {
	pub fn merge(&mut self, other: DeploymentConfigLayer) {
		if other.environment.is_some() {
			self.environment = other.environment;
		}
	}

	pub fn finalize(self) -> DeploymentConfig {
		DeploymentConfig {
			environment: self
				.environment
				.unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
		}
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration management for the Envizo server.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`ENVIZO_SERVER_*`)
//!
//! # Usage
//!
//! ```ignore
//! use envizo_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("write lock timeout: {:?}", config.store.write_lock_timeout());
//! ```

pub mod env;
pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use env::{load_secret_env, SecretEnvError};
pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource, SYSTEM_CONFIG_PATH};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub deployment: DeploymentConfig,
	pub crypto: CryptoConfig,
	pub store: StoreConfig,
	pub audit: AuditConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`ENVIZO_SERVER_*`)
/// 2. Config file (`/etc/envizo/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![Box::new(DefaultsSource), Box::new(EnvSource)])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let config = ServerConfig {
		deployment: layer.deployment.unwrap_or_default().finalize(),
		crypto: layer.crypto.unwrap_or_default().finalize(),
		store: layer.store.unwrap_or_default().finalize(),
		audit: layer.audit.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		environment = %config.deployment.environment,
		master_key_configured = config.crypto.has_master_key(),
		write_lock_timeout_ms = config.store.write_lock_timeout_ms,
		audit_enabled = config.audit.enabled,
		audit_sqlite = config.audit.sqlite_url.is_some(),
		"Server configuration loaded"
	);

	Ok(config)
}

/// Validate cross-field configuration rules.
fn validate_config(config: &ServerConfig) -> Result<(), ConfigError> {
	match &config.crypto.master_key {
		Some(key) if !sections::is_valid_master_key_hex(key.expose()) => {
			return Err(ConfigError::InvalidValue {
				key: "crypto.master_key".to_string(),
				message: format!("expected {MASTER_KEY_HEX_LEN} hex characters"),
			});
		}
		None if config.deployment.is_production() => {
			return Err(ConfigError::Validation(
				"no master key is configured while ENVIZO_SERVER_ENV=production. \
				 Set ENVIZO_SERVER_MASTER_KEY or ENVIZO_SERVER_MASTER_KEY_FILE; \
				 an ephemeral key would make every stored secret unreadable after restart."
					.to_string(),
			));
		}
		_ => {}
	}

	if config.store.write_lock_timeout_ms == 0 {
		return Err(ConfigError::InvalidValue {
			key: "store.write_lock_timeout_ms".to_string(),
			message: "must be greater than zero".to_string(),
		});
	}

	if config.audit.queue_capacity == 0 {
		return Err(ConfigError::InvalidValue {
			key: "audit.queue_capacity".to_string(),
			message: "must be greater than zero".to_string(),
		});
	}

	Ok(())
}

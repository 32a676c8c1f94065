// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::env::load_secret_env;
use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	AuditConfigLayer, CryptoConfigLayer, DeploymentConfigLayer, LoggingConfigLayer, QueueOverflowPolicy,
	StoreConfigLayer,
};

/// Default location of the system config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/envizo/server.toml";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new(SYSTEM_CONFIG_PATH)
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: ENVIZO_SERVER_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			deployment: Some(load_deployment_from_env()),
			crypto: Some(load_crypto_from_env()?),
			store: Some(load_store_from_env()?),
			audit: Some(load_audit_from_env()?),
			logging: Some(load_logging_from_env()),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u64 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_usize(name: &str) -> Result<Option<usize>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid usize value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn load_deployment_from_env() -> DeploymentConfigLayer {
	DeploymentConfigLayer {
		environment: env_var("ENVIZO_SERVER_ENV"),
	}
}

fn load_crypto_from_env() -> Result<CryptoConfigLayer, ConfigError> {
	Ok(CryptoConfigLayer {
		master_key: load_secret_env("ENVIZO_SERVER_MASTER_KEY")
			.map_err(|e| ConfigError::Secret(e.to_string()))?,
	})
}

fn load_store_from_env() -> Result<StoreConfigLayer, ConfigError> {
	Ok(StoreConfigLayer {
		write_lock_timeout_ms: env_u64("ENVIZO_SERVER_STORE_WRITE_LOCK_TIMEOUT_MS")?,
	})
}

fn load_audit_from_env() -> Result<AuditConfigLayer, ConfigError> {
	let queue_overflow_policy = match env_var("ENVIZO_SERVER_AUDIT_QUEUE_OVERFLOW_POLICY") {
		Some(v) => Some(v.parse::<QueueOverflowPolicy>().map_err(|message| {
			ConfigError::InvalidValue {
				key: "ENVIZO_SERVER_AUDIT_QUEUE_OVERFLOW_POLICY".to_string(),
				message,
			}
		})?),
		None => None,
	};

	Ok(AuditConfigLayer {
		enabled: env_bool("ENVIZO_SERVER_AUDIT_ENABLED"),
		queue_capacity: env_usize("ENVIZO_SERVER_AUDIT_QUEUE_CAPACITY")?,
		queue_overflow_policy,
		min_severity: env_var("ENVIZO_SERVER_AUDIT_MIN_SEVERITY"),
		tracing_sink: env_bool("ENVIZO_SERVER_AUDIT_TRACING_SINK"),
		sqlite_url: env_var("ENVIZO_SERVER_AUDIT_SQLITE_URL"),
	})
}

fn load_logging_from_env() -> LoggingConfigLayer {
	LoggingConfigLayer {
		level: env_var("ENVIZO_SERVER_LOG_LEVEL"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_precedence_ordering() {
		assert!(Precedence::Environment > Precedence::ConfigFile);
		assert!(Precedence::ConfigFile > Precedence::Defaults);
	}

	#[test]
	fn test_defaults_source_returns_empty_layer() {
		let layer = DefaultsSource.load().unwrap();
		assert!(layer.crypto.is_none());
		assert!(layer.store.is_none());
	}

	#[test]
	fn test_toml_source_missing_file_returns_empty() {
		let source = TomlSource::new("/nonexistent/config.toml");
		let layer = source.load().unwrap();
		assert!(layer.audit.is_none());
	}

	#[test]
	fn test_toml_source_reads_sections() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			r#"
[crypto]
master_key = "{}"

[store]
write_lock_timeout_ms = 750
"#,
			"ab".repeat(32)
		)
		.unwrap();

		let layer = TomlSource::new(file.path()).load().unwrap();
		let crypto = layer.crypto.unwrap().finalize();
		assert_eq!(crypto.master_key.unwrap().expose(), &"ab".repeat(32));
		assert_eq!(layer.store.unwrap().write_lock_timeout_ms, Some(750));
	}

	#[test]
	fn test_toml_source_reports_parse_errors() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[store]\nwrite_lock_timeout_ms = \"soon\"").unwrap();
		let err = TomlSource::new(file.path()).load().unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { .. }));
	}
}

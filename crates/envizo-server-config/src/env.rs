// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secret loading from environment variables with `*_FILE` indirection.

use std::path::PathBuf;

use envizo_common_secret::SecretString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretEnvError {
	#[error("both {name} and {name}_FILE are set")]
	Ambiguous { name: String },

	#[error("failed to read {name}_FILE at {path}: {source}")]
	FileRead {
		name: String,
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}

/// Load a secret from `NAME` or from the file named by `NAME_FILE`.
///
/// Trailing newlines in the file are stripped. Empty values count as unset.
pub fn load_secret_env(name: &str) -> Result<Option<SecretString>, SecretEnvError> {
	let direct = std::env::var(name).ok().filter(|v| !v.is_empty());
	let file_var = format!("{name}_FILE");
	let file = std::env::var(&file_var).ok().filter(|v| !v.is_empty());

	match (direct, file) {
		(Some(_), Some(_)) => Err(SecretEnvError::Ambiguous {
			name: name.to_string(),
		}),
		(Some(value), None) => Ok(Some(SecretString::new(value))),
		(None, Some(path)) => {
			let path = PathBuf::from(path);
			let content = std::fs::read_to_string(&path).map_err(|source| SecretEnvError::FileRead {
				name: name.to_string(),
				path: path.clone(),
				source,
			})?;
			let trimmed = content.trim_end_matches(['\r', '\n']);
			if trimmed.is_empty() {
				Ok(None)
			} else {
				Ok(Some(SecretString::new(trimmed.to_string())))
			}
		}
		(None, None) => Ok(None),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	// Each test uses its own variable names; the process environment is shared.

	#[test]
	fn unset_is_none() {
		assert!(load_secret_env("ENVIZO_TEST_UNSET_SECRET").unwrap().is_none());
	}

	#[test]
	fn direct_value() {
		std::env::set_var("ENVIZO_TEST_DIRECT_SECRET", "hunter2");
		let secret = load_secret_env("ENVIZO_TEST_DIRECT_SECRET").unwrap().unwrap();
		assert_eq!(secret.expose(), "hunter2");
		std::env::remove_var("ENVIZO_TEST_DIRECT_SECRET");
	}

	#[test]
	fn file_value_strips_newline() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "from-file").unwrap();
		std::env::set_var("ENVIZO_TEST_FILE_SECRET_FILE", file.path());
		let secret = load_secret_env("ENVIZO_TEST_FILE_SECRET").unwrap().unwrap();
		assert_eq!(secret.expose(), "from-file");
		std::env::remove_var("ENVIZO_TEST_FILE_SECRET_FILE");
	}

	#[test]
	fn both_set_is_ambiguous() {
		std::env::set_var("ENVIZO_TEST_BOTH_SECRET", "a");
		std::env::set_var("ENVIZO_TEST_BOTH_SECRET_FILE", "/tmp/whatever");
		assert!(matches!(
			load_secret_env("ENVIZO_TEST_BOTH_SECRET"),
			Err(SecretEnvError::Ambiguous { .. })
		));
		std::env::remove_var("ENVIZO_TEST_BOTH_SECRET");
		std::env::remove_var("ENVIZO_TEST_BOTH_SECRET_FILE");
	}

	#[test]
	fn missing_file_is_error() {
		std::env::set_var("ENVIZO_TEST_MISSING_SECRET_FILE", "/nonexistent/secret");
		assert!(matches!(
			load_secret_env("ENVIZO_TEST_MISSING_SECRET"),
			Err(SecretEnvError::FileRead { .. })
		));
		std::env::remove_var("ENVIZO_TEST_MISSING_SECRET_FILE");
	}
}

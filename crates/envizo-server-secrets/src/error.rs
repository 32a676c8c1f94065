// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use envizo_server_audit::ReasonCode;
use envizo_server_auth::{IdError, PolicyError};
use thiserror::Error;

use crate::codec::CodecError;
use crate::encryption::CryptoError;

pub type SecretsResult<T> = Result<T, SecretsError>;

/// Coarse classification of [`SecretsError`] for callers that branch on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	NotFound,
	Forbidden,
	CorruptedSecret,
	Parse,
	Conflict,
	InvalidInput,
	Unavailable,
	Encryption,
}

#[derive(Debug, Error)]
pub enum SecretsError {
	#[error("not found: {0}")]
	NotFound(String),

	#[error(transparent)]
	Forbidden(#[from] PolicyError),

	#[error("secret {target} version {version} could not be decrypted")]
	CorruptedSecret { target: String, version: u64 },

	#[error(transparent)]
	Parse(#[from] CodecError),

	#[error("conflict: {0}")]
	Conflict(String),

	#[error("invalid input: {0}")]
	InvalidInput(String),

	#[error("unavailable: {0}")]
	Unavailable(String),

	#[error("encryption failed: {0}")]
	Encryption(String),
}

impl SecretsError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			SecretsError::NotFound(_) => ErrorKind::NotFound,
			SecretsError::Forbidden(_) => ErrorKind::Forbidden,
			SecretsError::CorruptedSecret { .. } => ErrorKind::CorruptedSecret,
			SecretsError::Parse(_) => ErrorKind::Parse,
			SecretsError::Conflict(_) => ErrorKind::Conflict,
			SecretsError::InvalidInput(_) => ErrorKind::InvalidInput,
			SecretsError::Unavailable(_) => ErrorKind::Unavailable,
			SecretsError::Encryption(_) => ErrorKind::Encryption,
		}
	}

	/// Reason recorded on the audit entry when this error ends an operation.
	pub fn reason_code(&self) -> ReasonCode {
		match self {
			SecretsError::NotFound(_) => ReasonCode::NotFound,
			SecretsError::Forbidden(e) => e.reason().into(),
			SecretsError::CorruptedSecret { .. } => ReasonCode::CorruptedSecret,
			SecretsError::Parse(_) | SecretsError::InvalidInput(_) => ReasonCode::InvalidInput,
			SecretsError::Conflict(_) => ReasonCode::Conflict,
			SecretsError::Unavailable(_) | SecretsError::Encryption(_) => ReasonCode::Unavailable,
		}
	}
}

impl From<IdError> for SecretsError {
	fn from(e: IdError) -> Self {
		SecretsError::InvalidInput(e.to_string())
	}
}

impl From<CryptoError> for SecretsError {
	fn from(e: CryptoError) -> Self {
		match e {
			CryptoError::KeyUnavailable(msg) => SecretsError::Unavailable(msg),
			other => SecretsError::Encryption(other.to_string()),
		}
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the secret store.

use std::fmt;

use chrono::{DateTime, Utc};
use envizo_common_secret::SecretString;
use envizo_server_auth::{ActorId, EnvironmentId, ProjectId, Role};
use serde::{Deserialize, Serialize};

use crate::classify::Classification;
use crate::encryption::NONCE_SIZE;
use crate::error::{SecretsError, SecretsResult};

/// Maximum length of a secret key in bytes.
pub const MAX_KEY_LEN: usize = 256;

/// Maximum length of a project display name in characters.
pub const MAX_PROJECT_NAME_LEN: usize = 128;

/// A project and the environments that currently exist in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
	pub id: ProjectId,
	pub name: String,
	pub created_by: ActorId,
	pub created_at: DateTime<Utc>,
	/// Live environments in canonical order.
	pub environments: Vec<EnvironmentId>,
}

/// One actor's standing in a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMember {
	pub actor_id: ActorId,
	pub role: Role,
	/// Explicit grant to read plaintext of values classified as insecure.
	pub reveal_insecure: bool,
	pub added_at: DateTime<Utc>,
}

/// An in-place change to an existing membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberChange {
	Role(Role),
	RevealInsecure(bool),
}

/// Shared members may only be viewers or editors; the creator is the sole owner.
pub(crate) fn validate_shared_role(role: Role) -> SecretsResult<()> {
	match role {
		Role::Viewer | Role::Editor => Ok(()),
		Role::Owner => Err(SecretsError::InvalidInput(
			"members can only be granted viewer or editor".to_string(),
		)),
	}
}

/// Identity of one logical secret.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SecretRef {
	pub project: ProjectId,
	pub environment: EnvironmentId,
	pub key: String,
}

impl SecretRef {
	/// Build a reference, validating the key.
	pub fn new(project: ProjectId, environment: EnvironmentId, key: impl Into<String>) -> SecretsResult<Self> {
		let key = key.into();
		validate_key(&key)?;
		Ok(Self {
			project,
			environment,
			key,
		})
	}
}

impl fmt::Display for SecretRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}/{}", self.project, self.environment, self.key)
	}
}

/// Keys are non-empty, at most [`MAX_KEY_LEN`] bytes, and contain no
/// whitespace, control characters or `=`. They may not start with `#`.
pub fn validate_key(key: &str) -> SecretsResult<()> {
	if key.is_empty() {
		return Err(SecretsError::InvalidInput("secret key must not be empty".to_string()));
	}
	if key.len() > MAX_KEY_LEN {
		return Err(SecretsError::InvalidInput(format!(
			"secret key exceeds {MAX_KEY_LEN} bytes"
		)));
	}
	if key.starts_with('#') {
		return Err(SecretsError::InvalidInput(format!(
			"secret key '{key}' must not start with '#'"
		)));
	}
	if key
		.chars()
		.any(|c| c.is_whitespace() || c.is_control() || c == '=')
	{
		return Err(SecretsError::InvalidInput(format!(
			"secret key '{key}' contains whitespace, control characters or '='"
		)));
	}
	Ok(())
}

pub(crate) fn validate_project_name(name: &str) -> SecretsResult<String> {
	let trimmed = name.trim();
	if trimmed.is_empty() {
		return Err(SecretsError::InvalidInput("project name must not be empty".to_string()));
	}
	if trimmed.chars().count() > MAX_PROJECT_NAME_LEN {
		return Err(SecretsError::InvalidInput(format!(
			"project name exceeds {MAX_PROJECT_NAME_LEN} characters"
		)));
	}
	Ok(trimmed.to_string())
}

/// An immutable, persisted snapshot of one secret.
///
/// Carries ciphertext only. Delete markers have empty ciphertext and an all-zero nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretVersion {
	pub key: String,
	/// Starts at 1 and increases by exactly 1 per append.
	pub version: u64,
	pub ciphertext: Vec<u8>,
	pub nonce: [u8; NONCE_SIZE],
	pub created_at: DateTime<Utc>,
	pub author: ActorId,
	pub comment: Option<String>,
	pub deleted: bool,
}

impl SecretVersion {
	pub(crate) fn delete_marker(key: String, version: u64, author: ActorId, comment: Option<String>) -> Self {
		Self {
			key,
			version,
			ciphertext: Vec::new(),
			nonce: [0u8; NONCE_SIZE],
			created_at: Utc::now(),
			author,
			comment,
			deleted: true,
		}
	}

	pub fn is_delete_marker(&self) -> bool {
		self.deleted
	}
}

/// A decrypted secret returned by [`SecretStore::get`](crate::SecretStore::get).
#[derive(Debug, Clone)]
pub struct RevealedSecret {
	pub version: SecretVersion,
	pub value: SecretString,
	pub classification: Classification,
}

/// Options for [`SecretStore::put`](crate::SecretStore::put).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
	pub comment: Option<String>,
	/// Fail with `Conflict` unless the latest version equals this (0 for a new key).
	pub expected_version: Option<u64>,
}

impl PutOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn comment(mut self, comment: impl Into<String>) -> Self {
		self.comment = Some(comment.into());
		self
	}

	pub fn expected_version(mut self, version: u64) -> Self {
		self.expected_version = Some(version);
		self
	}
}

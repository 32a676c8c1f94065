// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core identifiers shared by the policy engine, the audit log and the store.
//!
//! - [`ActorId`]: UUID newtype for an authenticated caller
//! - [`ProjectId`]: validated slug such as `proj-1`
//! - [`EnvironmentId`]: the closed set of deployment environments
//! - [`Role`]: project-scoped role, ordered `Viewer < Editor < Owner`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::IdError;

/// Maximum length of a project id.
pub const MAX_PROJECT_ID_LEN: usize = 64;

/// Unique identifier for an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(Uuid);

impl ActorId {
	pub fn new(id: Uuid) -> Self {
		Self(id)
	}

	/// Generate a new random ID.
	pub fn generate() -> Self {
		Self(Uuid::new_v4())
	}

	pub fn into_inner(self) -> Uuid {
		self.0
	}

	pub fn as_uuid(&self) -> &Uuid {
		&self.0
	}
}

impl fmt::Display for ActorId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<Uuid> for ActorId {
	fn from(id: Uuid) -> Self {
		Self(id)
	}
}

impl From<ActorId> for Uuid {
	fn from(id: ActorId) -> Self {
		id.0
	}
}

/// Project identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectId(String);

impl ProjectId {
	pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
		let id = id.into();
		if Self::is_valid(&id) {
			Ok(Self(id))
		} else {
			Err(IdError::InvalidProjectId(id))
		}
	}

	pub fn is_valid(id: &str) -> bool {
		!id.is_empty()
			&& id.len() <= MAX_PROJECT_ID_LEN
			&& id
				.chars()
				.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for ProjectId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for ProjectId {
	type Err = IdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

impl TryFrom<String> for ProjectId {
	type Error = IdError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}

impl From<ProjectId> for String {
	fn from(id: ProjectId) -> Self {
		id.0
	}
}

/// Deployment environment. Every project holds at most one of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentId {
	Development,
	Staging,
	Production,
}

impl EnvironmentId {
	/// All environments in canonical order.
	pub fn all() -> &'static [EnvironmentId] {
		&[
			EnvironmentId::Development,
			EnvironmentId::Staging,
			EnvironmentId::Production,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			EnvironmentId::Development => "development",
			EnvironmentId::Staging => "staging",
			EnvironmentId::Production => "production",
		}
	}

	/// Human-readable name, e.g. "Production".
	pub fn display_name(&self) -> &'static str {
		match self {
			EnvironmentId::Development => "Development",
			EnvironmentId::Staging => "Staging",
			EnvironmentId::Production => "Production",
		}
	}
}

impl fmt::Display for EnvironmentId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for EnvironmentId {
	type Err = IdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"development" | "dev" => Ok(EnvironmentId::Development),
			"staging" | "stage" => Ok(EnvironmentId::Staging),
			"production" | "prod" => Ok(EnvironmentId::Production),
			_ => Err(IdError::UnknownEnvironment(s.to_string())),
		}
	}
}

/// Role an actor holds within one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
	/// Full control, including history, environments and membership.
	Owner,
	/// Reads and writes current values.
	Editor,
	/// Reads current values only.
	Viewer,
}

impl Role {
	pub fn all() -> &'static [Role] {
		&[Role::Owner, Role::Editor, Role::Viewer]
	}

	fn rank(&self) -> u8 {
		match self {
			Role::Viewer => 1,
			Role::Editor => 2,
			Role::Owner => 3,
		}
	}

	/// Returns true if this role grants everything `other` grants.
	pub fn at_least(&self, other: Role) -> bool {
		self.rank() >= other.rank()
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Role::Owner => write!(f, "owner"),
			Role::Editor => write!(f, "editor"),
			Role::Viewer => write!(f, "viewer"),
		}
	}
}

impl FromStr for Role {
	type Err = IdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"owner" => Ok(Role::Owner),
			"editor" => Ok(Role::Editor),
			"viewer" => Ok(Role::Viewer),
			_ => Err(IdError::UnknownRole(s.to_string())),
		}
	}
}

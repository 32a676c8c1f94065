// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

use crate::abac::{DenyReason, Operation};
use crate::types::{ActorId, ProjectId};

/// Rejected identifiers and enumeration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
	#[error("invalid project id '{0}': expected 1-64 ASCII letters, digits, '-' or '_'")]
	InvalidProjectId(String),

	#[error("unknown environment '{0}': expected development, staging or production")]
	UnknownEnvironment(String),

	#[error("unknown role '{0}': expected owner, editor or viewer")]
	UnknownRole(String),
}

/// A policy denial.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
	#[error("actor {actor} may not {operation} in project {project}: {reason}")]
	Forbidden {
		actor: ActorId,
		project: ProjectId,
		operation: Operation,
		reason: DenyReason,
	},
}

impl PolicyError {
	pub fn reason(&self) -> DenyReason {
		match self {
			PolicyError::Forbidden { reason, .. } => *reason,
		}
	}
}

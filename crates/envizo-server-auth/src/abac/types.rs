// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{ActorId, ProjectId, Role};

/// An authenticated caller and the projects it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
	pub id: ActorId,
	pub memberships: Vec<ProjectMembership>,
}

impl Actor {
	/// Creates an actor with no memberships.
	pub fn new(id: ActorId) -> Self {
		Self {
			id,
			memberships: Vec::new(),
		}
	}

	/// Builder: grant `role` in `project`, replacing any existing membership.
	pub fn with_role(mut self, project: ProjectId, role: Role) -> Self {
		self.memberships.retain(|m| m.project_id != project);
		self.memberships.push(ProjectMembership {
			project_id: project,
			role,
			reveal_insecure: false,
		});
		self
	}

	/// Builder: allow a viewer to read plaintext of insecure values in `project`.
	pub fn with_insecure_reveal(mut self, project: &ProjectId) -> Self {
		if let Some(m) = self.memberships.iter_mut().find(|m| &m.project_id == project) {
			m.reveal_insecure = true;
		}
		self
	}

	pub fn membership(&self, project: &ProjectId) -> Option<&ProjectMembership> {
		self.memberships.iter().find(|m| &m.project_id == project)
	}

	/// Returns the role for the given project, if any.
	pub fn role(&self, project: &ProjectId) -> Option<Role> {
		self.membership(project).map(|m| m.role)
	}
}

/// Membership of one actor in one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMembership {
	pub project_id: ProjectId,
	pub role: Role,
	/// Explicit grant to read plaintext of values classified as insecure.
	#[serde(default)]
	pub reveal_insecure: bool,
}

/// Operations that can be authorized within a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
	ReadProject,
	ListSecrets,
	GetSecret,
	/// Read the plaintext of a value classified as insecure.
	RevealInsecure,
	PutSecret,
	DeleteSecret,
	ImportSecrets,
	ExportSecrets,
	AnalyzeEnvironment,
	/// Version metadata only, no plaintext.
	ReadHistory,
	/// Plaintext of a non-current version.
	GetSecretVersion,
	CreateEnvironment,
	DeleteEnvironment,
	ManageMembers,
	ReadAuditLog,
}

impl Operation {
	pub fn all() -> &'static [Operation] {
		&[
			Operation::ReadProject,
			Operation::ListSecrets,
			Operation::GetSecret,
			Operation::RevealInsecure,
			Operation::PutSecret,
			Operation::DeleteSecret,
			Operation::ImportSecrets,
			Operation::ExportSecrets,
			Operation::AnalyzeEnvironment,
			Operation::ReadHistory,
			Operation::GetSecretVersion,
			Operation::CreateEnvironment,
			Operation::DeleteEnvironment,
			Operation::ManageMembers,
			Operation::ReadAuditLog,
		]
	}
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Operation::ReadProject => "read_project",
			Operation::ListSecrets => "list_secrets",
			Operation::GetSecret => "get_secret",
			Operation::RevealInsecure => "reveal_insecure",
			Operation::PutSecret => "put_secret",
			Operation::DeleteSecret => "delete_secret",
			Operation::ImportSecrets => "import_secrets",
			Operation::ExportSecrets => "export_secrets",
			Operation::AnalyzeEnvironment => "analyze_environment",
			Operation::ReadHistory => "read_history",
			Operation::GetSecretVersion => "get_secret_version",
			Operation::CreateEnvironment => "create_environment",
			Operation::DeleteEnvironment => "delete_environment",
			Operation::ManageMembers => "manage_members",
			Operation::ReadAuditLog => "read_audit_log",
		};
		write!(f, "{s}")
	}
}

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
	/// The actor holds no role in the project.
	NotMember,
	/// The actor's role is below what the operation requires.
	InsufficientRole,
	/// The value is classified insecure and the actor lacks an explicit grant.
	InsecureValue,
}

impl fmt::Display for DenyReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DenyReason::NotMember => write!(f, "not_member"),
			DenyReason::InsufficientRole => write!(f, "insufficient_role"),
			DenyReason::InsecureValue => write!(f, "insecure_value"),
		}
	}
}

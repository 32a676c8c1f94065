// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Policy evaluation.
//!
//! Every operation maps to a minimum project role. Evaluation is two-phase:
//!
//! 1. **Membership**: actors without a role in the project are refused
//! 2. **Role check**: the membership role must reach [`required_role`], with
//!    [`Operation::RevealInsecure`] additionally open to viewers holding an
//!    explicit grant
//!
//! Functions here are pure; recording the decision is the caller's job.

use tracing::{debug, instrument};

use super::types::{Actor, DenyReason, Operation};
use crate::error::PolicyError;
use crate::types::{ProjectId, Role};

/// Minimum role needed for an operation.
pub fn required_role(operation: Operation) -> Role {
	match operation {
		Operation::ReadProject | Operation::ListSecrets | Operation::GetSecret => Role::Viewer,

		Operation::RevealInsecure
		| Operation::PutSecret
		| Operation::DeleteSecret
		| Operation::ImportSecrets
		| Operation::ExportSecrets
		| Operation::AnalyzeEnvironment
		| Operation::ReadHistory => Role::Editor,

		Operation::GetSecretVersion
		| Operation::CreateEnvironment
		| Operation::DeleteEnvironment
		| Operation::ManageMembers
		| Operation::ReadAuditLog => Role::Owner,
	}
}

/// Authorizes `operation` for `actor` in `project`.
#[instrument(
    level = "debug",
    skip(actor, project, operation),
    fields(actor_id = %actor.id, project = %project, operation = %operation)
)]
pub fn authorize(actor: &Actor, project: &ProjectId, operation: Operation) -> Result<(), PolicyError> {
	match evaluate(actor, project, operation) {
		None => {
			debug!("allowed");
			Ok(())
		}
		Some(reason) => {
			debug!(%reason, "denied");
			Err(PolicyError::Forbidden {
				actor: actor.id,
				project: project.clone(),
				operation,
				reason,
			})
		}
	}
}

/// Returns `true` if the action is allowed.
pub fn is_allowed(actor: &Actor, project: &ProjectId, operation: Operation) -> bool {
	evaluate(actor, project, operation).is_none()
}

fn evaluate(actor: &Actor, project: &ProjectId, operation: Operation) -> Option<DenyReason> {
	let Some(membership) = actor.membership(project) else {
		return Some(DenyReason::NotMember);
	};

	if membership.role.at_least(required_role(operation)) {
		return None;
	}

	if operation == Operation::RevealInsecure {
		return if membership.reveal_insecure {
			None
		} else {
			Some(DenyReason::InsecureValue)
		};
	}

	Some(DenyReason::InsufficientRole)
}

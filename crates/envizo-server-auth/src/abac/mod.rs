// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role-based access policy for project-scoped operations.
//!
//! Evaluation is a pure function of pre-loaded actor attributes: the caller
//! resolves an [`Actor`] with its project memberships, then asks the engine
//! whether an [`Operation`] is allowed in a project.

mod engine;
mod types;

pub use engine::{authorize, is_allowed, required_role};
pub use types::{Actor, DenyReason, Operation, ProjectMembership};

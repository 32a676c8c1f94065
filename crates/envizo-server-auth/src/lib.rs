// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identity and access control for Envizo.
//!
//! - [`types`]: id newtypes, the fixed environment enumeration and project roles
//! - [`abac`]: actor attributes, operations and the policy engine

pub mod abac;
pub mod error;
pub mod types;

pub use abac::{authorize, is_allowed, required_role, Actor, DenyReason, Operation, ProjectMembership};
pub use error::{IdError, PolicyError};
pub use types::{ActorId, EnvironmentId, ProjectId, Role};

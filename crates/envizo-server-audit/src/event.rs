// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core event types for audit logging.
//!
//! - [`AuditEventType`]: every auditable store operation
//! - [`AuditOutcome`] and [`ReasonCode`]: what happened and why
//! - [`AuditSeverity`]: RFC 5424-compatible severity levels
//! - [`AuditEntry`]: the immutable record, built with [`AuditEntryBuilder`]

use chrono::{DateTime, Utc};
use envizo_server_auth::{ActorId, DenyReason, EnvironmentId, ProjectId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Types of events that can be recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
	// Project lifecycle
	ProjectCreated,
	ProjectRead,
	EnvironmentCreated,
	EnvironmentDeleted,

	// Membership
	MemberAdded,
	MemberUpdated,
	MemberRemoved,
	MembersListed,

	// Secret reads
	SecretRead,
	SecretVersionRead,
	SecretsListed,
	HistoryRead,

	// Secret writes
	SecretWritten,
	SecretDeleted,

	// Bulk operations
	SecretsExported,
	SecretsImported,
	EnvironmentAnalyzed,

	// Audit access
	AuditLogRead,
}

impl fmt::Display for AuditEventType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			AuditEventType::ProjectCreated => "project_created",
			AuditEventType::ProjectRead => "project_read",
			AuditEventType::EnvironmentCreated => "environment_created",
			AuditEventType::EnvironmentDeleted => "environment_deleted",
			AuditEventType::MemberAdded => "member_added",
			AuditEventType::MemberUpdated => "member_updated",
			AuditEventType::MemberRemoved => "member_removed",
			AuditEventType::MembersListed => "members_listed",
			AuditEventType::SecretRead => "secret_read",
			AuditEventType::SecretVersionRead => "secret_version_read",
			AuditEventType::SecretsListed => "secrets_listed",
			AuditEventType::HistoryRead => "history_read",
			AuditEventType::SecretWritten => "secret_written",
			AuditEventType::SecretDeleted => "secret_deleted",
			AuditEventType::SecretsExported => "secrets_exported",
			AuditEventType::SecretsImported => "secrets_imported",
			AuditEventType::EnvironmentAnalyzed => "environment_analyzed",
			AuditEventType::AuditLogRead => "audit_log_read",
		};
		write!(f, "{s}")
	}
}

impl AuditEventType {
	/// Returns the default severity for this event type.
	///
	/// - `Info`: reads and ordinary writes
	/// - `Notice`: destructive, access-changing or bulk-disclosure actions
	pub fn default_severity(&self) -> AuditSeverity {
		match self {
			AuditEventType::ProjectCreated
			| AuditEventType::ProjectRead
			| AuditEventType::EnvironmentCreated
			| AuditEventType::MembersListed
			| AuditEventType::SecretRead
			| AuditEventType::SecretsListed
			| AuditEventType::HistoryRead
			| AuditEventType::SecretWritten
			| AuditEventType::SecretsImported
			| AuditEventType::EnvironmentAnalyzed
			| AuditEventType::AuditLogRead => AuditSeverity::Info,

			AuditEventType::EnvironmentDeleted
			| AuditEventType::MemberAdded
			| AuditEventType::MemberUpdated
			| AuditEventType::MemberRemoved
			| AuditEventType::SecretDeleted
			| AuditEventType::SecretVersionRead
			| AuditEventType::SecretsExported => AuditSeverity::Notice,
		}
	}
}

/// Result of an audited attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
	/// Authorized and committed.
	Allowed,
	/// Refused by the access policy.
	Denied,
	/// Authorized but could not complete (missing target, conflict, corruption).
	Failed,
}

impl fmt::Display for AuditOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AuditOutcome::Allowed => write!(f, "allowed"),
			AuditOutcome::Denied => write!(f, "denied"),
			AuditOutcome::Failed => write!(f, "failed"),
		}
	}
}

/// Machine-readable cause attached to every non-allowed outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
	NotMember,
	InsufficientRole,
	InsecureValue,
	NotFound,
	Conflict,
	CorruptedSecret,
	InvalidInput,
	Unavailable,
}

impl fmt::Display for ReasonCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			ReasonCode::NotMember => "not_member",
			ReasonCode::InsufficientRole => "insufficient_role",
			ReasonCode::InsecureValue => "insecure_value",
			ReasonCode::NotFound => "not_found",
			ReasonCode::Conflict => "conflict",
			ReasonCode::CorruptedSecret => "corrupted_secret",
			ReasonCode::InvalidInput => "invalid_input",
			ReasonCode::Unavailable => "unavailable",
		};
		write!(f, "{s}")
	}
}

impl From<DenyReason> for ReasonCode {
	fn from(reason: DenyReason) -> Self {
		match reason {
			DenyReason::NotMember => ReasonCode::NotMember,
			DenyReason::InsufficientRole => ReasonCode::InsufficientRole,
			DenyReason::InsecureValue => ReasonCode::InsecureValue,
		}
	}
}

/// Severity levels for audit events, compatible with RFC 5424 syslog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
	Debug = 7,
	#[default]
	Info = 6,
	Notice = 5,
	Warning = 4,
	Error = 3,
	Critical = 2,
}

impl AuditSeverity {
	/// Returns the RFC 5424 numeric severity code.
	pub fn as_syslog_code(&self) -> u8 {
		*self as u8
	}
}

impl PartialOrd for AuditSeverity {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for AuditSeverity {
	fn cmp(&self, other: &Self) -> Ordering {
		// Lower numeric value = higher severity (Critical=2 > Debug=7)
		(*other as u8).cmp(&(*self as u8))
	}
}

impl fmt::Display for AuditSeverity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			AuditSeverity::Debug => "debug",
			AuditSeverity::Info => "info",
			AuditSeverity::Notice => "notice",
			AuditSeverity::Warning => "warning",
			AuditSeverity::Error => "error",
			AuditSeverity::Critical => "critical",
		};
		write!(f, "{s}")
	}
}

impl FromStr for AuditSeverity {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"debug" => Ok(AuditSeverity::Debug),
			"info" => Ok(AuditSeverity::Info),
			"notice" => Ok(AuditSeverity::Notice),
			"warning" | "warn" => Ok(AuditSeverity::Warning),
			"error" => Ok(AuditSeverity::Error),
			"critical" => Ok(AuditSeverity::Critical),
			other => Err(format!("unknown audit severity '{other}'")),
		}
	}
}

/// What an audited operation was aimed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTarget {
	pub project: ProjectId,
	pub environment: Option<EnvironmentId>,
	pub key: Option<String>,
	pub version: Option<u64>,
}

impl AuditTarget {
	pub fn project(project: ProjectId) -> Self {
		Self {
			project,
			environment: None,
			key: None,
			version: None,
		}
	}

	pub fn environment(project: ProjectId, environment: EnvironmentId) -> Self {
		Self {
			environment: Some(environment),
			..Self::project(project)
		}
	}

	pub fn secret(project: ProjectId, environment: EnvironmentId, key: impl Into<String>) -> Self {
		Self {
			key: Some(key.into()),
			..Self::environment(project, environment)
		}
	}

	/// Builder: set the secret version the operation touched.
	pub fn with_version(mut self, version: u64) -> Self {
		self.version = Some(version);
		self
	}
}

impl fmt::Display for AuditTarget {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.project)?;
		if let Some(env) = self.environment {
			write!(f, "/{env}")?;
		}
		if let Some(key) = &self.key {
			write!(f, "/{key}")?;
		}
		if let Some(version) = self.version {
			write!(f, "@{version}")?;
		}
		Ok(())
	}
}

/// An immutable record of one attempted operation.
///
/// Entries never carry secret values, only identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
	/// Position in the owning log, starting at 1. Zero until appended.
	pub sequence: u64,
	/// Unique identifier for this audit entry.
	pub id: Uuid,
	/// When the event occurred.
	pub timestamp: DateTime<Utc>,
	pub event_type: AuditEventType,
	pub severity: AuditSeverity,
	pub actor_id: ActorId,
	pub target: AuditTarget,
	pub outcome: AuditOutcome,
	/// Present whenever `outcome` is not `Allowed`.
	pub reason: Option<ReasonCode>,
	/// Additional event-specific details.
	pub details: serde_json::Value,
}

impl AuditEntry {
	/// Create a new audit entry builder.
	pub fn builder(event_type: AuditEventType, actor_id: ActorId, target: AuditTarget) -> AuditEntryBuilder {
		AuditEntryBuilder::new(event_type, actor_id, target)
	}
}

/// Builder for constructing audit entries with a fluent API.
#[derive(Debug, Clone)]
pub struct AuditEntryBuilder {
	event_type: AuditEventType,
	actor_id: ActorId,
	target: AuditTarget,
	severity: Option<AuditSeverity>,
	outcome: AuditOutcome,
	reason: Option<ReasonCode>,
	details: serde_json::Value,
}

impl AuditEntryBuilder {
	pub fn new(event_type: AuditEventType, actor_id: ActorId, target: AuditTarget) -> Self {
		Self {
			event_type,
			actor_id,
			target,
			severity: None,
			outcome: AuditOutcome::Allowed,
			reason: None,
			details: serde_json::Value::Null,
		}
	}

	/// Set the severity level. Defaults to a value derived from the event type and outcome.
	pub fn severity(mut self, severity: AuditSeverity) -> Self {
		self.severity = Some(severity);
		self
	}

	/// Mark the attempt as refused by policy.
	pub fn denied(mut self, reason: impl Into<ReasonCode>) -> Self {
		self.outcome = AuditOutcome::Denied;
		self.reason = Some(reason.into());
		self
	}

	/// Mark the attempt as authorized but unsuccessful.
	pub fn failed(mut self, reason: ReasonCode) -> Self {
		self.outcome = AuditOutcome::Failed;
		self.reason = Some(reason);
		self
	}

	/// Set additional event-specific details.
	pub fn details(mut self, details: serde_json::Value) -> Self {
		self.details = details;
		self
	}

	pub fn build(self) -> AuditEntry {
		let severity = self.severity.unwrap_or_else(|| {
			let base = self.event_type.default_severity();
			match (self.outcome, self.reason) {
				(AuditOutcome::Allowed, _) => base,
				(_, Some(ReasonCode::CorruptedSecret)) => AuditSeverity::Error,
				_ => base.max(AuditSeverity::Warning),
			}
		});

		AuditEntry {
			sequence: 0,
			id: Uuid::new_v4(),
			timestamp: Utc::now(),
			event_type: self.event_type,
			severity,
			actor_id: self.actor_id,
			target: self.target,
			outcome: self.outcome,
			reason: self.reason,
			details: self.details,
		}
	}
}

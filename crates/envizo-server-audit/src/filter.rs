// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use envizo_server_auth::{ActorId, EnvironmentId, ProjectId};

use crate::event::{AuditEntry, AuditEventType, AuditOutcome, AuditSeverity};

/// Which entries a sink receives.
#[derive(Debug, Clone, Default)]
pub struct AuditFilterConfig {
	pub min_severity: AuditSeverity,
	pub include_events: Option<Vec<AuditEventType>>,
	pub exclude_events: Option<Vec<AuditEventType>>,
}

impl AuditFilterConfig {
	pub fn with_min_severity(min_severity: AuditSeverity) -> Self {
		Self {
			min_severity,
			..Default::default()
		}
	}

	pub fn allows(&self, entry: &AuditEntry) -> bool {
		if entry.severity < self.min_severity {
			return false;
		}
		if let Some(include) = &self.include_events {
			if !include.contains(&entry.event_type) {
				return false;
			}
		}
		if let Some(exclude) = &self.exclude_events {
			if exclude.contains(&entry.event_type) {
				return false;
			}
		}
		true
	}
}

/// Read-side filter for [`AuditLog::query`](crate::AuditLog::query).
///
/// Every field narrows the result; an empty query matches everything.
/// The time range is half-open: `since <= timestamp < until`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditQuery {
	pub project: Option<ProjectId>,
	pub environment: Option<EnvironmentId>,
	pub key: Option<String>,
	pub actor: Option<ActorId>,
	pub outcome: Option<AuditOutcome>,
	pub event_type: Option<AuditEventType>,
	pub since: Option<DateTime<Utc>>,
	pub until: Option<DateTime<Utc>>,
}

impl AuditQuery {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn project(mut self, project: ProjectId) -> Self {
		self.project = Some(project);
		self
	}

	pub fn environment(mut self, environment: EnvironmentId) -> Self {
		self.environment = Some(environment);
		self
	}

	pub fn key(mut self, key: impl Into<String>) -> Self {
		self.key = Some(key.into());
		self
	}

	pub fn actor(mut self, actor: ActorId) -> Self {
		self.actor = Some(actor);
		self
	}

	pub fn outcome(mut self, outcome: AuditOutcome) -> Self {
		self.outcome = Some(outcome);
		self
	}

	pub fn event_type(mut self, event_type: AuditEventType) -> Self {
		self.event_type = Some(event_type);
		self
	}

	pub fn since(mut self, since: DateTime<Utc>) -> Self {
		self.since = Some(since);
		self
	}

	pub fn until(mut self, until: DateTime<Utc>) -> Self {
		self.until = Some(until);
		self
	}

	pub fn matches(&self, entry: &AuditEntry) -> bool {
		if let Some(project) = &self.project {
			if &entry.target.project != project {
				return false;
			}
		}
		if self.environment.is_some() && entry.target.environment != self.environment {
			return false;
		}
		if self.key.is_some() && entry.target.key != self.key {
			return false;
		}
		if let Some(actor) = self.actor {
			if entry.actor_id != actor {
				return false;
			}
		}
		if let Some(outcome) = self.outcome {
			if entry.outcome != outcome {
				return false;
			}
		}
		if let Some(event_type) = self.event_type {
			if entry.event_type != event_type {
				return false;
			}
		}
		if let Some(since) = self.since {
			if entry.timestamp < since {
				return false;
			}
		}
		if let Some(until) = self.until {
			if entry.timestamp >= until {
				return false;
			}
		}
		true
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::event::{AuditTarget, ReasonCode};
	use chrono::Duration;
	use envizo_server_auth::DenyReason;

	fn project(id: &str) -> ProjectId {
		ProjectId::new(id).unwrap()
	}

	fn entry(project_id: &str, actor: ActorId) -> AuditEntry {
		AuditEntry::builder(
			AuditEventType::SecretWritten,
			actor,
			AuditTarget::secret(project(project_id), EnvironmentId::Staging, "API_KEY"),
		)
		.build()
	}

	#[test]
	fn empty_query_matches_everything() {
		assert!(AuditQuery::new().matches(&entry("proj-1", ActorId::generate())));
	}

	#[test]
	fn project_and_actor_narrow() {
		let actor = ActorId::generate();
		let e = entry("proj-1", actor);
		assert!(AuditQuery::new().project(project("proj-1")).actor(actor).matches(&e));
		assert!(!AuditQuery::new().project(project("proj-2")).matches(&e));
		assert!(!AuditQuery::new().actor(ActorId::generate()).matches(&e));
	}

	#[test]
	fn environment_and_key_narrow() {
		let e = entry("proj-1", ActorId::generate());
		assert!(AuditQuery::new().environment(EnvironmentId::Staging).key("API_KEY").matches(&e));
		assert!(!AuditQuery::new().environment(EnvironmentId::Production).matches(&e));
		assert!(!AuditQuery::new().key("OTHER").matches(&e));
	}

	#[test]
	fn outcome_narrows() {
		let denied = AuditEntry::builder(
			AuditEventType::HistoryRead,
			ActorId::generate(),
			AuditTarget::project(project("proj-1")),
		)
		.denied(DenyReason::InsufficientRole)
		.build();
		assert!(AuditQuery::new().outcome(AuditOutcome::Denied).matches(&denied));
		assert!(!AuditQuery::new().outcome(AuditOutcome::Allowed).matches(&denied));
		assert_eq!(denied.reason, Some(ReasonCode::InsufficientRole));
	}

	#[test]
	fn time_range_is_half_open() {
		let e = entry("proj-1", ActorId::generate());
		let at = e.timestamp;
		assert!(AuditQuery::new().since(at).matches(&e));
		assert!(!AuditQuery::new().until(at).matches(&e));
		assert!(AuditQuery::new()
			.since(at - Duration::seconds(1))
			.until(at + Duration::seconds(1))
			.matches(&e));
	}

	#[test]
	fn sink_filter_min_severity() {
		let e = entry("proj-1", ActorId::generate());
		assert!(AuditFilterConfig::default().allows(&e));
		assert!(!AuditFilterConfig::with_min_severity(AuditSeverity::Warning).allows(&e));
	}

	#[test]
	fn sink_filter_include_exclude() {
		let e = entry("proj-1", ActorId::generate());
		let include = AuditFilterConfig {
			include_events: Some(vec![AuditEventType::SecretDeleted]),
			..Default::default()
		};
		assert!(!include.allows(&e));

		let exclude = AuditFilterConfig {
			exclude_events: Some(vec![AuditEventType::SecretWritten]),
			..Default::default()
		};
		assert!(!exclude.allows(&e));
	}
}

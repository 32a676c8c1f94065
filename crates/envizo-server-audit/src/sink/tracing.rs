// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AuditSinkError;
use crate::event::{AuditEntry, AuditSeverity};
use crate::filter::AuditFilterConfig;
use crate::sink::AuditSink;

/// Emits each audit entry as a structured `tracing` event on the `audit` target.
pub struct TracingAuditSink {
	filter: AuditFilterConfig,
}

impl TracingAuditSink {
	pub fn new(filter: AuditFilterConfig) -> Self {
		Self { filter }
	}
}

impl Default for TracingAuditSink {
	fn default() -> Self {
		Self::new(AuditFilterConfig::default())
	}
}

macro_rules! emit {
	($level:ident, $entry:expr) => {
		::tracing::$level!(
			target: "audit",
			sequence = $entry.sequence,
			id = %$entry.id,
			event_type = %$entry.event_type,
			actor_id = %$entry.actor_id,
			resource = %$entry.target,
			outcome = %$entry.outcome,
			reason = ?$entry.reason,
			"audit event"
		)
	};
}

#[async_trait]
impl AuditSink for TracingAuditSink {
	fn name(&self) -> &str {
		"tracing"
	}

	fn filter(&self) -> &AuditFilterConfig {
		&self.filter
	}

	async fn publish(&self, entry: Arc<AuditEntry>) -> Result<(), AuditSinkError> {
		match entry.severity {
			AuditSeverity::Debug => emit!(debug, entry),
			AuditSeverity::Info | AuditSeverity::Notice => emit!(info, entry),
			AuditSeverity::Warning => emit!(warn, entry),
			AuditSeverity::Error | AuditSeverity::Critical => emit!(error, entry),
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::event::{AuditEventType, AuditTarget};
	use envizo_server_auth::{ActorId, ProjectId};

	#[tokio::test]
	async fn publish_never_fails() {
		let sink = TracingAuditSink::default();
		let entry = AuditEntry::builder(
			AuditEventType::ProjectCreated,
			ActorId::generate(),
			AuditTarget::project(ProjectId::new("proj-1").unwrap()),
		)
		.build();
		assert!(sink.publish(Arc::new(entry)).await.is_ok());
		assert!(sink.health_check().await.is_ok());
		assert_eq!(sink.name(), "tracing");
	}
}

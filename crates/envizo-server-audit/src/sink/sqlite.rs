// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::error::AuditSinkError;
use crate::event::AuditEntry;
use crate::filter::AuditFilterConfig;
use crate::sink::AuditSink;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS audit_entries (
	id TEXT PRIMARY KEY NOT NULL,
	sequence INTEGER NOT NULL,
	timestamp TEXT NOT NULL,
	event_type TEXT NOT NULL,
	severity TEXT NOT NULL,
	actor_id TEXT NOT NULL,
	project_id TEXT NOT NULL,
	environment TEXT,
	secret_key TEXT,
	version INTEGER,
	outcome TEXT NOT NULL,
	reason TEXT,
	details TEXT NOT NULL,
	created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_audit_entries_project ON audit_entries (project_id, sequence);
"#;

/// Create the `audit_entries` table if it does not exist.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
	sqlx::raw_sql(SCHEMA).execute(pool).await?;
	Ok(())
}

pub struct SqliteAuditSink {
	pool: SqlitePool,
	filter: AuditFilterConfig,
	name: String,
}

impl SqliteAuditSink {
	pub fn new(pool: SqlitePool, filter: AuditFilterConfig) -> Self {
		Self {
			pool,
			filter,
			name: "sqlite".to_string(),
		}
	}
}

#[async_trait]
impl AuditSink for SqliteAuditSink {
	fn name(&self) -> &str {
		&self.name
	}

	fn filter(&self) -> &AuditFilterConfig {
		&self.filter
	}

	async fn publish(&self, entry: Arc<AuditEntry>) -> Result<(), AuditSinkError> {
		let details_json = serde_json::to_string(&entry.details)
			.map_err(|e| AuditSinkError::Permanent(format!("failed to serialize details: {e}")))?;

		let now = chrono::Utc::now();

		sqlx::query(
			r#"
			INSERT INTO audit_entries (
				id, sequence, timestamp, event_type, severity, actor_id,
				project_id, environment, secret_key, version, outcome, reason,
				details, created_at
			) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(entry.id.to_string())
		.bind(entry.sequence as i64)
		.bind(entry.timestamp.to_rfc3339())
		.bind(entry.event_type.to_string())
		.bind(entry.severity.to_string())
		.bind(entry.actor_id.to_string())
		.bind(entry.target.project.as_str())
		.bind(entry.target.environment.map(|e| e.as_str()))
		.bind(entry.target.key.as_deref())
		.bind(entry.target.version.map(|v| v as i64))
		.bind(entry.outcome.to_string())
		.bind(entry.reason.map(|r| r.to_string()))
		.bind(&details_json)
		.bind(now.to_rfc3339())
		.execute(&self.pool)
		.await
		.map_err(|e| {
			if is_transient_error(&e) {
				AuditSinkError::Transient(format!("database error: {e}"))
			} else {
				AuditSinkError::Permanent(format!("database error: {e}"))
			}
		})?;

		Ok(())
	}

	async fn health_check(&self) -> Result<(), AuditSinkError> {
		sqlx::query("SELECT 1")
			.execute(&self.pool)
			.await
			.map_err(|e| AuditSinkError::Transient(format!("health check failed: {e}")))?;
		Ok(())
	}
}

fn is_transient_error(e: &sqlx::Error) -> bool {
	match e {
		sqlx::Error::Io(_) => true,
		sqlx::Error::PoolTimedOut => true,
		sqlx::Error::PoolClosed => true,
		sqlx::Error::Database(db_err) => {
			let msg = db_err.message().to_lowercase();
			msg.contains("busy") || msg.contains("locked")
		}
		_ => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::event::{AuditEventType, AuditTarget, ReasonCode};
	use envizo_server_auth::{ActorId, EnvironmentId, ProjectId};
	use sqlx::sqlite::SqlitePoolOptions;
	use sqlx::Row;

	async fn memory_pool() -> SqlitePool {
		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.connect("sqlite::memory:")
			.await
			.unwrap();
		ensure_schema(&pool).await.unwrap();
		pool
	}

	#[tokio::test]
	async fn publish_inserts_row() {
		let pool = memory_pool().await;
		let sink = SqliteAuditSink::new(pool.clone(), AuditFilterConfig::default());

		let mut entry = AuditEntry::builder(
			AuditEventType::SecretRead,
			ActorId::generate(),
			AuditTarget::secret(ProjectId::new("proj-1").unwrap(), EnvironmentId::Staging, "API_KEY"),
		)
		.failed(ReasonCode::NotFound)
		.build();
		entry.sequence = 7;

		sink.publish(Arc::new(entry)).await.unwrap();

		let row = sqlx::query("SELECT sequence, environment, secret_key, outcome, reason FROM audit_entries")
			.fetch_one(&pool)
			.await
			.unwrap();
		assert_eq!(row.get::<i64, _>("sequence"), 7);
		assert_eq!(row.get::<String, _>("environment"), "staging");
		assert_eq!(row.get::<String, _>("secret_key"), "API_KEY");
		assert_eq!(row.get::<String, _>("outcome"), "failed");
		assert_eq!(row.get::<String, _>("reason"), "not_found");
	}

	#[tokio::test]
	async fn health_check_succeeds_on_open_pool() {
		let pool = memory_pool().await;
		let sink = SqliteAuditSink::new(pool, AuditFilterConfig::default());
		assert!(sink.health_check().await.is_ok());
	}

	#[tokio::test]
	async fn health_check_fails_on_closed_pool() {
		let pool = memory_pool().await;
		pool.close().await;
		let sink = SqliteAuditSink::new(pool, AuditFilterConfig::default());
		assert!(sink.health_check().await.is_err());
	}
}

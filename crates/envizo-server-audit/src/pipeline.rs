// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::SendError};
use tracing::{instrument, warn};

use crate::error::{AuditError, AuditResult};
use crate::event::{AuditEntry, AuditSeverity};
use crate::filter::AuditFilterConfig;
use crate::sink::AuditSink;
use envizo_server_config::{AuditConfig, QueueOverflowPolicy};

/// Asynchronous fan-out of appended audit entries to external sinks.
///
/// Must be constructed inside a Tokio runtime. Entries can be queued from any
/// thread afterwards.
#[derive(Clone)]
pub struct AuditService {
	tx: mpsc::Sender<Arc<AuditEntry>>,
	overflow_policy: QueueOverflowPolicy,
	sinks: Vec<Arc<dyn AuditSink>>,
	runtime: Handle,
}

impl AuditService {
	pub fn new(
		global_filter: AuditFilterConfig,
		queue_capacity: usize,
		overflow_policy: QueueOverflowPolicy,
		sinks: Vec<Arc<dyn AuditSink>>,
	) -> Self {
		let (tx, rx) = mpsc::channel(queue_capacity.max(1));
		let runtime = Handle::current();

		runtime.spawn(Self::background_task(rx, global_filter, sinks.clone()));

		Self {
			tx,
			overflow_policy,
			sinks,
			runtime,
		}
	}

	/// Build a service from the `[audit]` configuration section.
	pub fn from_config(config: &AuditConfig, sinks: Vec<Arc<dyn AuditSink>>) -> AuditResult<Self> {
		let min_severity: AuditSeverity = config.min_severity.parse().map_err(AuditError::ConfigError)?;
		Ok(Self::new(
			AuditFilterConfig::with_min_severity(min_severity),
			config.queue_capacity,
			config.queue_overflow_policy,
			sinks,
		))
	}

	async fn background_task(
		mut rx: mpsc::Receiver<Arc<AuditEntry>>,
		global_filter: AuditFilterConfig,
		sinks: Vec<Arc<dyn AuditSink>>,
	) {
		while let Some(entry) = rx.recv().await {
			if !global_filter.allows(&entry) {
				continue;
			}

			for sink in &sinks {
				if !sink.filter().allows(&entry) {
					continue;
				}

				let sink = Arc::clone(sink);
				let entry = Arc::clone(&entry);

				tokio::spawn(async move {
					if let Err(e) = sink.publish(entry).await {
						warn!(sink = sink.name(), error = %e, "audit sink publish failed");
					}
				});
			}
		}
	}

	/// Queue an entry for delivery to the sinks.
	///
	/// Returns `true` if the entry was queued, `false` if dropped.
	///
	/// # Overflow Policy Behavior
	///
	/// - `Block`: Spawns a task to send (non-blocking to caller, but the entry will be sent)
	/// - `DropNewest`: Uses try_send, drops new entries when the queue is full
	/// - `DropOldest`: Behaves like DropNewest; the channel cannot evict queued entries.
	#[instrument(skip(self, entry), fields(sequence = entry.sequence, event_type = %entry.event_type))]
	pub fn log(&self, entry: Arc<AuditEntry>) -> bool {
		match self.overflow_policy {
			QueueOverflowPolicy::Block => {
				let tx = self.tx.clone();
				self.runtime.spawn(async move {
					let _ = tx.send(entry).await;
				});
				true
			}
			QueueOverflowPolicy::DropNewest | QueueOverflowPolicy::DropOldest => {
				let queued = self.tx.try_send(entry).is_ok();
				if !queued {
					warn!("audit queue full, entry not forwarded to sinks");
				}
				queued
			}
		}
	}

	pub async fn log_blocking(&self, entry: Arc<AuditEntry>) -> Result<(), SendError<Arc<AuditEntry>>> {
		self.tx.send(entry).await
	}

	/// Check every sink, returning one error per unhealthy sink.
	pub async fn health_check(&self) -> Vec<AuditError> {
		let mut failures = Vec::new();
		for sink in &self.sinks {
			if let Err(source) = sink.health_check().await {
				failures.push(AuditError::SinkError {
					sink: sink.name().to_string(),
					source,
				});
			}
		}
		failures
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::AuditSinkError;
	use crate::event::{AuditEventType, AuditSeverity, AuditTarget};
	use async_trait::async_trait;
	use envizo_server_auth::{ActorId, EnvironmentId, ProjectId};
	use std::sync::atomic::{AtomicUsize, Ordering};
	use tokio::time::{sleep, Duration};

	struct TestSink {
		name: String,
		filter: AuditFilterConfig,
		publish_count: Arc<AtomicUsize>,
	}

	impl TestSink {
		fn new(name: &str) -> Self {
			Self {
				name: name.to_string(),
				filter: AuditFilterConfig::default(),
				publish_count: Arc::new(AtomicUsize::new(0)),
			}
		}

		fn count(&self) -> usize {
			self.publish_count.load(Ordering::SeqCst)
		}
	}

	#[async_trait]
	impl AuditSink for TestSink {
		fn name(&self) -> &str {
			&self.name
		}

		fn filter(&self) -> &AuditFilterConfig {
			&self.filter
		}

		async fn publish(&self, _entry: Arc<AuditEntry>) -> Result<(), AuditSinkError> {
			self.publish_count.fetch_add(1, Ordering::SeqCst);
			Ok(())
		}
	}

	struct FailingSink {
		name: String,
		filter: AuditFilterConfig,
	}

	#[async_trait]
	impl AuditSink for FailingSink {
		fn name(&self) -> &str {
			&self.name
		}

		fn filter(&self) -> &AuditFilterConfig {
			&self.filter
		}

		async fn publish(&self, _entry: Arc<AuditEntry>) -> Result<(), AuditSinkError> {
			Err(AuditSinkError::Transient("test error".to_string()))
		}

		async fn health_check(&self) -> Result<(), AuditSinkError> {
			Err(AuditSinkError::Transient("unreachable".to_string()))
		}
	}

	fn entry(event_type: AuditEventType) -> Arc<AuditEntry> {
		Arc::new(
			AuditEntry::builder(
				event_type,
				ActorId::generate(),
				AuditTarget::secret(
					ProjectId::new("proj-1").unwrap(),
					EnvironmentId::Production,
					"API_KEY",
				),
			)
			.build(),
		)
	}

	#[tokio::test]
	async fn test_log_sends_to_sink() {
		let sink = Arc::new(TestSink::new("test"));

		let service = AuditService::new(
			AuditFilterConfig::default(),
			16,
			QueueOverflowPolicy::DropNewest,
			vec![sink.clone()],
		);

		assert!(service.log(entry(AuditEventType::SecretWritten)));

		sleep(Duration::from_millis(50)).await;
		assert_eq!(sink.count(), 1);
	}

	#[tokio::test]
	async fn test_log_blocking_sends_to_sink() {
		let sink = Arc::new(TestSink::new("test"));

		let service = AuditService::new(
			AuditFilterConfig::default(),
			16,
			QueueOverflowPolicy::Block,
			vec![sink.clone()],
		);

		service.log_blocking(entry(AuditEventType::SecretRead)).await.unwrap();

		sleep(Duration::from_millis(50)).await;
		assert_eq!(sink.count(), 1);
	}

	#[tokio::test]
	async fn test_global_filter_blocks_entries() {
		let sink = Arc::new(TestSink::new("test"));

		let service = AuditService::new(
			AuditFilterConfig::with_min_severity(AuditSeverity::Notice),
			16,
			QueueOverflowPolicy::DropNewest,
			vec![sink.clone()],
		);

		service.log(entry(AuditEventType::SecretRead));
		service.log(entry(AuditEventType::SecretDeleted));

		sleep(Duration::from_millis(50)).await;
		assert_eq!(sink.count(), 1);
	}

	#[tokio::test]
	async fn test_failing_sink_does_not_block_others() {
		let good_sink = Arc::new(TestSink::new("good"));
		let failing_sink = Arc::new(FailingSink {
			name: "failing".to_string(),
			filter: AuditFilterConfig::default(),
		});

		let service = AuditService::new(
			AuditFilterConfig::default(),
			16,
			QueueOverflowPolicy::DropNewest,
			vec![failing_sink, good_sink.clone()],
		);

		service.log(entry(AuditEventType::SecretWritten));

		sleep(Duration::from_millis(50)).await;
		assert_eq!(good_sink.count(), 1);
	}

	#[tokio::test]
	async fn test_health_check_reports_failing_sinks() {
		let service = AuditService::new(
			AuditFilterConfig::default(),
			16,
			QueueOverflowPolicy::DropNewest,
			vec![
				Arc::new(TestSink::new("good")),
				Arc::new(FailingSink {
					name: "failing".to_string(),
					filter: AuditFilterConfig::default(),
				}),
			],
		);

		let failures = service.health_check().await;
		assert_eq!(failures.len(), 1);
		assert!(matches!(&failures[0], AuditError::SinkError { sink, .. } if sink == "failing"));
	}

	#[tokio::test]
	async fn test_from_config_rejects_unknown_severity() {
		let config = AuditConfig {
			min_severity: "loud".to_string(),
			..Default::default()
		};
		assert!(matches!(
			AuditService::from_config(&config, Vec::new()),
			Err(AuditError::ConfigError(_))
		));
		assert!(AuditService::from_config(&AuditConfig::default(), Vec::new()).is_ok());
	}

	#[tokio::test]
	async fn test_audit_log_forwards_to_service() {
		let sink = Arc::new(TestSink::new("test"));
		let service = AuditService::new(
			AuditFilterConfig::default(),
			16,
			QueueOverflowPolicy::DropNewest,
			vec![sink.clone()],
		);
		let log = crate::AuditLog::with_service(service);

		log.append((*entry(AuditEventType::SecretWritten)).clone());
		log.append((*entry(AuditEventType::SecretDeleted)).clone());

		sleep(Duration::from_millis(50)).await;
		assert_eq!(sink.count(), 2);
		assert_eq!(log.len(), 2);
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Append-only, in-memory audit log.
//!
//! The log is the authoritative record: [`AuditLog::append`] stamps a
//! sequence number and timestamp and stores the entry under one write lock,
//! so sequence order, timestamp order and storage order always agree. Entries are never updated or
//! removed. Sinks attached through [`AuditService`] receive copies
//! asynchronously and cannot affect what the log holds.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::trace;

use crate::error::AuditError;
use crate::event::AuditEntry;
use crate::filter::AuditQuery;
use crate::pipeline::AuditService;

const SUBSCRIBER_CAPACITY: usize = 1024;

/// Thread-safe append-only audit log. Cloning yields another handle to the same log.
#[derive(Clone)]
pub struct AuditLog {
	inner: Arc<AuditLogInner>,
}

struct AuditLogInner {
	entries: RwLock<Vec<Arc<AuditEntry>>>,
	sender: broadcast::Sender<Arc<AuditEntry>>,
	forwarder: Option<AuditService>,
}

impl Default for AuditLog {
	fn default() -> Self {
		Self::new()
	}
}

impl AuditLog {
	/// Create an audit log that keeps entries in memory only.
	pub fn new() -> Self {
		Self::build(None)
	}

	/// Create an audit log that also forwards every entry to `service`.
	pub fn with_service(service: AuditService) -> Self {
		Self::build(Some(service))
	}

	fn build(forwarder: Option<AuditService>) -> Self {
		let (sender, _) = broadcast::channel(SUBSCRIBER_CAPACITY);
		Self {
			inner: Arc::new(AuditLogInner {
				entries: RwLock::new(Vec::new()),
				sender,
				forwarder,
			}),
		}
	}

	/// Append an entry, returning it with its sequence number and timestamp assigned.
	///
	/// Timestamps never decrease along the sequence, even if the wall clock does.
	/// Synchronous: the entry is visible to [`query`](Self::query) before this returns.
	pub fn append(&self, mut entry: AuditEntry) -> Arc<AuditEntry> {
		let entry = {
			let mut entries = self.inner.entries.write();
			let now = Utc::now();
			entry.timestamp = match entries.last() {
				Some(last) if last.timestamp > now => last.timestamp,
				_ => now,
			};
			entry.sequence = entries.len() as u64 + 1;
			let entry = Arc::new(entry);
			entries.push(Arc::clone(&entry));
			entry
		};

		trace!(
			sequence = entry.sequence,
			event_type = %entry.event_type,
			outcome = %entry.outcome,
			"audit entry appended"
		);

		// Ignore errors if no subscribers
		let _ = self.inner.sender.send(Arc::clone(&entry));

		if let Some(forwarder) = &self.inner.forwarder {
			forwarder.log(Arc::clone(&entry));
		}

		entry
	}

	/// Lazily iterate entries matching `query`, oldest first.
	///
	/// The cursor covers entries present when it was created; later appends
	/// are not included. No lock is held between calls to `next`.
	pub fn query(&self, query: AuditQuery) -> AuditCursor {
		let end = self.inner.entries.read().len();
		AuditCursor {
			inner: Arc::clone(&self.inner),
			query,
			position: 0,
			end,
		}
	}

	/// Receive every entry appended from now on.
	pub fn subscribe(&self) -> broadcast::Receiver<Arc<AuditEntry>> {
		self.inner.sender.subscribe()
	}

	/// Check every sink behind the forwarding service, one error per unhealthy sink.
	pub async fn health_check(&self) -> Vec<AuditError> {
		match &self.inner.forwarder {
			Some(forwarder) => forwarder.health_check().await,
			None => Vec::new(),
		}
	}

	pub fn len(&self) -> usize {
		self.inner.entries.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// Lazy sequence of audit entries produced by [`AuditLog::query`].
pub struct AuditCursor {
	inner: Arc<AuditLogInner>,
	query: AuditQuery,
	position: usize,
	end: usize,
}

impl Iterator for AuditCursor {
	type Item = Arc<AuditEntry>;

	fn next(&mut self) -> Option<Self::Item> {
		while self.position < self.end {
			let entry = self.inner.entries.read().get(self.position).cloned();
			self.position += 1;
			match entry {
				Some(entry) if self.query.matches(&entry) => return Some(entry),
				Some(_) => continue,
				None => return None,
			}
		}
		None
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		(0, Some(self.end - self.position))
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AuditSinkError;
use crate::event::AuditEntry;
use crate::filter::AuditFilterConfig;

#[cfg(feature = "sink-sqlite")]
pub mod sqlite;

#[cfg(feature = "sink-tracing")]
pub mod tracing;

/// A destination that receives copies of appended audit entries.
///
/// Sinks never feed back into the [`AuditLog`](crate::AuditLog); a failing
/// sink only loses its own copy.
#[async_trait]
pub trait AuditSink: Send + Sync {
	fn name(&self) -> &str;

	fn filter(&self) -> &AuditFilterConfig;

	async fn publish(&self, entry: Arc<AuditEntry>) -> Result<(), AuditSinkError>;

	async fn health_check(&self) -> Result<(), AuditSinkError> {
		Ok(())
	}
}

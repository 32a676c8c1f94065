// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

pub mod error;
pub mod event;
pub mod filter;
pub mod log;
pub mod pipeline;
pub mod sink;

pub use error::{AuditError, AuditResult, AuditSinkError};
pub use event::{
	AuditEntry, AuditEntryBuilder, AuditEventType, AuditOutcome, AuditSeverity, AuditTarget,
	ReasonCode,
};
pub use filter::{AuditFilterConfig, AuditQuery};
pub use log::{AuditCursor, AuditLog};
pub use pipeline::AuditService;
pub use sink::AuditSink;

pub use envizo_server_config::{AuditConfig, QueueOverflowPolicy};

#[cfg(feature = "sink-sqlite")]
pub use sink::sqlite::SqliteAuditSink;

#[cfg(feature = "sink-tracing")]
pub use sink::tracing::TracingAuditSink;

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Envizo server wiring.
//!
//! Turns a resolved [`ServerConfig`] into a running [`SecretStore`] with its
//! audit pipeline, checks that the result works end to end, and hosts the
//! offline tooling behind the binary's subcommands.

pub mod commands;
pub mod version;

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context};
use envizo_server_audit::sink::sqlite::{ensure_schema, SqliteAuditSink};
use envizo_server_audit::{AuditConfig, AuditFilterConfig, AuditLog, AuditService, AuditSink, TracingAuditSink};
use envizo_server_auth::{Actor, ActorId, EnvironmentId, ProjectId, Role};
use envizo_server_config::ServerConfig;
use envizo_server_secrets::{Format, KeyProvider, PutOptions, SecretStore, StaticKeyProvider};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use tracing::{info, warn};

/// A bootstrapped store and the audit log it writes to.
#[derive(Clone)]
pub struct Envizo {
	pub store: SecretStore,
	pub audit: AuditLog,
}

/// Build the store described by `config`.
///
/// Must run inside a Tokio runtime when auditing is enabled.
pub async fn bootstrap(config: &ServerConfig) -> anyhow::Result<Envizo> {
	let key_provider = key_provider(config)?;

	let audit = if config.audit.enabled {
		let sinks = build_sinks(&config.audit).await?;
		info!(sinks = sinks.len(), "audit pipeline enabled");
		AuditLog::with_service(AuditService::from_config(&config.audit, sinks)?)
	} else {
		warn!("audit sinks disabled, entries are kept in memory only");
		AuditLog::new()
	};

	let store = SecretStore::builder(key_provider, audit.clone())
		.config(config.store)
		.build();

	Ok(Envizo { store, audit })
}

/// Outcome of [`self_check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfCheck {
	/// Throwaway project the round trip ran in.
	pub project: ProjectId,
	/// Audit entries the round trip produced.
	pub audit_entries: usize,
}

const SELF_CHECK_KEY: &str = "ENVIZO_SELF_CHECK";

/// Check the audit sinks, then seal, store, reveal and export one value in a
/// throwaway project under the configured key.
#[tracing::instrument(skip_all)]
pub async fn self_check(envizo: &Envizo) -> anyhow::Result<SelfCheck> {
	let failures = envizo.audit.health_check().await;
	if let Some(first) = failures.first() {
		bail!("{} audit sink(s) unhealthy: {first}", failures.len());
	}

	let actor_id = ActorId::generate();
	let project = ProjectId::new(format!("self-check-{actor_id}"))?;
	let owner = Actor::new(actor_id).with_role(project.clone(), Role::Owner);
	let environment = EnvironmentId::Development;
	let value = format!("self-check-{}", ActorId::generate());
	let before = envizo.audit.len();

	let store = &envizo.store;
	store.create_project(&owner, project.clone(), "self check").await?;
	store.create_environment(&project, environment, &owner).await?;
	store
		.put(&project, environment, SELF_CHECK_KEY, value.clone().into(), &owner, PutOptions::new())
		.await?;
	let revealed = store.get(&project, environment, SELF_CHECK_KEY, &owner, None).await?;
	if *revealed.value.expose() != value {
		bail!("self check read back a different value");
	}
	let exported = store.export(&project, environment, Format::Dotenv, &owner).await?;
	if !String::from_utf8_lossy(&exported).contains(SELF_CHECK_KEY) {
		bail!("self check export is missing {SELF_CHECK_KEY}");
	}

	let audit_entries = envizo.audit.len() - before;
	info!(%project, audit_entries, "self check passed");
	Ok(SelfCheck { project, audit_entries })
}

fn key_provider(config: &ServerConfig) -> anyhow::Result<Arc<dyn KeyProvider>> {
	match &config.crypto.master_key {
		Some(key) => {
			let provider = StaticKeyProvider::from_hex(key.expose()).context("invalid master key")?;
			Ok(Arc::new(provider))
		}
		None => {
			warn!("no master key configured, using an ephemeral key; secrets will not survive a restart");
			Ok(Arc::new(StaticKeyProvider::ephemeral()))
		}
	}
}

async fn build_sinks(config: &AuditConfig) -> anyhow::Result<Vec<Arc<dyn AuditSink>>> {
	let mut sinks: Vec<Arc<dyn AuditSink>> = Vec::new();

	if config.tracing_sink {
		sinks.push(Arc::new(TracingAuditSink::new(AuditFilterConfig::default())));
	}

	if let Some(url) = &config.sqlite_url {
		let pool = create_pool(url).await?;
		ensure_schema(&pool)
			.await
			.context("failed to create audit schema")?;
		sinks.push(Arc::new(SqliteAuditSink::new(pool, AuditFilterConfig::default())));
	}

	Ok(sinks)
}

/// SQLite pool with WAL mode, creating the database file if needed.
#[tracing::instrument(skip(database_url))]
pub async fn create_pool(database_url: &str) -> anyhow::Result<SqlitePool> {
	let options = SqliteConnectOptions::from_str(database_url)
		.with_context(|| format!("invalid audit database URL '{database_url}'"))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.create_if_missing(true);

	let pool = SqlitePool::connect_with(options)
		.await
		.context("failed to open audit database")?;

	tracing::debug!("audit database pool created");
	Ok(pool)
}

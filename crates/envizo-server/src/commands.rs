// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Offline subcommands. None of these touch persistent state.

use std::fmt::Write as _;
use std::sync::Arc;

use envizo_server_audit::AuditLog;
use envizo_server_auth::{Actor, ActorId, EnvironmentId, ProjectId, Role};
use envizo_server_config::ServerConfig;
use envizo_server_secrets::{classify, decode, Classification, Format, SecretStore, StaticKeyProvider};

/// Human-readable summary of the resolved configuration. Never prints key material.
pub fn config_summary(config: &ServerConfig) -> String {
	let master_key = if config.crypto.has_master_key() {
		"configured"
	} else {
		"not configured (ephemeral)"
	};
	let sqlite = config.audit.sqlite_url.as_deref().unwrap_or("disabled");

	let mut out = String::new();
	let _ = writeln!(out, "deployment.environment      = {}", config.deployment.environment);
	let _ = writeln!(out, "crypto.master_key           = {master_key}");
	let _ = writeln!(out, "store.write_lock_timeout_ms = {}", config.store.write_lock_timeout_ms);
	let _ = writeln!(out, "audit.enabled               = {}", config.audit.enabled);
	let _ = writeln!(out, "audit.queue_capacity        = {}", config.audit.queue_capacity);
	let _ = writeln!(out, "audit.queue_overflow_policy = {:?}", config.audit.queue_overflow_policy);
	let _ = writeln!(out, "audit.min_severity          = {}", config.audit.min_severity);
	let _ = writeln!(out, "audit.tracing_sink          = {}", config.audit.tracing_sink);
	let _ = writeln!(out, "audit.sqlite_url            = {sqlite}");
	let _ = write!(out, "logging.level               = {}", config.logging.level);
	out
}

/// Re-encode `input` from one format to another through an ephemeral store,
/// so the output is exactly what `import` followed by `export` would give.
pub async fn convert(input: &[u8], from: Format, to: Format) -> anyhow::Result<Vec<u8>> {
	let project = ProjectId::new("local")?;
	let environment = EnvironmentId::Development;
	let actor = Actor::new(ActorId::generate()).with_role(project.clone(), Role::Owner);
	let store = SecretStore::new(Arc::new(StaticKeyProvider::ephemeral()), AuditLog::new());

	store.create_project(&actor, project.clone(), "local").await?;
	store.create_environment(&project, environment, &actor).await?;
	store.import(&project, environment, input, from, &actor).await?;
	Ok(store.export(&project, environment, to, &actor).await?)
}

/// Classify every entry of `input`, ordered by key.
pub fn classify_entries(
	input: &[u8],
	format: Format,
	environment: EnvironmentId,
) -> anyhow::Result<Vec<(String, Classification)>> {
	let snapshot = decode(input, format)?;
	Ok(snapshot
		.iter()
		.map(|(key, value)| (key.clone(), classify(key, value.expose(), environment)))
		.collect())
}

/// One line per key with its status, followed by indented findings.
pub fn render_classifications(entries: &[(String, Classification)]) -> String {
	let width = entries.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
	let mut out = String::new();
	for (key, classification) in entries {
		let _ = writeln!(out, "{key:<width$}  {}", classification.status);
		for finding in &classification.findings {
			let _ = writeln!(out, "{:<width$}    - {}", "", finding.message);
		}
	}
	out
}

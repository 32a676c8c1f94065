// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The secret store.
//!
//! Every public operation follows the same shape:
//!
//! 1. **Authorize** against the policy engine; refusals are audited as `denied`
//! 2. **Validate** inputs and check the project/environment exist
//! 3. **Execute**, auditing the result as `allowed` or `failed`
//!
//! Writes to one `(project, environment, key)` are serialized by a per-key
//! async mutex. The new version and its audit entry are committed with no
//! await point in between, so a cancelled write leaves nothing behind and
//! audit order matches commit order. Imports take every key's lock in key
//! order and commit all entries in one repository batch.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use envizo_common_secret::SecretString;
use envizo_server_audit::{
	AuditEntry, AuditEntryBuilder, AuditEventType, AuditLog, AuditQuery, AuditTarget,
};
use envizo_server_auth::{authorize, Actor, ActorId, EnvironmentId, Operation, ProjectId, Role};
use envizo_server_config::StoreConfig;
use serde_json::json;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, instrument, warn};

use crate::analysis::{AnalysisInput, AnalysisReport, ConfigurationAnalyzer, HeuristicAnalyzer};
use crate::classify::classify;
use crate::codec::{self, Format, Snapshot};
use crate::encryption::{Envelope, EnvelopeContext, KeyProvider};
use crate::error::{SecretsError, SecretsResult};
use crate::repository::{InMemorySecretRepository, SecretRepository};
use crate::types::{
	validate_project_name, validate_shared_role, MemberChange, Project, ProjectMember, PutOptions, RevealedSecret,
	SecretRef, SecretVersion,
};

/// Handle to a secret store. Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct SecretStore {
	inner: Arc<StoreInner>,
}

struct StoreInner {
	repository: Arc<dyn SecretRepository>,
	envelope: Envelope,
	audit: AuditLog,
	analyzer: Arc<dyn ConfigurationAnalyzer>,
	locks: DashMap<SecretRef, Arc<Mutex<()>>>,
	config: StoreConfig,
}

/// Builder for [`SecretStore`]. Defaults to an in-memory repository and
/// the [`HeuristicAnalyzer`].
pub struct SecretStoreBuilder {
	key_provider: Arc<dyn KeyProvider>,
	audit: AuditLog,
	repository: Option<Arc<dyn SecretRepository>>,
	analyzer: Option<Arc<dyn ConfigurationAnalyzer>>,
	config: StoreConfig,
}

impl SecretStoreBuilder {
	pub fn repository(mut self, repository: Arc<dyn SecretRepository>) -> Self {
		self.repository = Some(repository);
		self
	}

	pub fn analyzer(mut self, analyzer: Arc<dyn ConfigurationAnalyzer>) -> Self {
		self.analyzer = Some(analyzer);
		self
	}

	pub fn config(mut self, config: StoreConfig) -> Self {
		self.config = config;
		self
	}

	pub fn build(self) -> SecretStore {
		SecretStore {
			inner: Arc::new(StoreInner {
				repository: self
					.repository
					.unwrap_or_else(|| Arc::new(InMemorySecretRepository::new())),
				envelope: Envelope::new(self.key_provider),
				audit: self.audit,
				analyzer: self
					.analyzer
					.unwrap_or_else(|| Arc::new(HeuristicAnalyzer::new())),
				locks: DashMap::new(),
				config: self.config,
			}),
		}
	}
}

/// Exclusive write access to one secret. Releases the lock table entry on drop.
struct WriteGuard<'a> {
	locks: &'a DashMap<SecretRef, Arc<Mutex<()>>>,
	secret: SecretRef,
	guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for WriteGuard<'_> {
	fn drop(&mut self) {
		self.guard.take();
		release_lock(self.locks, &self.secret);
	}
}

fn release_lock(locks: &DashMap<SecretRef, Arc<Mutex<()>>>, secret: &SecretRef) {
	locks.remove_if(secret, |_, mutex| Arc::strong_count(mutex) == 1);
}

impl SecretStore {
	pub fn builder(key_provider: Arc<dyn KeyProvider>, audit: AuditLog) -> SecretStoreBuilder {
		SecretStoreBuilder {
			key_provider,
			audit,
			repository: None,
			analyzer: None,
			config: StoreConfig::default(),
		}
	}

	/// In-memory store with default settings.
	pub fn new(key_provider: Arc<dyn KeyProvider>, audit: AuditLog) -> Self {
		Self::builder(key_provider, audit).build()
	}

	pub fn audit_log(&self) -> &AuditLog {
		&self.inner.audit
	}

	// Projects and environments

	/// Create a project owned by `actor`. Any authenticated actor may do this.
	#[instrument(skip_all, fields(project = %id, actor_id = %actor.id))]
	pub async fn create_project(&self, actor: &Actor, id: ProjectId, name: &str) -> SecretsResult<Project> {
		let target = AuditTarget::project(id.clone());
		let result = validate_project_name(name).and_then(|name| {
			self.inner
				.repository
				.insert_project(id, name, actor.id, Utc::now())
		});
		match result {
			Ok(project) => {
				self.record(AuditEntry::builder(
					AuditEventType::ProjectCreated,
					actor.id,
					target,
				));
				debug!("project created");
				Ok(project)
			}
			Err(e) => Err(self.fail(AuditEventType::ProjectCreated, actor, target, e)),
		}
	}

	/// Fetch a project with its live environments.
	#[instrument(skip_all, fields(project = %project, actor_id = %actor.id))]
	pub async fn project(&self, project: &ProjectId, actor: &Actor) -> SecretsResult<Project> {
		let target = AuditTarget::project(project.clone());
		let result = self.authorized(actor, project, Operation::ReadProject).and_then(|()| {
			self.inner
				.repository
				.get_project(project)?
				.ok_or_else(|| SecretsError::NotFound(format!("project {project}")))
		});
		self.finish(AuditEventType::ProjectRead, actor, target, result, |_| json!(null))
	}

	/// Create an environment. Re-creating a deleted environment starts a new
	/// generation with no current values; version numbering and history carry over.
	#[instrument(skip_all, fields(project = %project, environment = %environment, actor_id = %actor.id))]
	pub async fn create_environment(
		&self,
		project: &ProjectId,
		environment: EnvironmentId,
		actor: &Actor,
	) -> SecretsResult<()> {
		let target = AuditTarget::environment(project.clone(), environment);
		let result = self
			.authorized(actor, project, Operation::CreateEnvironment)
			.and_then(|()| {
				self.inner
					.repository
					.create_environment(project, environment)
			});
		self.finish(
			AuditEventType::EnvironmentCreated,
			actor,
			target,
			result,
			|generation| json!({ "generation": generation }),
		)
		.map(|_| ())
	}

	/// Tombstone every secret in an environment and retire it. History stays
	/// readable. Returns the number of live secrets tombstoned.
	#[instrument(skip_all, fields(project = %project, environment = %environment, actor_id = %actor.id))]
	pub async fn delete_environment(
		&self,
		project: &ProjectId,
		environment: EnvironmentId,
		actor: &Actor,
	) -> SecretsResult<usize> {
		let target = AuditTarget::environment(project.clone(), environment);
		let result = self
			.authorized(actor, project, Operation::DeleteEnvironment)
			.and_then(|()| {
				self.inner
					.repository
					.delete_environment(project, environment, actor.id)
			});
		self.finish(
			AuditEventType::EnvironmentDeleted,
			actor,
			target,
			result,
			|count| json!({ "tombstoned": count }),
		)
	}

	// Members

	/// Resolve an [`Actor`] carrying every membership recorded for `id`.
	pub fn resolve_actor(&self, id: ActorId) -> SecretsResult<Actor> {
		Ok(Actor {
			id,
			memberships: self.inner.repository.memberships_of(id)?,
		})
	}

	/// Members of a project, owner first.
	#[instrument(skip_all, fields(project = %project, actor_id = %actor.id))]
	pub async fn members(&self, project: &ProjectId, actor: &Actor) -> SecretsResult<Vec<ProjectMember>> {
		let target = AuditTarget::project(project.clone());
		let result = self
			.authorized(actor, project, Operation::ReadProject)
			.and_then(|()| self.inner.repository.members(project));
		self.finish(AuditEventType::MembersListed, actor, target, result, |members| {
			json!({ "count": members.len() })
		})
	}

	/// Share a project with `member` as a viewer or editor.
	#[instrument(skip_all, fields(project = %project, member = %member, role = %role, actor_id = %actor.id))]
	pub async fn add_member(
		&self,
		project: &ProjectId,
		member: ActorId,
		role: Role,
		actor: &Actor,
	) -> SecretsResult<ProjectMember> {
		let target = AuditTarget::project(project.clone());
		let result = self
			.authorized(actor, project, Operation::ManageMembers)
			.and_then(|()| {
				validate_shared_role(role)?;
				let record = ProjectMember {
					actor_id: member,
					role,
					reveal_insecure: false,
					added_at: Utc::now(),
				};
				self.inner.repository.insert_member(project, record.clone())?;
				Ok(record)
			});
		self.finish(AuditEventType::MemberAdded, actor, target, result, |m| {
			json!({ "member": m.actor_id, "role": m.role })
		})
	}

	/// Change a shared member between viewer and editor.
	#[instrument(skip_all, fields(project = %project, member = %member, role = %role, actor_id = %actor.id))]
	pub async fn set_member_role(
		&self,
		project: &ProjectId,
		member: ActorId,
		role: Role,
		actor: &Actor,
	) -> SecretsResult<ProjectMember> {
		let result = self
			.authorized(actor, project, Operation::ManageMembers)
			.and_then(|()| validate_shared_role(role))
			.and_then(|()| {
				self.inner
					.repository
					.update_member(project, member, MemberChange::Role(role))
			});
		self.finish_member_update(project, actor, result)
	}

	/// Grant or revoke a member's right to read plaintext of insecure values.
	#[instrument(skip_all, fields(project = %project, member = %member, granted = granted, actor_id = %actor.id))]
	pub async fn set_insecure_reveal(
		&self,
		project: &ProjectId,
		member: ActorId,
		granted: bool,
		actor: &Actor,
	) -> SecretsResult<ProjectMember> {
		let result = self
			.authorized(actor, project, Operation::ManageMembers)
			.and_then(|()| {
				self.inner
					.repository
					.update_member(project, member, MemberChange::RevealInsecure(granted))
			});
		self.finish_member_update(project, actor, result)
	}

	/// Remove a shared member. The owner cannot be removed.
	#[instrument(skip_all, fields(project = %project, member = %member, actor_id = %actor.id))]
	pub async fn remove_member(&self, project: &ProjectId, member: ActorId, actor: &Actor) -> SecretsResult<()> {
		let target = AuditTarget::project(project.clone());
		let result = self
			.authorized(actor, project, Operation::ManageMembers)
			.and_then(|()| self.inner.repository.remove_member(project, member));
		self.finish(AuditEventType::MemberRemoved, actor, target, result, |m| {
			json!({ "member": m.actor_id, "role": m.role })
		})
		.map(|_| ())
	}

	fn finish_member_update(
		&self,
		project: &ProjectId,
		actor: &Actor,
		result: SecretsResult<ProjectMember>,
	) -> SecretsResult<ProjectMember> {
		let target = AuditTarget::project(project.clone());
		self.finish(AuditEventType::MemberUpdated, actor, target, result, |m| {
			json!({ "member": m.actor_id, "role": m.role, "reveal_insecure": m.reveal_insecure })
		})
	}

	// Secrets

	/// Append a new version of `key`: version 1 for a new key, otherwise
	/// latest + 1. Deleted keys continue their numbering.
	#[instrument(skip_all, fields(project = %project, environment = %environment, key = %key, actor_id = %actor.id))]
	pub async fn put(
		&self,
		project: &ProjectId,
		environment: EnvironmentId,
		key: &str,
		value: SecretString,
		actor: &Actor,
		options: PutOptions,
	) -> SecretsResult<SecretVersion> {
		let target = AuditTarget::secret(project.clone(), environment, key);
		match self
			.put_inner(project, environment, key, value, actor, options, target.clone())
			.await
		{
			Ok(version) => Ok(version),
			Err(e) => Err(self.fail(AuditEventType::SecretWritten, actor, target, e)),
		}
	}

	#[allow(clippy::too_many_arguments)]
	async fn put_inner(
		&self,
		project: &ProjectId,
		environment: EnvironmentId,
		key: &str,
		value: SecretString,
		actor: &Actor,
		options: PutOptions,
		target: AuditTarget,
	) -> SecretsResult<SecretVersion> {
		self.authorized(actor, project, Operation::PutSecret)?;
		let secret = SecretRef::new(project.clone(), environment, key)?;
		self.inner.repository.ensure_environment(project, environment)?;

		let sealed = self.inner.envelope.seal(
			value.expose().as_bytes(),
			&EnvelopeContext::new(project, environment, key),
		)?;

		let _guard = self.lock(&secret).await?;

		let current = self
			.inner
			.repository
			.latest(&secret)?
			.map(|v| v.version)
			.unwrap_or(0);
		if let Some(expected) = options.expected_version {
			if expected != current {
				return Err(SecretsError::Conflict(format!(
					"{secret} is at version {current}, expected {expected}"
				)));
			}
		}

		let version = SecretVersion {
			key: secret.key.clone(),
			version: current + 1,
			ciphertext: sealed.ciphertext,
			nonce: sealed.nonce,
			created_at: Utc::now(),
			author: actor.id,
			comment: options.comment,
			deleted: false,
		};
		self.inner.repository.append(&secret, version.clone())?;
		self.record(
			AuditEntry::builder(
				AuditEventType::SecretWritten,
				actor.id,
				target.with_version(version.version),
			)
			.details(json!({ "comment": version.comment })),
		);
		debug!(version = version.version, "secret written");
		Ok(version)
	}

	/// Decrypt the latest live version of `key`, or a specific historical version.
	/// Historical versions stay readable after their environment is deleted.
	///
	/// Values classified as insecure additionally need
	/// [`Operation::RevealInsecure`].
	#[instrument(skip_all, fields(project = %project, environment = %environment, key = %key, actor_id = %actor.id, version = ?version))]
	pub async fn get(
		&self,
		project: &ProjectId,
		environment: EnvironmentId,
		key: &str,
		actor: &Actor,
		version: Option<u64>,
	) -> SecretsResult<RevealedSecret> {
		let (operation, event_type) = match version {
			Some(_) => (Operation::GetSecretVersion, AuditEventType::SecretVersionRead),
			None => (Operation::GetSecret, AuditEventType::SecretRead),
		};
		let mut target = AuditTarget::secret(project.clone(), environment, key);
		if let Some(v) = version {
			target = target.with_version(v);
		}

		let result = self.get_inner(project, environment, key, actor, version, operation);
		match result {
			Ok(revealed) => {
				self.record(
					AuditEntry::builder(
						event_type,
						actor.id,
						target.with_version(revealed.version.version),
					)
					.details(json!({ "classification": revealed.classification.status })),
				);
				Ok(revealed)
			}
			Err(e) => Err(self.fail(event_type, actor, target, e)),
		}
	}

	fn get_inner(
		&self,
		project: &ProjectId,
		environment: EnvironmentId,
		key: &str,
		actor: &Actor,
		version: Option<u64>,
		operation: Operation,
	) -> SecretsResult<RevealedSecret> {
		self.authorized(actor, project, operation)?;
		let secret = SecretRef::new(project.clone(), environment, key)?;
		if version.is_none() {
			self.inner.repository.ensure_environment(project, environment)?;
		}

		let record = match version {
			Some(v) => self.inner.repository.version(&secret, v)?,
			None => self.inner.repository.latest(&secret)?,
		}
		.filter(|record| !record.is_delete_marker())
		.ok_or_else(|| match version {
			Some(v) => SecretsError::NotFound(format!("{secret} version {v}")),
			None => SecretsError::NotFound(secret.to_string()),
		})?;

		let value = self.reveal(&secret, &record)?;
		let classification = classify(key, value.expose(), environment);
		if classification.is_insecure() {
			self.authorized(actor, project, Operation::RevealInsecure)?;
		}

		Ok(RevealedSecret {
			version: record,
			value,
			classification,
		})
	}

	/// Append a delete marker. `NotFound` if the key has no live version.
	#[instrument(skip_all, fields(project = %project, environment = %environment, key = %key, actor_id = %actor.id))]
	pub async fn delete(
		&self,
		project: &ProjectId,
		environment: EnvironmentId,
		key: &str,
		actor: &Actor,
	) -> SecretsResult<SecretVersion> {
		let target = AuditTarget::secret(project.clone(), environment, key);
		match self
			.delete_inner(project, environment, key, actor, target.clone())
			.await
		{
			Ok(marker) => Ok(marker),
			Err(e) => Err(self.fail(AuditEventType::SecretDeleted, actor, target, e)),
		}
	}

	async fn delete_inner(
		&self,
		project: &ProjectId,
		environment: EnvironmentId,
		key: &str,
		actor: &Actor,
		target: AuditTarget,
	) -> SecretsResult<SecretVersion> {
		self.authorized(actor, project, Operation::DeleteSecret)?;
		let secret = SecretRef::new(project.clone(), environment, key)?;
		self.inner.repository.ensure_environment(project, environment)?;

		let _guard = self.lock(&secret).await?;

		let current = self
			.inner
			.repository
			.latest(&secret)?
			.filter(|v| !v.is_delete_marker())
			.ok_or_else(|| SecretsError::NotFound(secret.to_string()))?;

		let marker = SecretVersion::delete_marker(secret.key.clone(), current.version + 1, actor.id, None);
		self.inner.repository.append(&secret, marker.clone())?;
		self.record(AuditEntry::builder(
			AuditEventType::SecretDeleted,
			actor.id,
			target.with_version(marker.version),
		));
		debug!(version = marker.version, "secret deleted");
		Ok(marker)
	}

	/// Current version metadata of every live key, ordered by key. No plaintext.
	#[instrument(skip_all, fields(project = %project, environment = %environment, actor_id = %actor.id))]
	pub async fn list(
		&self,
		project: &ProjectId,
		environment: EnvironmentId,
		actor: &Actor,
	) -> SecretsResult<Vec<SecretVersion>> {
		let target = AuditTarget::environment(project.clone(), environment);
		let result = self
			.authorized(actor, project, Operation::ListSecrets)
			.and_then(|()| self.inner.repository.list_current(project, environment));
		self.finish(AuditEventType::SecretsListed, actor, target, result, |versions| {
			json!({ "count": versions.len() })
		})
	}

	/// Every version of `key`, oldest first, including delete markers.
	/// Also answers for deleted environments.
	#[instrument(skip_all, fields(project = %project, environment = %environment, key = %key, actor_id = %actor.id))]
	pub async fn history(
		&self,
		project: &ProjectId,
		environment: EnvironmentId,
		key: &str,
		actor: &Actor,
	) -> SecretsResult<Vec<SecretVersion>> {
		let target = AuditTarget::secret(project.clone(), environment, key);
		let result = self
			.authorized(actor, project, Operation::ReadHistory)
			.and_then(|()| {
				let secret = SecretRef::new(project.clone(), environment, key)?;
				let versions = self.inner.repository.history(&secret)?;
				if versions.is_empty() {
					return Err(SecretsError::NotFound(secret.to_string()));
				}
				Ok(versions)
			});
		self.finish(AuditEventType::HistoryRead, actor, target, result, |versions| {
			json!({ "count": versions.len() })
		})
	}

	// Export and import

	/// Serialize the current plaintext of an environment. Keys are sorted.
	/// Fails as a whole if any value cannot be decrypted.
	#[instrument(skip_all, fields(project = %project, environment = %environment, format = %format, actor_id = %actor.id))]
	pub async fn export(
		&self,
		project: &ProjectId,
		environment: EnvironmentId,
		format: Format,
		actor: &Actor,
	) -> SecretsResult<Vec<u8>> {
		let target = AuditTarget::environment(project.clone(), environment);
		let result = self
			.authorized(actor, project, Operation::ExportSecrets)
			.and_then(|()| {
				let snapshot = self.snapshot(project, environment)?;
				let bytes = codec::encode(&snapshot, format)?;
				Ok((snapshot.len(), bytes))
			});
		self.finish(
			AuditEventType::SecretsExported,
			actor,
			target,
			result,
			|(count, _)| json!({ "format": format, "count": count }),
		)
		.map(|(_, bytes)| bytes)
	}

	/// Parse `bytes` and write every entry as a new version, all or nothing.
	/// Nothing is written if parsing, sealing or locking fails.
	#[instrument(skip_all, fields(project = %project, environment = %environment, format = %format, actor_id = %actor.id))]
	pub async fn import(
		&self,
		project: &ProjectId,
		environment: EnvironmentId,
		bytes: &[u8],
		format: Format,
		actor: &Actor,
	) -> SecretsResult<Vec<SecretVersion>> {
		let target = AuditTarget::environment(project.clone(), environment);
		match self.import_inner(project, environment, bytes, format, actor).await {
			Ok(versions) => {
				self.record(
					AuditEntry::builder(AuditEventType::SecretsImported, actor.id, target)
						.details(json!({ "format": format, "count": versions.len() })),
				);
				Ok(versions)
			}
			Err(e) => Err(self.fail(AuditEventType::SecretsImported, actor, target, e)),
		}
	}

	async fn import_inner(
		&self,
		project: &ProjectId,
		environment: EnvironmentId,
		bytes: &[u8],
		format: Format,
		actor: &Actor,
	) -> SecretsResult<Vec<SecretVersion>> {
		self.authorized(actor, project, Operation::ImportSecrets)?;
		self.inner.repository.ensure_environment(project, environment)?;

		let snapshot = codec::decode(bytes, format)?;

		let mut sealed = Vec::with_capacity(snapshot.len());
		for (key, value) in &snapshot {
			let secret = SecretRef::new(project.clone(), environment, key.as_str())?;
			let envelope = self
				.inner
				.envelope
				.seal(value.expose().as_bytes(), &EnvelopeContext::new(project, environment, key))?;
			sealed.push((secret, envelope));
		}

		// Snapshot keys are sorted, so concurrent imports lock in the same order.
		let mut guards = Vec::with_capacity(sealed.len());
		for (secret, _) in &sealed {
			guards.push(self.lock(secret).await?);
		}

		let comment = format!("imported from {format}");
		let created_at = Utc::now();
		let mut versions = Vec::with_capacity(sealed.len());
		for (secret, envelope) in sealed {
			let current = self
				.inner
				.repository
				.latest(&secret)?
				.map(|v| v.version)
				.unwrap_or(0);
			versions.push(SecretVersion {
				key: secret.key,
				version: current + 1,
				ciphertext: envelope.ciphertext,
				nonce: envelope.nonce,
				created_at,
				author: actor.id,
				comment: Some(comment.clone()),
				deleted: false,
			});
		}

		self.inner
			.repository
			.append_batch(project, environment, versions.clone())?;
		for version in &versions {
			self.record(
				AuditEntry::builder(
					AuditEventType::SecretWritten,
					actor.id,
					AuditTarget::secret(project.clone(), environment, version.key.as_str())
						.with_version(version.version),
				)
				.details(json!({ "comment": version.comment })),
			);
		}
		drop(guards);
		debug!(count = versions.len(), "secrets imported");
		Ok(versions)
	}

	// Analysis and audit

	/// Run the configured analyzer over the current plaintext of an environment.
	#[instrument(skip_all, fields(project = %project, environment = %environment, actor_id = %actor.id))]
	pub async fn analyze_environment(
		&self,
		project: &ProjectId,
		environment: EnvironmentId,
		actor: &Actor,
	) -> SecretsResult<AnalysisReport> {
		let target = AuditTarget::environment(project.clone(), environment);
		let result = self.analyze_inner(project, environment, actor).await;
		self.finish(
			AuditEventType::EnvironmentAnalyzed,
			actor,
			target,
			result,
			|report| json!({ "alerts": report.alerts.len() }),
		)
	}

	async fn analyze_inner(
		&self,
		project: &ProjectId,
		environment: EnvironmentId,
		actor: &Actor,
	) -> SecretsResult<AnalysisReport> {
		self.authorized(actor, project, Operation::AnalyzeEnvironment)?;
		let project_name = self
			.inner
			.repository
			.get_project(project)?
			.map(|p| p.name)
			.ok_or_else(|| SecretsError::NotFound(format!("project {project}")))?;
		let variables: BTreeMap<String, SecretString> = self.snapshot(project, environment)?;

		self.inner
			.analyzer
			.analyze(AnalysisInput {
				project_name,
				environment_name: environment.as_str().to_string(),
				variables,
			})
			.await
			.map_err(|e| SecretsError::Unavailable(e.to_string()))
	}

	/// Audit entries for `project` matching `query`, in append order.
	#[instrument(skip_all, fields(project = %project, actor_id = %actor.id))]
	pub async fn audit_trail(
		&self,
		project: &ProjectId,
		actor: &Actor,
		query: AuditQuery,
	) -> SecretsResult<Vec<Arc<AuditEntry>>> {
		let target = AuditTarget::project(project.clone());
		let result = self
			.authorized(actor, project, Operation::ReadAuditLog)
			.map(|()| {
				self.inner
					.audit
					.query(AuditQuery {
						project: Some(project.clone()),
						..query
					})
					.collect::<Vec<_>>()
			});
		self.finish(AuditEventType::AuditLogRead, actor, target, result, |entries| {
			json!({ "count": entries.len() })
		})
	}

	// Helpers

	fn authorized(&self, actor: &Actor, project: &ProjectId, operation: Operation) -> SecretsResult<()> {
		authorize(actor, project, operation).map_err(SecretsError::from)
	}

	async fn lock(&self, secret: &SecretRef) -> SecretsResult<WriteGuard<'_>> {
		let mutex = self
			.inner
			.locks
			.entry(secret.clone())
			.or_insert_with(|| Arc::new(Mutex::new(())))
			.clone();

		let acquired = tokio::time::timeout(self.inner.config.write_lock_timeout(), mutex.lock_owned()).await;
		match acquired {
			Ok(guard) => Ok(WriteGuard {
				locks: &self.inner.locks,
				secret: secret.clone(),
				guard: Some(guard),
			}),
			Err(_) => {
				release_lock(&self.inner.locks, secret);
				warn!(secret = %secret, "timed out waiting for write lock");
				Err(SecretsError::Unavailable(format!(
					"timed out waiting for write lock on {secret}"
				)))
			}
		}
	}

	fn reveal(&self, secret: &SecretRef, record: &SecretVersion) -> SecretsResult<SecretString> {
		let corrupted = || SecretsError::CorruptedSecret {
			target: secret.to_string(),
			version: record.version,
		};
		let plaintext = self
			.inner
			.envelope
			.open(
				&record.ciphertext,
				&record.nonce,
				&EnvelopeContext::new(&secret.project, secret.environment, &secret.key),
			)
			.map_err(|e| match SecretsError::from(e) {
				SecretsError::Unavailable(msg) => SecretsError::Unavailable(msg),
				_ => corrupted(),
			})?;
		let text = std::str::from_utf8(&plaintext).map_err(|_| corrupted())?;
		Ok(SecretString::new(text.to_owned()))
	}

	/// Decrypted current values of an environment.
	fn snapshot(&self, project: &ProjectId, environment: EnvironmentId) -> SecretsResult<Snapshot> {
		let mut snapshot = Snapshot::new();
		for record in self.inner.repository.list_current(project, environment)? {
			let secret = SecretRef {
				project: project.clone(),
				environment,
				key: record.key.clone(),
			};
			let value = self.reveal(&secret, &record)?;
			snapshot.insert(record.key, value);
		}
		Ok(snapshot)
	}

	fn record(&self, builder: AuditEntryBuilder) -> Arc<AuditEntry> {
		self.inner.audit.append(builder.build())
	}

	/// Audit a successful result with `details`, or a failed/denied one.
	fn finish<T>(
		&self,
		event_type: AuditEventType,
		actor: &Actor,
		target: AuditTarget,
		result: SecretsResult<T>,
		details: impl FnOnce(&T) -> serde_json::Value,
	) -> SecretsResult<T> {
		match result {
			Ok(value) => {
				self.record(AuditEntry::builder(event_type, actor.id, target).details(details(&value)));
				Ok(value)
			}
			Err(e) => Err(self.fail(event_type, actor, target, e)),
		}
	}

	/// Record an unsuccessful attempt and hand the error back.
	fn fail(&self, event_type: AuditEventType, actor: &Actor, target: AuditTarget, error: SecretsError) -> SecretsError {
		let role = actor.role(&target.project);
		let builder = AuditEntry::builder(event_type, actor.id, target);
		let builder = match &error {
			SecretsError::Forbidden(e) => {
				warn!(event = %event_type, reason = %e.reason(), role = ?role, "access denied");
				builder.denied(e.reason())
			}
			other => {
				debug!(event = %event_type, error = %other, "operation failed");
				builder.failed(other.reason_code())
			}
		};
		self.record(builder);
		error
	}
}

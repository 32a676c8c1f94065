// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persistence for projects, members, environments and secret versions.
//!
//! The repository stores ciphertext only and enforces the version-chain
//! invariant: every append is exactly the latest version plus one. A key
//! keeps a single chain for the life of its project, so deleting and
//! re-creating an environment continues numbering and keeps history.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use envizo_server_auth::{ActorId, EnvironmentId, ProjectId, ProjectMembership, Role};
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{SecretsError, SecretsResult};
use crate::types::{MemberChange, Project, ProjectMember, SecretRef, SecretVersion};

/// Storage backend for the secret store.
///
/// Methods are synchronous so that a version and its audit entry can be
/// committed without an await point in between.
pub trait SecretRepository: Send + Sync {
	/// Insert a new project with `created_by` as its owner. `Conflict` if the id is taken.
	fn insert_project(
		&self,
		id: ProjectId,
		name: String,
		created_by: ActorId,
		created_at: DateTime<Utc>,
	) -> SecretsResult<Project>;

	fn get_project(&self, id: &ProjectId) -> SecretsResult<Option<Project>>;

	/// Members of a project, owner first, then in the order they were added.
	fn members(&self, project: &ProjectId) -> SecretsResult<Vec<ProjectMember>>;

	/// Add a member. `Conflict` if the actor already belongs to the project.
	fn insert_member(&self, project: &ProjectId, member: ProjectMember) -> SecretsResult<()>;

	/// Apply `change` to an existing member. `NotFound` if absent, `Conflict` for the owner.
	fn update_member(
		&self,
		project: &ProjectId,
		actor: ActorId,
		change: MemberChange,
	) -> SecretsResult<ProjectMember>;

	/// Remove a member. `NotFound` if absent, `Conflict` for the owner.
	fn remove_member(&self, project: &ProjectId, actor: ActorId) -> SecretsResult<ProjectMember>;

	/// Every project membership held by `actor`, ordered by project id.
	fn memberships_of(&self, actor: ActorId) -> SecretsResult<Vec<ProjectMembership>>;

	/// Create an environment. `Conflict` if it is live; a deleted one starts a new generation.
	fn create_environment(&self, project: &ProjectId, environment: EnvironmentId) -> SecretsResult<u64>;

	/// Tombstone every live secret and retire the environment.
	/// Returns the number of live secrets tombstoned.
	fn delete_environment(
		&self,
		project: &ProjectId,
		environment: EnvironmentId,
		author: ActorId,
	) -> SecretsResult<usize>;

	/// `NotFound` unless the project and a live environment both exist.
	fn ensure_environment(&self, project: &ProjectId, environment: EnvironmentId) -> SecretsResult<()>;

	/// Latest version in a live environment.
	fn latest(&self, secret: &SecretRef) -> SecretsResult<Option<SecretVersion>>;

	/// A specific version. Also answers for deleted environments.
	fn version(&self, secret: &SecretRef, version: u64) -> SecretsResult<Option<SecretVersion>>;

	/// All versions of a secret, oldest first. Also answers for deleted
	/// environments. Empty if the key never existed.
	fn history(&self, secret: &SecretRef) -> SecretsResult<Vec<SecretVersion>>;

	/// Latest version of every key whose latest version is not a delete marker, ordered by key.
	fn list_current(&self, project: &ProjectId, environment: EnvironmentId) -> SecretsResult<Vec<SecretVersion>>;

	/// Append a version. `Conflict` unless `version.version == latest + 1`.
	fn append(&self, secret: &SecretRef, version: SecretVersion) -> SecretsResult<()>;

	/// Append one version for each of several keys, or none of them.
	///
	/// `Conflict` if any version is not its key's latest plus one;
	/// `InvalidInput` if a key appears twice.
	fn append_batch(
		&self,
		project: &ProjectId,
		environment: EnvironmentId,
		versions: Vec<SecretVersion>,
	) -> SecretsResult<()>;
}

type VersionChains = BTreeMap<String, Vec<SecretVersion>>;

#[derive(Default)]
struct EnvironmentState {
	live: bool,
	generation: u64,
	/// Chains survive deletion; only `live` and `generation` change.
	secrets: VersionChains,
}

impl EnvironmentState {
	fn next_version(&self, key: &str) -> u64 {
		self.secrets
			.get(key)
			.and_then(|chain| chain.last())
			.map(|v| v.version)
			.unwrap_or(0)
			+ 1
	}
}

struct ProjectState {
	name: String,
	created_by: ActorId,
	created_at: DateTime<Utc>,
	members: Vec<ProjectMember>,
	environments: BTreeMap<EnvironmentId, EnvironmentState>,
}

impl ProjectState {
	fn to_project(&self, id: &ProjectId) -> Project {
		Project {
			id: id.clone(),
			name: self.name.clone(),
			created_by: self.created_by,
			created_at: self.created_at,
			environments: self
				.environments
				.iter()
				.filter(|(_, state)| state.live)
				.map(|(env, _)| *env)
				.collect(),
		}
	}

	fn shared_member_mut(&mut self, project: &ProjectId, actor: ActorId) -> SecretsResult<&mut ProjectMember> {
		let member = self
			.members
			.iter_mut()
			.find(|m| m.actor_id == actor)
			.ok_or_else(|| member_not_found(project, actor))?;
		if member.role == Role::Owner {
			return Err(SecretsError::Conflict(format!(
				"the owner of {project} cannot be changed or removed"
			)));
		}
		Ok(member)
	}
}

/// In-memory repository. Cheap reads, one writer at a time.
#[derive(Default)]
pub struct InMemorySecretRepository {
	projects: RwLock<HashMap<ProjectId, ProjectState>>,
}

impl InMemorySecretRepository {
	pub fn new() -> Self {
		Self::default()
	}
}

fn project_not_found(project: &ProjectId) -> SecretsError {
	SecretsError::NotFound(format!("project {project}"))
}

fn environment_not_found(project: &ProjectId, environment: EnvironmentId) -> SecretsError {
	SecretsError::NotFound(format!("environment {project}/{environment}"))
}

fn member_not_found(project: &ProjectId, actor: ActorId) -> SecretsError {
	SecretsError::NotFound(format!("member {actor} of {project}"))
}

fn project_state<'a>(
	projects: &'a HashMap<ProjectId, ProjectState>,
	project: &ProjectId,
) -> SecretsResult<&'a ProjectState> {
	projects.get(project).ok_or_else(|| project_not_found(project))
}

fn project_state_mut<'a>(
	projects: &'a mut HashMap<ProjectId, ProjectState>,
	project: &ProjectId,
) -> SecretsResult<&'a mut ProjectState> {
	projects
		.get_mut(project)
		.ok_or_else(|| project_not_found(project))
}

/// An environment that was created at some point, live or deleted.
fn known_environment<'a>(
	projects: &'a HashMap<ProjectId, ProjectState>,
	project: &ProjectId,
	environment: EnvironmentId,
) -> SecretsResult<&'a EnvironmentState> {
	project_state(projects, project)?
		.environments
		.get(&environment)
		.ok_or_else(|| environment_not_found(project, environment))
}

fn live_environment<'a>(
	projects: &'a HashMap<ProjectId, ProjectState>,
	project: &ProjectId,
	environment: EnvironmentId,
) -> SecretsResult<&'a EnvironmentState> {
	let env = known_environment(projects, project, environment)?;
	if env.live {
		Ok(env)
	} else {
		Err(environment_not_found(project, environment))
	}
}

fn live_environment_mut<'a>(
	projects: &'a mut HashMap<ProjectId, ProjectState>,
	project: &ProjectId,
	environment: EnvironmentId,
) -> SecretsResult<&'a mut EnvironmentState> {
	project_state_mut(projects, project)?
		.environments
		.get_mut(&environment)
		.filter(|env| env.live)
		.ok_or_else(|| environment_not_found(project, environment))
}

impl SecretRepository for InMemorySecretRepository {
	fn insert_project(
		&self,
		id: ProjectId,
		name: String,
		created_by: ActorId,
		created_at: DateTime<Utc>,
	) -> SecretsResult<Project> {
		let mut projects = self.projects.write();
		if projects.contains_key(&id) {
			return Err(SecretsError::Conflict(format!("project {id} already exists")));
		}
		let state = ProjectState {
			name,
			created_by,
			created_at,
			members: vec![ProjectMember {
				actor_id: created_by,
				role: Role::Owner,
				reveal_insecure: false,
				added_at: created_at,
			}],
			environments: BTreeMap::new(),
		};
		let project = state.to_project(&id);
		projects.insert(id, state);
		Ok(project)
	}

	fn get_project(&self, id: &ProjectId) -> SecretsResult<Option<Project>> {
		Ok(self.projects.read().get(id).map(|state| state.to_project(id)))
	}

	fn members(&self, project: &ProjectId) -> SecretsResult<Vec<ProjectMember>> {
		let projects = self.projects.read();
		Ok(project_state(&projects, project)?.members.clone())
	}

	fn insert_member(&self, project: &ProjectId, member: ProjectMember) -> SecretsResult<()> {
		let mut projects = self.projects.write();
		let state = project_state_mut(&mut projects, project)?;
		if state.members.iter().any(|m| m.actor_id == member.actor_id) {
			return Err(SecretsError::Conflict(format!(
				"{} is already a member of {project}",
				member.actor_id
			)));
		}
		state.members.push(member);
		Ok(())
	}

	fn update_member(
		&self,
		project: &ProjectId,
		actor: ActorId,
		change: MemberChange,
	) -> SecretsResult<ProjectMember> {
		let mut projects = self.projects.write();
		let member = project_state_mut(&mut projects, project)?.shared_member_mut(project, actor)?;
		match change {
			MemberChange::Role(role) => member.role = role,
			MemberChange::RevealInsecure(granted) => member.reveal_insecure = granted,
		}
		Ok(member.clone())
	}

	fn remove_member(&self, project: &ProjectId, actor: ActorId) -> SecretsResult<ProjectMember> {
		let mut projects = self.projects.write();
		let state = project_state_mut(&mut projects, project)?;
		state.shared_member_mut(project, actor)?;
		let idx = state
			.members
			.iter()
			.position(|m| m.actor_id == actor)
			.ok_or_else(|| member_not_found(project, actor))?;
		Ok(state.members.remove(idx))
	}

	fn memberships_of(&self, actor: ActorId) -> SecretsResult<Vec<ProjectMembership>> {
		let projects = self.projects.read();
		let mut memberships: Vec<ProjectMembership> = projects
			.iter()
			.filter_map(|(id, state)| {
				state
					.members
					.iter()
					.find(|m| m.actor_id == actor)
					.map(|m| ProjectMembership {
						project_id: id.clone(),
						role: m.role,
						reveal_insecure: m.reveal_insecure,
					})
			})
			.collect();
		memberships.sort_by(|a, b| a.project_id.cmp(&b.project_id));
		Ok(memberships)
	}

	fn create_environment(&self, project: &ProjectId, environment: EnvironmentId) -> SecretsResult<u64> {
		let mut projects = self.projects.write();
		let state = project_state_mut(&mut projects, project)?;
		let env = state.environments.entry(environment).or_default();
		if env.live {
			return Err(SecretsError::Conflict(format!(
				"environment {project}/{environment} already exists"
			)));
		}
		env.generation += 1;
		env.live = true;
		debug!(%project, %environment, generation = env.generation, "environment created");
		Ok(env.generation)
	}

	fn delete_environment(
		&self,
		project: &ProjectId,
		environment: EnvironmentId,
		author: ActorId,
	) -> SecretsResult<usize> {
		let mut projects = self.projects.write();
		let env = live_environment_mut(&mut projects, project, environment)?;

		let mut tombstoned = 0;
		for (key, chain) in env.secrets.iter_mut() {
			let Some(latest) = chain.last() else {
				continue;
			};
			if latest.deleted {
				continue;
			}
			let next = latest.version + 1;
			chain.push(SecretVersion::delete_marker(
				key.clone(),
				next,
				author,
				Some("environment deleted".to_string()),
			));
			tombstoned += 1;
		}

		env.live = false;
		debug!(%project, %environment, generation = env.generation, tombstoned, "environment deleted");
		Ok(tombstoned)
	}

	fn ensure_environment(&self, project: &ProjectId, environment: EnvironmentId) -> SecretsResult<()> {
		let projects = self.projects.read();
		live_environment(&projects, project, environment).map(|_| ())
	}

	fn latest(&self, secret: &SecretRef) -> SecretsResult<Option<SecretVersion>> {
		let projects = self.projects.read();
		let env = live_environment(&projects, &secret.project, secret.environment)?;
		Ok(env.secrets.get(&secret.key).and_then(|chain| chain.last().cloned()))
	}

	fn version(&self, secret: &SecretRef, version: u64) -> SecretsResult<Option<SecretVersion>> {
		let projects = self.projects.read();
		let env = known_environment(&projects, &secret.project, secret.environment)?;
		// Versions start at 1 and have no gaps, so the index is version - 1.
		Ok(env.secrets.get(&secret.key).and_then(|chain| {
			version
				.checked_sub(1)
				.and_then(|idx| chain.get(idx as usize))
				.cloned()
		}))
	}

	fn history(&self, secret: &SecretRef) -> SecretsResult<Vec<SecretVersion>> {
		let projects = self.projects.read();
		let env = known_environment(&projects, &secret.project, secret.environment)?;
		Ok(env.secrets.get(&secret.key).cloned().unwrap_or_default())
	}

	fn list_current(&self, project: &ProjectId, environment: EnvironmentId) -> SecretsResult<Vec<SecretVersion>> {
		let projects = self.projects.read();
		let env = live_environment(&projects, project, environment)?;
		Ok(env
			.secrets
			.values()
			.filter_map(|chain| chain.last())
			.filter(|latest| !latest.deleted)
			.cloned()
			.collect())
	}

	fn append(&self, secret: &SecretRef, version: SecretVersion) -> SecretsResult<()> {
		let mut projects = self.projects.write();
		let env = live_environment_mut(&mut projects, &secret.project, secret.environment)?;
		let expected = env.next_version(&secret.key);
		if version.version != expected {
			return Err(SecretsError::Conflict(format!(
				"{secret}: expected version {expected}, got {}",
				version.version
			)));
		}
		env.secrets.entry(secret.key.clone()).or_default().push(version);
		Ok(())
	}

	fn append_batch(
		&self,
		project: &ProjectId,
		environment: EnvironmentId,
		versions: Vec<SecretVersion>,
	) -> SecretsResult<()> {
		let mut projects = self.projects.write();
		let env = live_environment_mut(&mut projects, project, environment)?;

		let mut seen = BTreeSet::new();
		for version in &versions {
			if !seen.insert(version.key.as_str()) {
				return Err(SecretsError::InvalidInput(format!(
					"{project}/{environment}/{} appears twice in one batch",
					version.key
				)));
			}
			let expected = env.next_version(&version.key);
			if version.version != expected {
				return Err(SecretsError::Conflict(format!(
					"{project}/{environment}/{}: expected version {expected}, got {}",
					version.key, version.version
				)));
			}
		}

		for version in versions {
			env.secrets.entry(version.key.clone()).or_default().push(version);
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::encryption::NONCE_SIZE;
	use proptest::prelude::*;

	fn project() -> ProjectId {
		ProjectId::new("proj-1").unwrap()
	}

	fn secret(key: &str) -> SecretRef {
		SecretRef::new(project(), EnvironmentId::Development, key).unwrap()
	}

	fn version(key: &str, n: u64) -> SecretVersion {
		SecretVersion {
			key: key.to_string(),
			version: n,
			ciphertext: vec![n as u8],
			nonce: [0u8; NONCE_SIZE],
			created_at: Utc::now(),
			author: ActorId::generate(),
			comment: None,
			deleted: false,
		}
	}

	fn repo_with_env() -> InMemorySecretRepository {
		let repo = InMemorySecretRepository::new();
		repo.insert_project(project(), "Project".to_string(), ActorId::generate(), Utc::now())
			.unwrap();
		repo.create_environment(&project(), EnvironmentId::Development)
			.unwrap();
		repo
	}

	fn shared(actor: ActorId, role: Role) -> ProjectMember {
		ProjectMember {
			actor_id: actor,
			role,
			reveal_insecure: false,
			added_at: Utc::now(),
		}
	}

	#[test]
	fn duplicate_project_conflicts() {
		let repo = repo_with_env();
		let err = repo
			.insert_project(project(), "Again".to_string(), ActorId::generate(), Utc::now())
			.unwrap_err();
		assert!(matches!(err, SecretsError::Conflict(_)));
	}

	#[test]
	fn project_lists_live_environments_in_order() {
		let repo = repo_with_env();
		repo.create_environment(&project(), EnvironmentId::Production)
			.unwrap();
		repo.create_environment(&project(), EnvironmentId::Staging)
			.unwrap();
		let p = repo.get_project(&project()).unwrap().unwrap();
		assert_eq!(
			p.environments,
			vec![
				EnvironmentId::Development,
				EnvironmentId::Staging,
				EnvironmentId::Production
			]
		);
	}

	#[test]
	fn duplicate_environment_conflicts() {
		let repo = repo_with_env();
		assert!(matches!(
			repo.create_environment(&project(), EnvironmentId::Development),
			Err(SecretsError::Conflict(_))
		));
	}

	#[test]
	fn missing_environment_is_not_found() {
		let repo = repo_with_env();
		let r = SecretRef::new(project(), EnvironmentId::Production, "K").unwrap();
		assert!(matches!(repo.latest(&r), Err(SecretsError::NotFound(_))));
		assert!(matches!(repo.history(&r), Err(SecretsError::NotFound(_))));
	}

	#[test]
	fn append_requires_consecutive_versions() {
		let repo = repo_with_env();
		repo.append(&secret("K"), version("K", 1)).unwrap();
		assert!(matches!(
			repo.append(&secret("K"), version("K", 3)),
			Err(SecretsError::Conflict(_))
		));
		assert!(matches!(
			repo.append(&secret("K"), version("K", 1)),
			Err(SecretsError::Conflict(_))
		));
		repo.append(&secret("K"), version("K", 2)).unwrap();
		assert_eq!(repo.latest(&secret("K")).unwrap().unwrap().version, 2);
	}

	#[test]
	fn version_lookup() {
		let repo = repo_with_env();
		repo.append(&secret("K"), version("K", 1)).unwrap();
		repo.append(&secret("K"), version("K", 2)).unwrap();
		assert_eq!(repo.version(&secret("K"), 1).unwrap().unwrap().version, 1);
		assert!(repo.version(&secret("K"), 0).unwrap().is_none());
		assert!(repo.version(&secret("K"), 3).unwrap().is_none());
	}

	#[test]
	fn list_current_excludes_deleted_and_sorts() {
		let repo = repo_with_env();
		repo.append(&secret("b"), version("b", 1)).unwrap();
		repo.append(&secret("B"), version("B", 1)).unwrap();
		repo.append(&secret("a"), version("a", 1)).unwrap();
		repo.append(
			&secret("a"),
			SecretVersion::delete_marker("a".to_string(), 2, ActorId::generate(), None),
		)
		.unwrap();

		let keys: Vec<_> = repo
			.list_current(&project(), EnvironmentId::Development)
			.unwrap()
			.into_iter()
			.map(|v| v.key)
			.collect();
		assert_eq!(keys, vec!["B", "b"]);
	}

	#[test]
	fn deleted_environment_keeps_history_and_numbering() {
		let repo = repo_with_env();
		repo.append(&secret("A"), version("A", 1)).unwrap();
		repo.append(&secret("B"), version("B", 1)).unwrap();
		repo.append(
			&secret("B"),
			SecretVersion::delete_marker("B".to_string(), 2, ActorId::generate(), None),
		)
		.unwrap();

		let tombstoned = repo
			.delete_environment(&project(), EnvironmentId::Development, ActorId::generate())
			.unwrap();
		assert_eq!(tombstoned, 1);
		assert!(matches!(repo.latest(&secret("A")), Err(SecretsError::NotFound(_))));
		assert!(matches!(
			repo.append(&secret("A"), version("A", 3)),
			Err(SecretsError::NotFound(_))
		));
		assert!(repo.get_project(&project()).unwrap().unwrap().environments.is_empty());

		let history = repo.history(&secret("A")).unwrap();
		assert_eq!(history.len(), 2);
		assert!(history[1].deleted);
		assert_eq!(repo.version(&secret("A"), 1).unwrap().unwrap().ciphertext, vec![1]);

		let generation = repo
			.create_environment(&project(), EnvironmentId::Development)
			.unwrap();
		assert_eq!(generation, 2);
		assert!(repo
			.list_current(&project(), EnvironmentId::Development)
			.unwrap()
			.is_empty());
		assert!(repo.latest(&secret("A")).unwrap().unwrap().deleted);

		assert!(matches!(
			repo.append(&secret("A"), version("A", 1)),
			Err(SecretsError::Conflict(_))
		));
		repo.append(&secret("A"), version("A", 3)).unwrap();
		let versions: Vec<u64> = repo
			.history(&secret("A"))
			.unwrap()
			.iter()
			.map(|v| v.version)
			.collect();
		assert_eq!(versions, vec![1, 2, 3]);
	}

	#[test]
	fn append_batch_is_all_or_nothing() {
		let repo = repo_with_env();
		repo.append(&secret("B"), version("B", 1)).unwrap();

		let err = repo
			.append_batch(
				&project(),
				EnvironmentId::Development,
				vec![version("A", 1), version("B", 1), version("C", 1)],
			)
			.unwrap_err();
		assert!(matches!(err, SecretsError::Conflict(_)));
		assert!(repo.latest(&secret("A")).unwrap().is_none());
		assert!(repo.latest(&secret("C")).unwrap().is_none());

		let err = repo
			.append_batch(
				&project(),
				EnvironmentId::Development,
				vec![version("A", 1), version("A", 2)],
			)
			.unwrap_err();
		assert!(matches!(err, SecretsError::InvalidInput(_)));
		assert!(repo.latest(&secret("A")).unwrap().is_none());

		repo.append_batch(
			&project(),
			EnvironmentId::Development,
			vec![version("A", 1), version("B", 2), version("C", 1)],
		)
		.unwrap();
		let current: Vec<_> = repo
			.list_current(&project(), EnvironmentId::Development)
			.unwrap()
			.into_iter()
			.map(|v| (v.key, v.version))
			.collect();
		assert_eq!(
			current,
			vec![("A".to_string(), 1), ("B".to_string(), 2), ("C".to_string(), 1)]
		);
	}

	#[test]
	fn creator_is_the_owner() {
		let repo = InMemorySecretRepository::new();
		let creator = ActorId::generate();
		repo.insert_project(project(), "Project".to_string(), creator, Utc::now())
			.unwrap();
		let members = repo.members(&project()).unwrap();
		assert_eq!(members.len(), 1);
		assert_eq!(members[0].actor_id, creator);
		assert_eq!(members[0].role, Role::Owner);
	}

	#[test]
	fn member_lifecycle() {
		let repo = repo_with_env();
		let actor = ActorId::generate();
		repo.insert_member(&project(), shared(actor, Role::Viewer)).unwrap();
		assert!(matches!(
			repo.insert_member(&project(), shared(actor, Role::Editor)),
			Err(SecretsError::Conflict(_))
		));

		let updated = repo
			.update_member(&project(), actor, MemberChange::Role(Role::Editor))
			.unwrap();
		assert_eq!(updated.role, Role::Editor);
		let updated = repo
			.update_member(&project(), actor, MemberChange::RevealInsecure(true))
			.unwrap();
		assert_eq!(updated.role, Role::Editor);
		assert!(updated.reveal_insecure);

		let removed = repo.remove_member(&project(), actor).unwrap();
		assert_eq!(removed.actor_id, actor);
		assert!(matches!(
			repo.remove_member(&project(), actor),
			Err(SecretsError::NotFound(_))
		));
	}

	#[test]
	fn owner_cannot_be_changed_or_removed() {
		let repo = repo_with_env();
		let owner = repo.members(&project()).unwrap()[0].actor_id;
		assert!(matches!(
			repo.update_member(&project(), owner, MemberChange::Role(Role::Viewer)),
			Err(SecretsError::Conflict(_))
		));
		assert!(matches!(
			repo.remove_member(&project(), owner),
			Err(SecretsError::Conflict(_))
		));
	}

	#[test]
	fn memberships_span_projects() {
		let repo = repo_with_env();
		let actor = ActorId::generate();
		let other = ProjectId::new("proj-0").unwrap();
		repo.insert_project(other.clone(), "Other".to_string(), actor, Utc::now())
			.unwrap();
		repo.insert_member(&project(), shared(actor, Role::Viewer)).unwrap();

		let memberships = repo.memberships_of(actor).unwrap();
		assert_eq!(memberships.len(), 2);
		assert_eq!(memberships[0].project_id, other);
		assert_eq!(memberships[0].role, Role::Owner);
		assert_eq!(memberships[1].project_id, project());
		assert_eq!(memberships[1].role, Role::Viewer);
		assert!(repo.memberships_of(ActorId::generate()).unwrap().is_empty());
	}

	proptest! {
		#[test]
		fn prop_versions_strictly_increase_by_one(count in 1u64..50) {
			let repo = repo_with_env();
			for n in 1..=count {
				repo.append(&secret("K"), version("K", n)).unwrap();
			}
			let history = repo.history(&secret("K")).unwrap();
			prop_assert_eq!(history.len() as u64, count);
			for (idx, v) in history.iter().enumerate() {
				prop_assert_eq!(v.version, idx as u64 + 1);
			}
		}

		#[test]
		fn prop_numbering_survives_environment_cycles(cycles in 1usize..6, puts in 1u64..4) {
			let repo = repo_with_env();
			for cycle in 0..cycles {
				for _ in 0..puts {
					let next = repo.latest(&secret("K")).unwrap().map(|v| v.version).unwrap_or(0) + 1;
					repo.append(&secret("K"), version("K", next)).unwrap();
				}
				repo.delete_environment(&project(), EnvironmentId::Development, ActorId::generate())
					.unwrap();
				if cycle + 1 < cycles {
					repo.create_environment(&project(), EnvironmentId::Development)
						.unwrap();
				}
			}
			let history = repo.history(&secret("K")).unwrap();
			prop_assert_eq!(history.len() as u64, cycles as u64 * (puts + 1));
			for (idx, v) in history.iter().enumerate() {
				prop_assert_eq!(v.version, idx as u64 + 1);
			}
		}
	}
}

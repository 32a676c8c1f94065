// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Versioned, encrypted secret storage for Envizo.
//!
//! Secrets are addressed by `(project, environment, key)` and stored as an
//! append-only chain of encrypted versions. Every access is checked by the
//! policy engine in `envizo-server-auth` and recorded in the audit log.
//!
//! # Modules
//!
//! - [`encryption`]: AES-256-GCM envelope bound to the secret's identity
//! - [`repository`]: storage abstraction and the in-memory implementation
//! - [`store`]: [`SecretStore`], the entry point for all operations
//! - [`codec`]: dotenv, JSON and YAML export/import
//! - [`classify`]: secure/warning/insecure classification of values
//! - [`analysis`]: pluggable configuration analyzer
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use envizo_server_audit::AuditLog;
//! use envizo_server_auth::{Actor, ActorId, EnvironmentId, ProjectId, Role};
//! use envizo_server_secrets::{PutOptions, SecretStore, StaticKeyProvider};
//!
//! # async fn example() -> envizo_server_secrets::SecretsResult<()> {
//! let project = ProjectId::new("proj-1")?;
//! let owner = Actor::new(ActorId::generate()).with_role(project.clone(), Role::Owner);
//! let store = SecretStore::new(Arc::new(StaticKeyProvider::ephemeral()), AuditLog::new());
//!
//! store.create_project(&owner, project.clone(), "Payments").await?;
//! store.create_environment(&project, EnvironmentId::Development, &owner).await?;
//! store
//!     .put(&project, EnvironmentId::Development, "API_KEY", "s3cr3t".into(), &owner, PutOptions::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod classify;
pub mod codec;
pub mod encryption;
pub mod error;
pub mod repository;
pub mod store;
pub mod types;

pub use analysis::{
	AlertLevel, AnalysisAlert, AnalysisError, AnalysisInput, AnalysisReport, ConfigurationAnalyzer,
	HeuristicAnalyzer,
};
pub use classify::{classify, Classification, Finding, FindingCode, SecurityStatus};
pub use codec::{decode, encode, CodecError, Format, Snapshot};
pub use encryption::{
	CryptoError, Envelope, EnvelopeContext, KeyProvider, Sealed, StaticKeyProvider, KEY_SIZE, NONCE_SIZE,
};
pub use error::{ErrorKind, SecretsError, SecretsResult};
pub use repository::{InMemorySecretRepository, SecretRepository};
pub use store::{SecretStore, SecretStoreBuilder};
pub use types::{
	validate_key, MemberChange, Project, ProjectMember, PutOptions, RevealedSecret, SecretRef, SecretVersion, MAX_KEY_LEN,
	MAX_PROJECT_NAME_LEN,
};

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Envelope encryption for secret values.
//!
//! Each value is sealed with AES-256-GCM under a per-environment key supplied
//! by a [`KeyProvider`]. The (project, environment, key) triple is bound as
//! associated data, so a ciphertext only opens under the identity it was
//! sealed for.

use aes_gcm::{
	aead::{Aead, KeyInit, OsRng, Payload},
	Aes256Gcm, Key, Nonce,
};
use envizo_server_auth::{EnvironmentId, ProjectId};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

/// Size of encryption keys in bytes (256 bits for AES-256).
pub const KEY_SIZE: usize = 32;

/// Size of AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

const DERIVATION_LABEL: &[u8] = b"envizo/environment-key/v1";
const AAD_LABEL: &[u8] = b"envizo/secret/v1";

#[derive(Debug, Error)]
pub enum CryptoError {
	#[error("key material unavailable: {0}")]
	KeyUnavailable(String),

	#[error("invalid key: {0}")]
	InvalidKey(String),

	#[error("encryption failed")]
	Encryption,

	#[error("decryption failed")]
	Decryption,
}

/// The identity a ciphertext is bound to.
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeContext<'a> {
	pub project: &'a ProjectId,
	pub environment: EnvironmentId,
	pub key: &'a str,
}

impl<'a> EnvelopeContext<'a> {
	pub fn new(project: &'a ProjectId, environment: EnvironmentId, key: &'a str) -> Self {
		Self {
			project,
			environment,
			key,
		}
	}

	/// Length-prefixed encoding, so no two distinct triples share an encoding.
	fn associated_data(&self) -> Vec<u8> {
		let mut aad = Vec::with_capacity(AAD_LABEL.len() + 64 + self.key.len());
		aad.extend_from_slice(AAD_LABEL);
		push_field(&mut aad, self.project.as_str().as_bytes());
		push_field(&mut aad, self.environment.as_str().as_bytes());
		push_field(&mut aad, self.key.as_bytes());
		aad
	}
}

fn push_field(buf: &mut Vec<u8>, field: &[u8]) {
	buf.extend_from_slice(&(field.len() as u32).to_be_bytes());
	buf.extend_from_slice(field);
}

/// Source of per-environment key material.
///
/// Implementations may call out to a key-management service; the envelope
/// never stores what they return.
pub trait KeyProvider: Send + Sync {
	fn environment_key(
		&self,
		project: &ProjectId,
		environment: EnvironmentId,
	) -> Result<Zeroizing<[u8; KEY_SIZE]>, CryptoError>;
}

/// Derives environment keys from one master key with HMAC-SHA256.
pub struct StaticKeyProvider {
	master: Zeroizing<[u8; KEY_SIZE]>,
}

impl StaticKeyProvider {
	pub fn new(master: [u8; KEY_SIZE]) -> Self {
		Self {
			master: Zeroizing::new(master),
		}
	}

	/// Parse a hex-encoded 256-bit master key.
	pub fn from_hex(hex_key: &str) -> Result<Self, CryptoError> {
		let bytes = Zeroizing::new(
			hex::decode(hex_key.trim()).map_err(|e| CryptoError::InvalidKey(format!("not hex: {e}")))?,
		);
		if bytes.len() != KEY_SIZE {
			return Err(CryptoError::InvalidKey(format!(
				"expected {KEY_SIZE} bytes, got {}",
				bytes.len()
			)));
		}
		let mut master = Zeroizing::new([0u8; KEY_SIZE]);
		master.copy_from_slice(&bytes);
		Ok(Self { master })
	}

	/// A random master key that lives only as long as this process.
	pub fn ephemeral() -> Self {
		Self {
			master: generate_key(),
		}
	}
}

impl KeyProvider for StaticKeyProvider {
	fn environment_key(
		&self,
		project: &ProjectId,
		environment: EnvironmentId,
	) -> Result<Zeroizing<[u8; KEY_SIZE]>, CryptoError> {
		let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(self.master.as_slice())
			.map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
		let mut input = Vec::with_capacity(DERIVATION_LABEL.len() + 32);
		input.extend_from_slice(DERIVATION_LABEL);
		push_field(&mut input, project.as_str().as_bytes());
		push_field(&mut input, environment.as_str().as_bytes());
		mac.update(&input);

		let mut key = Zeroizing::new([0u8; KEY_SIZE]);
		key.copy_from_slice(&mac.finalize().into_bytes());
		Ok(key)
	}
}

/// Generate a random encryption key.
pub fn generate_key() -> Zeroizing<[u8; KEY_SIZE]> {
	let mut key = Zeroizing::new([0u8; KEY_SIZE]);
	OsRng.fill_bytes(key.as_mut());
	key
}

/// Generate a random nonce.
///
/// 96-bit random nonces from OsRng. Safe for well under 2^32 seals per
/// environment key.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
	let mut nonce = [0u8; NONCE_SIZE];
	OsRng.fill_bytes(&mut nonce);
	nonce
}

/// Encrypted data with nonce.
#[derive(Debug, Clone)]
pub struct Sealed {
	pub ciphertext: Vec<u8>,
	pub nonce: [u8; NONCE_SIZE],
}

/// Seals and opens secret values under context-bound keys.
pub struct Envelope {
	provider: std::sync::Arc<dyn KeyProvider>,
}

impl Envelope {
	pub fn new(provider: std::sync::Arc<dyn KeyProvider>) -> Self {
		Self { provider }
	}

	fn cipher(&self, context: &EnvelopeContext<'_>) -> Result<Aes256Gcm, CryptoError> {
		let key = self
			.provider
			.environment_key(context.project, context.environment)?;
		Ok(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice())))
	}

	/// Encrypt `plaintext` with a fresh nonce.
	pub fn seal(&self, plaintext: &[u8], context: &EnvelopeContext<'_>) -> Result<Sealed, CryptoError> {
		let cipher = self.cipher(context)?;
		let nonce_bytes = generate_nonce();
		let aad = context.associated_data();

		let ciphertext = cipher
			.encrypt(
				Nonce::from_slice(&nonce_bytes),
				Payload {
					msg: plaintext,
					aad: &aad,
				},
			)
			.map_err(|_| CryptoError::Encryption)?;

		Ok(Sealed {
			ciphertext,
			nonce: nonce_bytes,
		})
	}

	/// Decrypt and authenticate. Fails if the ciphertext, nonce, key or context differ.
	pub fn open(
		&self,
		ciphertext: &[u8],
		nonce: &[u8; NONCE_SIZE],
		context: &EnvelopeContext<'_>,
	) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
		let cipher = self.cipher(context)?;
		let aad = context.associated_data();

		let plaintext = cipher
			.decrypt(
				Nonce::from_slice(nonce),
				Payload {
					msg: ciphertext,
					aad: &aad,
				},
			)
			.map_err(|_| CryptoError::Decryption)?;

		Ok(Zeroizing::new(plaintext))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use std::sync::Arc;

	fn envelope() -> Envelope {
		Envelope::new(Arc::new(StaticKeyProvider::ephemeral()))
	}

	fn project(id: &str) -> ProjectId {
		ProjectId::new(id).unwrap()
	}

	struct UnavailableProvider;

	impl KeyProvider for UnavailableProvider {
		fn environment_key(
			&self,
			_project: &ProjectId,
			_environment: EnvironmentId,
		) -> Result<Zeroizing<[u8; KEY_SIZE]>, CryptoError> {
			Err(CryptoError::KeyUnavailable("kms offline".to_string()))
		}
	}

	#[test]
	fn key_generation_produces_unique_keys() {
		let key1 = generate_key();
		let key2 = generate_key();
		assert_ne!(key1.as_slice(), key2.as_slice());
	}

	#[test]
	fn seal_open_roundtrip() {
		let env = envelope();
		let p = project("proj-1");
		let ctx = EnvelopeContext::new(&p, EnvironmentId::Development, "DATABASE_URL");

		let sealed = env.seal(b"postgres://db/app", &ctx).unwrap();
		let opened = env.open(&sealed.ciphertext, &sealed.nonce, &ctx).unwrap();
		assert_eq!(opened.as_slice(), b"postgres://db/app");
	}

	#[test]
	fn swapped_key_context_fails() {
		let env = envelope();
		let p = project("proj-1");
		let ctx = EnvelopeContext::new(&p, EnvironmentId::Development, "A");
		let other = EnvelopeContext::new(&p, EnvironmentId::Development, "B");

		let sealed = env.seal(b"value", &ctx).unwrap();
		assert!(matches!(
			env.open(&sealed.ciphertext, &sealed.nonce, &other),
			Err(CryptoError::Decryption)
		));
	}

	#[test]
	fn swapped_environment_or_project_fails() {
		let env = envelope();
		let p1 = project("proj-1");
		let p2 = project("proj-2");
		let ctx = EnvelopeContext::new(&p1, EnvironmentId::Staging, "K");
		let sealed = env.seal(b"value", &ctx).unwrap();

		let other_env = EnvelopeContext::new(&p1, EnvironmentId::Production, "K");
		let other_project = EnvelopeContext::new(&p2, EnvironmentId::Staging, "K");
		assert!(env.open(&sealed.ciphertext, &sealed.nonce, &other_env).is_err());
		assert!(env.open(&sealed.ciphertext, &sealed.nonce, &other_project).is_err());
	}

	#[test]
	fn length_prefix_prevents_boundary_confusion() {
		let p1 = project("ab");
		let p2 = project("a");
		let a = EnvelopeContext::new(&p1, EnvironmentId::Development, "c").associated_data();
		let b = EnvelopeContext::new(&p2, EnvironmentId::Development, "bc").associated_data();
		assert_ne!(a, b);
	}

	#[test]
	fn wrong_master_key_fails() {
		let p = project("proj-1");
		let ctx = EnvelopeContext::new(&p, EnvironmentId::Development, "K");
		let sealed = envelope().seal(b"value", &ctx).unwrap();
		assert!(envelope().open(&sealed.ciphertext, &sealed.nonce, &ctx).is_err());
	}

	#[test]
	fn derived_keys_differ_per_environment() {
		let provider = StaticKeyProvider::new([7u8; KEY_SIZE]);
		let p = project("proj-1");
		let dev = provider.environment_key(&p, EnvironmentId::Development).unwrap();
		let prod = provider.environment_key(&p, EnvironmentId::Production).unwrap();
		let dev_again = provider.environment_key(&p, EnvironmentId::Development).unwrap();
		assert_ne!(dev.as_slice(), prod.as_slice());
		assert_eq!(dev.as_slice(), dev_again.as_slice());
	}

	#[test]
	fn from_hex_validates_length() {
		assert!(StaticKeyProvider::from_hex(&"00".repeat(KEY_SIZE)).is_ok());
		assert!(matches!(
			StaticKeyProvider::from_hex("abcd"),
			Err(CryptoError::InvalidKey(_))
		));
		assert!(StaticKeyProvider::from_hex(&"zz".repeat(KEY_SIZE)).is_err());
	}

	#[test]
	fn provider_failure_propagates() {
		let env = Envelope::new(Arc::new(UnavailableProvider));
		let p = project("proj-1");
		let ctx = EnvelopeContext::new(&p, EnvironmentId::Development, "K");
		assert!(matches!(env.seal(b"v", &ctx), Err(CryptoError::KeyUnavailable(_))));
	}

	proptest! {
		#[test]
		fn prop_seal_open_roundtrip(
			plaintext in proptest::collection::vec(any::<u8>(), 0..4096),
			key in "[A-Z_][A-Z0-9_]{0,32}",
		) {
			let env = envelope();
			let p = project("proj-1");
			let ctx = EnvelopeContext::new(&p, EnvironmentId::Production, &key);

			let sealed = env.seal(&plaintext, &ctx).unwrap();
			let opened = env.open(&sealed.ciphertext, &sealed.nonce, &ctx).unwrap();

			prop_assert_eq!(plaintext.as_slice(), opened.as_slice());
		}

		#[test]
		fn prop_nonces_are_unique(plaintext in proptest::collection::vec(any::<u8>(), 1..256)) {
			let env = envelope();
			let p = project("proj-1");
			let ctx = EnvelopeContext::new(&p, EnvironmentId::Development, "K");

			let a = env.seal(&plaintext, &ctx).unwrap();
			let b = env.seal(&plaintext, &ctx).unwrap();

			prop_assert_ne!(a.nonce, b.nonce);
			prop_assert_ne!(a.ciphertext, b.ciphertext);
		}

		#[test]
		fn prop_tampered_ciphertext_fails(
			plaintext in proptest::collection::vec(any::<u8>(), 1..512),
			tamper_idx in 0usize..1024usize,
		) {
			let env = envelope();
			let p = project("proj-1");
			let ctx = EnvelopeContext::new(&p, EnvironmentId::Development, "K");

			let mut sealed = env.seal(&plaintext, &ctx).unwrap();
			let idx = tamper_idx % sealed.ciphertext.len();
			sealed.ciphertext[idx] ^= 0xFF;

			prop_assert!(env.open(&sealed.ciphertext, &sealed.nonce, &ctx).is_err());
		}
	}
}

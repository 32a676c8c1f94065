// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The partial, mergeable form of [`ServerConfig`](crate::ServerConfig).

use serde::Deserialize;

use crate::sections::{
	AuditConfigLayer, CryptoConfigLayer, DeploymentConfigLayer, LoggingConfigLayer, StoreConfigLayer,
};

/// One source's contribution. Absent sections and fields leave lower layers untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub deployment: Option<DeploymentConfigLayer>,
	#[serde(default)]
	pub crypto: Option<CryptoConfigLayer>,
	#[serde(default)]
	pub store: Option<StoreConfigLayer>,
	#[serde(default)]
	pub audit: Option<AuditConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

macro_rules! merge_section {
	($self:ident, $other:ident, $field:ident) => {
		match (&mut $self.$field, $other.$field) {
			(Some(existing), Some(incoming)) => existing.merge(incoming),
			(None, Some(incoming)) => $self.$field = Some(incoming),
			(_, None) => {}
		}
	};
}

impl ServerConfigLayer {
	/// Overlay `other` on top of `self`, field by field.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_section!(self, other, deployment);
		merge_section!(self, other, crypto);
		merge_section!(self, other, store);
		merge_section!(self, other, audit);
		merge_section!(self, other, logging);
	}
}

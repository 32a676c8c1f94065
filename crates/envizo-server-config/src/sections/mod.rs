// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections. Each has a partial `*ConfigLayer` and a resolved `*Config`.

mod audit;
mod crypto;
mod deployment;
mod logging;
mod store;

pub use audit::{AuditConfig, AuditConfigLayer, QueueOverflowPolicy};
pub use crypto::{CryptoConfig, CryptoConfigLayer, MASTER_KEY_HEX_LEN};
pub(crate) use crypto::is_valid_master_key_hex;
pub use deployment::{DeploymentConfig, DeploymentConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use store::{StoreConfig, StoreConfigLayer};

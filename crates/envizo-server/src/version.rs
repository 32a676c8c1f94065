// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Build information for envizo-server.

/// Package version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit, if the build environment provided one.
pub fn git_sha() -> &'static str {
	option_env!("ENVIZO_GIT_SHA").unwrap_or("unknown")
}

/// Format version info for display.
pub fn format_version_info() -> String {
	format!(
		"envizo-server version: {}\n\
         Git SHA:               {}\n\
         Platform:              {}-{}",
		VERSION,
		git_sha(),
		std::env::consts::OS,
		std::env::consts::ARCH,
	)
}

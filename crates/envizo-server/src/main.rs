// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Envizo secrets server binary.
//!
//! Without a subcommand the binary runs `self-check`: it loads configuration,
//! builds the store and its audit sinks, proves one sealed round trip works,
//! and exits. Request routing lives outside this binary.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use envizo_server::{bootstrap, commands, self_check, version};
use envizo_server_auth::EnvironmentId;
use envizo_server_config::{LoggingConfig, ServerConfig};
use envizo_server_secrets::Format;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Envizo server - encrypted, versioned environment secrets.
#[derive(Parser, Debug)]
#[command(name = "envizo-server", about = "Envizo secrets server", version)]
struct Args {
	/// Config file to load instead of /etc/envizo/server.toml
	#[arg(long, env = "ENVIZO_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Load configuration and print a redacted summary
	CheckConfig,
	/// Build the configured store, check its audit sinks and run one round trip (default)
	SelfCheck,
	/// Convert a secrets file between dotenv, json and yaml
	Convert {
		#[arg(long)]
		from: Format,
		#[arg(long)]
		to: Format,
		path: PathBuf,
	},
	/// Print the security classification of each entry in a secrets file
	Classify {
		#[arg(long, default_value = "development")]
		environment: EnvironmentId,
		#[arg(long, default_value = "dotenv")]
		format: Format,
		path: PathBuf,
	},
	/// Show version and build information
	Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	let check_only = match args.command {
		Some(Command::Version) => {
			println!("{}", version::format_version_info());
			return Ok(());
		}
		Some(Command::Convert { from, to, path }) => {
			let input = read_input(&path)?;
			let output = commands::convert(&input, from, to).await?;
			std::io::stdout().write_all(&output)?;
			return Ok(());
		}
		Some(Command::Classify {
			environment,
			format,
			path,
		}) => {
			let input = read_input(&path)?;
			let entries = commands::classify_entries(&input, format, environment)?;
			print!("{}", commands::render_classifications(&entries));
			return Ok(());
		}
		Some(Command::CheckConfig) => true,
		Some(Command::SelfCheck) | None => false,
	};

	dotenvy::dotenv().ok();

	let config = load_config(args.config)?;

	if check_only {
		println!("{}", commands::config_summary(&config));
		return Ok(());
	}

	init_tracing(&config.logging);

	tracing::info!(
		environment = %config.deployment.environment,
		version = version::VERSION,
		"starting envizo-server"
	);

	let envizo = bootstrap(&config).await?;
	let report = self_check(&envizo).await.context("self check failed")?;
	println!(
		"self check passed: project {} ({} audit entries)",
		report.project, report.audit_entries
	);

	Ok(())
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<ServerConfig> {
	let config = match path {
		Some(path) => envizo_server_config::load_config_with_file(path)?,
		None => envizo_server_config::load_config()?,
	};
	Ok(config)
}

fn init_tracing(logging: &LoggingConfig) {
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| logging.level.clone().into()),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();
}

fn read_input(path: &Path) -> anyhow::Result<Vec<u8>> {
	std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

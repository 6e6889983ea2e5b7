//! Builds the lifecycle manager from CLI flags, environment and config file.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chatgate::{ClientConfig, LifecycleManager};
use chatgate_runtime::BridgeFactory;
use tracing::info;

use crate::cli::Cli;

/// Resolves the client config: defaults, then `--config`, then flags and env.
pub fn client_config(cli: &Cli) -> Result<ClientConfig> {
	let mut config = match &cli.config {
		Some(path) => ClientConfig::load(path)?,
		None => ClientConfig::default(),
	};

	if let Some(session) = &cli.session {
		config.session_id = session.clone();
	}
	if let Some(backend) = cli.store {
		config.store.backend = backend;
	}
	if let Some(bucket) = &cli.bucket {
		config.store.bucket = bucket.clone();
	}
	if let Some(prefix) = &cli.bucket_path {
		config.store.path_prefix = prefix.clone();
	}
	if let Some(region) = &cli.region {
		config.store.region = Some(region.clone());
	}
	if let Some(endpoint) = &cli.store_endpoint {
		config.store.endpoint = Some(endpoint.clone());
	}
	if let Some(token) = &cli.store_token {
		config.store.access_token = Some(token.clone());
	}
	if let Some(key_id) = &cli.access_key_id {
		config.store.access_key_id = Some(key_id.clone());
	}
	if let Some(secret) = &cli.secret_access_key {
		config.store.secret_access_key = Some(secret.clone());
	}
	if let Some(root) = &cli.store_root {
		config.store.root = Some(root.clone());
	}
	if cli.no_reconnect {
		config.reconnect.enabled = false;
	}

	config.validate()?;
	Ok(config)
}

/// Splits `--engine-cmd` into program and arguments.
pub fn engine_factory(command: &str) -> Result<BridgeFactory> {
	let mut parts = command.split_whitespace();
	let Some(program) = parts.next() else {
		bail!("engine command is empty");
	};
	Ok(BridgeFactory::new(program).with_args(parts))
}

pub fn build_manager(cli: &Cli) -> Result<LifecycleManager> {
	let config = client_config(cli)?;
	let store = chatgate::store::open(&config.store).context("failed to open session store")?;
	let factory = engine_factory(&cli.engine_cmd)?;

	info!(
		target = "chatgate.http",
		session_id = %config.session_id,
		store = ?config.store.backend,
		engine = %cli.engine_cmd,
		reconnect = config.reconnect.enabled,
		"client configured"
	);
	Ok(LifecycleManager::new(config, Arc::new(factory), store)?)
}

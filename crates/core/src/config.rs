//! Client configuration.
//!
//! Every field has a default so a partial JSON document (or none at all)
//! yields a usable config; [`ClientConfig::validate`] rejects the values the
//! manager cannot run with.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_SESSION_ID: &str = "default";

/// Top-level configuration for a [`LifecycleManager`](crate::LifecycleManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
	/// Identifies the persisted session; part of the store key.
	pub session_id: String,
	pub store: StoreConfig,
	pub reconnect: ReconnectConfig,
	pub dispatch: DispatchConfig,
	/// Upper bound on a single engine teardown.
	pub teardown_timeout_ms: u64,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			session_id: DEFAULT_SESSION_ID.to_string(),
			store: StoreConfig::default(),
			reconnect: ReconnectConfig::default(),
			dispatch: DispatchConfig::default(),
			teardown_timeout_ms: 10_000,
		}
	}
}

impl ClientConfig {
	/// Reads a JSON config file. Missing fields take their defaults.
	pub fn load(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path).map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
		serde_json::from_str(&content).map_err(|e| Error::Config(format!("cannot parse {}: {e}", path.display())))
	}

	pub fn validate(&self) -> Result<()> {
		if self.session_id.trim().is_empty() {
			return Err(Error::Config("sessionId must not be empty".into()));
		}
		if self.dispatch.retries == 0 {
			return Err(Error::Config("dispatch.retries must be at least 1".into()));
		}
		if self.reconnect.enabled && self.reconnect.max_attempts == 0 {
			return Err(Error::Config("reconnect.maxAttempts must be at least 1 when reconnect is enabled".into()));
		}
		if self.reconnect.strategy == BackoffStrategy::Exponential && self.reconnect.max_backoff_ms < self.reconnect.backoff_ms {
			return Err(Error::Config("reconnect.maxBackoffMs must not be below reconnect.backoffMs".into()));
		}
		match self.store.backend {
			StoreBackend::Memory | StoreBackend::Fs => {}
			StoreBackend::Http | StoreBackend::S3 if self.store.bucket.trim().is_empty() => {
				return Err(Error::Config(format!("store.bucket is required for the {} store", self.store.backend)));
			}
			StoreBackend::Http if self.store.endpoint.is_none() => {
				return Err(Error::Config("store.endpoint is required for the http store".into()));
			}
			StoreBackend::S3 if self.store.region.is_none() => {
				return Err(Error::Config("store.region is required for the s3 store".into()));
			}
			StoreBackend::Http | StoreBackend::S3 => {}
		}
		Ok(())
	}

	pub fn teardown_timeout(&self) -> Duration {
		Duration::from_millis(self.teardown_timeout_ms)
	}
}

/// Which [`SessionStore`](crate::store::SessionStore) implementation backs the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
	#[default]
	Memory,
	Fs,
	Http,
	S3,
}

impl std::fmt::Display for StoreBackend {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			Self::Memory => "memory",
			Self::Fs => "fs",
			Self::Http => "http",
			Self::S3 => "s3",
		})
	}
}

impl std::str::FromStr for StoreBackend {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		match s.to_ascii_lowercase().as_str() {
			"memory" => Ok(Self::Memory),
			"fs" | "file" => Ok(Self::Fs),
			"http" => Ok(Self::Http),
			"s3" => Ok(Self::S3),
			other => Err(Error::Config(format!("unknown store backend '{other}' (expected memory, fs, http or s3)"))),
		}
	}
}

/// Where session credentials are persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
	pub backend: StoreBackend,
	pub bucket: String,
	/// Key prefix inside the bucket (or below `root`).
	pub path_prefix: String,
	/// AWS region of the s3 store.
	pub region: Option<String>,
	/// Base URL of the http store; for s3, an S3-compatible endpoint overriding AWS.
	pub endpoint: Option<String>,
	/// Bearer credential for the http store.
	pub access_token: Option<String>,
	/// Static credentials for the s3 store; without them the AWS credential chain is used.
	pub access_key_id: Option<String>,
	pub secret_access_key: Option<String>,
	/// Root directory of the fs store.
	pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
	#[default]
	Fixed,
	Exponential,
}

/// Automatic reconnection after unsolicited disconnects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconnectConfig {
	pub enabled: bool,
	pub backoff_ms: u64,
	pub max_backoff_ms: u64,
	pub max_attempts: u32,
	pub strategy: BackoffStrategy,
	/// Window within which a reconnect attempt must reach `Ready`; `None` waits forever.
	pub ready_timeout_ms: Option<u64>,
}

impl Default for ReconnectConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			backoff_ms: 5_000,
			max_backoff_ms: 60_000,
			max_attempts: 5,
			strategy: BackoffStrategy::Fixed,
			ready_timeout_ms: Some(120_000),
		}
	}
}

/// Retry behavior of `send_message` while the session is not ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DispatchConfig {
	pub retries: u32,
	pub retry_delay_ms: u64,
}

impl Default for DispatchConfig {
	fn default() -> Self {
		Self {
			retries: 3,
			retry_delay_ms: 2_000,
		}
	}
}

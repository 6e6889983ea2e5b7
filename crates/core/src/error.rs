use std::path::PathBuf;

use chatgate_runtime::EngineError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the lifecycle manager.
#[derive(Debug, Error)]
pub enum Error {
	#[error("client not initialized; call init first")]
	NotInitialized,

	#[error("client not ready: {0}")]
	NotReady(String),

	#[error("session did not become ready after {attempts} send attempts")]
	SendExhausted { attempts: u32 },

	#[error("automatic reconnection gave up after {attempts} attempts; call init to start over")]
	ReconnectExhausted { attempts: u32 },

	#[error("failed to persist session credentials: {0}")]
	StorePersistenceFailed(#[source] StoreError),

	#[error("engine teardown failed: {0}")]
	TeardownFailed(String),

	#[error(transparent)]
	Engine(#[from] EngineError),

	#[error(transparent)]
	Store(#[from] StoreError),

	#[error("invalid configuration: {0}")]
	Config(String),
}

impl Error {
	/// True for errors caused by the session not being usable yet.
	pub fn is_unavailable(&self) -> bool {
		matches!(
			self,
			Self::NotInitialized | Self::NotReady(_) | Self::SendExhausted { .. } | Self::ReconnectExhausted { .. }
		)
	}
}

/// Failures raised by a session store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("object not found: {key}")]
	NotFound { key: String },

	#[error("store I/O error at {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("object store returned {status} for {key}")]
	Status { status: u16, key: String },

	#[error("object store request failed: {0}")]
	Http(#[from] reqwest::Error),

	#[error("s3 request failed: {0}")]
	ObjectStore(#[from] object_store::Error),

	#[error("store misconfigured: {0}")]
	Config(String),
}

impl StoreError {
	pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		Self::Io { path: path.into(), source }
	}
}

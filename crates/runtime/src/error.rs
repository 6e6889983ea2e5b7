use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Failures raised by a session engine.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("failed to spawn engine {program}: {source}")]
	Spawn {
		program: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("engine I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("engine protocol error: {0}")]
	Protocol(String),

	#[error("engine rejected request: {0}")]
	Rejected(String),

	#[error("engine channel closed")]
	ChannelClosed,

	#[error("engine did not answer within {0} ms")]
	Timeout(u64),

	#[error("engine process {pid} still alive after teardown")]
	TeardownIncomplete { pid: u32 },
}

impl From<serde_json::Error> for EngineError {
	fn from(err: serde_json::Error) -> Self {
		Self::Protocol(err.to_string())
	}
}

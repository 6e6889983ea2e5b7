//! Engine seam consumed by the lifecycle manager.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chatgate_protocol::{ChatAddress, DeliveryReceipt};
use tokio::sync::mpsc;

use crate::error::Result;

/// Parameters handed to [`EngineFactory::construct`].
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
	pub session_id: String,
	/// Auth material restored from the session store, if any.
	pub credentials: Option<Vec<u8>>,
}

impl fmt::Debug for EngineConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EngineConfig")
			.field("session_id", &self.session_id)
			.field("credentials", &self.credentials.as_ref().map(|c| format!("<{} bytes>", c.len())))
			.finish()
	}
}

/// Lifecycle events raised by a running engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
	/// A scan-code the user must scan to authorize the session.
	Qr(String),
	Ready,
	Disconnected(String),
	/// Updated auth material to persist remotely.
	Credentials(Vec<u8>),
}

/// A constructed engine plus the stream of its events.
///
/// The event stream ending means the engine is gone.
pub struct EngineHandle {
	pub engine: Arc<dyn SessionEngine>,
	pub events: mpsc::UnboundedReceiver<EngineEvent>,
}

/// Handle to one live engine instance.
#[async_trait]
pub trait SessionEngine: Send + Sync {
	/// Sends `body` to `to` and returns the engine's receipt.
	async fn send(&self, to: &ChatAddress, body: &str) -> Result<DeliveryReceipt>;

	/// Releases every resource held by the engine.
	///
	/// Resolves once spawned processes have exited. Calling it again is a no-op.
	async fn destroy(&self) -> Result<()>;
}

/// Creates engine instances.
#[async_trait]
pub trait EngineFactory: Send + Sync {
	async fn construct(&self, config: EngineConfig) -> Result<EngineHandle>;
}

//! Credential persistence for one session id on top of a [`SessionStore`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::store::{SessionStore, object_key};

/// Binds a store to the object key of a single session.
#[derive(Clone)]
pub struct RemoteAuth {
	store: Arc<dyn SessionStore>,
	key: String,
}

impl RemoteAuth {
	pub fn new(store: Arc<dyn SessionStore>, path_prefix: &str, session_id: &str) -> Self {
		Self {
			store,
			key: object_key(path_prefix, session_id),
		}
	}

	pub fn key(&self) -> &str {
		&self.key
	}

	/// Loads persisted credentials, if any.
	///
	/// Store failures are logged and reported as "nothing persisted": the engine
	/// then starts fresh and asks for a new scan.
	pub async fn restore(&self) -> Option<Vec<u8>> {
		match self.store.head(&self.key).await {
			Ok(false) => {
				debug!(target = "chatgate.store", key = %self.key, "no persisted session");
				return None;
			}
			Ok(true) => {}
			Err(err) => {
				warn!(target = "chatgate.store", key = %self.key, error = %err, "session lookup failed; starting fresh");
				return None;
			}
		}

		match self.store.get(&self.key).await {
			Ok(data) => {
				info!(target = "chatgate.store", key = %self.key, bytes = data.len(), "restored persisted session");
				Some(data)
			}
			Err(StoreError::NotFound { .. }) => None,
			Err(err) => {
				warn!(target = "chatgate.store", key = %self.key, error = %err, "session download failed; starting fresh");
				None
			}
		}
	}

	pub async fn persist(&self, data: &[u8]) -> StoreResult<()> {
		self.store.put(&self.key, data).await?;
		debug!(target = "chatgate.store", key = %self.key, bytes = data.len(), "persisted session");
		Ok(())
	}

	/// Deletes the persisted bundle. Returns whether one existed.
	pub async fn forget(&self) -> StoreResult<bool> {
		if !self.store.head(&self.key).await? {
			return Ok(false);
		}
		self.store.delete(&self.key).await?;
		info!(target = "chatgate.store", key = %self.key, "deleted persisted session");
		Ok(true)
	}
}

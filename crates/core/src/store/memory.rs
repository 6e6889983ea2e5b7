use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::SessionStore;
use crate::error::{StoreError, StoreResult};

/// In-process store; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
	objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.objects.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[async_trait]
impl SessionStore for MemoryStore {
	async fn put(&self, key: &str, data: &[u8]) -> StoreResult<()> {
		self.objects.lock().insert(key.to_string(), data.to_vec());
		Ok(())
	}

	async fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
		self.objects
			.lock()
			.get(key)
			.cloned()
			.ok_or_else(|| StoreError::NotFound { key: key.to_string() })
	}

	async fn head(&self, key: &str) -> StoreResult<bool> {
		Ok(self.objects.lock().contains_key(key))
	}

	async fn delete(&self, key: &str) -> StoreResult<()> {
		self.objects.lock().remove(key);
		Ok(())
	}
}

//! Durable key/value blob storage for session credentials.

mod fs;
mod http;
mod memory;
mod s3;

use std::sync::Arc;

use async_trait::async_trait;

pub use self::fs::FsStore;
pub use self::http::HttpObjectStore;
pub use self::memory::MemoryStore;
pub use self::s3::S3Store;
use crate::config::{StoreBackend, StoreConfig};
use crate::error::StoreResult;

/// Blob store the credential bundle is written to and restored from.
#[async_trait]
pub trait SessionStore: Send + Sync {
	async fn put(&self, key: &str, data: &[u8]) -> StoreResult<()>;

	/// Fails with [`StoreError::NotFound`](crate::StoreError::NotFound) when `key` is absent.
	async fn get(&self, key: &str) -> StoreResult<Vec<u8>>;

	async fn head(&self, key: &str) -> StoreResult<bool>;

	/// Removing an absent key succeeds.
	async fn delete(&self, key: &str) -> StoreResult<()>;
}

/// Builds the store selected by `config.backend`.
pub fn open(config: &StoreConfig) -> StoreResult<Arc<dyn SessionStore>> {
	Ok(match config.backend {
		StoreBackend::Memory => Arc::new(MemoryStore::new()),
		StoreBackend::Fs => Arc::new(FsStore::from_config(config)),
		StoreBackend::Http => Arc::new(HttpObjectStore::from_config(config)?),
		StoreBackend::S3 => Arc::new(S3Store::from_config(config)?),
	})
}

/// Object key for a session: `{prefix}/RemoteAuth-{session_id}.zip`.
///
/// Surrounding slashes on the prefix are ignored; an empty prefix yields a bare key.
pub fn object_key(prefix: &str, session_id: &str) -> String {
	let name = format!("RemoteAuth-{session_id}.zip");
	match prefix.trim_matches('/') {
		"" => name,
		prefix => format!("{prefix}/{name}"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn object_key_joins_prefix() {
		assert_eq!(object_key("", "default"), "RemoteAuth-default.zip");
		assert_eq!(object_key("sessions", "shop"), "sessions/RemoteAuth-shop.zip");
		assert_eq!(object_key("/a/b/", "x"), "a/b/RemoteAuth-x.zip");
	}

	#[test]
	fn open_selects_backend() {
		assert!(open(&StoreConfig::default()).is_ok());

		let http = StoreConfig {
			backend: StoreBackend::Http,
			bucket: "auth".into(),
			..Default::default()
		};
		assert!(open(&http).is_err(), "http store without endpoint");

		let s3 = StoreConfig {
			backend: StoreBackend::S3,
			bucket: "auth".into(),
			region: Some("eu-west-1".into()),
			..Default::default()
		};
		assert!(open(&s3).is_ok());
	}
}

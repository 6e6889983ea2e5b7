use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::SessionStore;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};

const DEFAULT_ROOT: &str = ".chatgate/sessions";

/// One file per key below a root directory.
///
/// Keys containing `/` map to subdirectories. Writes go through a temporary
/// sibling file and a rename so readers never see a partial bundle.
#[derive(Debug, Clone)]
pub struct FsStore {
	root: PathBuf,
}

impl FsStore {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	/// Uses `config.root`, or `.chatgate/sessions` (joined with the bucket, when set).
	pub fn from_config(config: &StoreConfig) -> Self {
		let root = config.root.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT));
		match config.bucket.trim() {
			"" => Self::new(root),
			bucket => Self::new(root.join(bucket)),
		}
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn path_for(&self, key: &str) -> PathBuf {
		key.split('/')
			.filter(|part| !part.is_empty() && *part != "." && *part != "..")
			.fold(self.root.clone(), |path, part| path.join(part))
	}
}

#[async_trait]
impl SessionStore for FsStore {
	async fn put(&self, key: &str, data: &[u8]) -> StoreResult<()> {
		let path = self.path_for(key);
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).await.map_err(|e| StoreError::io(parent, e))?;
		}
		let tmp = path.with_extension("partial");
		fs::write(&tmp, data).await.map_err(|e| StoreError::io(&tmp, e))?;
		fs::rename(&tmp, &path).await.map_err(|e| StoreError::io(&path, e))?;
		debug!(target = "chatgate.store", path = %path.display(), bytes = data.len(), "wrote session object");
		Ok(())
	}

	async fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
		let path = self.path_for(key);
		match fs::read(&path).await {
			Ok(data) => Ok(data),
			Err(err) if err.kind() == ErrorKind::NotFound => Err(StoreError::NotFound { key: key.to_string() }),
			Err(err) => Err(StoreError::io(path, err)),
		}
	}

	async fn head(&self, key: &str) -> StoreResult<bool> {
		let path = self.path_for(key);
		fs::try_exists(&path).await.map_err(|e| StoreError::io(path, e))
	}

	async fn delete(&self, key: &str) -> StoreResult<()> {
		let path = self.path_for(key);
		match fs::remove_file(&path).await {
			Ok(()) => Ok(()),
			Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
			Err(err) => Err(StoreError::io(path, err)),
		}
	}
}

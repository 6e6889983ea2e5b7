use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tracing::debug;

use super::SessionStore;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Plain REST object store: `PUT/GET/HEAD/DELETE {endpoint}/{bucket}/{key}`.
///
/// Authenticates with an optional bearer token and does not sign requests,
/// so it cannot talk to AWS S3 directly; use [`S3Store`](super::S3Store) for that.
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
	client: Client,
	base_url: String,
	token: Option<String>,
}

impl HttpObjectStore {
	pub fn from_config(config: &StoreConfig) -> StoreResult<Self> {
		let bucket = config.bucket.trim().trim_matches('/');
		if bucket.is_empty() {
			return Err(StoreError::Config("bucket name is required".into()));
		}

		let Some(endpoint) = config.endpoint.as_deref().map(|e| e.trim_end_matches('/')).filter(|e| !e.is_empty()) else {
			return Err(StoreError::Config("endpoint is required for the http store".into()));
		};

		let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
		Ok(Self {
			client,
			base_url: format!("{endpoint}/{bucket}"),
			token: config.access_token.clone(),
		})
	}

	pub fn url_for(&self, key: &str) -> String {
		format!("{}/{}", self.base_url, key.trim_start_matches('/'))
	}

	fn request(&self, method: Method, key: &str) -> RequestBuilder {
		let mut request = self.client.request(method, self.url_for(key));
		if let Some(token) = &self.token {
			request = request.header(AUTHORIZATION, format!("Bearer {token}"));
		}
		request
	}

	fn check(response: Response, key: &str) -> StoreResult<Response> {
		let status = response.status();
		if status == StatusCode::NOT_FOUND {
			return Err(StoreError::NotFound { key: key.to_string() });
		}
		if !status.is_success() {
			return Err(StoreError::Status {
				status: status.as_u16(),
				key: key.to_string(),
			});
		}
		Ok(response)
	}
}

#[async_trait]
impl SessionStore for HttpObjectStore {
	async fn put(&self, key: &str, data: &[u8]) -> StoreResult<()> {
		let response = self
			.request(Method::PUT, key)
			.header(CONTENT_TYPE, "application/zip")
			.body(data.to_vec())
			.send()
			.await?;
		Self::check(response, key)?;
		debug!(target = "chatgate.store", key, bytes = data.len(), "uploaded session object");
		Ok(())
	}

	async fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
		let response = Self::check(self.request(Method::GET, key).send().await?, key)?;
		Ok(response.bytes().await?.to_vec())
	}

	async fn head(&self, key: &str) -> StoreResult<bool> {
		match Self::check(self.request(Method::HEAD, key).send().await?, key) {
			Ok(_) => Ok(true),
			Err(StoreError::NotFound { .. }) => Ok(false),
			Err(err) => Err(err),
		}
	}

	async fn delete(&self, key: &str) -> StoreResult<()> {
		match Self::check(self.request(Method::DELETE, key).send().await?, key) {
			Ok(_) | Err(StoreError::NotFound { .. }) => Ok(()),
			Err(err) => Err(err),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;
	use std::sync::Arc;

	use axum::Router;
	use axum::body::Bytes;
	use axum::extract::{Path, State};
	use axum::http::{HeaderMap, Method as AxumMethod, StatusCode as AxumStatus};
	use axum::routing::any;
	use parking_lot::Mutex;

	use super::*;

	#[derive(Clone, Default)]
	struct Bucket {
		objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
		seen_auth: Arc<Mutex<Vec<String>>>,
	}

	async fn object(
		State(bucket): State<Bucket>,
		Path((name, key)): Path<(String, String)>,
		method: AxumMethod,
		headers: HeaderMap,
		body: Bytes,
	) -> (AxumStatus, Vec<u8>) {
		if name != "auth" {
			return (AxumStatus::FORBIDDEN, Vec::new());
		}
		if let Some(value) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
			bucket.seen_auth.lock().push(value.to_string());
		}
		let mut objects = bucket.objects.lock();
		match method {
			AxumMethod::PUT => {
				objects.insert(key, body.to_vec());
				(AxumStatus::OK, Vec::new())
			}
			AxumMethod::GET | AxumMethod::HEAD => match objects.get(&key) {
				Some(data) => (AxumStatus::OK, data.clone()),
				None => (AxumStatus::NOT_FOUND, Vec::new()),
			},
			AxumMethod::DELETE => match objects.remove(&key) {
				Some(_) => (AxumStatus::NO_CONTENT, Vec::new()),
				None => (AxumStatus::NOT_FOUND, Vec::new()),
			},
			_ => (AxumStatus::METHOD_NOT_ALLOWED, Vec::new()),
		}
	}

	async fn serve(bucket: Bucket) -> String {
		let app = Router::new().route("/{bucket}/{*key}", any(object)).with_state(bucket);
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			axum::serve(listener, app).await.unwrap();
		});
		format!("http://{addr}")
	}

	fn config(endpoint: String, bucket: &str) -> StoreConfig {
		StoreConfig {
			bucket: bucket.into(),
			endpoint: Some(endpoint),
			access_token: Some("secret".into()),
			..Default::default()
		}
	}

	#[tokio::test]
	async fn object_lifecycle_against_server() {
		let bucket = Bucket::default();
		let store = HttpObjectStore::from_config(&config(serve(bucket.clone()).await, "auth")).unwrap();
		let key = "prod/RemoteAuth-shop.zip";

		assert!(!store.head(key).await.unwrap());
		assert!(matches!(store.get(key).await, Err(StoreError::NotFound { .. })));

		store.put(key, b"bundle").await.unwrap();
		assert!(store.head(key).await.unwrap());
		assert_eq!(store.get(key).await.unwrap(), b"bundle");
		assert!(bucket.objects.lock().contains_key(key));

		store.delete(key).await.unwrap();
		store.delete(key).await.unwrap();
		assert!(!store.head(key).await.unwrap());
		assert!(bucket.seen_auth.lock().iter().all(|v| v == "Bearer secret"));
	}

	#[tokio::test]
	async fn non_success_status_is_an_error() {
		let store = HttpObjectStore::from_config(&config(serve(Bucket::default()).await, "other")).unwrap();
		match store.put("k", b"x").await {
			Err(StoreError::Status { status, key }) => {
				assert_eq!(status, 403);
				assert_eq!(key, "k");
			}
			other => panic!("expected status error, got {other:?}"),
		}
		assert!(store.head("k").await.is_err());
	}

	#[test]
	fn endpoint_is_required() {
		let store = HttpObjectStore::from_config(&StoreConfig {
			bucket: "auth".into(),
			endpoint: Some("https://objects.internal/".into()),
			..Default::default()
		})
		.unwrap();
		assert_eq!(store.url_for("/a/b.zip"), "https://objects.internal/auth/a/b.zip");

		let region_only = StoreConfig {
			bucket: "auth".into(),
			region: Some("us-east-2".into()),
			..Default::default()
		};
		assert!(matches!(HttpObjectStore::from_config(&region_only), Err(StoreError::Config(_))));
	}
}

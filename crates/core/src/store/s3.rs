use async_trait::async_trait;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use tracing::debug;

use super::SessionStore;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};

/// AWS S3 bucket accessed with SigV4-signed requests.
///
/// Static credentials come from the config; without them the AWS instance
/// credential chain is used. `endpoint` targets an S3-compatible service.
#[derive(Debug)]
pub struct S3Store {
	bucket: String,
	inner: AmazonS3,
}

impl S3Store {
	pub fn from_config(config: &StoreConfig) -> StoreResult<Self> {
		let bucket = config.bucket.trim().trim_matches('/');
		if bucket.is_empty() {
			return Err(StoreError::Config("bucket name is required".into()));
		}
		let Some(region) = config.region.as_deref().filter(|r| !r.trim().is_empty()) else {
			return Err(StoreError::Config("region is required for the s3 store".into()));
		};

		let mut builder = AmazonS3Builder::new().with_bucket_name(bucket).with_region(region);
		match (&config.access_key_id, &config.secret_access_key) {
			(Some(key_id), Some(secret)) => {
				builder = builder.with_access_key_id(key_id).with_secret_access_key(secret);
			}
			(None, None) => {}
			_ => return Err(StoreError::Config("access key id and secret access key must be set together".into())),
		}
		if let Some(endpoint) = &config.endpoint {
			builder = builder.with_endpoint(endpoint.trim_end_matches('/')).with_allow_http(endpoint.starts_with("http://"));
		}

		Ok(Self {
			bucket: bucket.to_string(),
			inner: builder.build()?,
		})
	}

	pub fn bucket(&self) -> &str {
		&self.bucket
	}

	fn not_found(err: object_store::Error, key: &str) -> StoreError {
		match err {
			object_store::Error::NotFound { .. } => StoreError::NotFound { key: key.to_string() },
			other => StoreError::ObjectStore(other),
		}
	}
}

#[async_trait]
impl SessionStore for S3Store {
	async fn put(&self, key: &str, data: &[u8]) -> StoreResult<()> {
		self.inner.put(&Path::from(key), PutPayload::from(data.to_vec())).await?;
		debug!(target = "chatgate.store", bucket = %self.bucket, key, bytes = data.len(), "uploaded session object");
		Ok(())
	}

	async fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
		let object = self.inner.get(&Path::from(key)).await.map_err(|e| Self::not_found(e, key))?;
		let bytes = object.bytes().await.map_err(|e| Self::not_found(e, key))?;
		Ok(bytes.to_vec())
	}

	async fn head(&self, key: &str) -> StoreResult<bool> {
		match self.inner.head(&Path::from(key)).await {
			Ok(_) => Ok(true),
			Err(object_store::Error::NotFound { .. }) => Ok(false),
			Err(err) => Err(err.into()),
		}
	}

	async fn delete(&self, key: &str) -> StoreResult<()> {
		match self.inner.delete(&Path::from(key)).await {
			Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
			Err(err) => Err(err.into()),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;
	use std::sync::Arc;

	use axum::Router;
	use axum::body::{Body, Bytes};
	use axum::extract::{Path as UrlPath, State};
	use axum::http::{HeaderMap, Method, Response, StatusCode};
	use axum::routing::any;
	use parking_lot::Mutex;

	use super::*;

	const LAST_MODIFIED: &str = "Wed, 21 Oct 2015 07:28:00 GMT";

	/// Minimal path-style S3 bucket that records the authorization scheme of each request.
	#[derive(Clone, Default)]
	struct Bucket {
		objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
		signed: Arc<Mutex<Vec<bool>>>,
	}

	async fn object(
		State(bucket): State<Bucket>,
		UrlPath((name, key)): UrlPath<(String, String)>,
		method: Method,
		headers: HeaderMap,
		body: Bytes,
	) -> Response<Body> {
		let signed = headers
			.get("authorization")
			.and_then(|v| v.to_str().ok())
			.is_some_and(|v| v.starts_with("AWS4-HMAC-SHA256 Credential=AKIDTEST/"));
		bucket.signed.lock().push(signed);

		let builder = Response::builder();
		if name != "auth" {
			return builder.status(StatusCode::FORBIDDEN).body(Body::empty()).unwrap();
		}

		let mut objects = bucket.objects.lock();
		match method {
			Method::PUT => {
				objects.insert(key, body.to_vec());
				builder.status(StatusCode::OK).header("etag", "\"1\"").body(Body::empty()).unwrap()
			}
			Method::GET | Method::HEAD => match objects.get(&key) {
				Some(data) => {
					let builder = builder
						.status(StatusCode::OK)
						.header("etag", "\"1\"")
						.header("last-modified", LAST_MODIFIED)
						.header("content-length", data.len());
					let body = if method == Method::GET { Body::from(data.clone()) } else { Body::empty() };
					builder.body(body).unwrap()
				}
				None => builder.status(StatusCode::NOT_FOUND).body(Body::empty()).unwrap(),
			},
			Method::DELETE => {
				objects.remove(&key);
				builder.status(StatusCode::NO_CONTENT).body(Body::empty()).unwrap()
			}
			_ => builder.status(StatusCode::METHOD_NOT_ALLOWED).body(Body::empty()).unwrap(),
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

	fn config(endpoint: Option<String>) -> StoreConfig {
		StoreConfig {
			bucket: "auth".into(),
			region: Some("eu-west-1".into()),
			endpoint,
			access_key_id: Some("AKIDTEST".into()),
			secret_access_key: Some("secret".into()),
			..Default::default()
		}
	}

	#[tokio::test]
	async fn signed_object_lifecycle() {
		let bucket = Bucket::default();
		let store = S3Store::from_config(&config(Some(serve(bucket.clone()).await))).unwrap();
		let key = "prod/RemoteAuth-shop.zip";

		assert!(!store.head(key).await.unwrap());
		assert!(matches!(store.get(key).await, Err(StoreError::NotFound { .. })));

		store.put(key, b"bundle").await.unwrap();
		assert!(store.head(key).await.unwrap());
		assert_eq!(store.get(key).await.unwrap(), b"bundle");
		assert!(bucket.objects.lock().contains_key(key));

		store.delete(key).await.unwrap();
		assert!(!store.head(key).await.unwrap());
		assert!(bucket.signed.lock().iter().all(|signed| *signed));
	}

	#[test]
	fn config_requires_bucket_region_and_paired_keys() {
		assert!(S3Store::from_config(&config(None)).is_ok());
		assert_eq!(S3Store::from_config(&config(None)).unwrap().bucket(), "auth");

		let mut missing_region = config(None);
		missing_region.region = None;
		assert!(matches!(S3Store::from_config(&missing_region), Err(StoreError::Config(_))));

		let mut half_keys = config(None);
		half_keys.secret_access_key = None;
		assert!(matches!(S3Store::from_config(&half_keys), Err(StoreError::Config(_))));

		let mut no_bucket = config(None);
		no_bucket.bucket = " / ".into();
		assert!(matches!(S3Store::from_config(&no_bucket), Err(StoreError::Config(_))));
	}
}

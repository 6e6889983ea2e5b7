use axum::Json;
use axum::response::{IntoResponse, Response};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Uniform body of every HTTP response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
	pub success: bool,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	/// Machine-readable error code.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	/// RFC 3339, UTC.
	pub timestamp: String,
}

impl<T> ApiResponse<T> {
	pub fn success(message: impl Into<String>, data: T) -> Self {
		Self {
			success: true,
			message: message.into(),
			data: Some(data),
			error: None,
			timestamp: now(),
		}
	}
}

impl ApiResponse<()> {
	pub fn failure(message: impl Into<String>, code: &str) -> Self {
		Self {
			success: false,
			message: message.into(),
			data: None,
			error: Some(code.to_string()),
			timestamp: now(),
		}
	}
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
	fn into_response(self) -> Response {
		Json(self).into_response()
	}
}

fn now() -> String {
	Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn success_and_failure_shapes() {
		let ok = serde_json::to_value(ApiResponse::success("done", 7)).unwrap();
		assert_eq!(ok["success"], true);
		assert_eq!(ok["data"], 7);
		assert!(ok.get("error").is_none());
		assert!(ok["timestamp"].as_str().unwrap().ends_with('Z'));

		let err = serde_json::to_value(ApiResponse::failure("nope", "not_ready")).unwrap();
		assert_eq!(err["success"], false);
		assert_eq!(err["error"], "not_ready");
		assert!(err.get("data").is_none());
	}
}

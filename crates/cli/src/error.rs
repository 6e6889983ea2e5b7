use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::warn;

use crate::http::envelope::ApiResponse;

/// Handler failure, rendered as an error envelope.
#[derive(Debug, Error)]
pub enum ApiError {
	#[error("{0}")]
	Validation(String),

	#[error("route {0} not found")]
	NotFound(String),

	#[error(transparent)]
	Client(#[from] chatgate::Error),
}

impl ApiError {
	pub fn status(&self) -> StatusCode {
		match self {
			Self::Validation(_) => StatusCode::BAD_REQUEST,
			Self::NotFound(_) => StatusCode::NOT_FOUND,
			Self::Client(err) if err.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
			Self::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	pub fn code(&self) -> &'static str {
		use chatgate::Error as E;
		match self {
			Self::Validation(_) => "validation_error",
			Self::NotFound(_) => "not_found",
			Self::Client(E::NotInitialized) => "not_initialized",
			Self::Client(E::NotReady(_)) => "not_ready",
			Self::Client(E::SendExhausted { .. }) => "send_exhausted",
			Self::Client(E::ReconnectExhausted { .. }) => "reconnect_exhausted",
			Self::Client(E::Engine(_) | E::TeardownFailed(_)) => "engine_error",
			Self::Client(E::Store(_) | E::StorePersistenceFailed(_)) => "store_error",
			Self::Client(E::Config(_)) => "config_error",
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = self.status();
		if status.is_server_error() {
			warn!(target = "chatgate.http", status = status.as_u16(), error = %self, "request failed");
		}
		(status, ApiResponse::failure(self.to_string(), self.code())).into_response()
	}
}

#[cfg(test)]
mod tests {
	use chatgate_runtime::EngineError;

	use super::*;

	#[test]
	fn readiness_errors_are_service_unavailable() {
		for err in [
			chatgate::Error::NotInitialized,
			chatgate::Error::NotReady("scan".into()),
			chatgate::Error::SendExhausted { attempts: 3 },
			chatgate::Error::ReconnectExhausted { attempts: 5 },
		] {
			assert_eq!(ApiError::from(err).status(), StatusCode::SERVICE_UNAVAILABLE);
		}
	}

	#[test]
	fn engine_failures_are_internal() {
		let err = ApiError::from(chatgate::Error::Engine(EngineError::ChannelClosed));
		assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(err.code(), "engine_error");
		assert_eq!(ApiError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
	}
}

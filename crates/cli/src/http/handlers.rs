use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::Uri;
use chatgate::StatusSnapshot;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;

use super::AppState;
use super::envelope::ApiResponse;
use super::validate::validate_send;
use crate::error::ApiError;

/// Body of a successful `POST /send`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
	pub to: String,
	pub message: String,
	pub message_id: String,
}

pub async fn index() -> ApiResponse<Value> {
	ApiResponse::success(
		"chatgate is running",
		json!({
			"name": "chatgate",
			"version": env!("CARGO_PKG_VERSION"),
			"endpoints": {
				"GET /api/whatsapp/status": "Current session status",
				"POST /api/whatsapp/init": "Start the session (scan the issued code to authorize)",
				"POST /api/whatsapp/send": "Send a message: {number, message}",
				"POST /api/whatsapp/disconnect": "Tear the session down",
				"POST /api/whatsapp/reconnect": "Replace a session that is not ready",
				"POST /api/whatsapp/logout": "Disconnect and delete persisted credentials",
			}
		}),
	)
}

pub async fn status(State(state): State<AppState>) -> ApiResponse<StatusSnapshot> {
	ApiResponse::success("Status retrieved", state.manager.status())
}

pub async fn init(State(state): State<AppState>) -> ApiResponse<StatusSnapshot> {
	let before = state.manager.status();
	if before.state.is_live() {
		return ApiResponse::success("Client already initialized", before);
	}

	let status = state.manager.init().await;
	let message = match status.last_disconnect_reason.as_deref() {
		Some(reason) if status.state.is_idle() => format!("Client failed to start: {reason}"),
		_ => "Client initialized; scan the issued code if prompted".to_string(),
	};
	ApiResponse::success(message, status)
}

pub async fn send(State(state): State<AppState>, payload: Result<Json<Value>, JsonRejection>) -> Result<ApiResponse<SentMessage>, ApiError> {
	let Json(body) = payload.map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
	let request = validate_send(&body)?;

	let receipt = state.manager.send_message(&request.number, &request.message).await?;
	info!(target = "chatgate.http", to = %receipt.to, message_id = %receipt.message_id, "message sent");
	Ok(ApiResponse::success(
		"Message sent",
		SentMessage {
			to: request.number,
			message: request.message,
			message_id: receipt.message_id,
		},
	))
}

pub async fn disconnect(State(state): State<AppState>) -> ApiResponse<StatusSnapshot> {
	ApiResponse::success("Client disconnected", state.manager.disconnect().await)
}

pub async fn reconnect(State(state): State<AppState>) -> ApiResponse<StatusSnapshot> {
	let before = state.manager.status();
	if before.is_ready() {
		return ApiResponse::success("Client already ready", before);
	}
	ApiResponse::success("Reconnecting", state.manager.force_reconnect().await)
}

pub async fn logout(State(state): State<AppState>) -> Result<ApiResponse<StatusSnapshot>, ApiError> {
	let status = state.manager.logout().await?;
	Ok(ApiResponse::success("Logged out; persisted session deleted", status))
}

pub async fn not_found(uri: Uri) -> ApiError {
	ApiError::NotFound(uri.path().to_string())
}

//! Connection state and the status snapshot reported to callers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Authoritative lifecycle state of the single managed session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
	#[default]
	Uninitialized,
	Initializing,
	AwaitingScan,
	Ready,
	Disconnecting,
	Disconnected,
}

impl ConnectionState {
	/// Returns `true` while a session is being established or is usable.
	///
	/// `init()` is a no-op in these states.
	pub fn is_live(self) -> bool {
		matches!(self, Self::Initializing | Self::AwaitingScan | Self::Ready)
	}

	/// Returns `true` when no session exists and a fresh `init()` is required.
	pub fn is_idle(self) -> bool {
		matches!(self, Self::Uninitialized | Self::Disconnected)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Uninitialized => "uninitialized",
			Self::Initializing => "initializing",
			Self::AwaitingScan => "awaiting_scan",
			Self::Ready => "ready",
			Self::Disconnecting => "disconnecting",
			Self::Disconnected => "disconnected",
		}
	}
}

impl fmt::Display for ConnectionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Point-in-time view of the lifecycle manager.
///
/// Serialized in camelCase for the HTTP surface:
///
/// ```json
/// {
///   "state": "awaiting_scan",
///   "hasSession": true,
///   "pendingQr": "2@abc...",
///   "lastDisconnectReason": null,
///   "attemptCount": 0,
///   "reconnectExhausted": false,
///   "lastStoreError": null,
///   "sessionId": "default"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
	pub state: ConnectionState,
	pub has_session: bool,
	pub pending_qr: Option<String>,
	pub last_disconnect_reason: Option<String>,
	pub attempt_count: u32,
	pub reconnect_exhausted: bool,
	pub last_store_error: Option<String>,
	pub session_id: String,
}

impl StatusSnapshot {
	pub fn is_ready(&self) -> bool {
		self.state == ConnectionState::Ready
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn state_serializes_snake_case() {
		let json = serde_json::to_string(&ConnectionState::AwaitingScan).unwrap();
		assert_eq!(json, "\"awaiting_scan\"");
		assert_eq!(ConnectionState::AwaitingScan.to_string(), "awaiting_scan");
	}

	#[test]
	fn live_and_idle_partition() {
		for state in [ConnectionState::Initializing, ConnectionState::AwaitingScan, ConnectionState::Ready] {
			assert!(state.is_live());
			assert!(!state.is_idle());
		}
		for state in [ConnectionState::Uninitialized, ConnectionState::Disconnected] {
			assert!(state.is_idle());
			assert!(!state.is_live());
		}
		assert!(!ConnectionState::Disconnecting.is_live());
		assert!(!ConnectionState::Disconnecting.is_idle());
	}

	#[test]
	fn snapshot_uses_camel_case_keys() {
		let snapshot = StatusSnapshot {
			state: ConnectionState::Ready,
			has_session: true,
			session_id: "main".into(),
			..Default::default()
		};
		let value = serde_json::to_value(&snapshot).unwrap();
		assert_eq!(value["state"], "ready");
		assert_eq!(value["hasSession"], true);
		assert!(value["pendingQr"].is_null());
		assert_eq!(value["sessionId"], "main");
	}
}

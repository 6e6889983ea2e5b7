//! Newline-delimited JSON protocol spoken with an external engine process.
//!
//! Every message is one JSON object per line, discriminated by `type`.
//!
//! Host to engine:
//! ```json
//! {"type":"start","session_id":"default","credentials":null}
//! {"type":"send","id":0,"to":"5551234567@c.us","body":"hi"}
//! {"type":"shutdown"}
//! ```
//!
//! Engine to host (events and replies share one stream):
//! ```json
//! {"type":"qr","code":"2@abc"}
//! {"type":"ready"}
//! {"type":"credentials","data":"UEsDBBQ..."}
//! {"type":"sent","id":0,"message_id":"true_5551234567@c.us_3EB0","timestamp":1700000000}
//! {"type":"failed","id":1,"message":"chat not found"}
//! {"type":"disconnected","reason":"NAVIGATION"}
//! ```

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::address::ChatAddress;

/// Request written by the host to the engine's stdin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeRequest {
	/// Boots the engine, optionally restoring base64 auth material.
	Start { session_id: String, credentials: Option<String> },
	Send { id: u32, to: ChatAddress, body: String },
	Shutdown,
}

/// Message read by the host from the engine's stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
	Qr { code: String },
	Ready,
	Disconnected { reason: String },
	/// Updated auth material (base64) that should be persisted.
	Credentials { data: String },
	Sent {
		id: u32,
		message_id: String,
		#[serde(default)]
		timestamp: Option<u64>,
	},
	Failed { id: u32, message: String },
}

impl BridgeMessage {
	/// Returns the correlated request id for replies, `None` for events.
	pub fn reply_id(&self) -> Option<u32> {
		match self {
			Self::Sent { id, .. } | Self::Failed { id, .. } => Some(*id),
			_ => None,
		}
	}
}

pub fn encode_credentials(data: &[u8]) -> String {
	STANDARD.encode(data)
}

pub fn decode_credentials(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
	STANDARD.decode(data.trim())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn request_lines_are_tagged() {
		let line = serde_json::to_string(&BridgeRequest::Send {
			id: 7,
			to: ChatAddress::new("5551234567"),
			body: "hi".into(),
		})
		.unwrap();
		assert_eq!(line, r#"{"type":"send","id":7,"to":"5551234567@c.us","body":"hi"}"#);

		let shutdown = serde_json::to_string(&BridgeRequest::Shutdown).unwrap();
		assert_eq!(shutdown, r#"{"type":"shutdown"}"#);
	}

	#[test]
	fn events_and_replies_parse_from_one_stream() {
		let lines = [
			r#"{"type":"qr","code":"ABC"}"#,
			r#"{"type":"ready"}"#,
			r#"{"type":"sent","id":3,"message_id":"m-1"}"#,
			r#"{"type":"disconnected","reason":"LOST"}"#,
		];
		let parsed: Vec<BridgeMessage> = lines.iter().map(|l| serde_json::from_str(l).unwrap()).collect();

		assert_eq!(parsed[0], BridgeMessage::Qr { code: "ABC".into() });
		assert_eq!(parsed[1], BridgeMessage::Ready);
		assert_eq!(parsed[2].reply_id(), Some(3));
		assert_eq!(
			parsed[2],
			BridgeMessage::Sent {
				id: 3,
				message_id: "m-1".into(),
				timestamp: None
			}
		);
		assert_eq!(parsed[3].reply_id(), None);
	}

	#[test]
	fn credentials_survive_base64() {
		let raw = b"PK\x03\x04session".to_vec();
		let encoded = encode_credentials(&raw);
		assert_eq!(decode_credentials(&encoded).unwrap(), raw);
		assert!(decode_credentials("not base64!").is_err());
	}
}

use serde::{Deserialize, Serialize};

use crate::address::ChatAddress;

/// Acknowledgement returned by the session engine for an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceipt {
	/// Engine-assigned serialized message id.
	pub message_id: String,
	pub to: ChatAddress,
	/// Unix seconds reported by the engine, when it provides one.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub timestamp: Option<u64>,
}

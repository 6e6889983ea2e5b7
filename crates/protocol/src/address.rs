//! Chat addressing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Suffix the messaging network uses for individual user chats.
pub const USER_CHAT_SUFFIX: &str = "@c.us";

/// Normalized recipient address understood by the session engine.
///
/// Bare numbers are addressed as user chats (`5551234567@c.us`); addresses
/// that already carry a `@` server part are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatAddress(String);

impl ChatAddress {
	pub fn new(recipient: impl AsRef<str>) -> Self {
		let recipient = recipient.as_ref().trim();
		if recipient.contains('@') {
			Self(recipient.to_string())
		} else {
			Self(format!("{recipient}{USER_CHAT_SUFFIX}"))
		}
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Returns the part before `@`, usually the phone number.
	pub fn user(&self) -> &str {
		self.0.split_once('@').map_or(self.0.as_str(), |(user, _)| user)
	}
}

impl fmt::Display for ChatAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for ChatAddress {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bare_number_gets_user_suffix() {
		let address = ChatAddress::new("5551234567");
		assert_eq!(address.as_str(), "5551234567@c.us");
		assert_eq!(address.user(), "5551234567");
	}

	#[test]
	fn qualified_address_is_kept() {
		let address = ChatAddress::new(" 120363@g.us ");
		assert_eq!(address.as_str(), "120363@g.us");
		assert_eq!(address.user(), "120363");
	}
}

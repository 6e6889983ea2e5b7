//! Validation of `POST /send` bodies.

use serde_json::Value;

use crate::error::ApiError;

pub const MIN_NUMBER_DIGITS: usize = 9;
pub const MAX_NUMBER_DIGITS: usize = 11;
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// A send request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
	/// Digits only.
	pub number: String,
	/// Trimmed.
	pub message: String,
}

pub fn validate_send(body: &Value) -> Result<SendRequest, ApiError> {
	let number = match body.get("number") {
		Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
		Some(Value::Number(n)) => n.to_string(),
		_ => return Err(required()),
	};
	let message = match body.get("message") {
		Some(Value::String(s)) if !s.is_empty() => s,
		Some(Value::String(_) | Value::Null) | None => return Err(required()),
		Some(_) => return Err(ApiError::Validation("message must be a string".into())),
	};

	let digits: String = number.chars().filter(char::is_ascii_digit).collect();
	if !(MIN_NUMBER_DIGITS..=MAX_NUMBER_DIGITS).contains(&digits.len()) {
		return Err(ApiError::Validation(format!(
			"phone number must have between {MIN_NUMBER_DIGITS} and {MAX_NUMBER_DIGITS} digits"
		)));
	}

	let message = message.trim();
	if message.is_empty() {
		return Err(ApiError::Validation("message must not be blank".into()));
	}
	if message.chars().count() > MAX_MESSAGE_CHARS {
		return Err(ApiError::Validation(format!("message must not exceed {MAX_MESSAGE_CHARS} characters")));
	}

	Ok(SendRequest {
		number: digits,
		message: message.to_string(),
	})
}

fn required() -> ApiError {
	ApiError::Validation("number and message fields are required".into())
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn message_of(result: Result<SendRequest, ApiError>) -> String {
		match result {
			Err(ApiError::Validation(message)) => message,
			other => panic!("expected validation error, got {other:?}"),
		}
	}

	#[test]
	fn normalizes_number_and_trims_message() {
		let request = validate_send(&json!({"number": "+1 (555) 123-4567", "message": "  hi there \n"})).unwrap();
		assert_eq!(request.number, "15551234567");
		assert_eq!(request.message, "hi there");

		let request = validate_send(&json!({"number": 555123456, "message": "x"})).unwrap();
		assert_eq!(request.number, "555123456");
	}

	#[test]
	fn missing_fields_are_required() {
		assert!(message_of(validate_send(&json!({}))).contains("required"));
		assert!(message_of(validate_send(&json!({"number": "5551234567"}))).contains("required"));
		assert!(message_of(validate_send(&json!({"number": "", "message": "x"}))).contains("required"));
		assert!(message_of(validate_send(&json!({"number": "5551234567", "message": ""}))).contains("required"));
	}

	#[test]
	fn digit_count_bounds() {
		assert!(validate_send(&json!({"number": "12345678", "message": "x"})).is_err());
		assert!(validate_send(&json!({"number": "123456789", "message": "x"})).is_ok());
		assert!(validate_send(&json!({"number": "12345678901", "message": "x"})).is_ok());
		assert!(validate_send(&json!({"number": "123456789012", "message": "x"})).is_err());
	}

	#[test]
	fn message_rules() {
		assert!(message_of(validate_send(&json!({"number": "5551234567", "message": 5}))).contains("string"));
		assert!(message_of(validate_send(&json!({"number": "5551234567", "message": "   "}))).contains("blank"));

		let limit = "a".repeat(MAX_MESSAGE_CHARS);
		assert!(validate_send(&json!({"number": "5551234567", "message": limit})).is_ok());
		let over = "ñ".repeat(MAX_MESSAGE_CHARS + 1);
		assert!(message_of(validate_send(&json!({"number": "5551234567", "message": over}))).contains("4096"));
	}
}

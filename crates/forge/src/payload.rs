//! Decoding of verified webhook bodies.

use pipeline::{EventPayload, ForgebotError};
use serde_json::Value;

/// Decodes a verified webhook body into a payload map.
///
/// The body must be a JSON object; arrays, scalars and invalid JSON are all
/// `Decode` errors.
pub fn decode_payload(body: &[u8]) -> Result<EventPayload, ForgebotError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ForgebotError::decode(format!(
            "expected a JSON object, found {}",
            json_kind(&other)
        ))),
        Err(e) => Err(ForgebotError::decode(format!("invalid JSON: {e}"))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

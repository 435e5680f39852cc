// crates/farm-protocol/src/codec.rs

//! Line decoding for incoming requests.
//!
//! Decoding is two-stage: the line is first parsed as a generic JSON value
//! to recover the `requestId`, then the same value is decoded into a typed
//! [`Request`]. This way a request with a bad payload still produces an
//! error response carrying the caller's correlation id, and only a line
//! that is not JSON at all falls back to a `null` id.

use serde_json::Value;

use crate::wire::Request;

/// All request type tags the server understands.
const KNOWN_TYPES: &[&str] = &[
    "SIGNUP",
    "LOGIN",
    "PLANT",
    "HARVEST",
    "STEAL",
    "ADD_FRIEND",
    "LIST_FRIENDS",
    "VISIT_FARM",
    "PING",
];

/// Why a line failed to decode. `Display` is the wire `msg`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The line is not a JSON object.
    Malformed,
    /// No `type` field.
    MissingType,
    /// A `type` the server does not understand.
    UnknownType,
    /// Known type, but the payload fields are missing or mistyped.
    BadFields,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            DecodeError::Malformed => "bad request: malformed json",
            DecodeError::MissingType => "bad request: missing type",
            DecodeError::UnknownType => "unknown type",
            DecodeError::BadFields => "bad request",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for DecodeError {}

/// Result of decoding one line: whatever correlation id could be recovered,
/// plus either the typed request or the failure classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub request_id: Option<String>,
    pub result: Result<Request, DecodeError>,
}

/// Decode a single line of input.
pub fn decode_request(line: &str) -> Decoded {
    let value: Value = match serde_json::from_str(line) {
        Ok(Value::Object(map)) => Value::Object(map),
        _ => {
            return Decoded {
                request_id: None,
                result: Err(DecodeError::Malformed),
            }
        }
    };

    let request_id = id_text(value.get("requestId"));

    let type_tag = match value.get("type").and_then(Value::as_str) {
        Some(t) => t,
        None => {
            return Decoded {
                request_id,
                result: Err(DecodeError::MissingType),
            }
        }
    };

    if !KNOWN_TYPES.contains(&type_tag) {
        return Decoded {
            request_id,
            result: Err(DecodeError::UnknownType),
        };
    }

    let result = serde_json::from_value::<Request>(value).map_err(|_| DecodeError::BadFields);
    Decoded { request_id, result }
}

/// The correlation id as text: strings pass through, scalar ids are
/// stringified so they can be echoed, anything else is treated as absent.
fn id_text(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    }
}

//! Uniform result shape returned by every API call.

use serde_json::{json, Map, Value};

use crate::error::{SdkError, SdkResult};

/// Outcome of an API call.
///
/// Transport failures and server-reported errors both arrive as
/// [`ApiResponse::Error`], so callers inspect one value instead of handling
/// two error channels.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// The server's `data` payload, unwrapped.
    Data(Value),
    /// The server reported `"error": "success"` with no payload.
    Success,
    /// Classified failure.
    Error(ApiError),
}

/// Classified failure kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The request exceeded its deadline, or the gateway timed out.
    Timeout,
    /// The caller cancelled the request.
    Aborted,
    /// Network-layer failure or upstream gateway failure.
    RequestFailed,
    /// HTTP 503 from upstream.
    ServiceUnavailable,
    /// The body was not valid JSON.
    CannotParseData { response_data: String },
    /// The server's `error` value, verbatim.
    Server(Value),
}

impl ApiError {
    /// Wire-compatible value of the `error` field.
    pub fn error_value(&self) -> Value {
        match self {
            Self::Timeout => Value::from("timeout"),
            Self::Aborted => Value::from("aborted"),
            Self::RequestFailed => Value::from("request_failed"),
            Self::ServiceUnavailable => Value::from(503),
            Self::CannotParseData { .. } => Value::from("cannot_parse_data"),
            Self::Server(value) => value.clone(),
        }
    }

    /// Server string error, if that is what this is.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Server(Value::String(message)) => Some(message),
            _ => None,
        }
    }

    /// User-input validation errors are reported as `"ValidationError: ..."`
    /// and are meant to be shown on the page that sent the request.
    pub fn is_validation_error(&self) -> bool {
        self.server_message()
            .is_some_and(|message| message.starts_with("ValidationError:"))
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Server(Value::String(message)) => write!(f, "{message}"),
            other => write!(f, "{}", other.error_value()),
        }
    }
}

impl ApiResponse {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            Self::Error(error) => Some(error),
            _ => None,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Data(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_data(self) -> Option<Value> {
        match self {
            Self::Data(value) => Some(value),
            _ => None,
        }
    }

    /// The response in the JSON shape app code consumes:
    /// the bare payload, `{"result": "success"}`, or `{"error": ...}` (plus
    /// `responseData` for unparseable bodies).
    pub fn to_json(&self) -> Value {
        match self {
            Self::Data(value) => value.clone(),
            Self::Success => json!({ "result": "success" }),
            Self::Error(ApiError::CannotParseData { response_data }) => json!({
                "error": "cannot_parse_data",
                "responseData": response_data,
            }),
            Self::Error(error) => json!({ "error": error.error_value() }),
        }
    }

    /// Confirm a `Data` payload is an object with exactly `keys`.
    pub fn require_exact_keys(&self, keys: &[&str]) -> SdkResult<&Map<String, Value>> {
        let object = match self {
            Self::Data(Value::Object(object)) => object,
            other => {
                return Err(SdkError::UnexpectedShape(format!(
                    "expected an object payload, got {}",
                    other.to_json()
                )));
            }
        };
        if let Some(missing) = keys.iter().find(|key| !object.contains_key(**key)) {
            return Err(SdkError::UnexpectedShape(format!(
                "missing expected key `{missing}`"
            )));
        }
        if let Some(extra) = object.keys().find(|key| !keys.contains(&key.as_str())) {
            return Err(SdkError::UnexpectedShape(format!(
                "unexpected key `{extra}`; expected exactly [{}]",
                keys.join(", ")
            )));
        }
        Ok(object)
    }
}

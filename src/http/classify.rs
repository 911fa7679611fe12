//! Response classification: raw status + body → [`ApiResponse`].
//!
//! Transport-level outcomes (timeout, abort, network failure) are decided by
//! the executor before a body exists. Everything after that is here, and is a
//! pure function of its inputs.

use serde_json::Value;

use crate::response::{ApiError, ApiResponse};

/// HTML pages the upstream reverse proxy serves instead of JSON, matched on
/// their opening section after line breaks are removed.
pub const GATEWAY_PAGES: &[(&str, GatewayFailure)] = &[
    (
        "<html><head><title>502 Bad Gateway</title></head>",
        GatewayFailure::BadGateway,
    ),
    (
        "<html><head><title>504 Gateway Time-out</title></head>",
        GatewayFailure::GatewayTimeout,
    ),
];

/// What a recognised gateway page means for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayFailure {
    BadGateway,
    GatewayTimeout,
}

impl GatewayFailure {
    fn into_error(self) -> ApiError {
        match self {
            Self::BadGateway => ApiError::RequestFailed,
            Self::GatewayTimeout => ApiError::Timeout,
        }
    }
}

/// Match a body against [`GATEWAY_PAGES`].
pub fn match_gateway_page(body: &str) -> Option<GatewayFailure> {
    let flattened: String = body.chars().filter(|c| *c != '\r' && *c != '\n').collect();
    GATEWAY_PAGES
        .iter()
        .find(|(preamble, _)| flattened.starts_with(preamble))
        .map(|(_, failure)| *failure)
}

/// Classify a completed HTTP exchange.
pub fn classify_response(status: u16, body: &str) -> ApiResponse {
    if status == 503 {
        return ApiResponse::Error(ApiError::ServiceUnavailable);
    }

    if let Some(failure) = match_gateway_page(body) {
        return ApiResponse::Error(failure.into_error());
    }

    let parsed: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => {
            return ApiResponse::Error(ApiError::CannotParseData {
                response_data: body.to_string(),
            });
        }
    };

    // An absent `error` field counts as null.
    match parsed.get("error") {
        None | Some(Value::Null) => {
            ApiResponse::Data(parsed.get("data").cloned().unwrap_or(Value::Null))
        }
        Some(Value::String(s)) if s == "success" => ApiResponse::Success,
        Some(error) => ApiResponse::Error(ApiError::Server(error.clone())),
    }
}

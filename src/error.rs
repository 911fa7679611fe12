//! Unified SDK error types.
//!
//! Runtime outcomes of a request (timeouts, aborts, network failures, server
//! error values) are *not* errors here: they come back as
//! [`ApiResponse::Error`](crate::response::ApiResponse). `SdkError` is reserved
//! for mistakes in the calling code and for failures the client cannot classify.

use thiserror::Error;

/// Top-level SDK error.
#[derive(Error, Debug)]
pub enum SdkError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Credential store error: {0}")]
    CredentialStore(#[from] CredentialStoreError),

    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Programmer errors: the call can never succeed as written.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("apiSecret required for private API calls")]
    MissingApiSecret,

    #[error("'{method}' expects an argument property called {key}")]
    MissingArgument { method: &'static str, key: &'static str },

    #[error(
        "'{method}' expects exactly these argument properties: [{expected}], \
         and received this unexpected property: {key}"
    )]
    UnexpectedArgument {
        method: &'static str,
        expected: String,
        key: String,
    },

    #[error("'{method}' received a malformed argument: {reason}")]
    MalformedArgument { method: &'static str, reason: String },

    #[error("For HTTP method '{method}', parameters cannot be supplied")]
    ParamsNotAllowed { method: String },

    #[error("Private API calls must use POST, got '{method}'")]
    PrivateRequiresPost { method: String },

    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Errors raised by a [`CredentialStore`](crate::auth::CredentialStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialStoreError {
    #[error("No credentials stored under {0}")]
    NotFound(String),

    #[error("Credential backend failure: {0}")]
    Backend(String),
}

/// Result type alias for SDK operations.
pub type SdkResult<T> = Result<T, SdkError>;

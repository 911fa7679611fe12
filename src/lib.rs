//! # Solidi SDK
//!
//! A Rust client for the Solidi REST API.
//!
//! ## Architecture
//!
//! The SDK is organized in layers:
//!
//! 1. **Core**: Errors, network constants, configuration, response shapes
//! 2. **Auth**: Credentials, HMAC request signing, nonces, credential storage
//! 3. **HTTP**: The single request lane, the transport executor and response
//!    classification
//! 4. **Client**: `SolidiClient`, the facade applications call
//!
//! Every private call carries a nonce that must reach the server in increasing
//! order, so one client never has more than one request in flight.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use solidi_sdk::prelude::*;
//!
//! let client = SolidiClient::builder()
//!     .config(ClientConfig::builder().for_tier(Tier::Stag).build()?)
//!     .credentials(Credentials::new(api_key, api_secret))
//!     .build()?;
//!
//! let ticker = client.public_method(MethodCall::get("ticker")).await?;
//! let balance = client.private_method(MethodCall::post("balance")).await?;
//! match balance {
//!     ApiResponse::Data(data) => println!("{data}"),
//!     ApiResponse::Error(err) => eprintln!("balance failed: {err}"),
//!     ApiResponse::Success => {}
//! }
//! ```

// ── Layer 1: Core ────────────────────────────────────────────────────────────

/// Unified SDK error types.
pub mod error;

/// Network constants and deployment tiers.
pub mod network;

/// Client configuration and builder.
pub mod config;

/// Uniform response shape of every call.
pub mod response;

/// Tagged cancellation of in-flight calls.
pub mod cancel;

// ── Layer 2: Auth ────────────────────────────────────────────────────────────

/// Credentials, signing, nonces and credential storage.
pub mod auth;

// ── Layer 3: HTTP ────────────────────────────────────────────────────────────

/// Request lane, executor, classification and transport.
pub mod http;

// ── Layer 4: Client ──────────────────────────────────────────────────────────

/// `SolidiClient`, the primary entry point.
pub mod client;

// ── Prelude ──────────────────────────────────────────────────────────────────

pub mod prelude {
    // Client
    pub use crate::client::{HttpMethod, MethodCall, SolidiClient, SolidiClientBuilder};

    // Configuration + network
    pub use crate::config::{ClientConfig, ClientConfigBuilder, UrlMode};
    pub use crate::network::Tier;

    // Responses + errors
    pub use crate::error::{ConfigError, CredentialStoreError, SdkError, SdkResult};
    pub use crate::response::{ApiError, ApiResponse};

    // Auth
    pub use crate::auth::{
        credential_storage_key, CredentialStore, Credentials, MemoryCredentialStore,
        SessionObserver,
    };

    // Cancellation
    pub use crate::cancel::{route_tag, CancellationRegistry};
    pub use tokio_util::sync::CancellationToken;

    // Transport seam
    pub use crate::http::{HttpRequest, HttpResponse, Transport, TransportError};
}

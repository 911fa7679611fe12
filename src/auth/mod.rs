//! Authentication: API credentials, request signing, nonces, and the
//! collaborator traits the surrounding application implements.
//!
//! ## Security Model
//!
//! - The API secret is held as a [`SecretString`] and never logged or exposed
//!   through `Debug`.
//! - Credentials are replaced as a whole; the client never edits them.
//! - Persisting credentials is the application's job, through a
//!   [`CredentialStore`] (typically the platform keychain).

pub mod nonce;
pub mod signer;

use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{CredentialStoreError, SdkError, SdkResult};
use crate::network::Tier;
use crate::response::ApiError;

pub use nonce::NonceState;
pub use signer::RequestSigner;

// ============================================================================
// Credentials
// ============================================================================

/// API key and secret for private calls.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    api_secret: SecretString,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: SecretString::from(api_secret.into()),
        }
    }

    /// Read `SOLIDI_API_KEY` and `SOLIDI_API_SECRET`.
    pub fn from_env() -> SdkResult<Self> {
        let read = |name: &str| {
            env::var(name).map_err(|_| {
                SdkError::CredentialStore(CredentialStoreError::NotFound(name.to_string()))
            })
        };
        Ok(Self::new(read("SOLIDI_API_KEY")?, read("SOLIDI_API_SECRET")?))
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn api_secret(&self) -> &SecretString {
        &self.api_secret
    }

    /// Whether a non-empty secret is present.
    pub fn has_secret(&self) -> bool {
        !self.api_secret.expose_secret().is_empty()
    }

    pub fn signer(&self) -> RequestSigner {
        RequestSigner::new(&self.api_secret)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Credential storage
// ============================================================================

/// Storage key for a credential set, scoped so that builds for different tiers
/// or apps never share a keychain entry.
pub fn credential_storage_key(tier: Tier, app_name: &str, domain: &str) -> String {
    format!("API_{}_{}_{}", tier.as_str(), app_name, domain)
}

/// Persistent credential storage (platform keychain or similar).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_credentials(&self, key: &str) -> Result<Credentials, CredentialStoreError>;

    async fn set_credentials(
        &self,
        key: &str,
        credentials: &Credentials,
    ) -> Result<(), CredentialStoreError>;

    async fn delete_credentials(&self, key: &str) -> Result<(), CredentialStoreError>;
}

/// In-memory [`CredentialStore`] for tests and development builds.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    entries: Arc<RwLock<HashMap<String, Credentials>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get_credentials(&self, key: &str) -> Result<Credentials, CredentialStoreError> {
        self.entries
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| CredentialStoreError::NotFound(key.to_string()))
    }

    async fn set_credentials(
        &self,
        key: &str,
        credentials: &Credentials,
    ) -> Result<(), CredentialStoreError> {
        debug!(key = %key, "Storing API credentials");
        self.entries
            .write()
            .await
            .insert(key.to_string(), credentials.clone());
        Ok(())
    }

    async fn delete_credentials(&self, key: &str) -> Result<(), CredentialStoreError> {
        debug!(key = %key, "Deleting API credentials");
        self.entries.write().await.remove(key);
        Ok(())
    }
}

// ============================================================================
// Session observer
// ============================================================================

/// Notified when the server rejects a call's authentication (HTTP 401/403),
/// e.g. so the application can force a re-login.
pub trait SessionObserver: Send + Sync {
    fn on_authentication_failure(&self, api_route: &str, error: &ApiError);
}

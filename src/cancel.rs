//! Tagged cancellation for groups of in-flight calls.
//!
//! An application typically aborts everything a screen started when the user
//! leaves it. Tokens created here are tracked until aborted; tokens from
//! [`CancellationRegistry::untracked_token`] are never touched by
//! [`CancellationRegistry::abort_all`] (use them for calls that must finish,
//! e.g. a login).
//!
//! ```rust,ignore
//! let registry = CancellationRegistry::new();
//! let call = MethodCall::post("address_book/add")
//!     .with_cancel_token(registry.create_token_for_route("address_book/add"));
//! // user leaves the address book screen
//! registry.abort_all(Some("address_book"));
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug)]
struct Entry {
    tag: Option<String>,
    token: CancellationToken,
}

/// Hands out cancellation tokens and aborts them in bulk.
///
/// Clones share the same set of tracked tokens.
#[derive(Debug, Clone, Default)]
pub struct CancellationRegistry {
    entries: Arc<Mutex<HashMap<Uuid, Entry>>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tracked token, optionally tagged.
    pub fn create_token(&self, tag: Option<&str>) -> CancellationToken {
        let token = CancellationToken::new();
        let mut entries = self.lock();
        entries.retain(|_, entry| !entry.token.is_cancelled());
        entries.insert(
            Uuid::new_v4(),
            Entry {
                tag: tag.map(str::to_string),
                token: token.clone(),
            },
        );
        token
    }

    /// A tracked token tagged with the first segment of `api_route`, so
    /// `abort_all(Some("address_book"))` aborts every `address_book/...`
    /// call.
    pub fn create_token_for_route(&self, api_route: &str) -> CancellationToken {
        self.create_token(Some(route_tag(api_route)))
    }

    /// A token this registry never aborts.
    pub fn untracked_token(&self) -> CancellationToken {
        CancellationToken::new()
    }

    /// Abort every tracked token, or only those tagged `tag`. Aborted tokens
    /// stop being tracked. Returns how many were aborted.
    pub fn abort_all(&self, tag: Option<&str>) -> usize {
        let mut entries = self.lock();
        let mut aborted = 0;
        entries.retain(|id, entry| {
            if entry.token.is_cancelled() {
                return false;
            }
            if tag.is_some_and(|tag| entry.tag.as_deref() != Some(tag)) {
                return true;
            }
            entry.token.cancel();
            debug!(id = %id, tag = ?entry.tag, "Aborted request token");
            aborted += 1;
            false
        });
        aborted
    }

    /// Number of tokens still tracked.
    pub fn tracked(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// First path segment of an API route, e.g. `address_book` for
/// `address_book/add`.
pub fn route_tag(api_route: &str) -> &str {
    let route = api_route.trim_start_matches('/');
    route.split('/').next().unwrap_or(route)
}

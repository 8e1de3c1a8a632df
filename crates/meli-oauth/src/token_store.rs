//! Credential storage.
//!
//! The store is the single source of truth for the access/refresh token
//! pair. Only [`TokenRefresher`](crate::refresh::TokenRefresher) writes to it;
//! everything else reads snapshots.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

// ============================================================================
// Credential types
// ============================================================================

/// Access/refresh token pair.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}

/// OAuth client identity, fixed for the life of the process.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .finish()
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() { "<empty>" } else { "<redacted>" }
}

// ============================================================================
// TokenStore Trait
// ============================================================================

/// Holder of the current credential pair.
///
/// `set` replaces the whole pair atomically; a concurrent `get` observes
/// either the old pair or the new one, never a mix. Values are not
/// validated.
#[async_trait]
pub trait TokenStore: Send + Sync + fmt::Debug {
    /// Snapshot of the current pair.
    async fn get(&self) -> CredentialPair;

    /// Replace the current pair.
    async fn set(&self, pair: CredentialPair);
}

/// Shared token store for use across async contexts.
pub type SharedTokenStore = Arc<dyn TokenStore>;

// ============================================================================
// InMemoryTokenStore
// ============================================================================

/// Volatile, process-local token store.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    pair: RwLock<CredentialPair>,
}

impl InMemoryTokenStore {
    pub fn new(pair: CredentialPair) -> Self {
        Self {
            pair: RwLock::new(pair),
        }
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn get(&self) -> CredentialPair {
        self.pair.read().await.clone()
    }

    async fn set(&self, pair: CredentialPair) {
        *self.pair.write().await = pair;
    }
}

/// Create a shared in-memory store seeded with `pair`.
pub fn create_memory_token_store(pair: CredentialPair) -> SharedTokenStore {
    Arc::new(InMemoryTokenStore::new(pair))
}

//! Private key custody.
//!
//! This module defines the `KeyStore` trait and provides an in-memory
//! implementation for tests and ephemeral sessions. Persistent backends live in
//! `file_store` and `sqlite_store`.
//!
//! Each identity has at most one stored key. `save` replaces whatever was
//! there, which permanently loses the ability to open envelopes sealed to the
//! old public key. Callers that must not clobber an existing key use `create`,
//! which refuses atomically when an entry is already present (see
//! `MailClient::register`).

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use qmail_crypto::PrivateKey;

use crate::identity::Identity;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during key store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyStoreError {
    /// No key is stored for this identity. An expected outcome, not corruption.
    #[error("no key stored for {0}")]
    NotFound(Identity),

    /// `create` found an entry already stored for this identity.
    #[error("a key is already stored for {0}")]
    AlreadyExists(Identity),

    #[error("stored key for {identity} is corrupted: {reason}")]
    Corrupted { identity: Identity, reason: String },

    #[error("key store operation failed: {0}")]
    OperationFailed(String),
}

impl KeyStoreError {
    pub(crate) fn corrupted(identity: &Identity, reason: impl Into<String>) -> Self {
        Self::Corrupted {
            identity: identity.clone(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Data Models
// ============================================================================

/// A private key as held by a key store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPrivateKey {
    pub identity: Identity,
    pub key: PrivateKey,
    /// Unix timestamp of the `save` that wrote this entry.
    pub created_at: u64,
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// ============================================================================
// KeyStore Trait
// ============================================================================

/// Storage abstraction for private key material, keyed by identity.
///
/// Implementations must make `save` an atomic replace: a concurrent `load` of
/// the same identity observes either the previous entry or the new one.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Store `key` as the single current key for `identity`, replacing any
    /// existing entry.
    async fn save(&self, identity: &Identity, key: PrivateKey) -> Result<(), KeyStoreError>;

    /// Store `key` only if nothing is stored for `identity`.
    ///
    /// The check and the write are one atomic step: of several concurrent
    /// `create` calls for the same identity exactly one succeeds and the rest
    /// get `KeyStoreError::AlreadyExists`.
    async fn create(&self, identity: &Identity, key: PrivateKey) -> Result<(), KeyStoreError>;

    /// Load the current key for `identity`.
    ///
    /// # Returns
    /// * `Ok(stored)` if present
    /// * `Err(KeyStoreError::NotFound)` if nothing is stored
    /// * `Err(KeyStoreError::Corrupted)` if the entry cannot be decoded
    async fn load(&self, identity: &Identity) -> Result<StoredPrivateKey, KeyStoreError>;

    async fn contains(&self, identity: &Identity) -> Result<bool, KeyStoreError>;

    /// Remove the key for `identity`. Returns whether an entry existed.
    async fn delete(&self, identity: &Identity) -> Result<bool, KeyStoreError>;
}

// ============================================================================
// In-Memory Implementation
// ============================================================================

/// Thread-safe in-memory key store.
///
/// Uses `RwLock` for concurrent access with multiple readers or single writer.
#[derive(Default, Clone)]
pub struct InMemoryKeyStore {
    keys: Arc<RwLock<HashMap<Identity, StoredPrivateKey>>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.keys.read().await.is_empty()
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn save(&self, identity: &Identity, key: PrivateKey) -> Result<(), KeyStoreError> {
        let algorithm = key.algorithm();
        let stored = StoredPrivateKey {
            identity: identity.clone(),
            key,
            created_at: unix_now(),
        };
        let replaced = self
            .keys
            .write()
            .await
            .insert(identity.clone(), stored)
            .is_some();
        debug!(identity = %identity, algorithm = %algorithm, replaced, "stored private key");
        Ok(())
    }

    async fn create(&self, identity: &Identity, key: PrivateKey) -> Result<(), KeyStoreError> {
        let mut keys = self.keys.write().await;
        match keys.entry(identity.clone()) {
            Entry::Occupied(_) => Err(KeyStoreError::AlreadyExists(identity.clone())),
            Entry::Vacant(slot) => {
                debug!(identity = %identity, algorithm = %key.algorithm(), "created private key");
                slot.insert(StoredPrivateKey {
                    identity: identity.clone(),
                    key,
                    created_at: unix_now(),
                });
                Ok(())
            }
        }
    }

    async fn load(&self, identity: &Identity) -> Result<StoredPrivateKey, KeyStoreError> {
        self.keys
            .read()
            .await
            .get(identity)
            .cloned()
            .ok_or_else(|| KeyStoreError::NotFound(identity.clone()))
    }

    async fn contains(&self, identity: &Identity) -> Result<bool, KeyStoreError> {
        Ok(self.keys.read().await.contains_key(identity))
    }

    async fn delete(&self, identity: &Identity) -> Result<bool, KeyStoreError> {
        Ok(self.keys.write().await.remove(identity).is_some())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

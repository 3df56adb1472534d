//! Public key directory boundary.
//!
//! The directory maps identities to published public keys. Publication
//! happens during account registration, which lives outside this crate;
//! the client only resolves.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use qmail_crypto::{CipherError, PublicKey};

use crate::identity::Identity;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("no public key published for {0}")]
    NotFound(Identity),

    #[error("published key for {identity} is unusable: {source}")]
    InvalidKey {
        identity: Identity,
        #[source]
        source: CipherError,
    },

    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Resolve the current public key for `identity`.
    async fn resolve_public_key(&self, identity: &Identity) -> Result<PublicKey, DirectoryError>;
}

/// Directory held in memory, for tests and local demos.
#[derive(Default, Clone)]
pub struct InMemoryDirectory {
    entries: Arc<RwLock<HashMap<Identity, PublicKey>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish (or replace) the key for `identity`.
    pub async fn publish(&self, identity: &Identity, public_key: PublicKey) {
        self.entries.write().await.insert(identity.clone(), public_key);
    }

    /// Publish a key in its text form, as a registration form would submit it.
    pub async fn publish_text(&self, identity: &Identity, text: &str) -> Result<(), DirectoryError> {
        let public_key = PublicKey::from_text(text).map_err(|source| DirectoryError::InvalidKey {
            identity: identity.clone(),
            source,
        })?;
        self.publish(identity, public_key).await;
        Ok(())
    }
}

#[async_trait]
impl DirectoryClient for InMemoryDirectory {
    async fn resolve_public_key(&self, identity: &Identity) -> Result<PublicKey, DirectoryError> {
        self.entries
            .read()
            .await
            .get(identity)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(identity.clone()))
    }
}

//! QMail Core - key custody and mail flows for the QMail client.
//!
//! This crate implements:
//! - Identity handles
//! - Private key storage (in-memory, file, SQLite)
//! - Directory and mailbox collaborator boundaries
//! - Registration, compose and read flows over `qmail-crypto`

#![forbid(unsafe_code)]

// Flows
pub mod client;

// Collaborator boundaries
pub mod directory;
pub mod mailbox;

// Infrastructure
pub mod file_store;
pub mod keystore;

// Supporting modules
pub mod identity;
pub mod types;

// Optional transport implementations
#[cfg(feature = "http-mailbox")]
pub mod http_mailbox;

// Optional storage implementations
#[cfg(feature = "sqlite")]
pub mod sqlite_store;

pub use client::{register_key, ClientError, MailClient, ReadError, RegisterMode};
pub use directory::{DirectoryClient, DirectoryError, InMemoryDirectory};
pub use file_store::FileKeyStore;
pub use identity::{Identity, IdentityError};
pub use keystore::{InMemoryKeyStore, KeyStore, KeyStoreError, StoredPrivateKey};
pub use mailbox::{InMemoryMailbox, Mailbox, MailboxError};
pub use types::{AccountRegistration, MailItem, OutgoingMail};

//! SQLite-based persistent key storage.
//!
//! Keys live in a single `private_keys` table keyed by identity. Writes run
//! inside a transaction so a concurrent reader sees either the old row or the
//! new one.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;
use tracing::debug;
use zeroize::Zeroizing;

use qmail_crypto::{AlgorithmId, PrivateKey};

use crate::identity::Identity;
use crate::keystore::{unix_now, KeyStore, KeyStoreError, StoredPrivateKey};

// ============================================================================
// Schema Version
// ============================================================================

/// Current schema version for migrations.
/// Increment this when adding new migrations.
const SCHEMA_VERSION: i32 = 1;

// ============================================================================
// SQLite Key Store Implementation
// ============================================================================

/// SQLite-based persistent key store.
pub struct SqliteKeyStore {
    /// SQLite connection wrapped in a mutex for thread-safe access
    conn: Arc<Mutex<Connection>>,
}

impl SqliteKeyStore {
    /// Open (or create) a key database at `path` and run migrations.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, KeyStoreError> {
        let conn = Connection::open(path)
            .map_err(|e| KeyStoreError::OperationFailed(format!("failed to open database: {}", e)))?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")
            .map_err(|e| KeyStoreError::OperationFailed(format!("failed to set pragmas: {}", e)))?;

        Self::run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create a new in-memory SQLite key store for testing.
    pub fn new_in_memory() -> Result<Self, KeyStoreError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            KeyStoreError::OperationFailed(format!("failed to open in-memory database: {}", e))
        })?;

        Self::run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn run_migrations(conn: &Connection) -> Result<(), KeyStoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            [],
        )
        .map_err(|e| KeyStoreError::OperationFailed(format!("failed to create schema_version: {}", e)))?;

        let current_version: i32 = conn
            .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
                row.get(0)
            })
            .unwrap_or(0);

        if current_version > SCHEMA_VERSION {
            return Err(KeyStoreError::OperationFailed(format!(
                "database schema version {} is newer than supported version {}",
                current_version, SCHEMA_VERSION
            )));
        }

        if current_version < 1 {
            Self::migrate_v1(conn)?;
        }

        Ok(())
    }

    /// Migration to schema version 1 - initial schema.
    fn migrate_v1(conn: &Connection) -> Result<(), KeyStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS private_keys (
                identity TEXT PRIMARY KEY,
                algorithm TEXT NOT NULL,
                key_bytes BLOB NOT NULL,
                created_at INTEGER NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            "#,
        )
        .map_err(|e| KeyStoreError::OperationFailed(format!("migration v1 failed: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl KeyStore for SqliteKeyStore {
    async fn save(&self, identity: &Identity, key: PrivateKey) -> Result<(), KeyStoreError> {
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| KeyStoreError::OperationFailed(format!("failed to begin transaction: {}", e)))?;
        tx.execute(
            "INSERT INTO private_keys (identity, algorithm, key_bytes, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(identity) DO UPDATE SET
                algorithm = excluded.algorithm,
                key_bytes = excluded.key_bytes,
                created_at = excluded.created_at",
            params![
                identity.as_str(),
                key.algorithm().name(),
                key.secret_bytes(),
                unix_now() as i64,
            ],
        )
        .map_err(|e| KeyStoreError::OperationFailed(format!("failed to save key: {}", e)))?;
        tx.commit()
            .map_err(|e| KeyStoreError::OperationFailed(format!("failed to commit key: {}", e)))?;

        debug!(identity = %identity, algorithm = %key.algorithm(), "stored private key");
        Ok(())
    }

    async fn create(&self, identity: &Identity, key: PrivateKey) -> Result<(), KeyStoreError> {
        let conn = self.conn.lock().await;
        let inserted = conn
            .execute(
                "INSERT INTO private_keys (identity, algorithm, key_bytes, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(identity) DO NOTHING",
                params![
                    identity.as_str(),
                    key.algorithm().name(),
                    key.secret_bytes(),
                    unix_now() as i64,
                ],
            )
            .map_err(|e| KeyStoreError::OperationFailed(format!("failed to create key: {}", e)))?;

        if inserted == 0 {
            return Err(KeyStoreError::AlreadyExists(identity.clone()));
        }
        debug!(identity = %identity, algorithm = %key.algorithm(), "created private key");
        Ok(())
    }

    async fn load(&self, identity: &Identity) -> Result<StoredPrivateKey, KeyStoreError> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT algorithm, key_bytes, created_at FROM private_keys WHERE identity = ?1",
                params![identity.as_str()],
                |row| {
                    let algorithm: String = row.get(0)?;
                    let key_bytes: Vec<u8> = row.get(1)?;
                    let created_at: i64 = row.get(2)?;
                    Ok((algorithm, Zeroizing::new(key_bytes), created_at))
                },
            )
            .optional()
            .map_err(|e| KeyStoreError::OperationFailed(format!("failed to load key: {}", e)))?;
        drop(conn);

        let (algorithm, key_bytes, created_at) =
            row.ok_or_else(|| KeyStoreError::NotFound(identity.clone()))?;
        let algorithm: AlgorithmId = algorithm
            .parse()
            .map_err(|_| KeyStoreError::corrupted(identity, "unknown algorithm"))?;
        let key = PrivateKey::new(algorithm, key_bytes.to_vec())
            .map_err(|_| KeyStoreError::corrupted(identity, "private key has the wrong length"))?;

        Ok(StoredPrivateKey {
            identity: identity.clone(),
            key,
            created_at: created_at.max(0) as u64,
        })
    }

    async fn contains(&self, identity: &Identity) -> Result<bool, KeyStoreError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM private_keys WHERE identity = ?1",
                params![identity.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| KeyStoreError::OperationFailed(format!("failed to query key: {}", e)))?;
        Ok(count > 0)
    }

    async fn delete(&self, identity: &Identity) -> Result<bool, KeyStoreError> {
        let conn = self.conn.lock().await;
        let removed = conn
            .execute(
                "DELETE FROM private_keys WHERE identity = ?1",
                params![identity.as_str()],
            )
            .map_err(|e| KeyStoreError::OperationFailed(format!("failed to delete key: {}", e)))?;
        Ok(removed > 0)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

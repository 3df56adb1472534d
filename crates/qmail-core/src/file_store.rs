//! File-based private key storage.
//!
//! One JSON file per identity under a key directory. Files are named by the
//! hex SHA-256 of the identity so arbitrary addresses never reach the
//! filesystem as path components.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use qmail_crypto::hash::sha256;
use qmail_crypto::{AlgorithmId, PrivateKey};

use crate::identity::Identity;
use crate::keystore::{unix_now, KeyStore, KeyStoreError, StoredPrivateKey};

/// Serializable key data for file storage
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct KeyRecord {
    /// Version for future compatibility
    version: u32,
    identity: String,
    algorithm: String,
    /// Private key bytes, hex encoded
    private_key: String,
    /// When the key was saved (RFC3339)
    created_at: String,
}

impl KeyRecord {
    const CURRENT_VERSION: u32 = 1;

    fn new(identity: &Identity, key: &PrivateKey, created_at: u64) -> Self {
        let datetime = DateTime::<Utc>::from_timestamp(created_at as i64, 0).unwrap_or_default();
        Self {
            version: Self::CURRENT_VERSION,
            identity: identity.to_string(),
            algorithm: key.algorithm().name().to_string(),
            private_key: hex::encode(key.secret_bytes()),
            created_at: datetime.to_rfc3339(),
        }
    }

    fn into_stored(self, identity: &Identity) -> Result<StoredPrivateKey, KeyStoreError> {
        if self.version != Self::CURRENT_VERSION {
            return Err(KeyStoreError::corrupted(
                identity,
                format!("unsupported record version {}", self.version),
            ));
        }
        if self.identity != identity.as_str() {
            return Err(KeyStoreError::corrupted(identity, "record belongs to another identity"));
        }
        let algorithm: AlgorithmId = self
            .algorithm
            .parse()
            .map_err(|_| KeyStoreError::corrupted(identity, "unknown algorithm"))?;
        let bytes = hex::decode(&self.private_key)
            .map_err(|_| KeyStoreError::corrupted(identity, "private key is not hex"))?;
        let key = PrivateKey::new(algorithm, bytes)
            .map_err(|_| KeyStoreError::corrupted(identity, "private key has the wrong length"))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| KeyStoreError::corrupted(identity, format!("invalid timestamp: {e}")))?
            .timestamp()
            .max(0) as u64;
        Ok(StoredPrivateKey {
            identity: identity.clone(),
            key,
            created_at,
        })
    }
}

/// How a finished temp file replaces the key file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Publish {
    /// Atomic rename over any existing file.
    Replace,
    /// Fail with `AlreadyExists` if the key file is present.
    NoClobber,
}

/// Key store backed by a directory of per-identity JSON files.
///
/// Every write goes through its own uniquely named temp file in the key
/// directory, so any number of stores (or processes) may share a directory.
pub struct FileKeyStore {
    dir: PathBuf,
    /// Serializes this instance's writers; cross-instance safety comes from
    /// unique temp files and atomic publish.
    write_lock: Mutex<()>,
}

impl FileKeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Get default key directory
    pub fn default_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("in", "qmail", "qmail").map(|dirs| dirs.data_dir().join("keys"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, identity: &Identity) -> PathBuf {
        let digest = sha256(identity.as_str().as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }

    fn encode(identity: &Identity, key: &PrivateKey) -> Result<Zeroizing<Vec<u8>>, KeyStoreError> {
        let record = KeyRecord::new(identity, key, unix_now());
        serde_json::to_vec_pretty(&record)
            .map(Zeroizing::new)
            .map_err(|e| KeyStoreError::OperationFailed(format!("failed to serialize key: {e}")))
    }

    async fn write_atomic(
        &self,
        path: PathBuf,
        contents: Zeroizing<Vec<u8>>,
        publish: Publish,
    ) -> std::io::Result<()> {
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || write_and_publish(&dir, &path, &contents, publish))
            .await
            .map_err(|e| std::io::Error::new(ErrorKind::Other, e))?
    }

    async fn store(&self, identity: &Identity, key: &PrivateKey, publish: Publish) -> Result<(), KeyStoreError> {
        let json = Self::encode(identity, key)?;
        let path = self.path_for(identity);

        let _guard = self.write_lock.lock().await;
        match self.write_atomic(path.clone(), json, publish).await {
            Ok(()) => {}
            Err(e) if publish == Publish::NoClobber && e.kind() == ErrorKind::AlreadyExists => {
                return Err(KeyStoreError::AlreadyExists(identity.clone()))
            }
            Err(e) => return Err(io_failure("write key file", e)),
        }

        debug!(
            identity = %identity,
            algorithm = %key.algorithm(),
            path = %path.display(),
            replace = publish == Publish::Replace,
            "stored private key"
        );
        Ok(())
    }
}

/// Write `contents` to a fresh temp file beside `path`, flush it to disk and
/// move it into place. The temp file is removed on every failure path.
fn write_and_publish(dir: &Path, path: &Path, contents: &[u8], publish: Publish) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".key-")
        .suffix(".tmp")
        .tempfile_in(dir)?;

    // Restrict before any key bytes land on disk
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    temp.write_all(contents)?;
    temp.as_file().sync_all()?;

    let published = match publish {
        Publish::Replace => temp.persist(path),
        Publish::NoClobber => temp.persist_noclobber(path),
    };
    published.map(drop).map_err(|e| e.error)
}

fn io_failure(action: &str, err: std::io::Error) -> KeyStoreError {
    KeyStoreError::OperationFailed(format!("failed to {action}: {err}"))
}

#[async_trait]
impl KeyStore for FileKeyStore {
    async fn save(&self, identity: &Identity, key: PrivateKey) -> Result<(), KeyStoreError> {
        self.store(identity, &key, Publish::Replace).await
    }

    async fn create(&self, identity: &Identity, key: PrivateKey) -> Result<(), KeyStoreError> {
        self.store(identity, &key, Publish::NoClobber).await
    }

    async fn load(&self, identity: &Identity) -> Result<StoredPrivateKey, KeyStoreError> {
        let path = self.path_for(identity);
        let contents = match fs::read(&path).await {
            Ok(bytes) => Zeroizing::new(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(KeyStoreError::NotFound(identity.clone()))
            }
            Err(e) => return Err(io_failure("read key file", e)),
        };

        let record: KeyRecord = serde_json::from_slice(&contents).map_err(|e| {
            warn!(identity = %identity, path = %path.display(), "key file does not parse");
            KeyStoreError::corrupted(identity, e.to_string())
        })?;
        record.into_stored(identity)
    }

    async fn contains(&self, identity: &Identity) -> Result<bool, KeyStoreError> {
        fs::try_exists(self.path_for(identity))
            .await
            .map_err(|e| io_failure("check key file", e))
    }

    async fn delete(&self, identity: &Identity) -> Result<bool, KeyStoreError> {
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(self.path_for(identity)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_failure("remove key file", e)),
        }
    }
}

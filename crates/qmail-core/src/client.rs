//! Registration, compose and read flows.
//!
//! Every flow takes the acting identity explicitly. The client holds no
//! notion of a "current user".

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use qmail_crypto::{AlgorithmId, CipherError, KemProvider, MessageCipher, PublicKey, StandardKem};

use crate::directory::{DirectoryClient, DirectoryError};
use crate::identity::Identity;
use crate::keystore::{KeyStore, KeyStoreError};
use crate::mailbox::{Mailbox, MailboxError};
use crate::types::{MailItem, OutgoingMail};

/// What `register` does when the identity already has a local key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegisterMode {
    /// Refuse to touch an existing key.
    #[default]
    CreateNew,
    /// Overwrite it. Envelopes sealed to the old public key become unreadable.
    Replace,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("{0} already has a key on this device")]
    AlreadyRegistered(Identity),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Mailbox(#[from] MailboxError),
}

/// Why a mail item could not be read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReadError {
    #[error("no key for {0} on this device")]
    KeyNotFound(Identity),

    #[error("item is not addressed to {0}")]
    NotRecipient(Identity),

    #[error(transparent)]
    KeyStore(KeyStoreError),

    #[error(transparent)]
    Cipher(#[from] CipherError),
}

impl ReadError {
    /// Text safe to show an end user.
    ///
    /// All cipher failures share one message so the reader learns nothing
    /// about which check rejected the envelope.
    pub fn user_message(&self) -> &'static str {
        match self {
            ReadError::KeyNotFound(_) => "no key for this identity on this device",
            ReadError::NotRecipient(_) => "sent messages cannot be decrypted on this device",
            ReadError::KeyStore(_) => "the local key store could not be read",
            ReadError::Cipher(_) => "cannot decrypt this message",
        }
    }
}

impl From<KeyStoreError> for ReadError {
    fn from(err: KeyStoreError) -> Self {
        match err {
            KeyStoreError::NotFound(identity) => ReadError::KeyNotFound(identity),
            other => ReadError::KeyStore(other),
        }
    }
}

/// Generate a key pair with `kem` and store the private half in `keys`.
///
/// Needs no directory or mailbox, so it works offline. Under
/// `RegisterMode::CreateNew` the store's atomic `create` decides, so two
/// concurrent registrations of one identity cannot both succeed.
pub async fn register_key<K: KemProvider + ?Sized>(
    keys: &dyn KeyStore,
    kem: &K,
    identity: &Identity,
    algorithm: AlgorithmId,
    mode: RegisterMode,
) -> Result<PublicKey, ClientError> {
    let (public, private) = kem.generate(algorithm)?.into_parts();

    match mode {
        RegisterMode::CreateNew => keys.create(identity, private).await.map_err(|e| match e {
            KeyStoreError::AlreadyExists(identity) => ClientError::AlreadyRegistered(identity),
            other => ClientError::KeyStore(other),
        })?,
        RegisterMode::Replace => {
            if keys.contains(identity).await? {
                warn!(identity = %identity, "replacing existing private key; older mail becomes unreadable");
            }
            keys.save(identity, private).await?;
        }
    }

    info!(
        identity = %identity,
        algorithm = %algorithm,
        fingerprint = %public.fingerprint(),
        "registered key pair"
    );
    Ok(public)
}

/// A mail client over a key store, directory and mailbox.
pub struct MailClient<K = StandardKem> {
    keys: Arc<dyn KeyStore>,
    directory: Arc<dyn DirectoryClient>,
    mailbox: Arc<dyn Mailbox>,
    cipher: MessageCipher<K>,
}

impl<K: KemProvider> MailClient<K> {
    pub fn new(
        keys: Arc<dyn KeyStore>,
        directory: Arc<dyn DirectoryClient>,
        mailbox: Arc<dyn Mailbox>,
        cipher: MessageCipher<K>,
    ) -> Self {
        Self {
            keys,
            directory,
            mailbox,
            cipher,
        }
    }

    pub fn cipher(&self) -> &MessageCipher<K> {
        &self.cipher
    }

    /// Generate a key pair for `identity` and store the private half.
    ///
    /// Returns the public key; publishing it to the directory is the
    /// caller's job. See [`register_key`].
    pub async fn register(
        &self,
        identity: &Identity,
        algorithm: AlgorithmId,
        mode: RegisterMode,
    ) -> Result<PublicKey, ClientError> {
        register_key(self.keys.as_ref(), self.cipher.kem(), identity, algorithm, mode).await
    }

    /// Seal `body` to `recipient` and hand it to the mailbox.
    ///
    /// The envelope uses whatever algorithm the recipient's published key
    /// was generated under.
    pub async fn compose(
        &self,
        sender: &Identity,
        recipient: &Identity,
        body: &[u8],
    ) -> Result<OutgoingMail, ClientError> {
        let recipient_key = self.directory.resolve_public_key(recipient).await?;
        let encrypted_body = self
            .cipher
            .seal_encoded(&recipient_key, recipient_key.algorithm(), body)?;

        let mail = OutgoingMail {
            sender_email: sender.clone(),
            recipient_email: recipient.clone(),
            encrypted_body,
        };
        self.mailbox.deliver(&mail).await?;

        debug!(
            sender = %sender,
            recipient = %recipient,
            algorithm = %recipient_key.algorithm(),
            "delivered sealed message"
        );
        Ok(mail)
    }

    pub async fn inbox(&self, identity: &Identity) -> Result<Vec<MailItem>, ClientError> {
        Ok(self.mailbox.inbox(identity).await?)
    }

    pub async fn sent(&self, identity: &Identity) -> Result<Vec<MailItem>, ClientError> {
        Ok(self.mailbox.sent(identity).await?)
    }

    /// Open a mail item addressed to `identity` with the locally stored key.
    pub async fn read(&self, identity: &Identity, item: &MailItem) -> Result<Vec<u8>, ReadError> {
        if &item.recipient_email != identity {
            return Err(ReadError::NotRecipient(identity.clone()));
        }

        let stored = self.keys.load(identity).await?;
        self.cipher
            .open_encoded(&stored.key, &item.encrypted_body)
            .map_err(|err| {
                warn!(identity = %identity, sender = %item.sender_email, error = %err, "failed to open message");
                ReadError::from(err)
            })
    }
}

//! Cipher error types.

use thiserror::Error;

use crate::algorithm::AlgorithmId;

/// Errors produced by key generation, sealing, opening and envelope decoding.
///
/// Every variant is recoverable at the call site. `DecryptionFailure`
/// deliberately carries no detail: a wrong key, a corrupted ciphertext and a
/// swapped encapsulation all look the same to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("unsupported algorithm: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(&'static str),

    #[error("algorithm mismatch: key is {key}, envelope is {envelope}")]
    AlgorithmMismatch {
        key: AlgorithmId,
        envelope: AlgorithmId,
    },

    #[error("decryption failed")]
    DecryptionFailure,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid private key")]
    InvalidPrivateKey,

    /// A message or envelope field exceeds what the wire format carries.
    #[error("message too large: {len} bytes exceeds the {max} byte limit")]
    MessageTooLarge { len: usize, max: usize },

    #[error("encryption failed")]
    EncryptionFailed,
}

impl CipherError {
    pub(crate) fn unsupported(algorithm: impl ToString) -> Self {
        Self::UnsupportedAlgorithm {
            algorithm: algorithm.to_string(),
        }
    }
}

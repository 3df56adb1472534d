//! Message sealing and opening.
//!
//! [`MessageCipher`] is the entry point for compose and read flows. It is
//! stateless across calls and never persists key material.

use tracing::debug;

use crate::algorithm::AlgorithmId;
use crate::envelope::{Envelope, EnvelopeCodec, MAX_FIELD_LEN};
use crate::error::CipherError;
use crate::kem::{KemProvider, StandardKem};
use crate::keys::{PrivateKey, PublicKey};

/// Poly1305 tag appended to every ciphertext.
const AEAD_TAG_LEN: usize = 16;

/// Largest plaintext [`MessageCipher::seal`] accepts; its ciphertext still
/// fits an envelope field.
pub const MAX_PLAINTEXT_LEN: usize = MAX_FIELD_LEN - AEAD_TAG_LEN;

/// Seals plaintext into envelopes and opens them again.
#[derive(Debug, Clone, Default)]
pub struct MessageCipher<K = StandardKem> {
    kem: K,
}

impl<K: KemProvider> MessageCipher<K> {
    pub fn new(kem: K) -> Self {
        Self { kem }
    }

    pub fn kem(&self) -> &K {
        &self.kem
    }

    /// Seal `plaintext` to `recipient` under `algorithm`.
    ///
    /// `algorithm` must be the one the recipient's key was generated under;
    /// otherwise `AlgorithmMismatch` is returned and nothing is encapsulated.
    /// Plaintext longer than [`MAX_PLAINTEXT_LEN`] is `MessageTooLarge`.
    pub fn seal(
        &self,
        recipient: &PublicKey,
        algorithm: AlgorithmId,
        plaintext: &[u8],
    ) -> Result<Envelope, CipherError> {
        if recipient.algorithm() != algorithm {
            return Err(CipherError::AlgorithmMismatch {
                key: recipient.algorithm(),
                envelope: algorithm,
            });
        }
        if plaintext.len() > MAX_PLAINTEXT_LEN {
            return Err(CipherError::MessageTooLarge {
                len: plaintext.len(),
                max: MAX_PLAINTEXT_LEN,
            });
        }

        let sealed = self.kem.encapsulate(recipient, plaintext)?;
        debug!(
            algorithm = %algorithm,
            recipient = %recipient.fingerprint(),
            plaintext_len = plaintext.len(),
            ciphertext_len = sealed.ciphertext.len(),
            "sealed envelope"
        );

        Ok(Envelope {
            algorithm,
            encapsulation: sealed.encapsulation,
            ciphertext: sealed.ciphertext,
        })
    }

    /// Open an envelope with the caller's own private key.
    ///
    /// The algorithm check runs before any decapsulation.
    pub fn open(&self, own: &PrivateKey, envelope: &Envelope) -> Result<Vec<u8>, CipherError> {
        if envelope.algorithm != own.algorithm() {
            debug!(
                key = %own.algorithm(),
                envelope = %envelope.algorithm,
                "envelope algorithm does not match key"
            );
            return Err(CipherError::AlgorithmMismatch {
                key: own.algorithm(),
                envelope: envelope.algorithm,
            });
        }

        let result = self
            .kem
            .decapsulate(own, &envelope.encapsulation, &envelope.ciphertext);
        match &result {
            Ok(plaintext) => debug!(
                algorithm = %envelope.algorithm,
                plaintext_len = plaintext.len(),
                "opened envelope"
            ),
            Err(err) => debug!(algorithm = %envelope.algorithm, error = %err, "envelope rejected"),
        }
        result
    }

    /// [`seal`](Self::seal) followed by the codec's text encoding.
    pub fn seal_encoded(
        &self,
        recipient: &PublicKey,
        algorithm: AlgorithmId,
        plaintext: &[u8],
    ) -> Result<String, CipherError> {
        let envelope = self.seal(recipient, algorithm, plaintext)?;
        EnvelopeCodec::encode_text(&envelope)
    }

    /// Decode a text-form envelope, then [`open`](Self::open) it.
    pub fn open_encoded(&self, own: &PrivateKey, wire: &str) -> Result<Vec<u8>, CipherError> {
        let envelope = EnvelopeCodec::decode_text(wire)?;
        self.open(own, &envelope)
    }
}

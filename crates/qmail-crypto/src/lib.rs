//! QMail message cryptography.
//!
//! Key pairs are produced by a [`KemProvider`], messages are sealed into
//! self-describing [`Envelope`]s by [`MessageCipher`], and envelopes travel as
//! the versioned framing produced by [`EnvelopeCodec`].
//!
//! ```text
//! generate(alg) -> KeyPair { PublicKey, PrivateKey }
//!
//! seal(pub, alg, plaintext)
//!     KEM encapsulate -> shared secret -> HKDF-SHA256 -> ChaCha20-Poly1305
//!     -> Envelope { alg, encapsulation, ciphertext } -> EnvelopeCodec::encode
//!
//! open(priv, envelope)
//!     alg check -> KEM decapsulate -> HKDF-SHA256 -> ChaCha20-Poly1305 open
//! ```

#![forbid(unsafe_code)]

pub mod algorithm;
pub mod cipher;
pub mod envelope;
pub mod error;
pub mod hash;
pub mod kem;
pub mod keys;
pub mod transcript;

#[cfg(test)]
mod proptests;

pub use algorithm::AlgorithmId;
pub use cipher::{MessageCipher, MAX_PLAINTEXT_LEN};
pub use envelope::{Envelope, EnvelopeCodec, MAX_FIELD_LEN};
pub use error::CipherError;
pub use kem::{KemProvider, Sealed, StandardKem};
pub use keys::{KeyPair, PrivateKey, PublicKey};

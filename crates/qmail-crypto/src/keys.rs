//! Key types.
//!
//! Public and private halves are distinct types that each carry the
//! [`AlgorithmId`] they were generated under. Private key bytes are zeroized
//! on drop and never appear in `Debug` output.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use constant_time_eq::constant_time_eq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::algorithm::AlgorithmId;
use crate::error::CipherError;
use crate::hash::fingerprint;

/// A recipient's public key, as published to the directory.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PublicKey {
    algorithm: AlgorithmId,
    bytes: Vec<u8>,
}

impl PublicKey {
    /// Wrap raw key bytes, checking the length expected by `algorithm`.
    pub fn new(algorithm: AlgorithmId, bytes: Vec<u8>) -> Result<Self, CipherError> {
        if bytes.len() != algorithm.public_key_len() {
            return Err(CipherError::InvalidPublicKey);
        }
        Ok(Self { algorithm, bytes })
    }

    pub fn algorithm(&self) -> AlgorithmId {
        self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Text form `"<ALGORITHM>:<base64>"`.
    pub fn to_text(&self) -> String {
        format!("{}:{}", self.algorithm.name(), STANDARD.encode(&self.bytes))
    }

    /// Parse the text form produced by [`PublicKey::to_text`].
    ///
    /// An unknown algorithm name yields `UnsupportedAlgorithm`; anything
    /// else that does not parse yields `InvalidPublicKey`.
    pub fn from_text(text: &str) -> Result<Self, CipherError> {
        let (name, encoded) = text
            .trim()
            .split_once(':')
            .ok_or(CipherError::InvalidPublicKey)?;
        let algorithm: AlgorithmId = name.parse()?;
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|_| CipherError::InvalidPublicKey)?;
        Self::new(algorithm, bytes)
    }

    /// Short display fingerprint over the algorithm tag and key bytes.
    pub fn fingerprint(&self) -> String {
        let mut data = Vec::with_capacity(2 + self.bytes.len());
        data.extend_from_slice(&self.algorithm.wire_tag().to_be_bytes());
        data.extend_from_slice(&self.bytes);
        fingerprint(&data)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("algorithm", &self.algorithm)
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// The private half of a key pair. Only key stores and the KEM touch its bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey {
    #[zeroize(skip)]
    algorithm: AlgorithmId,
    bytes: Vec<u8>,
}

impl PrivateKey {
    /// Wrap raw key bytes loaded from storage, checking their length.
    pub fn new(algorithm: AlgorithmId, bytes: Vec<u8>) -> Result<Self, CipherError> {
        if bytes.len() != algorithm.private_key_len() {
            return Err(CipherError::InvalidPrivateKey);
        }
        Ok(Self { algorithm, bytes })
    }

    pub fn algorithm(&self) -> AlgorithmId {
        self.algorithm
    }

    /// Raw secret bytes, for persistence by a key store.
    pub fn secret_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.algorithm == other.algorithm && constant_time_eq(&self.bytes, &other.bytes)
    }
}

impl Eq for PrivateKey {}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("algorithm", &self.algorithm)
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A matched public/private pair produced by a single `generate` call.
#[derive(Debug, Clone)]
pub struct KeyPair {
    public: PublicKey,
    private: PrivateKey,
}

impl KeyPair {
    pub(crate) fn from_parts(public: PublicKey, private: PrivateKey) -> Self {
        debug_assert_eq!(public.algorithm(), private.algorithm());
        Self { public, private }
    }

    pub fn algorithm(&self) -> AlgorithmId {
        self.public.algorithm()
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private
    }

    pub fn into_parts(self) -> (PublicKey, PrivateKey) {
        (self.public, self.private)
    }
}

//! Algorithm identifiers.
//!
//! An [`AlgorithmId`] is fixed when a key pair is generated and travels with
//! every artifact derived from it: the public key text form, the stored
//! private key and each envelope's wire tag.

use std::fmt;
use std::str::FromStr;

use crate::error::CipherError;

/// Key encapsulation suites understood by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlgorithmId {
    /// Ephemeral X25519 DH, HKDF-SHA256, ChaCha20-Poly1305.
    X25519HkdfSha256,
    /// ML-KEM-768 (FIPS 203), HKDF-SHA256, ChaCha20-Poly1305.
    MlKem768,
}

impl AlgorithmId {
    /// Every algorithm, in wire-tag order.
    pub const ALL: [AlgorithmId; 2] = [AlgorithmId::X25519HkdfSha256, AlgorithmId::MlKem768];

    /// Tag written into the envelope header.
    pub const fn wire_tag(self) -> u16 {
        match self {
            AlgorithmId::X25519HkdfSha256 => 0x0001,
            AlgorithmId::MlKem768 => 0x0002,
        }
    }

    pub fn from_wire_tag(tag: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.wire_tag() == tag)
    }

    /// Canonical name, used in public key text and persisted records.
    pub const fn name(self) -> &'static str {
        match self {
            AlgorithmId::X25519HkdfSha256 => "X25519-HKDF-SHA256",
            AlgorithmId::MlKem768 => "ML-KEM-768",
        }
    }

    pub const fn public_key_len(self) -> usize {
        match self {
            AlgorithmId::X25519HkdfSha256 => 32,
            AlgorithmId::MlKem768 => 1184,
        }
    }

    pub const fn private_key_len(self) -> usize {
        match self {
            AlgorithmId::X25519HkdfSha256 => 32,
            AlgorithmId::MlKem768 => 2400,
        }
    }

    pub const fn encapsulation_len(self) -> usize {
        match self {
            AlgorithmId::X25519HkdfSha256 => 32,
            AlgorithmId::MlKem768 => 1088,
        }
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AlgorithmId {
    type Err = CipherError;

    /// Parse a canonical name, case-insensitively. `Kyber768` is accepted as
    /// an alias for ML-KEM-768.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        if wanted.eq_ignore_ascii_case("kyber768") {
            return Ok(AlgorithmId::MlKem768);
        }
        Self::ALL
            .into_iter()
            .find(|alg| alg.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CipherError::unsupported(wanted))
    }
}

//! Key encapsulation.
//!
//! [`StandardKem`] implements two suites behind the [`KemProvider`] trait:
//!
//! - `X25519-HKDF-SHA256`: an ephemeral X25519 key is generated per message and
//!   its public half is the encapsulation. The DH output is expanded with
//!   HKDF-SHA256, salted with `eph_pub || recipient_pub`.
//! - `ML-KEM-768`: the FIPS 203 ciphertext is the encapsulation and the KEM
//!   shared key is expanded with HKDF-SHA256, salted with that ciphertext.
//!
//! Both then seal the plaintext with ChaCha20-Poly1305. The AEAD associated
//! data binds the algorithm tag and the encapsulation, so an envelope only
//! opens under the exact encapsulation and suite it was produced with.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use hkdf::Hkdf;
use ml_kem::kem::{Decapsulate, Encapsulate};
use ml_kem::{Ciphertext, Encoded, EncodedSizeUser, KemCore, MlKem768};
use rand_core::OsRng;
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::algorithm::AlgorithmId;
use crate::error::CipherError;
use crate::keys::{KeyPair, PrivateKey, PublicKey};
use crate::transcript::{tags, Transcript};

type MlKemEncapsulationKey = <MlKem768 as KemCore>::EncapsulationKey;
type MlKemDecapsulationKey = <MlKem768 as KemCore>::DecapsulationKey;

/// Output of a single encapsulation: the KEM encapsulation and the AEAD
/// ciphertext of the message body (including the 16-byte tag).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub encapsulation: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

/// Key generation and the two core transforms, keyed by algorithm.
pub trait KemProvider: Send + Sync {
    /// Whether `algorithm` is enabled on this provider.
    fn supports(&self, algorithm: AlgorithmId) -> bool;

    /// Generate a matched key pair for `algorithm`.
    fn generate(&self, algorithm: AlgorithmId) -> Result<KeyPair, CipherError>;

    /// Encapsulate a fresh shared secret to `public_key` and use it to
    /// protect `plaintext`. Output differs between calls.
    fn encapsulate(&self, public_key: &PublicKey, plaintext: &[u8])
        -> Result<Sealed, CipherError>;

    /// Recover the plaintext. Any mismatch between key, encapsulation and
    /// ciphertext yields `DecryptionFailure` and no plaintext.
    fn decapsulate(
        &self,
        private_key: &PrivateKey,
        encapsulation: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CipherError>;
}

/// The production [`KemProvider`].
#[derive(Debug, Clone)]
pub struct StandardKem {
    enabled: Vec<AlgorithmId>,
}

impl Default for StandardKem {
    fn default() -> Self {
        Self {
            enabled: AlgorithmId::ALL.to_vec(),
        }
    }
}

impl StandardKem {
    /// Provider restricted to the given algorithms.
    pub fn with_algorithms(algorithms: &[AlgorithmId]) -> Self {
        let mut enabled = algorithms.to_vec();
        enabled.sort();
        enabled.dedup();
        Self { enabled }
    }

    pub fn enabled(&self) -> &[AlgorithmId] {
        &self.enabled
    }

    fn ensure_enabled(&self, algorithm: AlgorithmId) -> Result<(), CipherError> {
        if self.supports(algorithm) {
            Ok(())
        } else {
            Err(CipherError::unsupported(algorithm))
        }
    }
}

impl KemProvider for StandardKem {
    fn supports(&self, algorithm: AlgorithmId) -> bool {
        self.enabled.contains(&algorithm)
    }

    fn generate(&self, algorithm: AlgorithmId) -> Result<KeyPair, CipherError> {
        self.ensure_enabled(algorithm)?;
        let (public, private) = match algorithm {
            AlgorithmId::X25519HkdfSha256 => {
                let secret = StaticSecret::random_from_rng(OsRng);
                let public = X25519PublicKey::from(&secret);
                let secret_bytes = Zeroizing::new(secret.to_bytes());
                (public.as_bytes().to_vec(), secret_bytes.to_vec())
            }
            AlgorithmId::MlKem768 => {
                let (dk, ek) = MlKem768::generate(&mut OsRng);
                (ek.as_bytes().to_vec(), dk.as_bytes().to_vec())
            }
        };
        Ok(KeyPair::from_parts(
            PublicKey::new(algorithm, public)?,
            PrivateKey::new(algorithm, private)?,
        ))
    }

    fn encapsulate(
        &self,
        public_key: &PublicKey,
        plaintext: &[u8],
    ) -> Result<Sealed, CipherError> {
        let algorithm = public_key.algorithm();
        self.ensure_enabled(algorithm)?;

        let (encapsulation, keys) = match algorithm {
            AlgorithmId::X25519HkdfSha256 => {
                let recipient = x25519_public(public_key.as_bytes())
                    .ok_or(CipherError::InvalidPublicKey)?;
                let eph = EphemeralSecret::random_from_rng(OsRng);
                let eph_pub = X25519PublicKey::from(&eph);
                let shared = eph.diffie_hellman(&recipient);
                if !shared.was_contributory() {
                    return Err(CipherError::InvalidPublicKey);
                }
                let salt = x25519_salt(&eph_pub, &recipient);
                let keys = derive_keys(algorithm, shared.as_bytes(), &salt)
                    .ok_or(CipherError::EncryptionFailed)?;
                (eph_pub.as_bytes().to_vec(), keys)
            }
            AlgorithmId::MlKem768 => {
                let encoded: Encoded<MlKemEncapsulationKey> = public_key
                    .as_bytes()
                    .try_into()
                    .map_err(|_| CipherError::InvalidPublicKey)?;
                let ek = MlKemEncapsulationKey::from_bytes(&encoded);
                let (ct, shared) = ek
                    .encapsulate(&mut OsRng)
                    .map_err(|_| CipherError::EncryptionFailed)?;
                let keys = derive_keys(algorithm, shared.as_slice(), ct.as_slice())
                    .ok_or(CipherError::EncryptionFailed)?;
                (ct.as_slice().to_vec(), keys)
            }
        };

        let aad = envelope_aad(algorithm, &encapsulation);
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&keys.key[..]));
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&keys.nonce[..]),
                Payload {
                    msg: plaintext,
                    aad: &aad,
                },
            )
            .map_err(|_| CipherError::EncryptionFailed)?;

        Ok(Sealed {
            encapsulation,
            ciphertext,
        })
    }

    fn decapsulate(
        &self,
        private_key: &PrivateKey,
        encapsulation: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CipherError> {
        let algorithm = private_key.algorithm();
        self.ensure_enabled(algorithm)?;

        if encapsulation.len() != algorithm.encapsulation_len() {
            return Err(CipherError::DecryptionFailure);
        }

        let keys = match algorithm {
            AlgorithmId::X25519HkdfSha256 => {
                let secret_bytes: Zeroizing<[u8; 32]> = Zeroizing::new(
                    private_key
                        .secret_bytes()
                        .try_into()
                        .map_err(|_| CipherError::DecryptionFailure)?,
                );
                let secret = StaticSecret::from(*secret_bytes);
                let own_pub = X25519PublicKey::from(&secret);
                let eph_pub =
                    x25519_public(encapsulation).ok_or(CipherError::DecryptionFailure)?;
                let shared = secret.diffie_hellman(&eph_pub);
                if !shared.was_contributory() {
                    return Err(CipherError::DecryptionFailure);
                }
                let salt = x25519_salt(&eph_pub, &own_pub);
                derive_keys(algorithm, shared.as_bytes(), &salt)
            }
            AlgorithmId::MlKem768 => {
                let encoded: Encoded<MlKemDecapsulationKey> = private_key
                    .secret_bytes()
                    .try_into()
                    .map_err(|_| CipherError::DecryptionFailure)?;
                let dk = MlKemDecapsulationKey::from_bytes(&encoded);
                let ct: Ciphertext<MlKem768> = encapsulation
                    .try_into()
                    .map_err(|_| CipherError::DecryptionFailure)?;
                // ML-KEM rejects implicitly: a wrong key yields an unrelated
                // secret and the AEAD open below fails.
                let shared = dk
                    .decapsulate(&ct)
                    .map_err(|_| CipherError::DecryptionFailure)?;
                derive_keys(algorithm, shared.as_slice(), encapsulation)
            }
        }
        .ok_or(CipherError::DecryptionFailure)?;

        let aad = envelope_aad(algorithm, encapsulation);
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&keys.key[..]));
        cipher
            .decrypt(
                Nonce::from_slice(&keys.nonce[..]),
                Payload {
                    msg: ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| CipherError::DecryptionFailure)
    }
}

struct MessageKeys {
    key: Zeroizing<[u8; 32]>,
    nonce: [u8; 12],
}

/// HKDF-SHA256(salt, shared_secret) expanded into an AEAD key and nonce.
///
/// The nonce is fixed per derived key; every message derives a fresh key.
fn derive_keys(algorithm: AlgorithmId, shared_secret: &[u8], salt: &[u8]) -> Option<MessageKeys> {
    let hk = Hkdf::<Sha256>::new(Some(salt), shared_secret);

    let mut key = Zeroizing::new([0u8; 32]);
    hk.expand(&kdf_info(algorithm, "key"), &mut key[..]).ok()?;

    let mut nonce = [0u8; 12];
    hk.expand(&kdf_info(algorithm, "nonce"), &mut nonce).ok()?;

    Some(MessageKeys { key, nonce })
}

fn kdf_info(algorithm: AlgorithmId, label: &str) -> Vec<u8> {
    let mut t = Transcript::new("qmail_kem_kdf_v1");
    t.append_str(tags::ALGORITHM, algorithm.name());
    t.append_str(tags::LABEL, label);
    t.as_bytes().to_vec()
}

/// Associated data binding the suite and the encapsulation to the ciphertext.
fn envelope_aad(algorithm: AlgorithmId, encapsulation: &[u8]) -> Vec<u8> {
    let mut t = Transcript::new("qmail_envelope_aad_v1");
    t.append_u64(tags::ALGORITHM, u64::from(algorithm.wire_tag()));
    t.append_bytes(tags::ENCAPSULATION, encapsulation);
    t.as_bytes().to_vec()
}

fn x25519_public(bytes: &[u8]) -> Option<X25519PublicKey> {
    let arr: [u8; 32] = bytes.try_into().ok()?;
    Some(X25519PublicKey::from(arr))
}

fn x25519_salt(eph_pub: &X25519PublicKey, recipient: &X25519PublicKey) -> [u8; 64] {
    let mut salt = [0u8; 64];
    salt[..32].copy_from_slice(eph_pub.as_bytes());
    salt[32..].copy_from_slice(recipient.as_bytes());
    salt
}

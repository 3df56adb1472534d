//! Envelope wire format.
//!
//! Version 1 layout, all integers big-endian:
//!
//! ```text
//! offset  size  field
//! 0       4     magic "QMEV"
//! 4       1     version (1)
//! 5       2     algorithm tag
//! 7       4     encapsulation length N
//! 11      N     encapsulation
//! 11+N    4     ciphertext length M
//! 15+N    M     ciphertext
//! ```
//!
//! Decoding is strict: every byte must be accounted for. Neither field may
//! exceed [`MAX_FIELD_LEN`]; encoding refuses such an envelope instead of
//! truncating its length prefix, and decoding rejects the prefix before
//! looking at the body. Mail bodies carry the text form, which is the binary
//! form in standard base64.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::algorithm::AlgorithmId;
use crate::error::CipherError;

pub const ENVELOPE_MAGIC: [u8; 4] = *b"QMEV";
pub const ENVELOPE_VERSION: u8 = 1;

/// Largest encapsulation or ciphertext a version 1 envelope carries (16 MiB).
pub const MAX_FIELD_LEN: usize = 16 * 1024 * 1024;

const HEADER_LEN: usize = 4 + 1 + 2;
const LEN_PREFIX: usize = 4;

/// The self-describing container produced by sealing a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub algorithm: AlgorithmId,
    pub encapsulation: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Size of the encoded binary form.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + LEN_PREFIX + self.encapsulation.len() + LEN_PREFIX + self.ciphertext.len()
    }
}

/// Encoder and decoder for [`Envelope`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeCodec;

impl EnvelopeCodec {
    /// Encode to the binary wire form.
    ///
    /// Pure, and total over envelopes whose fields fit [`MAX_FIELD_LEN`];
    /// anything larger is `MessageTooLarge`. `MessageCipher::seal` never
    /// produces such an envelope.
    pub fn encode(envelope: &Envelope) -> Result<Bytes, CipherError> {
        let encapsulation_len = field_len(&envelope.encapsulation)?;
        let ciphertext_len = field_len(&envelope.ciphertext)?;

        let mut buf = BytesMut::with_capacity(envelope.encoded_len());
        buf.put_slice(&ENVELOPE_MAGIC);
        buf.put_u8(ENVELOPE_VERSION);
        buf.put_u16(envelope.algorithm.wire_tag());
        buf.put_u32(encapsulation_len);
        buf.put_slice(&envelope.encapsulation);
        buf.put_u32(ciphertext_len);
        buf.put_slice(&envelope.ciphertext);
        Ok(buf.freeze())
    }

    /// Decode the binary wire form.
    pub fn decode(wire: &[u8]) -> Result<Envelope, CipherError> {
        let mut buf = wire;

        if buf.remaining() < HEADER_LEN {
            return Err(CipherError::MalformedEnvelope("truncated header"));
        }
        let mut magic = [0u8; 4];
        buf.copy_to_slice(&mut magic);
        if magic != ENVELOPE_MAGIC {
            return Err(CipherError::MalformedEnvelope("bad magic"));
        }
        if buf.get_u8() != ENVELOPE_VERSION {
            return Err(CipherError::MalformedEnvelope("unsupported version"));
        }
        let algorithm = AlgorithmId::from_wire_tag(buf.get_u16())
            .ok_or(CipherError::MalformedEnvelope("unknown algorithm tag"))?;

        let encapsulation = take_field(&mut buf, "encapsulation overruns buffer")?;
        let ciphertext = take_field(&mut buf, "ciphertext overruns buffer")?;

        if buf.has_remaining() {
            return Err(CipherError::MalformedEnvelope("trailing bytes"));
        }

        Ok(Envelope {
            algorithm,
            encapsulation,
            ciphertext,
        })
    }

    /// Encode to base64 text for string-typed mail bodies.
    pub fn encode_text(envelope: &Envelope) -> Result<String, CipherError> {
        Ok(STANDARD.encode(Self::encode(envelope)?))
    }

    pub fn decode_text(text: &str) -> Result<Envelope, CipherError> {
        let wire = STANDARD
            .decode(text.trim())
            .map_err(|_| CipherError::MalformedEnvelope("invalid base64"))?;
        Self::decode(&wire)
    }
}

fn field_len(field: &[u8]) -> Result<u32, CipherError> {
    let len = field.len();
    u32::try_from(len)
        .ok()
        .filter(|_| len <= MAX_FIELD_LEN)
        .ok_or(CipherError::MessageTooLarge {
            len,
            max: MAX_FIELD_LEN,
        })
}

fn take_field(buf: &mut &[u8], overrun: &'static str) -> Result<Vec<u8>, CipherError> {
    if buf.remaining() < LEN_PREFIX {
        return Err(CipherError::MalformedEnvelope("truncated length prefix"));
    }
    let len = buf.get_u32() as usize;
    if len > MAX_FIELD_LEN {
        return Err(CipherError::MalformedEnvelope("field exceeds maximum length"));
    }
    if buf.remaining() < len {
        return Err(CipherError::MalformedEnvelope(overrun));
    }
    let field = buf[..len].to_vec();
    buf.advance(len);
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Envelope {
        Envelope {
            algorithm: AlgorithmId::X25519HkdfSha256,
            encapsulation: vec![0xE0; 32],
            ciphertext: b"ciphertext-with-tag".to_vec(),
        }
    }

    #[test]
    fn test_encode_layout() {
        let env = Envelope {
            algorithm: AlgorithmId::MlKem768,
            encapsulation: vec![0xAA, 0xBB],
            ciphertext: vec![0xCC],
        };
        let wire = EnvelopeCodec::encode(&env).unwrap();
        assert_eq!(
            wire.as_ref(),
            &[
                b'Q', b'M', b'E', b'V', 1, 0x00, 0x02, 0, 0, 0, 2, 0xAA, 0xBB, 0, 0, 0, 1, 0xCC
            ]
        );
        assert_eq!(wire.len(), env.encoded_len());
    }

    #[test]
    fn test_round_trip() {
        let env = sample();
        assert_eq!(EnvelopeCodec::decode(&EnvelopeCodec::encode(&env).unwrap()).unwrap(), env);
    }

    #[test]
    fn test_text_round_trip() {
        let env = sample();
        let text = EnvelopeCodec::encode_text(&env).unwrap();
        assert_eq!(EnvelopeCodec::decode_text(&text).unwrap(), env);
    }

    #[test]
    fn test_empty_fields_round_trip() {
        let env = Envelope {
            algorithm: AlgorithmId::MlKem768,
            encapsulation: Vec::new(),
            ciphertext: Vec::new(),
        };
        assert_eq!(EnvelopeCodec::decode(&EnvelopeCodec::encode(&env).unwrap()).unwrap(), env);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let env = sample();
        assert_eq!(EnvelopeCodec::encode(&env).unwrap(), EnvelopeCodec::encode(&env).unwrap());
    }

    #[test]
    fn test_every_truncation_is_malformed() {
        let wire = EnvelopeCodec::encode(&sample()).unwrap();
        for cut in 0..wire.len() {
            assert!(
                matches!(
                    EnvelopeCodec::decode(&wire[..cut]),
                    Err(CipherError::MalformedEnvelope(_))
                ),
                "truncation at {cut} was accepted"
            );
        }
    }

    #[test]
    fn test_bad_magic() {
        let mut wire = EnvelopeCodec::encode(&sample()).unwrap().to_vec();
        wire[0] = b'X';
        assert_eq!(
            EnvelopeCodec::decode(&wire),
            Err(CipherError::MalformedEnvelope("bad magic"))
        );
    }

    #[test]
    fn test_unknown_version() {
        let mut wire = EnvelopeCodec::encode(&sample()).unwrap().to_vec();
        wire[4] = 2;
        assert_eq!(
            EnvelopeCodec::decode(&wire),
            Err(CipherError::MalformedEnvelope("unsupported version"))
        );
    }

    #[test]
    fn test_unknown_algorithm_tag() {
        let mut wire = EnvelopeCodec::encode(&sample()).unwrap().to_vec();
        wire[5] = 0x7F;
        wire[6] = 0x7F;
        assert_eq!(
            EnvelopeCodec::decode(&wire),
            Err(CipherError::MalformedEnvelope("unknown algorithm tag"))
        );
    }

    #[test]
    fn test_trailing_bytes() {
        let mut wire = EnvelopeCodec::encode(&sample()).unwrap().to_vec();
        wire.push(0);
        assert_eq!(
            EnvelopeCodec::decode(&wire),
            Err(CipherError::MalformedEnvelope("trailing bytes"))
        );
    }

    #[test]
    fn test_length_prefix_past_end_of_buffer() {
        let mut wire = EnvelopeCodec::encode(&sample()).unwrap().to_vec();
        wire[7..11].copy_from_slice(&1000u32.to_be_bytes());
        assert_eq!(
            EnvelopeCodec::decode(&wire),
            Err(CipherError::MalformedEnvelope("encapsulation overruns buffer"))
        );
    }

    #[test]
    fn test_length_prefix_above_cap() {
        let mut wire = EnvelopeCodec::encode(&sample()).unwrap().to_vec();
        wire[7..11].copy_from_slice(&u32::MAX.to_be_bytes());
        assert_eq!(
            EnvelopeCodec::decode(&wire),
            Err(CipherError::MalformedEnvelope("field exceeds maximum length"))
        );

        let mut wire = EnvelopeCodec::encode(&sample()).unwrap().to_vec();
        let over = (MAX_FIELD_LEN as u32 + 1).to_be_bytes();
        wire[7..11].copy_from_slice(&over);
        assert_eq!(
            EnvelopeCodec::decode(&wire),
            Err(CipherError::MalformedEnvelope("field exceeds maximum length"))
        );
    }

    #[test]
    fn test_encode_refuses_oversized_field() {
        let env = Envelope {
            algorithm: AlgorithmId::X25519HkdfSha256,
            encapsulation: vec![0xE0; 32],
            ciphertext: vec![0; MAX_FIELD_LEN + 1],
        };
        assert_eq!(
            EnvelopeCodec::encode(&env),
            Err(CipherError::MessageTooLarge {
                len: MAX_FIELD_LEN + 1,
                max: MAX_FIELD_LEN,
            })
        );
        assert!(EnvelopeCodec::encode_text(&env).is_err());

        let at_cap = Envelope {
            ciphertext: vec![0; MAX_FIELD_LEN],
            ..env
        };
        let wire = EnvelopeCodec::encode(&at_cap).unwrap();
        assert_eq!(EnvelopeCodec::decode(&wire).unwrap(), at_cap);
    }

    #[test]
    fn test_legacy_string_body_is_malformed() {
        // Bodies written by the old web client were bracketed marker strings.
        let legacy = "[ENCRYPTED-WITH-abcdefghij]aGVsbG8=";
        assert!(matches!(
            EnvelopeCodec::decode_text(legacy),
            Err(CipherError::MalformedEnvelope(_))
        ));
        assert!(matches!(
            EnvelopeCodec::decode_text(""),
            Err(CipherError::MalformedEnvelope(_))
        ));
    }
}

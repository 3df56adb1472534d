use proptest::prelude::*;

use crate::algorithm::AlgorithmId;
use crate::cipher::MessageCipher;
use crate::envelope::{Envelope, EnvelopeCodec};
use crate::error::CipherError;
use crate::kem::{KemProvider, StandardKem};

fn any_algorithm() -> impl Strategy<Value = AlgorithmId> {
    prop::sample::select(AlgorithmId::ALL.to_vec())
}

fn any_envelope() -> impl Strategy<Value = Envelope> {
    (
        any_algorithm(),
        prop::collection::vec(any::<u8>(), 0..128),
        prop::collection::vec(any::<u8>(), 0..512),
    )
        .prop_map(|(algorithm, encapsulation, ciphertext)| Envelope {
            algorithm,
            encapsulation,
            ciphertext,
        })
}

proptest! {
    #[test]
    fn test_codec_round_trip(env in any_envelope()) {
        let wire = EnvelopeCodec::encode(&env).unwrap();
        prop_assert_eq!(wire.len(), env.encoded_len());
        prop_assert_eq!(EnvelopeCodec::decode(&wire).unwrap(), env);
    }

    #[test]
    fn test_codec_text_round_trip(env in any_envelope()) {
        let text = EnvelopeCodec::encode_text(&env).unwrap();
        prop_assert_eq!(EnvelopeCodec::decode_text(&text).unwrap(), env);
    }

    #[test]
    fn test_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        // Arbitrary input either decodes to an envelope that re-encodes to the
        // same bytes, or is rejected as malformed.
        match EnvelopeCodec::decode(&bytes) {
            Ok(env) => {
                let encoded = EnvelopeCodec::encode(&env).unwrap();
                prop_assert_eq!(encoded.as_ref(), bytes.as_slice())
            }
            Err(err) => prop_assert!(matches!(err, CipherError::MalformedEnvelope(_))),
        }
    }

    #[test]
    fn test_truncation_is_malformed(env in any_envelope(), cut in any::<prop::sample::Index>()) {
        let wire = EnvelopeCodec::encode(&env).unwrap();
        let cut = cut.index(wire.len());
        prop_assert!(matches!(
            EnvelopeCodec::decode(&wire[..cut]),
            Err(CipherError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_x25519_seal_open_round_trip(plaintext in prop::collection::vec(any::<u8>(), 0..2048)) {
        let cipher = MessageCipher::<StandardKem>::default();
        let pair = cipher.kem().generate(AlgorithmId::X25519HkdfSha256).unwrap();
        let envelope = cipher
            .seal(pair.public_key(), AlgorithmId::X25519HkdfSha256, &plaintext)
            .unwrap();
        prop_assert_eq!(cipher.open(pair.private_key(), &envelope).unwrap(), plaintext);
    }

    #[test]
    fn test_bit_flip_never_yields_plaintext(
        plaintext in prop::collection::vec(any::<u8>(), 1..256),
        flip in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let cipher = MessageCipher::<StandardKem>::default();
        let pair = cipher.kem().generate(AlgorithmId::X25519HkdfSha256).unwrap();
        let mut envelope = cipher
            .seal(pair.public_key(), AlgorithmId::X25519HkdfSha256, &plaintext)
            .unwrap();
        let at = flip.index(envelope.ciphertext.len());
        envelope.ciphertext[at] ^= 1 << bit;
        prop_assert_eq!(
            cipher.open(pair.private_key(), &envelope),
            Err(CipherError::DecryptionFailure)
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn test_mlkem_seal_open_round_trip(plaintext in prop::collection::vec(any::<u8>(), 0..1024)) {
        let cipher = MessageCipher::<StandardKem>::default();
        let pair = cipher.kem().generate(AlgorithmId::MlKem768).unwrap();
        let wire = cipher
            .seal_encoded(pair.public_key(), AlgorithmId::MlKem768, &plaintext)
            .unwrap();
        prop_assert_eq!(cipher.open_encoded(pair.private_key(), &wire).unwrap(), plaintext);
    }
}

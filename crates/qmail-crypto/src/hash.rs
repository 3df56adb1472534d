use sha2::{Digest, Sha256};

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(data);
    h.finalize().into()
}

/// Short, non-secret display fingerprint: first 8 bytes of sha256, hex.
pub fn fingerprint(data: &[u8]) -> String {
    hex::encode(&sha256(data)[..8])
}

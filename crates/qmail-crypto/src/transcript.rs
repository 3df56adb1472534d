//! Transcript module for deterministic binding data.
//!
//! Appends tagged fields in a canonical `(tag, len, bytes)` layout so the same
//! logical inputs always produce the same bytes. Used for AEAD associated data
//! and HKDF info strings.

use bytes::{BufMut, BytesMut};

/// Standard tag constants for transcript fields.
pub mod tags {
    pub const DOMAIN: u32 = 0;
    pub const ALGORITHM: u32 = 1;
    pub const ENCAPSULATION: u32 = 2;
    pub const LABEL: u32 = 3;
}

/// A minimal deterministic transcript builder.
#[derive(Clone, Debug, Default)]
pub struct Transcript {
    buf: BytesMut,
}

impl Transcript {
    /// Create a new transcript with the given domain separator.
    pub fn new(domain: &'static str) -> Self {
        let mut t = Self {
            buf: BytesMut::with_capacity(128),
        };
        t.append_bytes(tags::DOMAIN, domain.as_bytes());
        t
    }

    /// Append raw bytes with a tag.
    pub fn append_bytes(&mut self, tag: u32, data: &[u8]) -> &mut Self {
        // tag (u32 be) + len (u32 be) + data
        self.buf.put_u32(tag);
        self.buf.put_u32(data.len() as u32);
        self.buf.extend_from_slice(data);
        self
    }

    /// Append a u64 value with a tag.
    pub fn append_u64(&mut self, tag: u32, v: u64) -> &mut Self {
        self.buf.put_u32(tag);
        self.buf.put_u32(8);
        self.buf.put_u64(v);
        self
    }

    pub fn append_str(&mut self, tag: u32, s: &str) -> &mut Self {
        self.append_bytes(tag, s.as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

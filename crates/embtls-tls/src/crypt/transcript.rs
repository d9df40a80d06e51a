//! Running MD5 + SHA-1 hash over the handshake messages.
//!
//! Both digests are kept live; every read clones them so later messages can
//! still be absorbed.

use embtls_crypto::hash::{Digest, Md5, Sha1};

#[derive(Clone, Default)]
pub struct TranscriptHash {
    md5: Md5,
    sha1: Sha1,
}

impl std::fmt::Debug for TranscriptHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TranscriptHash")
    }
}

impl TranscriptHash {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb one handshake message, header included.
    pub fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.md5, data);
        Digest::update(&mut self.sha1, data);
    }

    /// `MD5(messages) || SHA-1(messages)`.
    pub fn md5_sha1(&self) -> [u8; 36] {
        let mut out = [0u8; 36];
        out[..16].copy_from_slice(&self.md5.clone().finalize());
        out[16..].copy_from_slice(&self.sha1.clone().finalize());
        out
    }

    /// Copies of the two running digests, for the SSLv3 constructions that
    /// keep hashing past the transcript.
    pub fn states(&self) -> (Md5, Sha1) {
        (self.md5.clone(), self.sha1.clone())
    }
}

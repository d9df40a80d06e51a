//! Digest selection by algorithm id.
//!
//! MD5 and SHA-1 are re-exported for the incremental users (transcript,
//! SSLv3 MAC and key derivation); everything else goes through [`digest`].

pub use ::digest::Digest;
pub use md5::Md5;
pub use sha1::Sha1;

use embtls_types::HashAlgId;

/// One-shot digest of `data` with the given algorithm.
pub fn digest(alg: HashAlgId, data: &[u8]) -> Vec<u8> {
    match alg {
        HashAlgId::Md2 => md2::Md2::digest(data).to_vec(),
        HashAlgId::Md4 => md4::Md4::digest(data).to_vec(),
        HashAlgId::Md5 => Md5::digest(data).to_vec(),
        HashAlgId::Sha1 => Sha1::digest(data).to_vec(),
        HashAlgId::Sha224 => sha2::Sha224::digest(data).to_vec(),
        HashAlgId::Sha256 => sha2::Sha256::digest(data).to_vec(),
        HashAlgId::Sha384 => sha2::Sha384::digest(data).to_vec(),
        HashAlgId::Sha512 => sha2::Sha512::digest(data).to_vec(),
    }
}

/// DER prefix of the PKCS#1 `DigestInfo` wrapping a digest of `alg`.
pub fn digest_info_prefix(alg: HashAlgId) -> &'static [u8] {
    match alg {
        HashAlgId::Md2 => &[
            0x30, 0x20, 0x30, 0x0c, 0x06, 0x08, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x02, 0x02,
            0x05, 0x00, 0x04, 0x10,
        ],
        HashAlgId::Md4 => &[
            0x30, 0x20, 0x30, 0x0c, 0x06, 0x08, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x02, 0x04,
            0x05, 0x00, 0x04, 0x10,
        ],
        HashAlgId::Md5 => &[
            0x30, 0x20, 0x30, 0x0c, 0x06, 0x08, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x02, 0x05,
            0x05, 0x00, 0x04, 0x10,
        ],
        HashAlgId::Sha1 => &[
            0x30, 0x21, 0x30, 0x09, 0x06, 0x05, 0x2b, 0x0e, 0x03, 0x02, 0x1a, 0x05, 0x00, 0x04,
            0x14,
        ],
        HashAlgId::Sha224 => &[
            0x30, 0x2d, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02,
            0x04, 0x05, 0x00, 0x04, 0x1c,
        ],
        HashAlgId::Sha256 => &[
            0x30, 0x31, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02,
            0x01, 0x05, 0x00, 0x04, 0x20,
        ],
        HashAlgId::Sha384 => &[
            0x30, 0x41, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02,
            0x02, 0x05, 0x00, 0x04, 0x30,
        ],
        HashAlgId::Sha512 => &[
            0x30, 0x51, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02,
            0x03, 0x05, 0x00, 0x04, 0x40,
        ],
    }
}

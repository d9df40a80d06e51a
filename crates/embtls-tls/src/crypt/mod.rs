//! Cryptographic plumbing between the handshake and the primitives in
//! `embtls-crypto`.

pub mod key_schedule;
pub mod keylog;
pub mod prf;
pub mod ssl3;
pub mod transcript;

use crate::CipherSuite;
use embtls_types::{CipherAlgId, HashAlgId, TlsError};

/// Key exchange method of a cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExchangeAlg {
    /// Premaster encrypted under the server's RSA key.
    Rsa,
    /// Ephemeral Diffie-Hellman signed with the server's RSA key.
    Dhe,
}

/// Everything the record layer and key schedule need to know about a suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherSuiteParams {
    pub suite: CipherSuite,
    pub kx_alg: KeyExchangeAlg,
    pub cipher: CipherAlgId,
    /// MD5 or SHA-1.
    pub mac: HashAlgId,
    pub mac_len: usize,
    pub key_len: usize,
    /// Zero for the stream cipher.
    pub iv_len: usize,
}

impl CipherSuiteParams {
    pub fn from_suite(suite: CipherSuite) -> Result<Self, TlsError> {
        let (kx_alg, cipher, mac) = match suite {
            CipherSuite::TLS_RSA_WITH_RC4_128_MD5 => {
                (KeyExchangeAlg::Rsa, CipherAlgId::Arc4_128, HashAlgId::Md5)
            }
            CipherSuite::TLS_RSA_WITH_RC4_128_SHA => {
                (KeyExchangeAlg::Rsa, CipherAlgId::Arc4_128, HashAlgId::Sha1)
            }
            CipherSuite::TLS_RSA_WITH_3DES_EDE_CBC_SHA => {
                (KeyExchangeAlg::Rsa, CipherAlgId::Des3Cbc, HashAlgId::Sha1)
            }
            CipherSuite::TLS_DHE_RSA_WITH_3DES_EDE_CBC_SHA => {
                (KeyExchangeAlg::Dhe, CipherAlgId::Des3Cbc, HashAlgId::Sha1)
            }
            CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA => {
                (KeyExchangeAlg::Rsa, CipherAlgId::Aes128Cbc, HashAlgId::Sha1)
            }
            CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA => {
                (KeyExchangeAlg::Rsa, CipherAlgId::Aes256Cbc, HashAlgId::Sha1)
            }
            CipherSuite::TLS_DHE_RSA_WITH_AES_256_CBC_SHA => {
                (KeyExchangeAlg::Dhe, CipherAlgId::Aes256Cbc, HashAlgId::Sha1)
            }
            CipherSuite::TLS_RSA_WITH_CAMELLIA_128_CBC_SHA => (
                KeyExchangeAlg::Rsa,
                CipherAlgId::Camellia128Cbc,
                HashAlgId::Sha1,
            ),
            CipherSuite::TLS_RSA_WITH_CAMELLIA_256_CBC_SHA => (
                KeyExchangeAlg::Rsa,
                CipherAlgId::Camellia256Cbc,
                HashAlgId::Sha1,
            ),
            CipherSuite::TLS_DHE_RSA_WITH_CAMELLIA_256_CBC_SHA => (
                KeyExchangeAlg::Dhe,
                CipherAlgId::Camellia256Cbc,
                HashAlgId::Sha1,
            ),
            _ => return Err(TlsError::NoSharedCipherSuite),
        };
        Ok(Self {
            suite,
            kx_alg,
            cipher,
            mac,
            mac_len: mac.output_len(),
            key_len: cipher.key_len(),
            iv_len: cipher.iv_len(),
        })
    }

    /// Total key block length: two MAC secrets, two keys, two IVs.
    pub fn key_block_len(&self) -> usize {
        2 * (self.mac_len + self.key_len + self.iv_len)
    }

    pub fn is_block_cipher(&self) -> bool {
        self.cipher.block_size() > 0
    }
}

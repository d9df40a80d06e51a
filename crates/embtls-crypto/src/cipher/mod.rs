//! Bulk ciphers for the record layer.
//!
//! Each record direction owns one [`BulkCipher`]. CBC variants carry their
//! IV across calls, which is how SSLv3 and TLS 1.0 chain records: the last
//! ciphertext block of one record is the IV of the next.

use ::cipher::generic_array::GenericArray;
use ::cipher::{consts::U16, BlockDecrypt, BlockEncrypt, KeyInit, StreamCipher};
use aes::{Aes128, Aes256};
use camellia::{Camellia128, Camellia256};
use des::TdesEde3;
use embtls_types::{CipherAlgId, CryptoError};
use rc4::Rc4;
use zeroize::Zeroize;

const MAX_BLOCK: usize = 16;

/// A block cipher in CBC mode with its chaining value.
pub struct Cbc<C> {
    cipher: C,
    iv: [u8; MAX_BLOCK],
}

impl<C: BlockEncrypt + BlockDecrypt + KeyInit> Cbc<C> {
    fn new(key: &[u8], iv: &[u8]) -> Result<Self, CryptoError> {
        let bs = C::block_size();
        if iv.len() != bs {
            return Err(CryptoError::InvalidKeyLength {
                expected: bs,
                got: iv.len(),
            });
        }
        let cipher = C::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
            expected: C::key_size(),
            got: key.len(),
        })?;
        let mut chain = [0u8; MAX_BLOCK];
        chain[..bs].copy_from_slice(iv);
        Ok(Self { cipher, iv: chain })
    }

    fn encrypt(&mut self, buf: &mut [u8]) -> Result<(), CryptoError> {
        let bs = C::block_size();
        if buf.len() % bs != 0 {
            return Err(CryptoError::InvalidArg);
        }
        for block in buf.chunks_exact_mut(bs) {
            for (b, v) in block.iter_mut().zip(&self.iv[..bs]) {
                *b ^= v;
            }
            self.cipher
                .encrypt_block(GenericArray::from_mut_slice(block));
            self.iv[..bs].copy_from_slice(block);
        }
        Ok(())
    }

    fn decrypt(&mut self, buf: &mut [u8]) -> Result<(), CryptoError> {
        let bs = C::block_size();
        if buf.len() % bs != 0 {
            return Err(CryptoError::InvalidArg);
        }
        let mut saved = [0u8; MAX_BLOCK];
        for block in buf.chunks_exact_mut(bs) {
            saved[..bs].copy_from_slice(block);
            self.cipher
                .decrypt_block(GenericArray::from_mut_slice(block));
            for (b, v) in block.iter_mut().zip(&self.iv[..bs]) {
                *b ^= v;
            }
            self.iv[..bs].copy_from_slice(&saved[..bs]);
        }
        saved.zeroize();
        Ok(())
    }
}

impl<C> Drop for Cbc<C> {
    fn drop(&mut self) {
        self.iv.zeroize();
    }
}

/// A keyed bulk cipher, one variant per supported algorithm.
pub enum BulkCipher {
    Arc4(Box<Rc4<U16>>),
    Des3(Box<Cbc<TdesEde3>>),
    Aes128(Box<Cbc<Aes128>>),
    Aes256(Box<Cbc<Aes256>>),
    Camellia128(Box<Cbc<Camellia128>>),
    Camellia256(Box<Cbc<Camellia256>>),
}

impl std::fmt::Debug for BulkCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BulkCipher").field(&self.alg()).finish()
    }
}

impl BulkCipher {
    /// Key a cipher. `iv` must be empty for ARC4 and one block otherwise.
    pub fn new(alg: CipherAlgId, key: &[u8], iv: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != alg.key_len() {
            return Err(CryptoError::InvalidKeyLength {
                expected: alg.key_len(),
                got: key.len(),
            });
        }
        Ok(match alg {
            CipherAlgId::Arc4_128 => {
                if !iv.is_empty() {
                    return Err(CryptoError::InvalidArg);
                }
                let rc4 = <Rc4<U16> as KeyInit>::new_from_slice(key)
                    .map_err(|_| CryptoError::InvalidKey)?;
                BulkCipher::Arc4(Box::new(rc4))
            }
            CipherAlgId::Des3Cbc => BulkCipher::Des3(Box::new(Cbc::new(key, iv)?)),
            CipherAlgId::Aes128Cbc => BulkCipher::Aes128(Box::new(Cbc::new(key, iv)?)),
            CipherAlgId::Aes256Cbc => BulkCipher::Aes256(Box::new(Cbc::new(key, iv)?)),
            CipherAlgId::Camellia128Cbc => BulkCipher::Camellia128(Box::new(Cbc::new(key, iv)?)),
            CipherAlgId::Camellia256Cbc => BulkCipher::Camellia256(Box::new(Cbc::new(key, iv)?)),
        })
    }

    pub fn alg(&self) -> CipherAlgId {
        match self {
            BulkCipher::Arc4(_) => CipherAlgId::Arc4_128,
            BulkCipher::Des3(_) => CipherAlgId::Des3Cbc,
            BulkCipher::Aes128(_) => CipherAlgId::Aes128Cbc,
            BulkCipher::Aes256(_) => CipherAlgId::Aes256Cbc,
            BulkCipher::Camellia128(_) => CipherAlgId::Camellia128Cbc,
            BulkCipher::Camellia256(_) => CipherAlgId::Camellia256Cbc,
        }
    }

    /// Block size in bytes, zero for the stream cipher.
    pub fn block_size(&self) -> usize {
        self.alg().block_size()
    }

    /// Encrypt in place. Block ciphers require whole blocks.
    pub fn encrypt(&mut self, buf: &mut [u8]) -> Result<(), CryptoError> {
        match self {
            BulkCipher::Arc4(c) => {
                c.apply_keystream(buf);
                Ok(())
            }
            BulkCipher::Des3(c) => c.encrypt(buf),
            BulkCipher::Aes128(c) => c.encrypt(buf),
            BulkCipher::Aes256(c) => c.encrypt(buf),
            BulkCipher::Camellia128(c) => c.encrypt(buf),
            BulkCipher::Camellia256(c) => c.encrypt(buf),
        }
    }

    /// Decrypt in place. Block ciphers require whole blocks.
    pub fn decrypt(&mut self, buf: &mut [u8]) -> Result<(), CryptoError> {
        match self {
            BulkCipher::Arc4(c) => {
                c.apply_keystream(buf);
                Ok(())
            }
            BulkCipher::Des3(c) => c.decrypt(buf),
            BulkCipher::Aes128(c) => c.decrypt(buf),
            BulkCipher::Aes256(c) => c.decrypt(buf),
            BulkCipher::Camellia128(c) => c.decrypt(buf),
            BulkCipher::Camellia256(c) => c.decrypt(buf),
        }
    }
}

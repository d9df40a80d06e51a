//! HMAC over the transcript hashes (RFC 2104).
//!
//! The record MAC and the TLS 1.0 PRF only ever key HMAC with MD5 or SHA-1,
//! so those are the two variants carried here.

use ::hmac::{Hmac, Mac};
use embtls_types::{CryptoError, HashAlgId};
use md5::Md5;
use sha1::Sha1;

/// An HMAC context over MD5 or SHA-1.
#[derive(Clone)]
pub enum HmacCtx {
    Md5(Hmac<Md5>),
    Sha1(Hmac<Sha1>),
}

impl HmacCtx {
    pub fn new(alg: HashAlgId, key: &[u8]) -> Result<Self, CryptoError> {
        match alg {
            HashAlgId::Md5 => <Hmac<Md5> as Mac>::new_from_slice(key)
                .map(HmacCtx::Md5)
                .map_err(|_| CryptoError::InvalidKey),
            HashAlgId::Sha1 => <Hmac<Sha1> as Mac>::new_from_slice(key)
                .map(HmacCtx::Sha1)
                .map_err(|_| CryptoError::InvalidKey),
            _ => Err(CryptoError::InvalidArg),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            HmacCtx::Md5(m) => m.update(data),
            HmacCtx::Sha1(m) => m.update(data),
        }
    }

    pub fn finish(self) -> Vec<u8> {
        match self {
            HmacCtx::Md5(m) => m.finalize().into_bytes().to_vec(),
            HmacCtx::Sha1(m) => m.finalize().into_bytes().to_vec(),
        }
    }

    pub fn output_len(&self) -> usize {
        match self {
            HmacCtx::Md5(_) => 16,
            HmacCtx::Sha1(_) => 20,
        }
    }
}

/// One-shot HMAC over the concatenation of `parts`.
pub fn hmac(alg: HashAlgId, key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>, CryptoError> {
    let mut ctx = HmacCtx::new(alg, key)?;
    for part in parts {
        ctx.update(part);
    }
    Ok(ctx.finish())
}

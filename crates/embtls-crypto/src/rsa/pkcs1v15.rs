//! PKCS#1 v1.5 block formatting (RFC 8017 §7.2 and §9.2).
//!
//! `EM = 00 || BT || PS || 00 || T`, with BT = 02 and random non-zero PS for
//! encryption, BT = 01 and PS of 0xFF for signatures.

use crate::hash::digest_info_prefix;
use crate::rand::{fill_nonzero, RandomSource};
use embtls_types::{CryptoError, HashAlgId};
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq, ConstantTimeLess};

/// Shortest PS the format allows.
const MIN_PAD: usize = 8;

pub(crate) fn encrypt_pad(
    rng: &dyn RandomSource,
    msg: &[u8],
    k: usize,
) -> Result<Vec<u8>, CryptoError> {
    if msg.len() + MIN_PAD + 3 > k {
        return Err(CryptoError::InputOverflow);
    }
    let ps_len = k - msg.len() - 3;
    let mut em = vec![0u8; k];
    em[1] = 0x02;
    fill_nonzero(rng, &mut em[2..2 + ps_len])?;
    em[3 + ps_len..].copy_from_slice(msg);
    Ok(em)
}

/// Block type 1 encoding. `hash == None` signs `hashed` as-is, which is
/// what the TLS 1.0 handshake does with its 36-byte MD5 || SHA-1 value.
pub(crate) fn sign_pad(
    hash: Option<HashAlgId>,
    hashed: &[u8],
    k: usize,
) -> Result<Vec<u8>, CryptoError> {
    let prefix: &[u8] = match hash {
        Some(alg) => {
            if hashed.len() != alg.output_len() {
                return Err(CryptoError::InvalidArg);
            }
            digest_info_prefix(alg)
        }
        None => &[],
    };
    let t_len = prefix.len() + hashed.len();
    if t_len + MIN_PAD + 3 > k {
        return Err(CryptoError::RsaOutputTooLarge);
    }
    let ps_len = k - t_len - 3;
    let mut em = Vec::with_capacity(k);
    em.push(0x00);
    em.push(0x01);
    em.resize(2 + ps_len, 0xFF);
    em.push(0x00);
    em.extend_from_slice(prefix);
    em.extend_from_slice(hashed);
    Ok(em)
}

/// Compare a recovered signature block against the expected encoding.
pub(crate) fn verify_unpad(
    em: &[u8],
    hash: Option<HashAlgId>,
    hashed: &[u8],
) -> Result<(), CryptoError> {
    let expected = sign_pad(hash, hashed, em.len()).map_err(|_| CryptoError::RsaVerifyFail)?;
    if bool::from(em.ct_eq(&expected)) {
        Ok(())
    } else {
        Err(CryptoError::RsaVerifyFail)
    }
}

/// Locate the message inside a type 2 block without branching on secret
/// bytes. Returns the validity bit and the message offset; the offset is
/// meaningless when the block is invalid.
pub(crate) fn decrypt_unpad(em: &[u8]) -> (Choice, usize) {
    if em.len() < MIN_PAD + 3 {
        return (Choice::from(0), em.len());
    }
    let header_ok = em[0].ct_eq(&0x00) & em[1].ct_eq(&0x02);
    let mut found = Choice::from(0);
    let mut sep = 0u64;
    for (i, &b) in em.iter().enumerate().skip(2) {
        let is_zero = b.ct_eq(&0x00);
        sep = u64::conditional_select(&sep, &(i as u64), is_zero & !found);
        found |= is_zero;
    }
    let ps_ok = !sep.ct_lt(&(2 + MIN_PAD as u64));
    (header_ok & found & ps_ok, sep as usize + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rand::OsRandom;

    #[test]
    fn test_encrypt_block_layout() {
        let em = encrypt_pad(&OsRandom, b"secret", 64).unwrap();
        assert_eq!(em.len(), 64);
        assert_eq!(&em[..2], &[0x00, 0x02]);
        assert!(em[2..57].iter().all(|&b| b != 0));
        assert_eq!(em[57], 0x00);
        assert_eq!(&em[58..], b"secret");

        let (ok, off) = decrypt_unpad(&em);
        assert!(bool::from(ok));
        assert_eq!(&em[off..], b"secret");
    }

    #[test]
    fn test_encrypt_too_long() {
        assert!(matches!(
            encrypt_pad(&OsRandom, &[1u8; 54], 64),
            Err(CryptoError::InputOverflow)
        ));
        assert!(encrypt_pad(&OsRandom, &[1u8; 53], 64).is_ok());
    }

    #[test]
    fn test_decrypt_unpad_rejections() {
        let good = encrypt_pad(&OsRandom, &[0xAB; 48], 128).unwrap();

        let mut bad_type = good.clone();
        bad_type[1] = 0x01;
        assert!(!bool::from(decrypt_unpad(&bad_type).0));

        let mut short_ps = good.clone();
        short_ps[5] = 0x00;
        assert!(!bool::from(decrypt_unpad(&short_ps).0));

        let mut no_sep = good.clone();
        for b in no_sep.iter_mut().skip(2) {
            *b = 0x11;
        }
        assert!(!bool::from(decrypt_unpad(&no_sep).0));

        let mut lead = good;
        lead[0] = 0x01;
        assert!(!bool::from(decrypt_unpad(&lead).0));
    }

    #[test]
    fn test_sign_pad_raw_and_digest_info() {
        let raw = sign_pad(None, &[0x5A; 36], 128).unwrap();
        assert_eq!(&raw[..2], &[0x00, 0x01]);
        assert!(raw[2..128 - 37].iter().all(|&b| b == 0xFF));
        assert_eq!(raw[128 - 37], 0x00);
        assert!(raw.ends_with(&[0x5A; 36]));

        let sha1 = sign_pad(Some(HashAlgId::Sha1), &[0x11; 20], 128).unwrap();
        assert!(sha1.ends_with(&[0x11; 20]));
        assert!(sign_pad(Some(HashAlgId::Sha1), &[0x11; 16], 128).is_err());
        assert!(verify_unpad(&sha1, Some(HashAlgId::Sha1), &[0x11; 20]).is_ok());
        assert!(verify_unpad(&sha1, Some(HashAlgId::Sha1), &[0x12; 20]).is_err());
    }
}

//! MAC-then-encrypt record protection for SSLv3 and TLS 1.0.
//!
//! One `RecordProtection` covers one direction. CBC state (the last
//! ciphertext block) carries over from record to record, so the IV is only
//! used for the first record.

use super::{ContentType, MAX_PLAINTEXT_LENGTH};
use crate::crypt::ssl3;
use crate::crypt::CipherSuiteParams;
use crate::TlsVersion;
use embtls_crypto::cipher::BulkCipher;
use embtls_crypto::hmac::HmacCtx;
use embtls_types::{HashAlgId, TlsError};
use subtle::{
    Choice, ConditionallySelectable, ConstantTimeEq, ConstantTimeGreater, ConstantTimeLess,
};
use zeroize::Zeroizing;

/// The record MAC, keyed once per direction.
enum RecordMac {
    Ssl3 {
        alg: HashAlgId,
        secret: Zeroizing<Vec<u8>>,
    },
    /// Pre-keyed context, cloned for every record.
    Hmac(HmacCtx),
}

/// Protection state for one direction of a connection.
pub struct RecordProtection {
    version: TlsVersion,
    cipher: BulkCipher,
    mac: RecordMac,
    mac_len: usize,
    seq: u64,
}

impl std::fmt::Debug for RecordProtection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordProtection")
            .field("version", &self.version)
            .field("cipher", &self.cipher)
            .field("mac_len", &self.mac_len)
            .field("seq", &self.seq)
            .finish()
    }
}

impl RecordProtection {
    pub fn new(
        version: TlsVersion,
        params: &CipherSuiteParams,
        mac_key: &[u8],
        key: &[u8],
        iv: &[u8],
    ) -> Result<Self, TlsError> {
        let cipher = BulkCipher::new(params.cipher, key, iv)?;
        let mac = match version {
            TlsVersion::Ssl3 => RecordMac::Ssl3 {
                alg: params.mac,
                secret: Zeroizing::new(mac_key.to_vec()),
            },
            TlsVersion::Tls10 => RecordMac::Hmac(HmacCtx::new(params.mac, mac_key)?),
        };
        Ok(Self {
            version,
            cipher,
            mac,
            mac_len: params.mac_len,
            seq: 0,
        })
    }

    pub fn sequence_number(&self) -> u64 {
        self.seq
    }

    fn compute_mac(&self, content_type: ContentType, data: &[u8]) -> Vec<u8> {
        match &self.mac {
            RecordMac::Ssl3 { alg, secret } => {
                ssl3::record_mac(*alg, secret, self.seq, content_type as u8, data)
            }
            RecordMac::Hmac(ctx) => {
                let mut ctx = ctx.clone();
                ctx.update(&self.seq.to_be_bytes());
                ctx.update(&[content_type as u8]);
                ctx.update(&self.version.wire());
                ctx.update(&(data.len() as u16).to_be_bytes());
                ctx.update(data);
                ctx.finish()
            }
        }
    }

    fn bump_seq(&mut self) -> Result<(), TlsError> {
        self.seq = self
            .seq
            .checked_add(1)
            .ok_or_else(|| TlsError::InvalidRecord("sequence number overflow".into()))?;
        Ok(())
    }

    /// Smallest valid fragment: the MAC alone for the stream cipher, the MAC
    /// plus the padding-length byte rounded up to whole blocks otherwise.
    pub fn min_fragment_len(&self) -> usize {
        let bs = self.cipher.block_size();
        if bs == 0 {
            self.mac_len
        } else {
            (self.mac_len + 1).div_ceil(bs) * bs
        }
    }

    /// MAC, pad and encrypt one record body.
    pub fn seal(&mut self, content_type: ContentType, plaintext: &[u8]) -> Result<Vec<u8>, TlsError> {
        if plaintext.len() > MAX_PLAINTEXT_LENGTH {
            return Err(TlsError::InvalidRecord("plaintext exceeds maximum".into()));
        }
        let mac = self.compute_mac(content_type, plaintext);

        let bs = self.cipher.block_size();
        let data_len = plaintext.len() + self.mac_len;
        let mut out = Vec::with_capacity(data_len + bs);
        out.extend_from_slice(plaintext);
        out.extend_from_slice(&mac);
        if bs > 0 {
            // Pad bytes all carry the pad length; SSLv3 accepts any value.
            let padlen = bs - 1 - data_len % bs;
            out.resize(data_len + padlen + 1, padlen as u8);
        }
        self.cipher.encrypt(&mut out)?;
        self.bump_seq()?;
        Ok(out)
    }

    /// Decrypt and authenticate one record body.
    ///
    /// Padding and MAC failures both surface as `BadRecordMac`, and the MAC
    /// is computed whether or not the padding was valid.
    pub fn open(&mut self, content_type: ContentType, fragment: &[u8]) -> Result<Vec<u8>, TlsError> {
        let bs = self.cipher.block_size();
        if fragment.len() < self.min_fragment_len() || (bs > 0 && fragment.len() % bs != 0) {
            return Err(TlsError::InvalidRecord(format!(
                "encrypted fragment of {} bytes",
                fragment.len()
            )));
        }

        let mut buf = Zeroizing::new(fragment.to_vec());
        self.cipher.decrypt(&mut buf)?;

        let len = buf.len();
        let (pad_ok, strip) = if bs > 0 {
            self.check_padding(&buf)
        } else {
            (Choice::from(1), 0)
        };

        let content_len = len - strip - self.mac_len;
        let expected = self.compute_mac(content_type, &buf[..content_len]);
        let mac_ok = buf[content_len..content_len + self.mac_len].ct_eq(expected.as_slice());

        if !bool::from(pad_ok & mac_ok) {
            return Err(TlsError::BadRecordMac);
        }
        if content_len > MAX_PLAINTEXT_LENGTH {
            return Err(TlsError::InvalidRecord("decrypted plaintext too large".into()));
        }
        self.bump_seq()?;
        Ok(buf[..content_len].to_vec())
    }

    /// Returns whether the CBC padding is valid and how many trailing bytes
    /// (padding plus its length byte) to strip. On failure nothing is
    /// stripped, so the MAC still runs over a plausible length.
    fn check_padding(&self, buf: &[u8]) -> (Choice, usize) {
        let len = buf.len();
        let bs = self.cipher.block_size() as u64;
        let padlen = buf[len - 1];
        let pad_total = padlen as u64 + 1;

        let mut good = !(pad_total + self.mac_len as u64).ct_gt(&(len as u64));
        match self.version {
            TlsVersion::Ssl3 => good &= (padlen as u64).ct_lt(&bs),
            TlsVersion::Tls10 => {
                // Scan a fixed window so the work does not depend on padlen.
                let window = len.min(256);
                for i in 1..=window {
                    let in_pad = (i as u64).ct_lt(&(pad_total + 1));
                    let matches = buf[len - i].ct_eq(&padlen);
                    good &= !in_pad | matches;
                }
            }
        }
        let strip = u64::conditional_select(&0, &pad_total, good);
        (good, strip as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CipherSuite;

    fn pair(version: TlsVersion, suite: CipherSuite) -> (RecordProtection, RecordProtection) {
        let params = CipherSuiteParams::from_suite(suite).unwrap();
        let mac_key = vec![0x11u8; params.mac_len];
        let key = vec![0x22u8; params.key_len];
        let iv = vec![0x33u8; params.iv_len];
        (
            RecordProtection::new(version, &params, &mac_key, &key, &iv).unwrap(),
            RecordProtection::new(version, &params, &mac_key, &key, &iv).unwrap(),
        )
    }

    #[test]
    fn test_roundtrip_all_suites_and_versions() {
        let payloads: [&[u8]; 4] = [b"", b"x", &[0x5a; 100], &[0xa5; MAX_PLAINTEXT_LENGTH]];
        for version in [TlsVersion::Ssl3, TlsVersion::Tls10] {
            for suite in CipherSuite::ALL {
                let (mut enc, mut dec) = pair(version, suite);
                for payload in payloads {
                    let sealed = enc.seal(ContentType::ApplicationData, payload).unwrap();
                    let opened = dec.open(ContentType::ApplicationData, &sealed).unwrap();
                    assert_eq!(opened, payload, "{version} {suite}");
                }
                assert_eq!(enc.sequence_number(), 4);
                assert_eq!(dec.sequence_number(), 4);
            }
        }
    }

    #[test]
    fn test_sealed_length_is_block_aligned() {
        let (mut enc, _) = pair(TlsVersion::Tls10, CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA);
        for n in 0..40 {
            let sealed = enc.seal(ContentType::Handshake, &vec![0u8; n]).unwrap();
            assert_eq!(sealed.len() % 16, 0);
            assert!(sealed.len() >= n + 21);
            assert!(sealed.len() <= n + 20 + 16);
        }
    }

    #[test]
    fn test_dropped_record_fails_mac() {
        let (mut enc, mut dec) = pair(TlsVersion::Tls10, CipherSuite::TLS_RSA_WITH_RC4_128_SHA);
        let first = enc.seal(ContentType::ApplicationData, b"one").unwrap();
        let second = enc.seal(ContentType::ApplicationData, b"two").unwrap();
        dec.open(ContentType::ApplicationData, &first).unwrap();
        // A receiver that missed the first record cannot open the second.
        let mut replay_dec = pair(TlsVersion::Tls10, CipherSuite::TLS_RSA_WITH_RC4_128_SHA).1;
        assert!(matches!(
            replay_dec.open(ContentType::ApplicationData, &second),
            Err(TlsError::BadRecordMac)
        ));
        assert_eq!(dec.open(ContentType::ApplicationData, &second).unwrap(), b"two");
    }

    #[test]
    fn test_wrong_content_type_fails_mac() {
        let (mut enc, mut dec) = pair(TlsVersion::Ssl3, CipherSuite::TLS_RSA_WITH_3DES_EDE_CBC_SHA);
        let sealed = enc.seal(ContentType::ApplicationData, b"data").unwrap();
        assert!(matches!(
            dec.open(ContentType::Handshake, &sealed),
            Err(TlsError::BadRecordMac)
        ));
        assert_eq!(dec.sequence_number(), 0);
    }

    #[test]
    fn test_tampered_padding_reports_bad_mac() {
        let params = CipherSuiteParams::from_suite(CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA).unwrap();
        let key = [0x22u8; 16];
        let iv = [0x33u8; 16];
        let (mut enc, mut dec) = pair(TlsVersion::Tls10, CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA);
        // 20 bytes of payload and 20 of MAC leave seven pad bytes.
        let sealed = enc.seal(ContentType::ApplicationData, &[7u8; 20]).unwrap();

        // Re-encrypt the plaintext with a corrupted padding run.
        let mut raw = sealed.clone();
        let mut cbc = BulkCipher::new(params.cipher, &key, &iv).unwrap();
        cbc.decrypt(&mut raw).unwrap();
        let last = raw.len() - 1;
        assert_eq!(raw[last], 7);
        raw[last - 1] ^= 0x01;
        let mut cbc = BulkCipher::new(params.cipher, &key, &iv).unwrap();
        cbc.encrypt(&mut raw).unwrap();

        assert!(matches!(
            dec.open(ContentType::ApplicationData, &raw),
            Err(TlsError::BadRecordMac)
        ));
    }

    #[test]
    fn test_flipped_ciphertext_reports_bad_mac() {
        for suite in CipherSuite::ALL {
            let (mut enc, mut dec) = pair(TlsVersion::Tls10, suite);
            let mut sealed = enc.seal(ContentType::ApplicationData, b"attack at dawn").unwrap();
            sealed[0] ^= 0x80;
            assert!(
                matches!(
                    dec.open(ContentType::ApplicationData, &sealed),
                    Err(TlsError::BadRecordMac)
                ),
                "{suite}"
            );
        }
    }

    #[test]
    fn test_short_or_unaligned_fragment_is_invalid_record() {
        let (_, mut dec) = pair(TlsVersion::Tls10, CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA);
        assert_eq!(dec.min_fragment_len(), 32);
        assert!(matches!(
            dec.open(ContentType::ApplicationData, &[0u8; 16]),
            Err(TlsError::InvalidRecord(_))
        ));
        assert!(matches!(
            dec.open(ContentType::ApplicationData, &[0u8; 33]),
            Err(TlsError::InvalidRecord(_))
        ));

        let (_, mut rc4) = pair(TlsVersion::Tls10, CipherSuite::TLS_RSA_WITH_RC4_128_MD5);
        assert_eq!(rc4.min_fragment_len(), 16);
        assert!(matches!(
            rc4.open(ContentType::ApplicationData, &[0u8; 15]),
            Err(TlsError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_ssl3_rejects_oversized_padding() {
        let params =
            CipherSuiteParams::from_suite(CipherSuite::TLS_RSA_WITH_3DES_EDE_CBC_SHA).unwrap();
        let mac_key = [0x11u8; 20];
        let key = [0x22u8; 24];
        let iv = [0x33u8; 8];
        let mut dec = RecordProtection::new(TlsVersion::Ssl3, &params, &mac_key, &key, &iv).unwrap();

        // payload || MAC || eight pad bytes || padlen=8: a full block of
        // padding, which TLS would accept and SSLv3 forbids.
        let payload = [0x44u8; 3];
        let mac = ssl3::record_mac(HashAlgId::Sha1, &mac_key, 0, 23, &payload);
        let mut body = payload.to_vec();
        body.extend_from_slice(&mac);
        body.extend_from_slice(&[8u8; 9]);
        assert_eq!(body.len(), 32);
        let mut enc = BulkCipher::new(params.cipher, &key, &iv).unwrap();
        enc.encrypt(&mut body).unwrap();

        assert!(matches!(
            dec.open(ContentType::ApplicationData, &body),
            Err(TlsError::BadRecordMac)
        ));
    }
}

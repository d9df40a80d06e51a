//! Master secret, key block and Finished computation for SSLv3 and
//! TLS 1.0 (RFC 2246 §6.3, §7.4.9, §8.1).

use super::prf::prf;
use super::ssl3;
use super::transcript::TranscriptHash;
use super::CipherSuiteParams;
use crate::record::RecordProtection;
use crate::{TlsRole, TlsVersion};
use embtls_types::TlsError;
use zeroize::{Zeroize, Zeroizing};

pub const MASTER_SECRET_LEN: usize = 48;
pub const TLS_VERIFY_DATA_LEN: usize = 12;
pub const SSL3_VERIFY_DATA_LEN: usize = 36;

/// Key block sliced into per-direction MAC secrets, keys and IVs.
pub struct KeyBlock {
    pub client_write_mac_key: Vec<u8>,
    pub server_write_mac_key: Vec<u8>,
    pub client_write_key: Vec<u8>,
    pub server_write_key: Vec<u8>,
    pub client_write_iv: Vec<u8>,
    pub server_write_iv: Vec<u8>,
}

impl Drop for KeyBlock {
    fn drop(&mut self) {
        self.client_write_mac_key.zeroize();
        self.server_write_mac_key.zeroize();
        self.client_write_key.zeroize();
        self.server_write_key.zeroize();
        self.client_write_iv.zeroize();
        self.server_write_iv.zeroize();
    }
}

impl KeyBlock {
    /// Key both directions and consume the block.
    ///
    /// Returns `(write, read)` protections for the given local role.
    pub fn into_protections(
        self,
        role: TlsRole,
        version: TlsVersion,
        params: &CipherSuiteParams,
    ) -> Result<(RecordProtection, RecordProtection), TlsError> {
        let client = RecordProtection::new(
            version,
            params,
            &self.client_write_mac_key,
            &self.client_write_key,
            &self.client_write_iv,
        )?;
        let server = RecordProtection::new(
            version,
            params,
            &self.server_write_mac_key,
            &self.server_write_key,
            &self.server_write_iv,
        )?;
        Ok(match role {
            TlsRole::Client => (client, server),
            TlsRole::Server => (server, client),
        })
    }
}

/// Derive the 48-byte master secret. The seed is
/// `client_random || server_random`.
pub fn derive_master_secret(
    version: TlsVersion,
    pre_master_secret: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> Result<Zeroizing<[u8; MASTER_SECRET_LEN]>, TlsError> {
    let mut seed = [0u8; 64];
    seed[..32].copy_from_slice(client_random);
    seed[32..].copy_from_slice(server_random);

    let out = match version {
        TlsVersion::Ssl3 => ssl3::expand(pre_master_secret, &seed, MASTER_SECRET_LEN)?,
        TlsVersion::Tls10 => prf(pre_master_secret, "master secret", &seed, MASTER_SECRET_LEN)?,
    };
    let mut master = Zeroizing::new([0u8; MASTER_SECRET_LEN]);
    master.copy_from_slice(&out);
    Ok(master)
}

/// Expand the master secret into a key block. The seed is
/// `server_random || client_random`, the reverse of the master secret's.
pub fn derive_key_block(
    version: TlsVersion,
    params: &CipherSuiteParams,
    master_secret: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> Result<KeyBlock, TlsError> {
    let mut seed = [0u8; 64];
    seed[..32].copy_from_slice(server_random);
    seed[32..].copy_from_slice(client_random);

    let len = params.key_block_len();
    let block = match version {
        TlsVersion::Ssl3 => ssl3::expand(master_secret, &seed, len)?,
        TlsVersion::Tls10 => prf(master_secret, "key expansion", &seed, len)?,
    };

    let mut pos = 0;
    let mut take = |n: usize| {
        let v = block[pos..pos + n].to_vec();
        pos += n;
        v
    };
    Ok(KeyBlock {
        client_write_mac_key: take(params.mac_len),
        server_write_mac_key: take(params.mac_len),
        client_write_key: take(params.key_len),
        server_write_key: take(params.key_len),
        client_write_iv: take(params.iv_len),
        server_write_iv: take(params.iv_len),
    })
}

/// Finished verify_data for messages sent by `sender`: 36 bytes in SSLv3,
/// 12 in TLS 1.0.
pub fn compute_finished(
    version: TlsVersion,
    master_secret: &[u8],
    transcript: &TranscriptHash,
    sender: TlsRole,
) -> Result<Vec<u8>, TlsError> {
    match version {
        TlsVersion::Ssl3 => {
            let label: &[u8] = match sender {
                TlsRole::Client => ssl3::SENDER_CLIENT,
                TlsRole::Server => ssl3::SENDER_SERVER,
            };
            let (md5, sha1) = transcript.states();
            Ok(ssl3::finished(md5, sha1, master_secret, label).to_vec())
        }
        TlsVersion::Tls10 => {
            let label = match sender {
                TlsRole::Client => "client finished",
                TlsRole::Server => "server finished",
            };
            let out = prf(
                master_secret,
                label,
                &transcript.md5_sha1(),
                TLS_VERIFY_DATA_LEN,
            )?;
            Ok(out.to_vec())
        }
    }
}

/// The 36 bytes signed in CertificateVerify: the SSLv3 nested hash with no
/// sender label, or the plain `MD5 || SHA-1` transcript in TLS 1.0.
pub fn compute_verify_hash(
    version: TlsVersion,
    master_secret: &[u8],
    transcript: &TranscriptHash,
) -> [u8; 36] {
    match version {
        TlsVersion::Ssl3 => {
            let (md5, sha1) = transcript.states();
            ssl3::finished(md5, sha1, master_secret, b"")
        }
        TlsVersion::Tls10 => transcript.md5_sha1(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ContentType;
    use crate::CipherSuite;

    const CR: [u8; 32] = [0x01; 32];
    const SR: [u8; 32] = [0x02; 32];

    #[test]
    fn test_master_secret_deterministic() {
        for version in [TlsVersion::Ssl3, TlsVersion::Tls10] {
            let a = derive_master_secret(version, &[0x03; 48], &CR, &SR).unwrap();
            let b = derive_master_secret(version, &[0x03; 48], &CR, &SR).unwrap();
            assert_eq!(*a, *b);
            let swapped = derive_master_secret(version, &[0x03; 48], &SR, &CR).unwrap();
            assert_ne!(*a, *swapped);
        }
    }

    #[test]
    fn test_versions_derive_differently() {
        let ssl3 = derive_master_secret(TlsVersion::Ssl3, &[0x03; 48], &CR, &SR).unwrap();
        let tls = derive_master_secret(TlsVersion::Tls10, &[0x03; 48], &CR, &SR).unwrap();
        assert_ne!(*ssl3, *tls);
    }

    #[test]
    fn test_tls_master_secret_matches_prf() {
        let mut seed = CR.to_vec();
        seed.extend_from_slice(&SR);
        let expected = prf(&[0x07; 48], "master secret", &seed, 48).unwrap();
        let master = derive_master_secret(TlsVersion::Tls10, &[0x07; 48], &CR, &SR).unwrap();
        assert_eq!(master.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_key_block_slicing() {
        let params = CipherSuiteParams::from_suite(CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA).unwrap();
        let master = [0x09u8; 48];
        let kb = derive_key_block(TlsVersion::Tls10, &params, &master, &CR, &SR).unwrap();

        let mut seed = SR.to_vec();
        seed.extend_from_slice(&CR);
        let raw = prf(&master, "key expansion", &seed, params.key_block_len()).unwrap();
        assert_eq!(kb.client_write_mac_key, raw[..20]);
        assert_eq!(kb.server_write_mac_key, raw[20..40]);
        assert_eq!(kb.client_write_key, raw[40..56]);
        assert_eq!(kb.server_write_key, raw[56..72]);
        assert_eq!(kb.client_write_iv, raw[72..88]);
        assert_eq!(kb.server_write_iv, raw[88..104]);
    }

    #[test]
    fn test_protections_are_complementary() {
        for version in [TlsVersion::Ssl3, TlsVersion::Tls10] {
            let params =
                CipherSuiteParams::from_suite(CipherSuite::TLS_RSA_WITH_3DES_EDE_CBC_SHA).unwrap();
            let master = [0x0au8; 48];
            let kb = derive_key_block(version, &params, &master, &CR, &SR).unwrap();
            let (mut client_write, mut client_read) =
                kb.into_protections(TlsRole::Client, version, &params).unwrap();
            let kb = derive_key_block(version, &params, &master, &CR, &SR).unwrap();
            let (mut server_write, mut server_read) =
                kb.into_protections(TlsRole::Server, version, &params).unwrap();

            let c2s = client_write.seal(ContentType::Handshake, b"to server").unwrap();
            assert_eq!(server_read.open(ContentType::Handshake, &c2s).unwrap(), b"to server");
            let s2c = server_write.seal(ContentType::Handshake, b"to client").unwrap();
            assert_eq!(client_read.open(ContentType::Handshake, &s2c).unwrap(), b"to client");
        }
    }

    #[test]
    fn test_finished_lengths_and_direction() {
        let mut t = TranscriptHash::new();
        t.update(b"client hello");
        let master = [0x0bu8; 48];
        let ssl3_c = compute_finished(TlsVersion::Ssl3, &master, &t, TlsRole::Client).unwrap();
        let ssl3_s = compute_finished(TlsVersion::Ssl3, &master, &t, TlsRole::Server).unwrap();
        assert_eq!(ssl3_c.len(), SSL3_VERIFY_DATA_LEN);
        assert_ne!(ssl3_c, ssl3_s);

        let tls_c = compute_finished(TlsVersion::Tls10, &master, &t, TlsRole::Client).unwrap();
        let tls_s = compute_finished(TlsVersion::Tls10, &master, &t, TlsRole::Server).unwrap();
        assert_eq!(tls_c.len(), TLS_VERIFY_DATA_LEN);
        assert_ne!(tls_c, tls_s);
        let expected = prf(&master, "client finished", &t.md5_sha1(), 12).unwrap();
        assert_eq!(tls_c, expected.as_slice());
    }

    #[test]
    fn test_verify_hash() {
        let mut t = TranscriptHash::new();
        t.update(b"messages");
        assert_eq!(compute_verify_hash(TlsVersion::Tls10, &[0; 48], &t), t.md5_sha1());
        let (md5, sha1) = t.states();
        assert_eq!(
            compute_verify_hash(TlsVersion::Ssl3, &[1; 48], &t),
            ssl3::finished(md5, sha1, &[1; 48], b"")
        );
    }
}

//! SSLv3 hash constructions: key expansion, record MAC and Finished.
//!
//! SSLv3 predates HMAC and uses its own nested-hash scheme with `pad1`
//! (0x36) and `pad2` (0x5c) runs of 48 bytes for MD5 and 40 for SHA-1.

use embtls_crypto::hash::{Digest, Md5, Sha1};
use embtls_types::{HashAlgId, TlsError};
use zeroize::Zeroizing;

const PAD1: u8 = 0x36;
const PAD2: u8 = 0x5c;

pub const SENDER_CLIENT: &[u8; 4] = b"CLNT";
pub const SENDER_SERVER: &[u8; 4] = b"SRVR";

/// Pad length for a given hash in the SSLv3 MAC construction.
fn pad_len(alg: HashAlgId) -> usize {
    match alg {
        HashAlgId::Md5 => 48,
        _ => 40,
    }
}

/// Expand `secret` with `seed` into `len` bytes:
///
/// ```text
/// MD5(secret + SHA1("A" + secret + seed)) +
/// MD5(secret + SHA1("BB" + secret + seed)) + ...
/// ```
pub fn expand(secret: &[u8], seed: &[u8], len: usize) -> Result<Zeroizing<Vec<u8>>, TlsError> {
    let rounds = len.div_ceil(16);
    if rounds > 26 {
        return Err(TlsError::HandshakeFailed(format!(
            "sslv3 key expansion of {len} bytes"
        )));
    }
    let mut out = Zeroizing::new(Vec::with_capacity(rounds * 16));
    for i in 0..rounds {
        let label = vec![b'A' + i as u8; i + 1];
        let mut sha = Sha1::new();
        sha.update(&label);
        sha.update(secret);
        sha.update(seed);
        let inner = sha.finalize();

        let mut md5 = Md5::new();
        md5.update(secret);
        md5.update(inner);
        out.extend_from_slice(&md5.finalize());
    }
    out.truncate(len);
    Ok(out)
}

/// The SSLv3 record MAC:
///
/// ```text
/// hash(secret + pad2 + hash(secret + pad1 + seq_num + type + length + data))
/// ```
pub fn record_mac(
    alg: HashAlgId,
    secret: &[u8],
    seq: u64,
    content_type: u8,
    data: &[u8],
) -> Vec<u8> {
    let pad = pad_len(alg);
    let mut header = [0u8; 11];
    header[..8].copy_from_slice(&seq.to_be_bytes());
    header[8] = content_type;
    header[9..].copy_from_slice(&(data.len() as u16).to_be_bytes());

    match alg {
        HashAlgId::Md5 => nested::<Md5>(secret, pad, &[&header, data]),
        _ => nested::<Sha1>(secret, pad, &[&header, data]),
    }
}

fn nested<D: Digest>(secret: &[u8], pad: usize, parts: &[&[u8]]) -> Vec<u8> {
    let mut inner = D::new();
    inner.update(secret);
    inner.update(vec![PAD1; pad]);
    for part in parts {
        inner.update(part);
    }
    let inner = inner.finalize();

    let mut outer = D::new();
    outer.update(secret);
    outer.update(vec![PAD2; pad]);
    outer.update(inner);
    outer.finalize().to_vec()
}

/// Finished / CertificateVerify hash over the running transcript:
///
/// ```text
/// MD5(master + pad2 + MD5(handshake + sender + master + pad1)) +
/// SHA(master + pad2 + SHA(handshake + sender + master + pad1))
/// ```
///
/// CertificateVerify uses the same construction with an empty `sender`.
pub fn finished(md5: Md5, sha1: Sha1, master: &[u8], sender: &[u8]) -> [u8; 36] {
    let mut out = [0u8; 36];
    out[..16].copy_from_slice(&continue_nested(md5, 48, master, sender));
    out[16..].copy_from_slice(&continue_nested(sha1, 40, master, sender));
    out
}

fn continue_nested<D: Digest>(mut running: D, pad: usize, master: &[u8], sender: &[u8]) -> Vec<u8> {
    running.update(sender);
    running.update(master);
    running.update(vec![PAD1; pad]);
    let inner = running.finalize();

    let mut outer = D::new();
    outer.update(master);
    outer.update(vec![PAD2; pad]);
    outer.update(inner);
    outer.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn test_expand_vector() {
        let out = expand(&[0x01; 48], &[0x02; 64], 48).unwrap();
        let expected = hex(
            "7cbd429c491b03240b8429f3a43171790d3d685319be0ced79a03ab3f89b7899\
             9aabec5dbcef8ab8e5f257aa08a571c7",
        );
        assert_eq!(out.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_expand_truncates() {
        let long = expand(b"s", b"seed", 40).unwrap();
        let short = expand(b"s", b"seed", 20).unwrap();
        assert_eq!(long.len(), 40);
        assert_eq!(&long[..20], short.as_slice());
        assert!(expand(b"s", b"seed", 27 * 16).is_err());
    }

    #[test]
    fn test_record_mac_md5() {
        let mac = record_mac(HashAlgId::Md5, &[0x11; 16], 0, 23, b"hello");
        assert_eq!(mac, hex("f57a312e21fcf1bdafc556814dd6c066"));
    }

    #[test]
    fn test_record_mac_sha1() {
        let mac = record_mac(HashAlgId::Sha1, &[0x22; 20], 7, 22, b"hello");
        assert_eq!(mac, hex("be25fd7f689699e7f5ac8b946897b379741fc9bd"));
    }

    #[test]
    fn test_finished_vector() {
        let mut md5 = Md5::new();
        let mut sha1 = Sha1::new();
        md5.update(b"handshake messages");
        sha1.update(b"handshake messages");

        let client = finished(md5.clone(), sha1.clone(), &[0x03; 48], SENDER_CLIENT);
        let expected = hex(
            "397e56c9783ecfc9629d0549cc88d23ae7b50493e6142131908e37640097a92a\
             8151b6cf",
        );
        assert_eq!(client.as_slice(), expected.as_slice());

        let verify = finished(md5, sha1, &[0x03; 48], b"");
        let expected = hex(
            "423094caff1adf2485aa96620dc75409be5f693b739f49e3f7760523f9ea08dd\
             26c3ae90",
        );
        assert_eq!(verify.as_slice(), expected.as_slice());
    }
}

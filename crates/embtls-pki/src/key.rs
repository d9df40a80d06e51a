//! RSA private keys in PKCS#1 (`RSA PRIVATE KEY`) and unencrypted PKCS#8
//! (`PRIVATE KEY`) form, PEM or DER.

use std::path::Path;

use embtls_crypto::rsa::RsaPrivateKey;
use embtls_types::PkiError;
use embtls_utils::asn1::{tags, Decoder, Encoder};
use embtls_utils::oid::{known, Oid};
use embtls_utils::pem;
use zeroize::Zeroizing;

const PKCS1_LABEL: &str = "RSA PRIVATE KEY";
const PKCS8_LABEL: &str = "PRIVATE KEY";

/// Parse an RSA private key from PEM or DER.
///
/// The key is checked for consistency (`N = P*Q`, `D*E = 1 mod lcm(P-1, Q-1)`)
/// before it is returned.
pub fn parse_rsa_private_key(data: &[u8]) -> Result<RsaPrivateKey, PkiError> {
    if !pem::is_pem(data) {
        return parse_der(data);
    }
    let text =
        std::str::from_utf8(data).map_err(|_| PkiError::InvalidPem("not valid UTF-8".into()))?;
    let blocks = pem::parse(text).map_err(|e| PkiError::InvalidPem(e.to_string()))?;
    for block in blocks {
        let der = Zeroizing::new(block.data);
        match block.label.as_str() {
            PKCS1_LABEL => return parse_pkcs1(&der),
            PKCS8_LABEL => return parse_pkcs8(&der),
            _ => continue,
        }
    }
    Err(PkiError::InvalidPem("no RSA private key block".into()))
}

/// Read and parse a private key file.
pub fn load_rsa_private_key(path: impl AsRef<Path>) -> Result<RsaPrivateKey, PkiError> {
    let data = Zeroizing::new(std::fs::read(path)?);
    parse_rsa_private_key(&data)
}

/// DER without armor: PKCS#1 has an INTEGER after the version, PKCS#8 an
/// AlgorithmIdentifier SEQUENCE.
fn parse_der(der: &[u8]) -> Result<RsaPrivateKey, PkiError> {
    let mut top = Decoder::new(der);
    let mut seq = top.read_sequence().map_err(PkiError::field("privateKey"))?;
    seq.read_small_int().map_err(PkiError::field("privateKey.version"))?;
    match seq.peek_tag().map_err(PkiError::field("privateKey"))? {
        tags::SEQUENCE => parse_pkcs8(der),
        _ => parse_pkcs1(der),
    }
}

/// `PrivateKeyInfo ::= SEQUENCE { version, AlgorithmIdentifier, OCTET STRING }`
fn parse_pkcs8(der: &[u8]) -> Result<RsaPrivateKey, PkiError> {
    let field = PkiError::field("PrivateKeyInfo");
    let mut top = Decoder::new(der);
    let mut info = top.read_sequence().map_err(&field)?;
    top.finish().map_err(&field)?;

    if info.read_small_int().map_err(&field)? != 0 {
        return Err(PkiError::InvalidKey("unsupported PrivateKeyInfo version".into()));
    }
    let mut alg = info.read_sequence().map_err(&field)?;
    let oid = alg.read_oid().map_err(&field)?;
    if oid != known::RSA_ENCRYPTION {
        let name = Oid::from_der_value(oid)
            .map(|o| o.to_dot_string())
            .unwrap_or_default();
        return Err(PkiError::UnsupportedKeyAlgorithm(name));
    }
    if !alg.is_empty() {
        alg.read_null().map_err(&field)?;
    }
    alg.finish().map_err(&field)?;
    let inner = info.read_octet_string().map_err(&field)?;
    // attributes [0] are allowed and ignored
    info.try_read_context(0, true).map_err(&field)?;
    info.finish().map_err(&field)?;
    parse_pkcs1(inner)
}

/// `RSAPrivateKey ::= SEQUENCE { version, n, e, d, p, q, dp, dq, qinv }`
fn parse_pkcs1(der: &[u8]) -> Result<RsaPrivateKey, PkiError> {
    let field = PkiError::field("RSAPrivateKey");
    let mut top = Decoder::new(der);
    let mut seq = top.read_sequence().map_err(&field)?;
    top.finish().map_err(&field)?;

    if seq.read_small_int().map_err(&field)? != 0 {
        return Err(PkiError::InvalidKey("multi-prime keys are not supported".into()));
    }
    let n = seq.read_unsigned().map_err(PkiError::field("RSAPrivateKey.modulus"))?;
    let e = seq
        .read_unsigned()
        .map_err(PkiError::field("RSAPrivateKey.publicExponent"))?;
    let d = seq
        .read_unsigned()
        .map_err(PkiError::field("RSAPrivateKey.privateExponent"))?;
    let p = seq.read_unsigned().map_err(PkiError::field("RSAPrivateKey.prime1"))?;
    let q = seq.read_unsigned().map_err(PkiError::field("RSAPrivateKey.prime2"))?;
    // exponent1, exponent2 and coefficient are recomputed from d, p and q
    for _ in 0..3 {
        seq.read_unsigned().map_err(&field)?;
    }
    seq.finish().map_err(&field)?;

    RsaPrivateKey::from_components(n, e, d, p, q)
        .map_err(|e| PkiError::InvalidKey(e.to_string()))
}

/// Encode `key` as a PKCS#1 `RSAPrivateKey` structure.
pub fn encode_rsa_private_key_der(key: &RsaPrivateKey) -> Zeroizing<Vec<u8>> {
    let public = key.public_key();
    let parts = [
        Zeroizing::new(public.n_bytes()),
        Zeroizing::new(public.e_bytes()),
        Zeroizing::new(key.d_bytes()),
        Zeroizing::new(key.p_bytes()),
        Zeroizing::new(key.q_bytes()),
        Zeroizing::new(key.dp_bytes()),
        Zeroizing::new(key.dq_bytes()),
        Zeroizing::new(key.qinv_bytes()),
    ];
    let mut body = Encoder::new();
    body.write_small_int(0);
    for part in &parts {
        body.write_unsigned(part);
    }
    let body = Zeroizing::new(body.finish());
    let mut out = Encoder::new();
    out.write_sequence(&body);
    Zeroizing::new(out.finish())
}

/// Encode `key` as an `RSA PRIVATE KEY` PEM block.
pub fn encode_rsa_private_key_pem(key: &RsaPrivateKey) -> Zeroizing<String> {
    Zeroizing::new(pem::encode(PKCS1_LABEL, &encode_rsa_private_key_der(key)))
}

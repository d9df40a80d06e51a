//! DER/PEM certificate decoding.

use std::path::Path;

use embtls_crypto::rsa::RsaPublicKey;
use embtls_types::{HashAlgId, PkiError};
use embtls_utils::asn1::{tags, Decoder};
use embtls_utils::oid::{known, Oid};
use embtls_utils::pem;
use log::debug;

use super::extensions::{parse_extensions, Extensions};
use super::{Certificate, Name, NameAttribute};

const PEM_BEGIN: &[u8] = b"-----BEGIN CERTIFICATE-----";
const PEM_END: &[u8] = b"-----END CERTIFICATE-----";

/// Decode every certificate in `buf` and return them with the number of
/// bytes consumed.
///
/// A buffer containing a `-----BEGIN CERTIFICATE-----` marker is read as PEM
/// and may hold several blocks; anything else is one or more concatenated
/// DER certificates. Nothing is skipped silently: a malformed block fails
/// the whole call.
pub fn parse_certificates(buf: &[u8]) -> Result<(Vec<Certificate>, usize), PkiError> {
    if find(buf, PEM_BEGIN).is_some() {
        return parse_pem_chain(buf);
    }

    let mut certs = Vec::new();
    let mut pos = 0;
    while pos < buf.len() {
        let tlv = Decoder::new(&buf[pos..])
            .read_tlv()
            .map_err(PkiError::field("certificate"))?;
        certs.push(parse_der(tlv.raw)?);
        pos += tlv.raw.len();
    }
    if certs.is_empty() {
        return Err(PkiError::InvalidCert("no certificate found".into()));
    }
    Ok((certs, pos))
}

fn parse_pem_chain(buf: &[u8]) -> Result<(Vec<Certificate>, usize), PkiError> {
    let consumed = rfind(buf, PEM_END)
        .map(|i| i + PEM_END.len())
        .ok_or_else(|| PkiError::InvalidPem("missing END CERTIFICATE".into()))?;
    let text = std::str::from_utf8(&buf[..consumed])
        .map_err(|_| PkiError::InvalidPem("not valid UTF-8".into()))?;
    let blocks = pem::parse_label(text, "CERTIFICATE")
        .map_err(|e| PkiError::InvalidPem(e.to_string()))?;
    let certs = blocks
        .iter()
        .map(|der| parse_der(der))
        .collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(PkiError::InvalidPem("no CERTIFICATE block".into()));
    }
    Ok((certs, consumed))
}

/// Read a PEM or DER file holding one or more certificates.
pub fn load_certificates(path: impl AsRef<Path>) -> Result<Vec<Certificate>, PkiError> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let (certs, _) = parse_certificates(&data)?;
    debug!("loaded {} certificate(s) from {}", certs.len(), path.display());
    Ok(certs)
}

fn find(hay: &[u8], needle: &[u8]) -> Option<usize> {
    hay.windows(needle.len()).position(|w| w == needle)
}

fn rfind(hay: &[u8], needle: &[u8]) -> Option<usize> {
    hay.windows(needle.len()).rposition(|w| w == needle)
}

pub(crate) fn parse_der(der: &[u8]) -> Result<Certificate, PkiError> {
    let mut top = Decoder::new(der);
    let mut outer = top.read_sequence().map_err(PkiError::field("certificate"))?;
    top.finish().map_err(PkiError::field("certificate"))?;
    let raw = &der[..top.position()];

    let tbs_tlv = outer.read_tlv().map_err(PkiError::field("tbsCertificate"))?;
    if tbs_tlv.tag != tags::SEQUENCE {
        return Err(PkiError::field("tbsCertificate")(
            embtls_types::Asn1Error::UnexpectedTag {
                expected: tags::SEQUENCE,
                actual: tbs_tlv.tag,
            },
        ));
    }
    let mut tbs = Decoder::new(tbs_tlv.value);

    // version [0] EXPLICIT INTEGER DEFAULT v1
    let version = match tbs.try_read_context(0, true).map_err(PkiError::field("version"))? {
        Some(body) => {
            let mut v = Decoder::new(body);
            let n = v.read_small_int().map_err(PkiError::field("version"))?;
            v.finish().map_err(PkiError::field("version"))?;
            n
        }
        None => 0,
    };
    if !(0..=2).contains(&version) {
        return Err(PkiError::UnsupportedVersion((version as u32).wrapping_add(1)));
    }
    let version = version as u8 + 1;

    let serial = tbs
        .read_integer()
        .map_err(PkiError::field("serialNumber"))?
        .to_vec();
    let inner_sig = read_algorithm(&mut tbs, "signature")?;

    let issuer_tlv = tbs.read_tlv().map_err(PkiError::field("issuer"))?;
    let issuer = parse_name(issuer_tlv.tag, issuer_tlv.value, "issuer")?;

    let mut validity = tbs.read_sequence().map_err(PkiError::field("validity"))?;
    let not_before = validity.read_time().map_err(PkiError::field("validity.notBefore"))?;
    let not_after = validity.read_time().map_err(PkiError::field("validity.notAfter"))?;
    validity.finish().map_err(PkiError::field("validity"))?;

    let subject_tlv = tbs.read_tlv().map_err(PkiError::field("subject"))?;
    let subject = parse_name(subject_tlv.tag, subject_tlv.value, "subject")?;

    let public_key = parse_rsa_spki(&mut tbs)?;

    // issuerUniqueID [1] / subjectUniqueID [2], v2 and v3 only
    if version >= 2 {
        tbs.try_read_context(1, false)
            .map_err(PkiError::field("issuerUniqueID"))?;
        tbs.try_read_context(2, false)
            .map_err(PkiError::field("subjectUniqueID"))?;
    }

    let mut ext = Extensions::default();
    if version == 3 {
        if let Some(body) = tbs
            .try_read_context(3, true)
            .map_err(PkiError::field("extensions"))?
        {
            ext = parse_extensions(body)?;
        }
    }
    tbs.finish().map_err(PkiError::field("tbsCertificate"))?;

    let outer_sig = read_algorithm(&mut outer, "signatureAlgorithm")?;
    if outer_sig != inner_sig {
        return Err(PkiError::InvalidCert(
            "signature algorithm differs from tbsCertificate.signature".into(),
        ));
    }
    let sig_hash = signature_hash(outer_sig)?;
    let signature = outer
        .read_bit_string()
        .map_err(PkiError::field("signatureValue"))?
        .to_vec();
    outer.finish().map_err(PkiError::field("certificate"))?;

    Ok(Certificate {
        raw: raw.to_vec(),
        tbs_raw: tbs_tlv.raw.to_vec(),
        version,
        serial,
        issuer_raw: issuer_tlv.raw.to_vec(),
        issuer,
        subject_raw: subject_tlv.raw.to_vec(),
        subject,
        not_before,
        not_after,
        public_key,
        sig_hash,
        signature,
        is_ca: ext.is_ca,
        max_pathlen: ext.max_pathlen,
        key_usage: ext.key_usage,
        dns_names: ext.dns_names,
    })
}

/// AlgorithmIdentifier: returns the OID; parameters must be absent or NULL.
fn read_algorithm<'a>(dec: &mut Decoder<'a>, field: &'static str) -> Result<&'a [u8], PkiError> {
    let mut alg = dec.read_sequence().map_err(PkiError::field(field))?;
    let oid = alg.read_oid().map_err(PkiError::field(field))?;
    if !alg.is_empty() {
        alg.read_null().map_err(PkiError::field(field))?;
    }
    alg.finish().map_err(PkiError::field(field))?;
    Ok(oid)
}

fn signature_hash(oid: &[u8]) -> Result<HashAlgId, PkiError> {
    Ok(match oid {
        known::MD2_WITH_RSA => HashAlgId::Md2,
        known::MD4_WITH_RSA => HashAlgId::Md4,
        known::MD5_WITH_RSA => HashAlgId::Md5,
        known::SHA1_WITH_RSA => HashAlgId::Sha1,
        known::SHA224_WITH_RSA => HashAlgId::Sha224,
        known::SHA256_WITH_RSA => HashAlgId::Sha256,
        known::SHA384_WITH_RSA => HashAlgId::Sha384,
        known::SHA512_WITH_RSA => HashAlgId::Sha512,
        other => {
            return Err(PkiError::UnsupportedSignatureAlgorithm(dotted(other)));
        }
    })
}

pub(crate) fn dotted(oid: &[u8]) -> String {
    Oid::from_der_value(oid)
        .map(|o| o.to_dot_string())
        .unwrap_or_else(|_| "<malformed OID>".into())
}

/// Name ::= SEQUENCE OF SET OF AttributeTypeAndValue
fn parse_name(tag: u8, body: &[u8], field: &'static str) -> Result<Name, PkiError> {
    if tag != tags::SEQUENCE {
        return Err(PkiError::field(field)(
            embtls_types::Asn1Error::UnexpectedTag {
                expected: tags::SEQUENCE,
                actual: tag,
            },
        ));
    }
    let mut rdns = Decoder::new(body);
    let mut attributes = Vec::new();
    while !rdns.is_empty() {
        let mut set = rdns.read_set().map_err(PkiError::field(field))?;
        while !set.is_empty() {
            let mut atv = set.read_sequence().map_err(PkiError::field(field))?;
            let oid = atv.read_oid().map_err(PkiError::field(field))?;
            let (str_tag, value) = atv.read_string().map_err(PkiError::field(field))?;
            atv.finish().map_err(PkiError::field(field))?;
            attributes.push(NameAttribute {
                oid: oid.to_vec(),
                value: decode_string(str_tag, value),
            });
        }
    }
    Ok(Name { attributes })
}

fn decode_string(tag: u8, value: &[u8]) -> String {
    match tag {
        tags::BMP_STRING => {
            let units: Vec<u16> = value
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        tags::UNIVERSAL_STRING => value
            .chunks_exact(4)
            .map(|c| {
                char::from_u32(u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                    .unwrap_or(char::REPLACEMENT_CHARACTER)
            })
            .collect(),
        _ => String::from_utf8_lossy(value).into_owned(),
    }
}

/// SubjectPublicKeyInfo carrying an rsaEncryption key.
fn parse_rsa_spki(tbs: &mut Decoder) -> Result<RsaPublicKey, PkiError> {
    let mut spki = tbs
        .read_sequence()
        .map_err(PkiError::field("subjectPublicKeyInfo"))?;
    let alg = read_algorithm(&mut spki, "subjectPublicKeyInfo.algorithm")?;
    if alg != known::RSA_ENCRYPTION {
        return Err(PkiError::UnsupportedKeyAlgorithm(dotted(alg)));
    }
    let bits = spki
        .read_bit_string()
        .map_err(PkiError::field("subjectPublicKey"))?;
    spki.finish().map_err(PkiError::field("subjectPublicKeyInfo"))?;

    let mut key = Decoder::new(bits);
    let mut seq = key
        .read_sequence()
        .map_err(PkiError::field("subjectPublicKey"))?;
    key.finish().map_err(PkiError::field("subjectPublicKey"))?;
    let n = seq.read_unsigned().map_err(PkiError::field("rsa.modulus"))?;
    let e = seq
        .read_unsigned()
        .map_err(PkiError::field("rsa.publicExponent"))?;
    seq.finish().map_err(PkiError::field("subjectPublicKey"))?;
    Ok(RsaPublicKey::new(n, e)?)
}

//! v3 extensions: basicConstraints, keyUsage and subjectAltName.

use embtls_types::PkiError;
use embtls_utils::asn1::{tags, Decoder};
use embtls_utils::oid::known;
use log::trace;

use super::certificate::dotted;

/// keyUsage bits as a 16-bit mask: the first BIT STRING octet is the high
/// byte, so bit 0 (`digitalSignature`) is `0x8000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub u16);

impl KeyUsage {
    pub const DIGITAL_SIGNATURE: u16 = 0x8000;
    pub const NON_REPUDIATION: u16 = 0x4000;
    pub const KEY_ENCIPHERMENT: u16 = 0x2000;
    pub const DATA_ENCIPHERMENT: u16 = 0x1000;
    pub const KEY_AGREEMENT: u16 = 0x0800;
    pub const KEY_CERT_SIGN: u16 = 0x0400;
    pub const CRL_SIGN: u16 = 0x0200;
    pub const ENCIPHER_ONLY: u16 = 0x0100;
    pub const DECIPHER_ONLY: u16 = 0x0080;

    pub fn has(&self, flag: u16) -> bool {
        self.0 & flag != 0
    }
}

/// The extension fields the engine acts on.
#[derive(Debug, Default)]
pub(crate) struct Extensions {
    pub is_ca: bool,
    pub max_pathlen: Option<u32>,
    pub key_usage: Option<KeyUsage>,
    pub dns_names: Vec<String>,
}

/// Parse the content of the `[3]` wrapper: `SEQUENCE OF Extension`.
///
/// Each Extension is decoded from its own sub-decoder, so a short or
/// overlong extension fails with `LengthMismatch` instead of shifting the
/// cursor into the next one.
pub(crate) fn parse_extensions(body: &[u8]) -> Result<Extensions, PkiError> {
    let mut outer = Decoder::new(body);
    let mut list = outer.read_sequence().map_err(PkiError::field("extensions"))?;
    outer.finish().map_err(PkiError::field("extensions"))?;

    let mut ext = Extensions::default();
    while !list.is_empty() {
        let mut item = list.read_sequence().map_err(PkiError::field("extension"))?;
        let oid = item.read_oid().map_err(PkiError::field("extension.extnID"))?;
        let critical = if item.peek_tag().map_err(PkiError::field("extension"))? == tags::BOOLEAN {
            item.read_boolean()
                .map_err(PkiError::field("extension.critical"))?
        } else {
            false
        };
        let value = item
            .read_octet_string()
            .map_err(PkiError::field("extension.extnValue"))?;
        item.finish().map_err(PkiError::field("extension"))?;

        match oid {
            known::CE_BASIC_CONSTRAINTS => {
                let (is_ca, pathlen) = parse_basic_constraints(value)?;
                ext.is_ca = is_ca;
                ext.max_pathlen = pathlen;
            }
            known::CE_KEY_USAGE => ext.key_usage = Some(parse_key_usage(value)?),
            known::CE_SUBJECT_ALT_NAME => ext.dns_names = parse_dns_names(value)?,
            other if critical => {
                return Err(PkiError::UnsupportedCriticalExtension(dotted(other)));
            }
            other => trace!("skipping extension {}", dotted(other)),
        }
    }
    Ok(ext)
}

/// `SEQUENCE { cA BOOLEAN DEFAULT FALSE, pathLenConstraint INTEGER OPTIONAL }`
fn parse_basic_constraints(value: &[u8]) -> Result<(bool, Option<u32>), PkiError> {
    let field = PkiError::field("basicConstraints");
    let mut outer = Decoder::new(value);
    let mut seq = outer.read_sequence().map_err(&field)?;
    outer.finish().map_err(&field)?;

    let mut is_ca = false;
    if !seq.is_empty() && seq.peek_tag().map_err(&field)? == tags::BOOLEAN {
        is_ca = seq.read_boolean().map_err(&field)?;
    }
    let mut pathlen = None;
    if !seq.is_empty() {
        let n = seq.read_small_int().map_err(&field)?;
        if n < 0 {
            return Err(PkiError::InvalidCert("negative pathLenConstraint".into()));
        }
        pathlen = Some(n as u32);
    }
    seq.finish().map_err(&field)?;
    Ok((is_ca, pathlen))
}

fn parse_key_usage(value: &[u8]) -> Result<KeyUsage, PkiError> {
    let field = PkiError::field("keyUsage");
    let mut dec = Decoder::new(value);
    let (unused, bits) = dec.read_bit_string_raw().map_err(&field)?;
    dec.finish().map_err(&field)?;
    if bits.is_empty() && unused != 0 {
        return Err(PkiError::InvalidCert("keyUsage unused bit count".into()));
    }
    let mut mask = 0u16;
    for (i, b) in bits.iter().take(2).enumerate() {
        mask |= (*b as u16) << (8 * (1 - i));
    }
    Ok(KeyUsage(mask))
}

/// `GeneralNames ::= SEQUENCE OF GeneralName`; keeps only `dNSName [2]`.
fn parse_dns_names(value: &[u8]) -> Result<Vec<String>, PkiError> {
    let field = PkiError::field("subjectAltName");
    let mut outer = Decoder::new(value);
    let mut seq = outer.read_sequence().map_err(&field)?;
    outer.finish().map_err(&field)?;

    let mut names = Vec::new();
    while !seq.is_empty() {
        let tlv = seq.read_tlv().map_err(&field)?;
        if tlv.tag == tags::context(2, false) {
            let name = std::str::from_utf8(tlv.value)
                .map_err(|_| PkiError::InvalidCert("dNSName is not ASCII".into()))?;
            names.push(name.to_string());
        }
    }
    Ok(names)
}

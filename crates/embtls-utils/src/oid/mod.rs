//! Object identifiers used by X.509 and PKCS#1.

use embtls_types::Asn1Error;
use std::fmt;

/// An OID held as its arc values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Oid {
    arcs: Vec<u32>,
}

impl Oid {
    pub fn new(arcs: &[u32]) -> Self {
        Self {
            arcs: arcs.to_vec(),
        }
    }

    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    /// DER content octets (no tag or length).
    pub fn to_der_value(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        if self.arcs.len() >= 2 {
            buf.push((self.arcs[0] * 40 + self.arcs[1]) as u8);
            for &arc in &self.arcs[2..] {
                encode_arc(&mut buf, arc);
            }
        }
        buf
    }

    pub fn from_der_value(data: &[u8]) -> Result<Self, Asn1Error> {
        let (&first, mut rest) = data
            .split_first()
            .ok_or(Asn1Error::InvalidData("empty OID"))?;
        let first = first as u32;
        let mut arcs = vec![(first / 40).min(2), first - 40 * (first / 40).min(2)];
        while !rest.is_empty() {
            let (arc, used) = decode_arc(rest)?;
            arcs.push(arc);
            rest = &rest[used..];
        }
        Ok(Self { arcs })
    }

    pub fn to_dot_string(&self) -> String {
        self.arcs
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_dot_string())
    }
}

fn encode_arc(buf: &mut Vec<u8>, mut value: u32) {
    let mut tmp = [0u8; 5];
    let mut i = tmp.len();
    loop {
        i -= 1;
        tmp[i] = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    let last = tmp.len() - 1;
    for (j, b) in tmp.iter().enumerate().skip(i) {
        buf.push(if j < last { b | 0x80 } else { *b });
    }
}

fn decode_arc(data: &[u8]) -> Result<(u32, usize), Asn1Error> {
    let mut value: u32 = 0;
    for (i, &byte) in data.iter().enumerate() {
        if value > (u32::MAX >> 7) {
            return Err(Asn1Error::InvalidData("OID arc overflow"));
        }
        value = (value << 7) | (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(Asn1Error::InvalidData("truncated OID arc"))
}

/// Content octets of the OIDs this library recognizes.
pub mod known {
    // PKCS#1
    pub const RSA_ENCRYPTION: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x01];
    pub const MD2_WITH_RSA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x02];
    pub const MD4_WITH_RSA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x03];
    pub const MD5_WITH_RSA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x04];
    pub const SHA1_WITH_RSA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x05];
    pub const SHA256_WITH_RSA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0B];
    pub const SHA384_WITH_RSA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0C];
    pub const SHA512_WITH_RSA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0D];
    pub const SHA224_WITH_RSA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0E];

    // Digest algorithms (DigestInfo)
    pub const MD2: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x02, 0x02];
    pub const MD4: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x02, 0x04];
    pub const MD5: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x02, 0x05];
    pub const SHA1: &[u8] = &[0x2B, 0x0E, 0x03, 0x02, 0x1A];
    pub const SHA256: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01];
    pub const SHA384: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x02];
    pub const SHA512: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x03];
    pub const SHA224: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x04];

    // X.520 attribute types
    pub const AT_CN: &[u8] = &[0x55, 0x04, 0x03];
    pub const AT_SERIAL_NUMBER: &[u8] = &[0x55, 0x04, 0x05];
    pub const AT_COUNTRY: &[u8] = &[0x55, 0x04, 0x06];
    pub const AT_LOCALITY: &[u8] = &[0x55, 0x04, 0x07];
    pub const AT_STATE: &[u8] = &[0x55, 0x04, 0x08];
    pub const AT_ORGANIZATION: &[u8] = &[0x55, 0x04, 0x0A];
    pub const AT_ORG_UNIT: &[u8] = &[0x55, 0x04, 0x0B];
    pub const EMAIL_ADDRESS: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x01];

    // Certificate extensions
    pub const CE_KEY_USAGE: &[u8] = &[0x55, 0x1D, 0x0F];
    pub const CE_SUBJECT_ALT_NAME: &[u8] = &[0x55, 0x1D, 0x11];
    pub const CE_BASIC_CONSTRAINTS: &[u8] = &[0x55, 0x1D, 0x13];
}

/// Short name for a distinguished-name attribute, as printed by
/// `openssl x509 -subject`.
pub fn attribute_short_name(oid: &[u8]) -> Option<&'static str> {
    use known::*;
    Some(match oid {
        AT_CN => "CN",
        AT_SERIAL_NUMBER => "serialNumber",
        AT_COUNTRY => "C",
        AT_LOCALITY => "L",
        AT_STATE => "ST",
        AT_ORGANIZATION => "O",
        AT_ORG_UNIT => "OU",
        EMAIL_ADDRESS => "emailAddress",
        _ => return None,
    })
}

//! X.509 v1/v2/v3 certificates with RSA keys.

mod certificate;
mod extensions;
mod hostname;
mod text;
mod verify;

pub use certificate::{load_certificates, parse_certificates};
pub use extensions::KeyUsage;
pub use hostname::matches_hostname;
pub use verify::{check_chain, verify, verify_at};

use embtls_crypto::rsa::RsaPublicKey;
use embtls_types::HashAlgId;
use embtls_utils::asn1::Asn1Time;
use embtls_utils::oid::{attribute_short_name, known, Oid};

/// One attribute of a distinguished name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameAttribute {
    /// Attribute type OID content octets.
    pub oid: Vec<u8>,
    /// Attribute value decoded to text.
    pub value: String,
}

/// A distinguished name in encoding order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Name {
    pub attributes: Vec<NameAttribute>,
}

impl Name {
    /// Values of every attribute with the given type.
    pub fn values<'a>(&'a self, oid: &'a [u8]) -> impl Iterator<Item = &'a str> + 'a {
        self.attributes
            .iter()
            .filter(move |a| a.oid == oid)
            .map(|a| a.value.as_str())
    }

    pub fn common_name(&self) -> Option<&str> {
        self.values(known::AT_CN).next()
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, attr) in self.attributes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match attribute_short_name(&attr.oid) {
                Some(short) => write!(f, "{short}={}", attr.value)?,
                None => match Oid::from_der_value(&attr.oid) {
                    Ok(oid) => write!(f, "{oid}={}", attr.value)?,
                    Err(_) => write!(f, "?={}", attr.value)?,
                },
            }
        }
        Ok(())
    }
}

/// A parsed certificate.
///
/// `raw`, `tbs_raw`, `issuer_raw` and `subject_raw` keep the exact DER the
/// fields came from: signatures cover `tbs_raw`, and chain linkage compares
/// issuer and subject bytes rather than decoded names.
#[derive(Debug, Clone)]
pub struct Certificate {
    pub raw: Vec<u8>,
    pub tbs_raw: Vec<u8>,
    /// 1, 2 or 3.
    pub version: u8,
    pub serial: Vec<u8>,
    pub issuer_raw: Vec<u8>,
    pub issuer: Name,
    pub subject_raw: Vec<u8>,
    pub subject: Name,
    pub not_before: Asn1Time,
    pub not_after: Asn1Time,
    pub public_key: RsaPublicKey,
    /// Digest of the signature algorithm; all supported ones are RSA.
    pub sig_hash: HashAlgId,
    pub signature: Vec<u8>,
    /// basicConstraints cA.
    pub is_ca: bool,
    /// basicConstraints pathLenConstraint.
    pub max_pathlen: Option<u32>,
    pub key_usage: Option<KeyUsage>,
    /// subjectAltName dNSName entries.
    pub dns_names: Vec<String>,
}

impl Certificate {
    /// Parse exactly one DER certificate.
    pub fn from_der(der: &[u8]) -> Result<Self, embtls_types::PkiError> {
        certificate::parse_der(der)
    }

    /// True if the validity period contains `now`.
    pub fn is_valid_at(&self, now: &Asn1Time) -> bool {
        self.not_before <= *now && *now <= self.not_after
    }
}

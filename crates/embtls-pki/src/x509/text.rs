//! Human-readable certificate summary for the `x509 --text` command.

use std::fmt::Write;

use embtls_types::HashAlgId;

use super::{Certificate, KeyUsage};

fn hex_colon(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

fn signature_name(hash: HashAlgId) -> &'static str {
    match hash {
        HashAlgId::Md2 => "RSA+MD2",
        HashAlgId::Md4 => "RSA+MD4",
        HashAlgId::Md5 => "RSA+MD5",
        HashAlgId::Sha1 => "RSA+SHA1",
        HashAlgId::Sha224 => "RSA+SHA224",
        HashAlgId::Sha256 => "RSA+SHA256",
        HashAlgId::Sha384 => "RSA+SHA384",
        HashAlgId::Sha512 => "RSA+SHA512",
    }
}

fn format_key_usage(usage: KeyUsage) -> String {
    let names = [
        (KeyUsage::DIGITAL_SIGNATURE, "Digital Signature"),
        (KeyUsage::NON_REPUDIATION, "Non Repudiation"),
        (KeyUsage::KEY_ENCIPHERMENT, "Key Encipherment"),
        (KeyUsage::DATA_ENCIPHERMENT, "Data Encipherment"),
        (KeyUsage::KEY_AGREEMENT, "Key Agreement"),
        (KeyUsage::KEY_CERT_SIGN, "Key Cert Sign"),
        (KeyUsage::CRL_SIGN, "CRL Sign"),
        (KeyUsage::ENCIPHER_ONLY, "Encipher Only"),
        (KeyUsage::DECIPHER_ONLY, "Decipher Only"),
    ];
    names
        .iter()
        .filter(|(bit, _)| usage.has(*bit))
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

impl Certificate {
    /// One field per line, each prefixed by `prefix`.
    pub fn to_text(&self, prefix: &str) -> String {
        let mut out = String::new();
        // writing into a String cannot fail
        let _ = writeln!(out, "{prefix}cert. version : {}", self.version);
        let _ = writeln!(out, "{prefix}serial number : {}", hex_colon(&self.serial));
        let _ = writeln!(out, "{prefix}issuer  name  : {}", self.issuer);
        let _ = writeln!(out, "{prefix}subject name  : {}", self.subject);
        let _ = writeln!(out, "{prefix}issued  on    : {}", self.not_before);
        let _ = writeln!(out, "{prefix}expires on    : {}", self.not_after);
        let _ = writeln!(out, "{prefix}signed using  : {}", signature_name(self.sig_hash));
        let _ = writeln!(out, "{prefix}RSA key size  : {} bits", self.public_key.bits());
        if self.is_ca {
            match self.max_pathlen {
                Some(n) => {
                    let _ = writeln!(out, "{prefix}basic constr. : CA=true, max_pathlen={n}");
                }
                None => {
                    let _ = writeln!(out, "{prefix}basic constr. : CA=true");
                }
            }
        }
        if let Some(usage) = self.key_usage {
            let _ = writeln!(out, "{prefix}key usage     : {}", format_key_usage(usage));
        }
        if !self.dns_names.is_empty() {
            let _ = writeln!(out, "{prefix}subject alt.  : {}", self.dns_names.join(", "));
        }
        out
    }
}

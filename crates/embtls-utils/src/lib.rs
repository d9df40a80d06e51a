#![forbid(unsafe_code)]
#![doc = "ASN.1 DER, PEM armor and OID helpers for embtls."]

pub mod asn1;
pub mod oid;
pub mod pem;

//! Minimal ASN.1 DER support: the subset X.509 and PKCS#1 need.
//!
//! Tags are handled as single identifier octets. Long-form lengths are
//! limited to one or two length octets.

mod decoder;
mod encoder;
mod time;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use time::Asn1Time;

/// ASN.1 tag constants.
pub mod tags {
    pub const BOOLEAN: u8 = 0x01;
    pub const INTEGER: u8 = 0x02;
    pub const BIT_STRING: u8 = 0x03;
    pub const OCTET_STRING: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const OID: u8 = 0x06;
    pub const UTF8_STRING: u8 = 0x0C;
    pub const PRINTABLE_STRING: u8 = 0x13;
    pub const T61_STRING: u8 = 0x14;
    pub const IA5_STRING: u8 = 0x16;
    pub const UTC_TIME: u8 = 0x17;
    pub const GENERALIZED_TIME: u8 = 0x18;
    pub const UNIVERSAL_STRING: u8 = 0x1C;
    pub const BMP_STRING: u8 = 0x1E;
    pub const SEQUENCE: u8 = 0x30;
    pub const SET: u8 = 0x31;
    pub const CONTEXT_SPECIFIC: u8 = 0x80;
    pub const CONSTRUCTED: u8 = 0x20;

    /// Identifier octet for a context-specific tag `[n]`.
    pub const fn context(n: u8, constructed: bool) -> u8 {
        CONTEXT_SPECIFIC | if constructed { CONSTRUCTED } else { 0 } | (n & 0x1F)
    }
}

/// A borrowed ASN.1 TLV element.
#[derive(Debug, Clone, Copy)]
pub struct Tlv<'a> {
    /// Identifier octet.
    pub tag: u8,
    /// Content octets.
    pub value: &'a [u8],
    /// The complete encoding (identifier, length and content).
    pub raw: &'a [u8],
}

impl Tlv<'_> {
    pub fn is_constructed(&self) -> bool {
        self.tag & tags::CONSTRUCTED != 0
    }
}

//! ASN.1 DER encoder.

use super::{tags, Asn1Time};

/// A builder for DER-encoded data.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the encoder and return the encoded bytes.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    /// Write a TLV with the given identifier octet.
    pub fn write_tlv(&mut self, tag: u8, value: &[u8]) -> &mut Self {
        self.buf.push(tag);
        self.write_length(value.len());
        self.buf.extend_from_slice(value);
        self
    }

    fn write_length(&mut self, len: usize) {
        if len < 0x80 {
            self.buf.push(len as u8);
            return;
        }
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|&&b| b == 0).count();
        self.buf.push(0x80 | (bytes.len() - skip) as u8);
        self.buf.extend_from_slice(&bytes[skip..]);
    }

    /// Write an unsigned big-endian INTEGER, adding a leading zero when the
    /// high bit is set and stripping redundant ones.
    pub fn write_unsigned(&mut self, magnitude: &[u8]) -> &mut Self {
        let skip = magnitude.iter().take_while(|&&b| b == 0).count();
        let trimmed = &magnitude[skip..];
        if trimmed.is_empty() {
            return self.write_tlv(tags::INTEGER, &[0]);
        }
        if trimmed[0] & 0x80 != 0 {
            let mut padded = Vec::with_capacity(trimmed.len() + 1);
            padded.push(0);
            padded.extend_from_slice(trimmed);
            self.write_tlv(tags::INTEGER, &padded)
        } else {
            self.write_tlv(tags::INTEGER, trimmed)
        }
    }

    /// Write a small non-negative INTEGER.
    pub fn write_small_int(&mut self, value: u32) -> &mut Self {
        self.write_unsigned(&value.to_be_bytes())
    }

    pub fn write_boolean(&mut self, value: bool) -> &mut Self {
        self.write_tlv(tags::BOOLEAN, &[if value { 0xFF } else { 0x00 }])
    }

    pub fn write_null(&mut self) -> &mut Self {
        self.write_tlv(tags::NULL, &[])
    }

    pub fn write_oid(&mut self, oid: &[u8]) -> &mut Self {
        self.write_tlv(tags::OID, oid)
    }

    pub fn write_octet_string(&mut self, value: &[u8]) -> &mut Self {
        self.write_tlv(tags::OCTET_STRING, value)
    }

    /// Write a BIT STRING with zero unused bits.
    pub fn write_bit_string(&mut self, value: &[u8]) -> &mut Self {
        let mut content = Vec::with_capacity(value.len() + 1);
        content.push(0);
        content.extend_from_slice(value);
        self.write_tlv(tags::BIT_STRING, &content)
    }

    pub fn write_printable_string(&mut self, s: &str) -> &mut Self {
        self.write_tlv(tags::PRINTABLE_STRING, s.as_bytes())
    }

    pub fn write_utf8_string(&mut self, s: &str) -> &mut Self {
        self.write_tlv(tags::UTF8_STRING, s.as_bytes())
    }

    pub fn write_time(&mut self, time: &Asn1Time) -> &mut Self {
        let (tag, s) = time.to_der_string();
        self.write_tlv(tag, s.as_bytes())
    }

    pub fn write_sequence(&mut self, contents: &[u8]) -> &mut Self {
        self.write_tlv(tags::SEQUENCE, contents)
    }

    pub fn write_set(&mut self, contents: &[u8]) -> &mut Self {
        self.write_tlv(tags::SET, contents)
    }

    /// Write a context-specific element `[n]`.
    pub fn write_context(&mut self, n: u8, constructed: bool, content: &[u8]) -> &mut Self {
        self.write_tlv(tags::context(n, constructed), content)
    }

    /// Append already-encoded bytes.
    pub fn write_raw(&mut self, der: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(der);
        self
    }
}

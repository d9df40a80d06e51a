//! ASN.1 DER decoder.

use super::{tags, Asn1Time, Tlv};
use embtls_types::Asn1Error;

/// A cursor over DER-encoded data.
///
/// Every read either consumes a complete element or fails; the cursor never
/// moves past the end of its buffer. Nested structures are decoded with a
/// sub-decoder whose [`finish`](Decoder::finish) checks the cursor landed
/// exactly on the enclosing length.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    /// Create a new decoder over the given data.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the remaining undecoded bytes.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns true if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Fail with `LengthMismatch` unless every byte was consumed.
    pub fn finish(&self) -> Result<(), Asn1Error> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Asn1Error::LengthMismatch)
        }
    }

    /// Peek at the next identifier octet without consuming it.
    pub fn peek_tag(&self) -> Result<u8, Asn1Error> {
        self.data.get(self.pos).copied().ok_or(Asn1Error::OutOfData)
    }

    /// Parse a DER length: short form, or long form with one or two
    /// length octets. Anything longer is `InvalidLength`.
    pub fn read_length(&mut self) -> Result<usize, Asn1Error> {
        let first = *self.data.get(self.pos).ok_or(Asn1Error::OutOfData)?;
        let len = match first {
            0x00..=0x7F => {
                self.pos += 1;
                first as usize
            }
            0x81 => {
                let b = *self.data.get(self.pos + 1).ok_or(Asn1Error::OutOfData)?;
                self.pos += 2;
                b as usize
            }
            0x82 => {
                let hi = *self.data.get(self.pos + 1).ok_or(Asn1Error::OutOfData)?;
                let lo = *self.data.get(self.pos + 2).ok_or(Asn1Error::OutOfData)?;
                self.pos += 3;
                (hi as usize) << 8 | lo as usize
            }
            _ => return Err(Asn1Error::InvalidLength),
        };
        if len > self.data.len() - self.pos {
            return Err(Asn1Error::OutOfData);
        }
        Ok(len)
    }

    /// Parse the next TLV element.
    pub fn read_tlv(&mut self) -> Result<Tlv<'a>, Asn1Error> {
        let start = self.pos;
        let tag = self.peek_tag()?;
        if tag & 0x1F == 0x1F {
            // multi-octet tag numbers never occur in the structures we decode
            return Err(Asn1Error::InvalidData("high tag number"));
        }
        self.pos += 1;
        let len = match self.read_length() {
            Ok(len) => len,
            Err(e) => {
                self.pos = start;
                return Err(e);
            }
        };
        let value = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(Tlv {
            tag,
            value,
            raw: &self.data[start..self.pos],
        })
    }

    /// Read an element whose identifier must equal `tag`; returns its content.
    pub fn expect(&mut self, tag: u8) -> Result<&'a [u8], Asn1Error> {
        let actual = self.peek_tag()?;
        if actual != tag {
            return Err(Asn1Error::UnexpectedTag {
                expected: tag,
                actual,
            });
        }
        Ok(self.read_tlv()?.value)
    }

    /// Read a SEQUENCE, returning a sub-decoder over its contents.
    pub fn read_sequence(&mut self) -> Result<Decoder<'a>, Asn1Error> {
        self.expect(tags::SEQUENCE).map(Decoder::new)
    }

    /// Read a SET, returning a sub-decoder over its contents.
    pub fn read_set(&mut self) -> Result<Decoder<'a>, Asn1Error> {
        self.expect(tags::SET).map(Decoder::new)
    }

    /// Read an INTEGER and return its content octets (big-endian, two's complement).
    pub fn read_integer(&mut self) -> Result<&'a [u8], Asn1Error> {
        let value = self.expect(tags::INTEGER)?;
        if value.is_empty() {
            return Err(Asn1Error::InvalidData("empty integer"));
        }
        Ok(value)
    }

    /// Read a non-negative INTEGER as unsigned big-endian magnitude, leading zeros stripped.
    pub fn read_unsigned(&mut self) -> Result<&'a [u8], Asn1Error> {
        let value = self.read_integer()?;
        if value[0] & 0x80 != 0 {
            return Err(Asn1Error::InvalidData("negative integer"));
        }
        let skip = value.iter().take_while(|&&b| b == 0).count();
        Ok(&value[skip..])
    }

    /// Read an INTEGER that must fit a machine `i32`.
    pub fn read_small_int(&mut self) -> Result<i32, Asn1Error> {
        let value = self.read_integer()?;
        if value.len() > 4 {
            return Err(Asn1Error::InvalidLength);
        }
        let negative = value[0] & 0x80 != 0;
        let mut n: i32 = if negative { -1 } else { 0 };
        for &b in value {
            n = (n << 8) | b as i32;
        }
        Ok(n)
    }

    /// Read a BOOLEAN value.
    pub fn read_boolean(&mut self) -> Result<bool, Asn1Error> {
        match self.expect(tags::BOOLEAN)? {
            [b] => Ok(*b != 0),
            _ => Err(Asn1Error::InvalidLength),
        }
    }

    /// Read a BIT STRING whose unused-bits octet must be zero.
    pub fn read_bit_string(&mut self) -> Result<&'a [u8], Asn1Error> {
        let (unused, bits) = self.read_bit_string_raw()?;
        if unused != 0 {
            return Err(Asn1Error::InvalidData("bit string with unused bits"));
        }
        Ok(bits)
    }

    /// Read a BIT STRING and return (unused bits, data).
    pub fn read_bit_string_raw(&mut self) -> Result<(u8, &'a [u8]), Asn1Error> {
        match self.expect(tags::BIT_STRING)? {
            [] => Err(Asn1Error::InvalidLength),
            [unused, rest @ ..] if *unused < 8 => Ok((*unused, rest)),
            _ => Err(Asn1Error::InvalidData("bit string unused count")),
        }
    }

    /// Read an OCTET STRING.
    pub fn read_octet_string(&mut self) -> Result<&'a [u8], Asn1Error> {
        self.expect(tags::OCTET_STRING)
    }

    /// Read an OBJECT IDENTIFIER and return its content octets.
    pub fn read_oid(&mut self) -> Result<&'a [u8], Asn1Error> {
        let value = self.expect(tags::OID)?;
        if value.is_empty() {
            return Err(Asn1Error::InvalidLength);
        }
        Ok(value)
    }

    /// Read a NULL.
    pub fn read_null(&mut self) -> Result<(), Asn1Error> {
        if self.expect(tags::NULL)?.is_empty() {
            Ok(())
        } else {
            Err(Asn1Error::InvalidLength)
        }
    }

    /// Read a context-specific element `[n]`.
    pub fn read_context(&mut self, n: u8, constructed: bool) -> Result<&'a [u8], Asn1Error> {
        self.expect(tags::context(n, constructed))
    }

    /// Read `[n]` if it is the next element; otherwise consume nothing.
    pub fn try_read_context(
        &mut self,
        n: u8,
        constructed: bool,
    ) -> Result<Option<&'a [u8]>, Asn1Error> {
        if self.is_empty() || self.peek_tag()? != tags::context(n, constructed) {
            return Ok(None);
        }
        self.read_tlv().map(|tlv| Some(tlv.value))
    }

    /// Read one of the directory string types and return (tag, content).
    pub fn read_string(&mut self) -> Result<(u8, &'a [u8]), Asn1Error> {
        let tlv = self.read_tlv()?;
        match tlv.tag {
            tags::UTF8_STRING
            | tags::PRINTABLE_STRING
            | tags::T61_STRING
            | tags::IA5_STRING
            | tags::UNIVERSAL_STRING
            | tags::BMP_STRING => Ok((tlv.tag, tlv.value)),
            actual => Err(Asn1Error::UnexpectedTag {
                expected: tags::UTF8_STRING,
                actual,
            }),
        }
    }

    /// Read a Time (UTCTime or GeneralizedTime).
    pub fn read_time(&mut self) -> Result<Asn1Time, Asn1Error> {
        let tlv = self.read_tlv()?;
        match tlv.tag {
            tags::UTC_TIME => Asn1Time::parse_utc(tlv.value),
            tags::GENERALIZED_TIME => Asn1Time::parse_generalized(tlv.value),
            actual => Err(Asn1Error::UnexpectedTag {
                expected: tags::UTC_TIME,
                actual,
            }),
        }
    }
}

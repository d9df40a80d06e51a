//! Record layer: framing, version checks and per-direction protection.

pub mod protection;

pub use protection::RecordProtection;

use crate::TlsVersion;
use embtls_types::TlsError;
use log::trace;

pub const RECORD_HEADER_LEN: usize = 5;
pub const MAX_PLAINTEXT_LENGTH: usize = 16384;
/// Content ceiling plus room for MAC and CBC padding.
pub const MAX_CIPHERTEXT_LENGTH: usize = MAX_PLAINTEXT_LENGTH + 2048;
/// Consecutive empty application-data records tolerated before giving up.
pub const MAX_EMPTY_RECORDS: u32 = 3;

/// Record content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContentType {
    ChangeCipherSpec = 20,
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
}

impl ContentType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            20 => Some(ContentType::ChangeCipherSpec),
            21 => Some(ContentType::Alert),
            22 => Some(ContentType::Handshake),
            23 => Some(ContentType::ApplicationData),
            _ => None,
        }
    }
}

/// A validated record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub content_type: ContentType,
    pub version: TlsVersion,
    pub length: usize,
}

/// Framing and protection state for both directions.
pub struct RecordLayer {
    /// Version written into outgoing headers.
    version: TlsVersion,
    encryptor: Option<RecordProtection>,
    decryptor: Option<RecordProtection>,
    empty_records: u32,
}

impl RecordLayer {
    /// Starts at SSLv3 framing, which every peer accepts for the hello.
    pub fn new() -> Self {
        Self {
            version: TlsVersion::Ssl3,
            encryptor: None,
            decryptor: None,
            empty_records: 0,
        }
    }

    pub fn version(&self) -> TlsVersion {
        self.version
    }

    pub fn set_version(&mut self, version: TlsVersion) {
        self.version = version;
    }

    pub fn is_encrypting(&self) -> bool {
        self.encryptor.is_some()
    }

    pub fn is_decrypting(&self) -> bool {
        self.decryptor.is_some()
    }

    pub fn activate_write(&mut self, protection: RecordProtection) {
        self.encryptor = Some(protection);
    }

    pub fn activate_read(&mut self, protection: RecordProtection) {
        self.decryptor = Some(protection);
    }

    /// `(send, receive)` sequence numbers; zero while unprotected.
    pub fn sequence_numbers(&self) -> (u64, u64) {
        (
            self.encryptor.as_ref().map_or(0, |p| p.sequence_number()),
            self.decryptor.as_ref().map_or(0, |p| p.sequence_number()),
        )
    }

    /// Build one complete record: header plus (protected) body.
    pub fn seal_record(
        &mut self,
        content_type: ContentType,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, TlsError> {
        if plaintext.len() > MAX_PLAINTEXT_LENGTH {
            return Err(TlsError::InvalidRecord(
                "plaintext exceeds max fragment size".into(),
            ));
        }
        let body = match &mut self.encryptor {
            Some(enc) => enc.seal(content_type, plaintext)?,
            None => plaintext.to_vec(),
        };
        let mut out = Vec::with_capacity(RECORD_HEADER_LEN + body.len());
        out.push(content_type as u8);
        out.extend_from_slice(&self.version.wire());
        out.extend_from_slice(&(body.len() as u16).to_be_bytes());
        out.extend_from_slice(&body);
        trace!(
            "send record type={:?} len={} seq={}",
            content_type,
            body.len(),
            self.sequence_numbers().0
        );
        Ok(out)
    }

    /// Validate the 5-byte header at the start of `data`.
    pub fn parse_header(&self, data: &[u8]) -> Result<RecordHeader, TlsError> {
        if data.len() < RECORD_HEADER_LEN {
            return Err(TlsError::InvalidRecord("incomplete record header".into()));
        }
        let content_type = ContentType::from_u8(data[0])
            .ok_or_else(|| TlsError::InvalidRecord(format!("unknown content type {}", data[0])))?;
        if data[1] != TlsVersion::MAJOR {
            return Err(TlsError::InvalidRecord(format!(
                "major version {}",
                data[1]
            )));
        }
        let version = TlsVersion::from_minor(data[2])
            .ok_or_else(|| TlsError::InvalidRecord(format!("minor version {}", data[2])))?;
        let length = u16::from_be_bytes([data[3], data[4]]) as usize;

        let limit = if self.decryptor.is_some() {
            MAX_CIPHERTEXT_LENGTH
        } else {
            MAX_PLAINTEXT_LENGTH
        };
        if length > limit {
            return Err(TlsError::InvalidRecord(format!("record length {length}")));
        }
        if length == 0 && self.decryptor.is_none() && content_type != ContentType::ApplicationData {
            return Err(TlsError::InvalidRecord(format!(
                "empty {content_type:?} record"
            )));
        }
        Ok(RecordHeader {
            content_type,
            version,
            length,
        })
    }

    /// Take one record off the front of `data`.
    ///
    /// Returns `None` when `data` does not yet hold a whole record; otherwise
    /// the content type, the plaintext and the number of bytes consumed.
    pub fn open_record(
        &mut self,
        data: &[u8],
    ) -> Result<Option<(ContentType, Vec<u8>, usize)>, TlsError> {
        if data.len() < RECORD_HEADER_LEN {
            return Ok(None);
        }
        let header = self.parse_header(data)?;
        let total = RECORD_HEADER_LEN + header.length;
        if data.len() < total {
            return Ok(None);
        }
        trace!(
            "recv record type={:?} version={} len={}",
            header.content_type,
            header.version,
            header.length
        );

        let body = &data[RECORD_HEADER_LEN..total];
        let plaintext = match &mut self.decryptor {
            Some(dec) => dec.open(header.content_type, body)?,
            None => body.to_vec(),
        };

        if header.content_type == ContentType::ApplicationData && plaintext.is_empty() {
            self.empty_records += 1;
            if self.empty_records > MAX_EMPTY_RECORDS {
                return Err(TlsError::InvalidRecord(
                    "too many consecutive empty records".into(),
                ));
            }
        } else {
            self.empty_records = 0;
        }
        Ok(Some((header.content_type, plaintext, total)))
    }
}

impl Default for RecordLayer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypt::CipherSuiteParams;
    use crate::CipherSuite;

    fn protected_pair(version: TlsVersion, suite: CipherSuite) -> (RecordLayer, RecordLayer) {
        let params = CipherSuiteParams::from_suite(suite).unwrap();
        let mk = || {
            RecordProtection::new(
                version,
                &params,
                &vec![1u8; params.mac_len],
                &vec![2u8; params.key_len],
                &vec![3u8; params.iv_len],
            )
            .unwrap()
        };
        let mut tx = RecordLayer::new();
        let mut rx = RecordLayer::new();
        tx.set_version(version);
        rx.set_version(version);
        tx.activate_write(mk());
        rx.activate_read(mk());
        (tx, rx)
    }

    #[test]
    fn test_plaintext_record_layout() {
        let mut layer = RecordLayer::new();
        let rec = layer.seal_record(ContentType::Handshake, &[1, 2, 3]).unwrap();
        assert_eq!(rec, vec![22, 3, 0, 0, 3, 1, 2, 3]);

        layer.set_version(TlsVersion::Tls10);
        let rec = layer.seal_record(ContentType::Alert, &[1, 0]).unwrap();
        assert_eq!(&rec[..5], &[21, 3, 1, 0, 2]);
    }

    #[test]
    fn test_open_incomplete_returns_none() {
        let mut layer = RecordLayer::new();
        assert!(layer.open_record(&[22, 3, 1]).unwrap().is_none());
        assert!(layer.open_record(&[22, 3, 1, 0, 4, 1, 2]).unwrap().is_none());
        let (ct, body, used) = layer
            .open_record(&[22, 3, 1, 0, 2, 9, 9, 0xff])
            .unwrap()
            .unwrap();
        assert_eq!(ct, ContentType::Handshake);
        assert_eq!(body, vec![9, 9]);
        assert_eq!(used, 7);
    }

    #[test]
    fn test_header_validation() {
        let layer = RecordLayer::new();
        assert!(matches!(
            layer.parse_header(&[24, 3, 1, 0, 1]),
            Err(TlsError::InvalidRecord(_))
        ));
        assert!(matches!(
            layer.parse_header(&[22, 2, 0, 0, 1]),
            Err(TlsError::InvalidRecord(_))
        ));
        assert!(matches!(
            layer.parse_header(&[22, 3, 3, 0, 1]),
            Err(TlsError::InvalidRecord(_))
        ));
        assert!(matches!(
            layer.parse_header(&[22, 3, 1, 0x40, 0x01]),
            Err(TlsError::InvalidRecord(_))
        ));
        assert!(matches!(
            layer.parse_header(&[22, 3, 1, 0, 0]),
            Err(TlsError::InvalidRecord(_))
        ));
        let hdr = layer.parse_header(&[23, 3, 0, 0x40, 0x00]).unwrap();
        assert_eq!(hdr.length, MAX_PLAINTEXT_LENGTH);
        assert_eq!(hdr.version, TlsVersion::Ssl3);
    }

    #[test]
    fn test_protected_roundtrip_and_sequence_numbers() {
        let (mut tx, mut rx) =
            protected_pair(TlsVersion::Tls10, CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA);
        for i in 0..5u8 {
            let rec = tx.seal_record(ContentType::ApplicationData, &[i; 33]).unwrap();
            let (ct, body, used) = rx.open_record(&rec).unwrap().unwrap();
            assert_eq!(ct, ContentType::ApplicationData);
            assert_eq!(body, vec![i; 33]);
            assert_eq!(used, rec.len());
        }
        assert_eq!(tx.sequence_numbers(), (5, 0));
        assert_eq!(rx.sequence_numbers(), (0, 5));
    }

    #[test]
    fn test_dropped_record_detected() {
        let (mut tx, mut rx) =
            protected_pair(TlsVersion::Ssl3, CipherSuite::TLS_RSA_WITH_CAMELLIA_128_CBC_SHA);
        let _lost = tx.seal_record(ContentType::ApplicationData, b"first").unwrap();
        let second = tx.seal_record(ContentType::ApplicationData, b"second").unwrap();
        assert!(matches!(rx.open_record(&second), Err(TlsError::BadRecordMac)));
        assert_eq!(rx.sequence_numbers(), (0, 0));
    }

    #[test]
    fn test_empty_record_limit() {
        let (mut tx, mut rx) =
            protected_pair(TlsVersion::Tls10, CipherSuite::TLS_RSA_WITH_RC4_128_SHA);
        for _ in 0..MAX_EMPTY_RECORDS {
            let rec = tx.seal_record(ContentType::ApplicationData, b"").unwrap();
            assert!(rx.open_record(&rec).unwrap().unwrap().1.is_empty());
        }
        let rec = tx.seal_record(ContentType::ApplicationData, b"").unwrap();
        assert!(matches!(rx.open_record(&rec), Err(TlsError::InvalidRecord(_))));
    }

    #[test]
    fn test_nonempty_record_resets_empty_counter() {
        let (mut tx, mut rx) =
            protected_pair(TlsVersion::Tls10, CipherSuite::TLS_RSA_WITH_RC4_128_MD5);
        for round in 0..3 {
            for _ in 0..MAX_EMPTY_RECORDS {
                let rec = tx.seal_record(ContentType::ApplicationData, b"").unwrap();
                rx.open_record(&rec).unwrap().unwrap();
            }
            let rec = tx.seal_record(ContentType::ApplicationData, &[round]).unwrap();
            assert_eq!(rx.open_record(&rec).unwrap().unwrap().1, vec![round]);
        }
    }
}

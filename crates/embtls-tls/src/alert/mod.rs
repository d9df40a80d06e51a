//! Alert protocol (SSLv3 §5.4, RFC 2246 §7.2).

use embtls_types::TlsError;

/// Alert severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlertLevel {
    Warning = 1,
    Fatal = 2,
}

/// Alert description codes known to SSLv3 and TLS 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlertDescription {
    CloseNotify = 0,
    UnexpectedMessage = 10,
    BadRecordMac = 20,
    DecryptionFailed = 21,
    RecordOverflow = 22,
    DecompressionFailure = 30,
    HandshakeFailure = 40,
    /// SSLv3 only: the client has no certificate to offer.
    NoCertificate = 41,
    BadCertificate = 42,
    UnsupportedCertificate = 43,
    CertificateRevoked = 44,
    CertificateExpired = 45,
    CertificateUnknown = 46,
    IllegalParameter = 47,
    UnknownCa = 48,
    AccessDenied = 49,
    DecodeError = 50,
    DecryptError = 51,
    ExportRestriction = 60,
    ProtocolVersion = 70,
    InsufficientSecurity = 71,
    InternalError = 80,
    UserCanceled = 90,
    NoRenegotiation = 100,
}

/// An alert message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub description: AlertDescription,
}

impl AlertLevel {
    pub fn from_u8(v: u8) -> Result<Self, u8> {
        match v {
            1 => Ok(AlertLevel::Warning),
            2 => Ok(AlertLevel::Fatal),
            _ => Err(v),
        }
    }
}

impl AlertDescription {
    pub fn from_u8(v: u8) -> Result<Self, u8> {
        match v {
            0 => Ok(AlertDescription::CloseNotify),
            10 => Ok(AlertDescription::UnexpectedMessage),
            20 => Ok(AlertDescription::BadRecordMac),
            21 => Ok(AlertDescription::DecryptionFailed),
            22 => Ok(AlertDescription::RecordOverflow),
            30 => Ok(AlertDescription::DecompressionFailure),
            40 => Ok(AlertDescription::HandshakeFailure),
            41 => Ok(AlertDescription::NoCertificate),
            42 => Ok(AlertDescription::BadCertificate),
            43 => Ok(AlertDescription::UnsupportedCertificate),
            44 => Ok(AlertDescription::CertificateRevoked),
            45 => Ok(AlertDescription::CertificateExpired),
            46 => Ok(AlertDescription::CertificateUnknown),
            47 => Ok(AlertDescription::IllegalParameter),
            48 => Ok(AlertDescription::UnknownCa),
            49 => Ok(AlertDescription::AccessDenied),
            50 => Ok(AlertDescription::DecodeError),
            51 => Ok(AlertDescription::DecryptError),
            60 => Ok(AlertDescription::ExportRestriction),
            70 => Ok(AlertDescription::ProtocolVersion),
            71 => Ok(AlertDescription::InsufficientSecurity),
            80 => Ok(AlertDescription::InternalError),
            90 => Ok(AlertDescription::UserCanceled),
            100 => Ok(AlertDescription::NoRenegotiation),
            _ => Err(v),
        }
    }

    /// The description to send when a local error aborts the connection.
    pub fn for_error(err: &TlsError) -> Option<Self> {
        Some(match err {
            TlsError::BadRecordMac => AlertDescription::BadRecordMac,
            TlsError::InvalidRecord(_) => AlertDescription::RecordOverflow,
            TlsError::UnexpectedMessage(_) => AlertDescription::UnexpectedMessage,
            TlsError::BadHandshakeMessage { .. } => AlertDescription::DecodeError,
            TlsError::FinishedMismatch | TlsError::CertificateVerifyFailed => {
                AlertDescription::DecryptError
            }
            TlsError::PeerCertificate(_) | TlsError::PkiError(_) => AlertDescription::BadCertificate,
            TlsError::UnsupportedVersion => AlertDescription::ProtocolVersion,
            TlsError::NoSharedCipherSuite | TlsError::HandshakeFailed(_) => {
                AlertDescription::HandshakeFailure
            }
            TlsError::CryptoError(_) | TlsError::Config(_) => AlertDescription::InternalError,
            // The transport is gone or the peer already alerted us.
            TlsError::AlertReceived(_)
            | TlsError::ConnectionClosed
            | TlsError::WouldBlock
            | TlsError::IoError(_) => return None,
        })
    }
}

impl std::fmt::Display for AlertDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AlertDescription::CloseNotify => "close_notify",
            AlertDescription::UnexpectedMessage => "unexpected_message",
            AlertDescription::BadRecordMac => "bad_record_mac",
            AlertDescription::DecryptionFailed => "decryption_failed",
            AlertDescription::RecordOverflow => "record_overflow",
            AlertDescription::DecompressionFailure => "decompression_failure",
            AlertDescription::HandshakeFailure => "handshake_failure",
            AlertDescription::NoCertificate => "no_certificate",
            AlertDescription::BadCertificate => "bad_certificate",
            AlertDescription::UnsupportedCertificate => "unsupported_certificate",
            AlertDescription::CertificateRevoked => "certificate_revoked",
            AlertDescription::CertificateExpired => "certificate_expired",
            AlertDescription::CertificateUnknown => "certificate_unknown",
            AlertDescription::IllegalParameter => "illegal_parameter",
            AlertDescription::UnknownCa => "unknown_ca",
            AlertDescription::AccessDenied => "access_denied",
            AlertDescription::DecodeError => "decode_error",
            AlertDescription::DecryptError => "decrypt_error",
            AlertDescription::ExportRestriction => "export_restriction",
            AlertDescription::ProtocolVersion => "protocol_version",
            AlertDescription::InsufficientSecurity => "insufficient_security",
            AlertDescription::InternalError => "internal_error",
            AlertDescription::UserCanceled => "user_canceled",
            AlertDescription::NoRenegotiation => "no_renegotiation",
        };
        f.write_str(name)
    }
}

impl Alert {
    pub fn fatal(description: AlertDescription) -> Self {
        Self {
            level: AlertLevel::Fatal,
            description,
        }
    }

    pub fn warning(description: AlertDescription) -> Self {
        Self {
            level: AlertLevel::Warning,
            description,
        }
    }

    pub fn close_notify() -> Self {
        Self::warning(AlertDescription::CloseNotify)
    }

    pub fn to_bytes(self) -> [u8; 2] {
        [self.level as u8, self.description as u8]
    }

    /// Decode a 2-byte alert body. Unknown codes are rejected.
    pub fn from_bytes(body: &[u8]) -> Result<Self, TlsError> {
        if body.len() != 2 {
            return Err(TlsError::InvalidRecord(format!(
                "alert body of {} bytes",
                body.len()
            )));
        }
        let level = AlertLevel::from_u8(body[0])
            .map_err(|v| TlsError::InvalidRecord(format!("unknown alert level {v}")))?;
        let description = AlertDescription::from_u8(body[1])
            .map_err(|v| TlsError::InvalidRecord(format!("unknown alert description {v}")))?;
        Ok(Self { level, description })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_codes() {
        assert_eq!(AlertLevel::Warning as u8, 1);
        assert_eq!(AlertLevel::Fatal as u8, 2);
        assert_eq!(AlertDescription::CloseNotify as u8, 0);
        assert_eq!(AlertDescription::BadRecordMac as u8, 20);
        assert_eq!(AlertDescription::NoCertificate as u8, 41);
        assert_eq!(AlertDescription::ProtocolVersion as u8, 70);
        assert_eq!(AlertDescription::NoRenegotiation as u8, 100);
    }

    #[test]
    fn test_from_u8_roundtrip() {
        for code in 0..=255u8 {
            if let Ok(desc) = AlertDescription::from_u8(code) {
                assert_eq!(desc as u8, code);
            }
        }
        assert_eq!(AlertDescription::from_u8(112), Err(112));
        assert_eq!(AlertLevel::from_u8(3), Err(3));
    }

    #[test]
    fn test_alert_bytes() {
        let alert = Alert::fatal(AlertDescription::HandshakeFailure);
        assert_eq!(alert.to_bytes(), [2, 40]);
        assert_eq!(Alert::from_bytes(&[2, 40]).unwrap(), alert);
        assert_eq!(Alert::close_notify().to_bytes(), [1, 0]);
        assert!(Alert::from_bytes(&[1]).is_err());
        assert!(Alert::from_bytes(&[9, 0]).is_err());
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            AlertDescription::for_error(&TlsError::BadRecordMac),
            Some(AlertDescription::BadRecordMac)
        );
        assert_eq!(
            AlertDescription::for_error(&TlsError::NoSharedCipherSuite),
            Some(AlertDescription::HandshakeFailure)
        );
        assert_eq!(AlertDescription::for_error(&TlsError::ConnectionClosed), None);
        assert_eq!(AlertDescription::BadRecordMac.to_string(), "bad_record_mac");
    }
}

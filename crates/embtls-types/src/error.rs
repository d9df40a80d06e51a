use crate::VerifyFlags;

/// ASN.1 DER / PEM decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Asn1Error {
    #[error("unexpected end of data")]
    OutOfData,
    #[error("unexpected tag: expected {expected:#04x}, got {actual:#04x}")]
    UnexpectedTag { expected: u8, actual: u8 },
    #[error("invalid length encoding")]
    InvalidLength,
    #[error("length mismatch")]
    LengthMismatch,
    #[error("invalid data: {0}")]
    InvalidData(&'static str),
    #[error("malformed PEM: {0}")]
    MalformedPem(String),
}

/// Cryptographic operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid argument")]
    InvalidArg,
    #[error("invalid key")]
    InvalidKey,
    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },
    #[error("buffer length not enough: need {need}, got {got}")]
    BufferTooSmall { need: usize, got: usize },
    #[error("input data too long")]
    InputOverflow,
    #[error("random number generation failed")]
    RngFail,

    // Big-number errors
    #[error("big number: no modular inverse")]
    BnNoInverse,
    #[error("big number: prime generation failed")]
    BnPrimeGenFail,

    // RSA errors
    #[error("rsa: invalid key bits")]
    RsaInvalidKeyBits,
    #[error("rsa: key consistency check failed")]
    RsaKeyCheckFail,
    #[error("rsa: verification failed")]
    RsaVerifyFail,
    #[error("rsa: invalid padding")]
    RsaInvalidPadding,
    #[error("rsa: output too large for the modulus")]
    RsaOutputTooLarge,

    // DHM errors
    #[error("dhm: bad input data")]
    DhmBadInputData,
    #[error("dhm: modulus size {0} bytes outside 64..=256")]
    DhmInvalidModulusSize(usize),
    #[error("dhm: peer public value out of range")]
    DhmInvalidPublic,
}

/// TLS protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),
    #[error("bad handshake message in state {state}: {reason}")]
    BadHandshakeMessage { state: &'static str, reason: String },
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("invalid MAC")]
    BadRecordMac,
    #[error("finished message mismatch")]
    FinishedMismatch,
    #[error("certificate verify signature mismatch")]
    CertificateVerifyFailed,
    #[error("peer certificate rejected: {0}")]
    PeerCertificate(VerifyFlags),
    #[error("received alert: {0}")]
    AlertReceived(String),
    #[error("unsupported protocol version")]
    UnsupportedVersion,
    #[error("no shared cipher suite")]
    NoSharedCipherSuite,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("operation would block")]
    WouldBlock,
    #[error("connection closed")]
    ConnectionClosed,
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("crypto error: {0}")]
    CryptoError(#[from] CryptoError),
    #[error("pki error: {0}")]
    PkiError(#[from] PkiError),
}

impl TlsError {
    /// True for the transient condition a non-blocking caller retries on.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TlsError::WouldBlock)
    }
}

/// PKI / certificate errors.
#[derive(Debug, thiserror::Error)]
pub enum PkiError {
    #[error("{field}: {source}")]
    Field {
        field: &'static str,
        #[source]
        source: Asn1Error,
    },
    #[error("unsupported certificate version {0}")]
    UnsupportedVersion(u32),
    #[error("unsupported signature algorithm {0}")]
    UnsupportedSignatureAlgorithm(String),
    #[error("unsupported public key algorithm {0}")]
    UnsupportedKeyAlgorithm(String),
    #[error("unsupported critical extension {0}")]
    UnsupportedCriticalExtension(String),
    #[error("invalid PEM: {0}")]
    InvalidPem(String),
    #[error("invalid certificate: {0}")]
    InvalidCert(String),
    #[error("invalid private key: {0}")]
    InvalidKey(String),
    #[error("certificate verification failed: {0}")]
    VerifyFailed(VerifyFlags),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("crypto error: {0}")]
    CryptoError(#[from] CryptoError),
}

impl PkiError {
    /// Build a closure that tags an ASN.1 error with the field being decoded.
    pub fn field(field: &'static str) -> impl Fn(Asn1Error) -> PkiError {
        move |source| PkiError::Field { field, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_error_names_the_field() {
        let err = PkiError::field("tbsCertificate.serialNumber")(Asn1Error::InvalidLength);
        assert_eq!(
            err.to_string(),
            "tbsCertificate.serialNumber: invalid length encoding"
        );
    }

    #[test]
    fn test_tls_error_from_crypto() {
        let err: TlsError = CryptoError::RsaVerifyFail.into();
        assert!(matches!(err, TlsError::CryptoError(CryptoError::RsaVerifyFail)));
        assert!(!err.is_retryable());
        assert!(TlsError::WouldBlock.is_retryable());
    }

    #[test]
    fn test_bad_mac_message_is_generic() {
        assert_eq!(TlsError::BadRecordMac.to_string(), "invalid MAC");
    }
}

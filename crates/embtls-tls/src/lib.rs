#![forbid(unsafe_code)]
#![doc = "SSLv3 / TLS 1.0 protocol engine for embtls."]

pub mod alert;
pub mod config;
pub mod connection;
pub mod crypt;
pub mod handshake;
pub mod record;
pub mod session;

pub use config::{AuthMode, TlsConfig};
pub use connection::TlsStream;
pub use session::{InMemorySessionCache, SessionCache, TlsSession};

use embtls_types::TlsError;

/// Protocol version. Both share major version 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TlsVersion {
    Ssl3,
    Tls10,
}

impl TlsVersion {
    pub const MAJOR: u8 = 3;

    pub fn minor(self) -> u8 {
        match self {
            TlsVersion::Ssl3 => 0,
            TlsVersion::Tls10 => 1,
        }
    }

    pub fn from_minor(minor: u8) -> Option<Self> {
        match minor {
            0 => Some(TlsVersion::Ssl3),
            1 => Some(TlsVersion::Tls10),
            _ => None,
        }
    }

    /// The two wire bytes (major, minor).
    pub fn wire(self) -> [u8; 2] {
        [Self::MAJOR, self.minor()]
    }
}

impl std::fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TlsVersion::Ssl3 => "SSLv3",
            TlsVersion::Tls10 => "TLSv1.0",
        })
    }
}

/// Cipher suite identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CipherSuite(pub u16);

impl CipherSuite {
    pub const TLS_RSA_WITH_RC4_128_MD5: Self = Self(0x0004);
    pub const TLS_RSA_WITH_RC4_128_SHA: Self = Self(0x0005);
    pub const TLS_RSA_WITH_3DES_EDE_CBC_SHA: Self = Self(0x000A);
    pub const TLS_DHE_RSA_WITH_3DES_EDE_CBC_SHA: Self = Self(0x0016);
    pub const TLS_RSA_WITH_AES_128_CBC_SHA: Self = Self(0x002F);
    pub const TLS_RSA_WITH_AES_256_CBC_SHA: Self = Self(0x0035);
    pub const TLS_DHE_RSA_WITH_AES_256_CBC_SHA: Self = Self(0x0039);
    pub const TLS_RSA_WITH_CAMELLIA_128_CBC_SHA: Self = Self(0x0041);
    pub const TLS_RSA_WITH_CAMELLIA_256_CBC_SHA: Self = Self(0x0084);
    pub const TLS_DHE_RSA_WITH_CAMELLIA_256_CBC_SHA: Self = Self(0x0088);

    /// Every suite the engine implements, strongest first.
    pub const ALL: [Self; 10] = [
        Self::TLS_DHE_RSA_WITH_AES_256_CBC_SHA,
        Self::TLS_DHE_RSA_WITH_CAMELLIA_256_CBC_SHA,
        Self::TLS_RSA_WITH_AES_256_CBC_SHA,
        Self::TLS_RSA_WITH_CAMELLIA_256_CBC_SHA,
        Self::TLS_RSA_WITH_AES_128_CBC_SHA,
        Self::TLS_RSA_WITH_CAMELLIA_128_CBC_SHA,
        Self::TLS_DHE_RSA_WITH_3DES_EDE_CBC_SHA,
        Self::TLS_RSA_WITH_3DES_EDE_CBC_SHA,
        Self::TLS_RSA_WITH_RC4_128_SHA,
        Self::TLS_RSA_WITH_RC4_128_MD5,
    ];

    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::TLS_RSA_WITH_RC4_128_MD5 => "TLS_RSA_WITH_RC4_128_MD5",
            Self::TLS_RSA_WITH_RC4_128_SHA => "TLS_RSA_WITH_RC4_128_SHA",
            Self::TLS_RSA_WITH_3DES_EDE_CBC_SHA => "TLS_RSA_WITH_3DES_EDE_CBC_SHA",
            Self::TLS_DHE_RSA_WITH_3DES_EDE_CBC_SHA => "TLS_DHE_RSA_WITH_3DES_EDE_CBC_SHA",
            Self::TLS_RSA_WITH_AES_128_CBC_SHA => "TLS_RSA_WITH_AES_128_CBC_SHA",
            Self::TLS_RSA_WITH_AES_256_CBC_SHA => "TLS_RSA_WITH_AES_256_CBC_SHA",
            Self::TLS_DHE_RSA_WITH_AES_256_CBC_SHA => "TLS_DHE_RSA_WITH_AES_256_CBC_SHA",
            Self::TLS_RSA_WITH_CAMELLIA_128_CBC_SHA => "TLS_RSA_WITH_CAMELLIA_128_CBC_SHA",
            Self::TLS_RSA_WITH_CAMELLIA_256_CBC_SHA => "TLS_RSA_WITH_CAMELLIA_256_CBC_SHA",
            Self::TLS_DHE_RSA_WITH_CAMELLIA_256_CBC_SHA => {
                "TLS_DHE_RSA_WITH_CAMELLIA_256_CBC_SHA"
            }
            _ => return None,
        })
    }

    /// Look a suite up by its IANA name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == Some(name))
    }
}

impl std::fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:04X}", self.0),
        }
    }
}

/// The role of a TLS endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsRole {
    Client,
    Server,
}

/// A synchronous TLS connection.
pub trait TlsConnection {
    /// Run the handshake to completion.
    fn handshake(&mut self) -> Result<(), TlsError>;
    /// Read decrypted application data into `buf`.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TlsError>;
    /// Encrypt and send `buf`.
    fn write(&mut self, buf: &[u8]) -> Result<usize, TlsError>;
    /// Send close_notify.
    fn shutdown(&mut self) -> Result<(), TlsError>;
    /// Negotiated protocol version.
    fn version(&self) -> Option<TlsVersion>;
    /// Negotiated cipher suite.
    fn cipher_suite(&self) -> Option<CipherSuite>;
}

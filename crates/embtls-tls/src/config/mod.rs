//! Connection configuration with builder pattern.

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::session::{SessionCache, TlsSession};
use crate::{CipherSuite, TlsRole, TlsVersion};
use embtls_crypto::dhm::{DhmContext, DhmGroup};
use embtls_crypto::rsa::RsaPrivateKey;
use embtls_crypto::{OsRandom, RandomSource};
use embtls_pki::Certificate;
use embtls_types::TlsError;

/// How strictly the peer's certificate is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Do not verify (and, on a server, do not request) a peer certificate.
    None,
    /// Verify, but continue on failure; the result is kept for inspection.
    Optional,
    /// Abort the handshake unless the peer presents a valid certificate.
    Required,
}

/// Diffie-Hellman group a server offers with the DHE suites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhParams {
    pub p: Vec<u8>,
    pub g: Vec<u8>,
}

impl DhParams {
    pub fn from_group(group: DhmGroup) -> Result<Self, TlsError> {
        let ctx = DhmContext::from_group(group)?;
        Ok(Self {
            p: ctx.p_bytes(),
            g: ctx.g_bytes(),
        })
    }
}

/// Callback receiving NSS key log lines.
pub type KeyLogCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Shared server-side session store.
pub type SharedSessionCache = Arc<Mutex<dyn SessionCache>>;

/// Configuration shared read-only by every connection built from it.
#[derive(Clone)]
pub struct TlsConfig {
    pub role: TlsRole,
    pub auth_mode: AuthMode,
    pub min_version: TlsVersion,
    pub max_version: TlsVersion,
    /// Enabled cipher suites in preference order. A server picks the first
    /// of these the client also offers.
    pub cipher_suites: Vec<CipherSuite>,
    /// Own certificate chain, DER, leaf first.
    pub certificate_chain: Vec<Vec<u8>>,
    pub private_key: Option<Arc<RsaPrivateKey>>,
    /// Trust anchors for verifying the peer.
    pub trusted_certs: Vec<Certificate>,
    /// Server: group for the DHE suites. Without it those suites are never
    /// selected.
    pub dh_params: Option<DhParams>,
    /// Client: sent as SNI and checked against the server certificate.
    pub server_name: Option<String>,
    /// Server: where sessions are stored for resumption.
    pub session_cache: Option<SharedSessionCache>,
    /// Client: session to offer for resumption.
    pub resumption_session: Option<TlsSession>,
    /// Client: age in seconds past which `resumption_session` is not
    /// offered. Zero disables the check.
    pub session_timeout: u64,
    pub key_log_callback: Option<KeyLogCallback>,
    pub rng: Arc<dyn RandomSource>,
}

impl fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfig")
            .field("role", &self.role)
            .field("auth_mode", &self.auth_mode)
            .field("min_version", &self.min_version)
            .field("max_version", &self.max_version)
            .field("cipher_suites", &self.cipher_suites)
            .field("certificate_chain_len", &self.certificate_chain.len())
            .field("has_private_key", &self.private_key.is_some())
            .field("trusted_certs_len", &self.trusted_certs.len())
            .field("server_name", &self.server_name)
            .field("session_cache", &self.session_cache.as_ref().map(|_| "<cache>"))
            .field(
                "key_log_callback",
                &self.key_log_callback.as_ref().map(|_| "<callback>"),
            )
            .finish_non_exhaustive()
    }
}

impl TlsConfig {
    pub fn builder() -> TlsConfigBuilder {
        TlsConfigBuilder::default()
    }

    /// Checks that do not depend on the peer, run before the first flight.
    pub(crate) fn validate(&self) -> Result<(), TlsError> {
        if self.min_version > self.max_version {
            return Err(TlsError::Config("min_version above max_version".into()));
        }
        if self.cipher_suites.is_empty() {
            return Err(TlsError::Config("no cipher suites enabled".into()));
        }
        if self.role == TlsRole::Server
            && (self.certificate_chain.is_empty() || self.private_key.is_none())
        {
            return Err(TlsError::Config(
                "server needs a certificate chain and private key".into(),
            ));
        }
        if self.auth_mode == AuthMode::Required
            && self.trusted_certs.is_empty()
            && self.role == TlsRole::Client
        {
            return Err(TlsError::Config(
                "certificate verification required but no trusted CA configured".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for `TlsConfig`.
pub struct TlsConfigBuilder {
    role: TlsRole,
    auth_mode: Option<AuthMode>,
    min_version: TlsVersion,
    max_version: TlsVersion,
    cipher_suites: Vec<CipherSuite>,
    certificate_chain: Vec<Vec<u8>>,
    private_key: Option<Arc<RsaPrivateKey>>,
    trusted_certs: Vec<Certificate>,
    dh_params: Option<DhParams>,
    server_name: Option<String>,
    session_cache: Option<SharedSessionCache>,
    resumption_session: Option<TlsSession>,
    session_timeout: u64,
    key_log_callback: Option<KeyLogCallback>,
    rng: Arc<dyn RandomSource>,
}

impl Default for TlsConfigBuilder {
    fn default() -> Self {
        Self {
            role: TlsRole::Client,
            auth_mode: None,
            min_version: TlsVersion::Ssl3,
            max_version: TlsVersion::Tls10,
            cipher_suites: CipherSuite::ALL.to_vec(),
            certificate_chain: Vec::new(),
            private_key: None,
            trusted_certs: Vec::new(),
            dh_params: None,
            server_name: None,
            session_cache: None,
            resumption_session: None,
            session_timeout: 0,
            key_log_callback: None,
            rng: Arc::new(OsRandom),
        }
    }
}

impl fmt::Debug for TlsConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfigBuilder")
            .field("role", &self.role)
            .field("auth_mode", &self.auth_mode)
            .field("cipher_suites", &self.cipher_suites)
            .finish_non_exhaustive()
    }
}

impl TlsConfigBuilder {
    pub fn role(mut self, role: TlsRole) -> Self {
        self.role = role;
        self
    }

    /// Defaults to `Required` for clients and `None` for servers.
    pub fn auth_mode(mut self, mode: AuthMode) -> Self {
        self.auth_mode = Some(mode);
        self
    }

    pub fn min_version(mut self, version: TlsVersion) -> Self {
        self.min_version = version;
        self
    }

    pub fn max_version(mut self, version: TlsVersion) -> Self {
        self.max_version = version;
        self
    }

    pub fn cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.cipher_suites = suites.to_vec();
        self
    }

    pub fn certificate_chain(mut self, certs: Vec<Vec<u8>>) -> Self {
        self.certificate_chain = certs;
        self
    }

    pub fn private_key(mut self, key: RsaPrivateKey) -> Self {
        self.private_key = Some(Arc::new(key));
        self
    }

    pub fn trusted_certs(mut self, certs: Vec<Certificate>) -> Self {
        self.trusted_certs = certs;
        self
    }

    pub fn trusted_cert(mut self, cert: Certificate) -> Self {
        self.trusted_certs.push(cert);
        self
    }

    pub fn dh_params(mut self, params: DhParams) -> Self {
        self.dh_params = Some(params);
        self
    }

    pub fn server_name(mut self, name: &str) -> Self {
        self.server_name = Some(name.to_string());
        self
    }

    pub fn session_cache(mut self, cache: SharedSessionCache) -> Self {
        self.session_cache = Some(cache);
        self
    }

    pub fn resumption_session(mut self, session: TlsSession) -> Self {
        self.resumption_session = Some(session);
        self
    }

    pub fn session_timeout(mut self, secs: u64) -> Self {
        self.session_timeout = secs;
        self
    }

    pub fn key_log(mut self, callback: KeyLogCallback) -> Self {
        self.key_log_callback = Some(callback);
        self
    }

    pub fn rng(mut self, rng: Arc<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    pub fn build(self) -> TlsConfig {
        let auth_mode = self.auth_mode.unwrap_or(match self.role {
            TlsRole::Client => AuthMode::Required,
            TlsRole::Server => AuthMode::None,
        });
        TlsConfig {
            role: self.role,
            auth_mode,
            min_version: self.min_version,
            max_version: self.max_version,
            cipher_suites: self.cipher_suites,
            certificate_chain: self.certificate_chain,
            private_key: self.private_key,
            trusted_certs: self.trusted_certs,
            dh_params: self.dh_params,
            server_name: self.server_name,
            session_cache: self.session_cache,
            resumption_session: self.resumption_session,
            session_timeout: self.session_timeout,
            key_log_callback: self.key_log_callback,
            rng: self.rng,
        }
    }
}

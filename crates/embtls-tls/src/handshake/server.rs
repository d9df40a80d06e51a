//! Server handshake state machine.

use std::sync::Arc;

use super::codec::{
    decode_certificate, decode_certificate_verify, decode_client_hello,
    decode_client_key_exchange_dhe, decode_client_key_exchange_rsa, decode_v2_client_hello,
    encode_certificate, encode_certificate_request, encode_finished, encode_server_hello,
    encode_server_hello_done, encode_server_key_exchange, parse_handshake_header,
    ske_signed_hash, CertificateRequest, ClientHello, ServerHello, ServerKeyExchange,
    CERT_TYPE_RSA_SIGN,
};
use super::{
    derive_protections, expect_change_cipher_spec, expect_handshake, hello_random,
    verify_finished, HandshakeIo, HandshakeSummary, HandshakeType, Inbox, Incoming, Step,
};
use crate::config::{AuthMode, TlsConfig};
use crate::crypt::key_schedule::{
    compute_finished, compute_verify_hash, derive_master_secret, MASTER_SECRET_LEN,
};
use crate::crypt::keylog::log_master_secret;
use crate::crypt::transcript::TranscriptHash;
use crate::crypt::{CipherSuiteParams, KeyExchangeAlg};
use crate::record::RecordProtection;
use crate::session::{unix_now, TlsSession};
use crate::{CipherSuite, TlsRole, TlsVersion};
use embtls_crypto::dhm::DhmContext;
use embtls_crypto::rsa::{ct_select_into, RsaPrivateKey};
use embtls_crypto::RandomSource;
use embtls_pki::x509::check_chain;
use embtls_pki::Certificate;
use embtls_types::{TlsError, VerifyFlags};
use embtls_utils::asn1::Asn1Time;
use log::{debug, warn};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Server handshake states, in protocol order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    ClientHello,
    ServerHello,
    ServerCertificate,
    ServerKeyExchange,
    CertificateRequest,
    ServerHelloDone,
    ClientCertificate,
    ClientKeyExchange,
    CertificateVerify,
    ClientChangeCipherSpec,
    ClientFinished,
    ServerChangeCipherSpec,
    ServerFinished,
    HandshakeOver,
}

/// Server side of one handshake.
pub struct ServerHandshake {
    config: Arc<TlsConfig>,
    state: ServerState,
    inbox: Inbox,
    transcript: TranscriptHash,
    version: TlsVersion,
    /// Version bytes from the ClientHello, checked inside the RSA premaster.
    client_version: [u8; 2],
    client_random: [u8; 32],
    server_random: [u8; 32],
    session_id: Vec<u8>,
    params: Option<CipherSuiteParams>,
    resumed: bool,
    resumed_created_at: u64,
    server_name: Option<String>,
    dhm: Option<DhmContext>,
    cert_requested: bool,
    client_certs: Vec<Certificate>,
    verify_result: Option<VerifyFlags>,
    master_secret: Zeroizing<[u8; MASTER_SECRET_LEN]>,
    pending_write: Option<RecordProtection>,
    pending_read: Option<RecordProtection>,
}

impl ServerHandshake {
    pub fn new(config: Arc<TlsConfig>) -> Self {
        let version = config.max_version;
        Self {
            config,
            state: ServerState::ClientHello,
            inbox: Inbox::default(),
            transcript: TranscriptHash::new(),
            version,
            client_version: [0; 2],
            client_random: [0; 32],
            server_random: [0; 32],
            session_id: Vec::new(),
            params: None,
            resumed: false,
            resumed_created_at: 0,
            server_name: None,
            dhm: None,
            cert_requested: false,
            client_certs: Vec::new(),
            verify_result: None,
            master_secret: Zeroizing::new([0; MASTER_SECRET_LEN]),
            pending_write: None,
            pending_read: None,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    /// Advance by one state.
    pub fn step(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        let state = self.state;
        let step = match state {
            ServerState::ClientHello => self.read_client_hello(io)?,
            ServerState::ServerHello => self.write_server_hello(io)?,
            ServerState::ServerCertificate => self.write_certificate(io)?,
            ServerState::ServerKeyExchange => self.write_server_key_exchange(io)?,
            ServerState::CertificateRequest => self.write_certificate_request(io)?,
            ServerState::ServerHelloDone => self.write_server_hello_done(io)?,
            ServerState::ClientCertificate => self.read_client_certificate(io)?,
            ServerState::ClientKeyExchange => self.read_client_key_exchange(io)?,
            ServerState::CertificateVerify => self.read_certificate_verify(io)?,
            ServerState::ClientChangeCipherSpec => self.read_change_cipher_spec(io)?,
            ServerState::ClientFinished => self.read_finished(io)?,
            ServerState::ServerChangeCipherSpec => self.write_change_cipher_spec(io)?,
            ServerState::ServerFinished => self.write_finished(io)?,
            ServerState::HandshakeOver => return Ok(Step::Done),
        };
        if self.state != state {
            debug!("server: {state:?} -> {:?}", self.state);
        }
        Ok(step)
    }

    /// Session and peer details; only meaningful once `step()` returned
    /// `Done`.
    pub fn summary(&self) -> Result<HandshakeSummary, TlsError> {
        if self.state != ServerState::HandshakeOver {
            return Err(TlsError::HandshakeFailed("handshake not complete".into()));
        }
        Ok(HandshakeSummary {
            version: self.version,
            cipher_suite: self.params()?.suite,
            session: self.session()?,
            resumed: self.resumed,
            peer_certificates: self.client_certs.clone(),
            verify_result: self.verify_result,
            server_name: self.server_name.clone(),
        })
    }

    fn session(&self) -> Result<TlsSession, TlsError> {
        Ok(TlsSession {
            id: self.session_id.clone(),
            cipher_suite: self.params()?.suite,
            version: self.version,
            master_secret: *self.master_secret,
            created_at: if self.resumed {
                self.resumed_created_at
            } else {
                unix_now()
            },
            peer_certificates: self.client_certs.iter().map(|c| c.raw.clone()).collect(),
        })
    }

    fn params(&self) -> Result<CipherSuiteParams, TlsError> {
        self.params
            .ok_or_else(|| TlsError::HandshakeFailed("no cipher suite negotiated".into()))
    }

    fn send(&mut self, io: &mut dyn HandshakeIo, msg: &[u8]) -> Result<Step, TlsError> {
        self.transcript.update(msg);
        io.send_handshake(msg)?;
        Ok(Step::Output)
    }

    fn private_key(&self) -> Result<Arc<RsaPrivateKey>, TlsError> {
        self.config
            .private_key
            .clone()
            .ok_or_else(|| TlsError::Config("server has no private key".into()))
    }

    fn read_client_hello(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        let Some(msg) = self.inbox.take(io)? else {
            return Ok(Step::NeedInput);
        };
        self.config.validate()?;
        let (hello, raw) = match msg {
            Incoming::V2ClientHello(raw) => {
                debug!("server: SSLv2-framed ClientHello");
                (decode_v2_client_hello(&raw)?, raw)
            }
            other => {
                let raw = expect_handshake(other, HandshakeType::ClientHello, "ClientHello")?;
                let (_, body) = parse_handshake_header(&raw)?;
                (decode_client_hello(body)?, raw)
            }
        };

        self.version = negotiate_version(&self.config, hello.version)?;
        io.set_version(self.version);
        self.client_version = hello.version;
        self.client_random = hello.random;
        self.server_name = hello.server_name.clone();

        let cached = self.lookup_session(&hello);
        let suite = match &cached {
            Some(session) => session.cipher_suite,
            None => select_cipher_suite(&self.config, &hello.cipher_suites)?,
        };
        self.params = Some(CipherSuiteParams::from_suite(suite)?);

        match cached {
            Some(session) => {
                debug!("server: resuming session");
                self.resumed = true;
                self.resumed_created_at = session.created_at;
                self.session_id = session.id.clone();
                self.master_secret.copy_from_slice(&session.master_secret);
                self.client_certs = session
                    .peer_certificates
                    .iter()
                    .filter_map(|der| Certificate::from_der(der).ok())
                    .collect();
            }
            None => {
                let mut id = vec![0u8; 32];
                self.config.rng.fill(&mut id)?;
                self.session_id = id;
            }
        }
        debug!(
            "server: negotiated {} {} sni={:?}",
            self.version, suite, self.server_name
        );
        self.transcript.update(&raw);
        self.state = ServerState::ServerHello;
        Ok(Step::Continue)
    }

    /// A cached session is reused only when its suite is still acceptable
    /// to both sides and its version matches.
    fn lookup_session(&self, hello: &ClientHello) -> Option<TlsSession> {
        if hello.session_id.is_empty() {
            return None;
        }
        let cache = self.config.session_cache.as_ref()?;
        let guard = cache.lock().ok()?;
        let session = guard.get(&hello.session_id)?;
        let usable = session.version == self.version
            && self.config.cipher_suites.contains(&session.cipher_suite)
            && hello.cipher_suites.contains(&session.cipher_suite);
        usable.then(|| session.clone())
    }

    fn write_server_hello(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        self.server_random = hello_random(self.config.rng.as_ref(), unix_now())?;
        let hello = ServerHello {
            version: self.version,
            random: self.server_random,
            session_id: self.session_id.clone(),
            cipher_suite: self.params()?.suite,
            compression_method: 0,
        };
        let msg = encode_server_hello(&hello);
        if self.resumed {
            self.derive_keys()?;
            self.state = ServerState::ServerChangeCipherSpec;
        } else {
            self.state = ServerState::ServerCertificate;
        }
        self.send(io, &msg)
    }

    fn write_certificate(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        let msg = encode_certificate(&self.config.certificate_chain);
        self.state = ServerState::ServerKeyExchange;
        self.send(io, &msg)
    }

    fn write_server_key_exchange(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        self.state = ServerState::CertificateRequest;
        if self.params()?.kx_alg != KeyExchangeAlg::Dhe {
            return Ok(Step::Continue);
        }
        let dh = self
            .config
            .dh_params
            .as_ref()
            .ok_or_else(|| TlsError::Config("DHE suite without DH parameters".into()))?;
        let mut dhm = DhmContext::new(&dh.p, &dh.g)?;
        let params = dhm.make_params(self.config.rng.as_ref())?;
        let hash = ske_signed_hash(&self.client_random, &self.server_random, &params);
        let signature = self
            .private_key()?
            .sign_pkcs1(self.config.rng.as_ref(), None, &hash)?;
        self.dhm = Some(dhm);

        let msg = encode_server_key_exchange(&ServerKeyExchange { params, signature });
        self.send(io, &msg)
    }

    fn write_certificate_request(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        self.state = ServerState::ServerHelloDone;
        if self.config.auth_mode == AuthMode::None {
            return Ok(Step::Continue);
        }
        let req = CertificateRequest {
            certificate_types: vec![CERT_TYPE_RSA_SIGN],
            ca_names: self
                .config
                .trusted_certs
                .iter()
                .map(|c| c.subject_raw.clone())
                .collect(),
        };
        self.cert_requested = true;
        let msg = encode_certificate_request(&req);
        self.send(io, &msg)
    }

    fn write_server_hello_done(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        self.state = ServerState::ClientCertificate;
        self.send(io, &encode_server_hello_done())
    }

    fn read_client_certificate(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        if !self.cert_requested {
            self.state = ServerState::ClientKeyExchange;
            return Ok(Step::Continue);
        }
        let Some(msg) = self.inbox.take(io)? else {
            return Ok(Step::NeedInput);
        };
        self.state = ServerState::ClientKeyExchange;

        // An SSLv3 client without a certificate sends a no_certificate
        // warning (already skipped by the record channel) and goes straight
        // on to its key exchange.
        if !msg.is_handshake(HandshakeType::Certificate) && self.version == TlsVersion::Ssl3 {
            self.inbox.hold(msg);
            return self.no_client_certificate();
        }
        let msg = expect_handshake(msg, HandshakeType::Certificate, "ClientCertificate")?;
        let (_, body) = parse_handshake_header(&msg)?;
        let chain = decode_certificate(body)?;
        self.transcript.update(&msg);
        if chain.is_empty() {
            return self.no_client_certificate();
        }

        let certs = chain
            .iter()
            .map(|der| Certificate::from_der(der))
            .collect::<Result<Vec<_>, _>>()?;
        let flags = check_chain(&certs, &self.config.trusted_certs, None, &Asn1Time::now());
        self.verify_result = Some(flags);
        if !flags.is_empty() {
            if self.config.auth_mode == AuthMode::Required {
                return Err(TlsError::PeerCertificate(flags));
            }
            warn!("server: client certificate not verified: {flags}");
        }
        debug!("server: client presented {} certificate(s)", certs.len());
        self.client_certs = certs;
        Ok(Step::Continue)
    }

    fn no_client_certificate(&mut self) -> Result<Step, TlsError> {
        if self.config.auth_mode == AuthMode::Required {
            return Err(TlsError::HandshakeFailed(
                "client did not send a certificate".into(),
            ));
        }
        debug!("server: client sent no certificate");
        Ok(Step::Continue)
    }

    fn read_client_key_exchange(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        let Some(msg) = self.inbox.take(io)? else {
            return Ok(Step::NeedInput);
        };
        let msg = expect_handshake(msg, HandshakeType::ClientKeyExchange, "ClientKeyExchange")?;
        let (_, body) = parse_handshake_header(&msg)?;

        let premaster = match self.params()?.kx_alg {
            KeyExchangeAlg::Rsa => {
                let encrypted = decode_client_key_exchange_rsa(self.version, body)?;
                let key = self.private_key()?;
                let pms = decode_premaster(
                    &key,
                    &encrypted,
                    self.client_version,
                    self.config.rng.as_ref(),
                )?;
                Zeroizing::new(pms.to_vec())
            }
            KeyExchangeAlg::Dhe => {
                let public = decode_client_key_exchange_dhe(body)?;
                let mut dhm = self.dhm.take().ok_or_else(|| {
                    TlsError::HandshakeFailed("no DH exchange in progress".into())
                })?;
                dhm.read_public(&public)?;
                dhm.calc_secret()?
            }
        };

        self.master_secret = derive_master_secret(
            self.version,
            &premaster,
            &self.client_random,
            &self.server_random,
        )?;
        drop(premaster);
        log_master_secret(&self.config, &self.client_random, &*self.master_secret);
        self.derive_keys()?;

        self.transcript.update(&msg);
        self.state = ServerState::CertificateVerify;
        Ok(Step::Continue)
    }

    fn read_certificate_verify(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        let Some(leaf) = self.client_certs.first() else {
            self.state = ServerState::ClientChangeCipherSpec;
            return Ok(Step::Continue);
        };
        let Some(msg) = self.inbox.take(io)? else {
            return Ok(Step::NeedInput);
        };
        let msg = expect_handshake(msg, HandshakeType::CertificateVerify, "CertificateVerify")?;
        let (_, body) = parse_handshake_header(&msg)?;
        let signature = decode_certificate_verify(body)?;
        let hash = compute_verify_hash(self.version, &*self.master_secret, &self.transcript);
        leaf.public_key
            .verify_pkcs1(None, &hash, &signature)
            .map_err(|_| TlsError::CertificateVerifyFailed)?;
        self.transcript.update(&msg);
        self.state = ServerState::ClientChangeCipherSpec;
        Ok(Step::Continue)
    }

    fn read_change_cipher_spec(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        let Some(msg) = self.inbox.take(io)? else {
            return Ok(Step::NeedInput);
        };
        expect_change_cipher_spec(msg, "ClientChangeCipherSpec")?;
        let protection = self
            .pending_read
            .take()
            .ok_or_else(|| TlsError::HandshakeFailed("read keys not derived".into()))?;
        io.activate_read(protection);
        self.state = ServerState::ClientFinished;
        Ok(Step::Continue)
    }

    fn read_finished(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        let Some(msg) = self.inbox.take(io)? else {
            return Ok(Step::NeedInput);
        };
        let msg = expect_handshake(msg, HandshakeType::Finished, "ClientFinished")?;
        let (_, body) = parse_handshake_header(&msg)?;
        verify_finished(
            self.version,
            &*self.master_secret,
            &self.transcript,
            TlsRole::Client,
            body,
        )?;
        self.transcript.update(&msg);
        if self.resumed {
            self.state = ServerState::HandshakeOver;
        } else {
            self.state = ServerState::ServerChangeCipherSpec;
        }
        Ok(Step::Continue)
    }

    fn write_change_cipher_spec(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        let protection = self
            .pending_write
            .take()
            .ok_or_else(|| TlsError::HandshakeFailed("write keys not derived".into()))?;
        io.send_change_cipher_spec()?;
        io.activate_write(protection);
        self.state = ServerState::ServerFinished;
        Ok(Step::Output)
    }

    fn write_finished(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        let verify_data = compute_finished(
            self.version,
            &*self.master_secret,
            &self.transcript,
            TlsRole::Server,
        )?;
        let msg = encode_finished(&verify_data);
        if self.resumed {
            self.state = ServerState::ClientChangeCipherSpec;
        } else {
            self.store_session()?;
            self.state = ServerState::HandshakeOver;
        }
        self.send(io, &msg)
    }

    fn store_session(&self) -> Result<(), TlsError> {
        let Some(cache) = &self.config.session_cache else {
            return Ok(());
        };
        let session = self.session()?;
        match cache.lock() {
            Ok(mut guard) => guard.put(&self.session_id, session),
            Err(_) => warn!("server: session cache lock poisoned; session not stored"),
        }
        Ok(())
    }

    fn derive_keys(&mut self) -> Result<(), TlsError> {
        let (write, read) = derive_protections(
            TlsRole::Server,
            self.version,
            &self.params()?,
            &*self.master_secret,
            &self.client_random,
            &self.server_random,
        )?;
        self.pending_write = Some(write);
        self.pending_read = Some(read);
        Ok(())
    }
}

/// Highest version both sides support, given the client's offer.
pub fn negotiate_version(config: &TlsConfig, offered: [u8; 2]) -> Result<TlsVersion, TlsError> {
    if offered[0] != TlsVersion::MAJOR {
        return Err(TlsError::UnsupportedVersion);
    }
    let client_max = if offered[1] >= 1 {
        TlsVersion::Tls10
    } else {
        TlsVersion::Ssl3
    };
    let version = client_max.min(config.max_version);
    if version < config.min_version {
        return Err(TlsError::UnsupportedVersion);
    }
    Ok(version)
}

/// First suite in the server's list that the client offered. DHE suites
/// are skipped when no DH group is configured.
pub fn select_cipher_suite(
    config: &TlsConfig,
    offered: &[CipherSuite],
) -> Result<CipherSuite, TlsError> {
    config
        .cipher_suites
        .iter()
        .copied()
        .filter(|s| offered.contains(s))
        .find(|s| match CipherSuiteParams::from_suite(*s) {
            Ok(p) => p.kx_alg != KeyExchangeAlg::Dhe || config.dh_params.is_some(),
            Err(_) => false,
        })
        .ok_or(TlsError::NoSharedCipherSuite)
}

/// Decrypt an RSA-encrypted premaster without revealing whether it was
/// well formed.
///
/// A random 48-byte premaster is drawn up front. It replaces the decrypted
/// value when the padding is bad, the length is not 48 or the leading
/// version bytes differ from `client_version`, and the choice is made in
/// constant time. A bad premaster then only shows up as a Finished
/// mismatch.
pub fn decode_premaster(
    key: &RsaPrivateKey,
    encrypted: &[u8],
    client_version: [u8; 2],
    rng: &dyn RandomSource,
) -> Result<Zeroizing<[u8; 48]>, TlsError> {
    let mut fake = Zeroizing::new([0u8; 48]);
    rng.fill(&mut fake[..])?;

    let mut premaster = Zeroizing::new([0u8; 48]);
    let decrypted = key.decrypt_pkcs1_fixed(rng, encrypted, &mut premaster[..]);
    let version_ok =
        premaster[0].ct_eq(&client_version[0]) & premaster[1].ct_eq(&client_version[1]);
    ct_select_into(&mut premaster[..], &fake[..], !(decrypted & version_ok));
    Ok(premaster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DhParams;
    use embtls_crypto::dhm::DhmGroup;
    use embtls_crypto::OsRandom;

    const SMALL_KEY: &str =
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../testdata/small.key"));

    fn small_key() -> RsaPrivateKey {
        embtls_pki::parse_rsa_private_key(SMALL_KEY.as_bytes()).unwrap()
    }

    #[test]
    fn test_negotiate_version() {
        let config = TlsConfig::builder().build();
        assert_eq!(negotiate_version(&config, [3, 1]).unwrap(), TlsVersion::Tls10);
        assert_eq!(negotiate_version(&config, [3, 3]).unwrap(), TlsVersion::Tls10);
        assert_eq!(negotiate_version(&config, [3, 0]).unwrap(), TlsVersion::Ssl3);
        assert!(matches!(
            negotiate_version(&config, [2, 0]),
            Err(TlsError::UnsupportedVersion)
        ));

        let ssl3_only = TlsConfig::builder().max_version(TlsVersion::Ssl3).build();
        assert_eq!(negotiate_version(&ssl3_only, [3, 1]).unwrap(), TlsVersion::Ssl3);

        let tls_only = TlsConfig::builder().min_version(TlsVersion::Tls10).build();
        assert!(matches!(
            negotiate_version(&tls_only, [3, 0]),
            Err(TlsError::UnsupportedVersion)
        ));
    }

    #[test]
    fn test_select_cipher_suite_server_preference() {
        let config = TlsConfig::builder()
            .cipher_suites(&[
                CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA,
                CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA,
            ])
            .build();
        let offered = [
            CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA,
            CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA,
        ];
        assert_eq!(
            select_cipher_suite(&config, &offered).unwrap(),
            CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA
        );
        assert!(matches!(
            select_cipher_suite(&config, &[CipherSuite::TLS_RSA_WITH_RC4_128_MD5]),
            Err(TlsError::NoSharedCipherSuite)
        ));
    }

    #[test]
    fn test_select_cipher_suite_needs_dh_params_for_dhe() {
        let offered = [
            CipherSuite::TLS_DHE_RSA_WITH_AES_256_CBC_SHA,
            CipherSuite::TLS_RSA_WITH_RC4_128_SHA,
        ];
        let without = TlsConfig::builder().build();
        assert_eq!(
            select_cipher_suite(&without, &offered).unwrap(),
            CipherSuite::TLS_RSA_WITH_RC4_128_SHA
        );
        let with = TlsConfig::builder()
            .dh_params(DhParams::from_group(DhmGroup::Rfc2409_1024).unwrap())
            .build();
        assert_eq!(
            select_cipher_suite(&with, &offered).unwrap(),
            CipherSuite::TLS_DHE_RSA_WITH_AES_256_CBC_SHA
        );
    }

    #[test]
    fn test_decode_premaster_valid() {
        let key = small_key();
        let mut pms = [0x77u8; 48];
        pms[..2].copy_from_slice(&[3, 1]);
        let ct = key.public_key().encrypt_pkcs1(&OsRandom, &pms).unwrap();
        let out = decode_premaster(&key, &ct, [3, 1], &OsRandom).unwrap();
        assert_eq!(*out, pms);
    }

    #[test]
    fn test_decode_premaster_never_fails_early() {
        let key = small_key();
        let rng = OsRandom;
        let k = key.len();

        for i in 0..1000usize {
            let (ct, plain): (Vec<u8>, Option<Vec<u8>>) = match i % 4 {
                // bytes that are not a PKCS#1 block at all (kept below N)
                0 => {
                    let mut ct = vec![0u8; k];
                    rng.fill(&mut ct[1..]).unwrap();
                    (ct, None)
                }
                // valid padding, wrong length
                1 => {
                    let len = [0usize, 1, 47, 49, 64][i % 5];
                    let mut msg = vec![0x11u8; len];
                    if len >= 2 {
                        msg[..2].copy_from_slice(&[3, 1]);
                    }
                    (key.public_key().encrypt_pkcs1(&rng, &msg).unwrap(), Some(msg))
                }
                // valid padding and length, wrong version bytes
                2 => {
                    let mut msg = vec![0x22u8; 48];
                    msg[..2].copy_from_slice(&[3, (i % 3) as u8 * 2]);
                    msg[0] ^= (i % 2) as u8;
                    (key.public_key().encrypt_pkcs1(&rng, &msg).unwrap(), Some(msg))
                }
                // wrong ciphertext length
                _ => (vec![0x5a; i % k], None),
            };

            let out = decode_premaster(&key, &ct, [3, 1], &rng)
                .unwrap_or_else(|e| panic!("case {i} failed early: {e}"));
            assert_eq!(out.len(), 48);
            if let Some(plain) = plain {
                assert_ne!(out.as_slice(), plain.as_slice(), "case {i} leaked the plaintext");
            }
        }
    }

    #[test]
    fn test_fake_premasters_are_fresh() {
        let key = small_key();
        let ct = vec![0u8; key.len()];
        let a = decode_premaster(&key, &ct, [3, 1], &OsRandom).unwrap();
        let b = decode_premaster(&key, &ct, [3, 1], &OsRandom).unwrap();
        assert_ne!(*a, *b);
    }
}

//! Client handshake state machine.

use std::sync::Arc;

use super::codec::{
    decode_certificate, decode_certificate_request, decode_server_hello,
    decode_server_hello_done, decode_server_key_exchange, encode_certificate,
    encode_certificate_verify, encode_client_hello, encode_client_key_exchange_dhe,
    encode_client_key_exchange_rsa, encode_finished, parse_handshake_header, ske_signed_hash,
    ClientHello,
};
use super::{
    derive_protections, expect_change_cipher_spec, expect_handshake, hello_random,
    verify_finished, HandshakeIo, HandshakeSummary, HandshakeType, Inbox, Step,
};
use crate::alert::{Alert, AlertDescription};
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
use embtls_pki::x509::check_chain;
use embtls_pki::Certificate;
use embtls_types::{TlsError, VerifyFlags};
use embtls_utils::asn1::Asn1Time;
use log::{debug, warn};
use zeroize::Zeroizing;

/// Client handshake states, in protocol order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    HelloRequest,
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

/// Client side of one handshake.
pub struct ClientHandshake {
    config: Arc<TlsConfig>,
    state: ClientState,
    inbox: Inbox,
    transcript: TranscriptHash,
    version: TlsVersion,
    client_random: [u8; 32],
    server_random: [u8; 32],
    session_id: Vec<u8>,
    params: Option<CipherSuiteParams>,
    /// Session offered in the ClientHello, if any.
    offered: Option<TlsSession>,
    resumed: bool,
    server_certs: Vec<Certificate>,
    verify_result: Option<VerifyFlags>,
    dhm: Option<DhmContext>,
    cert_requested: bool,
    sent_certificate: bool,
    master_secret: Zeroizing<[u8; MASTER_SECRET_LEN]>,
    pending_write: Option<RecordProtection>,
    pending_read: Option<RecordProtection>,
}

impl ClientHandshake {
    pub fn new(config: Arc<TlsConfig>) -> Self {
        let version = config.max_version;
        Self {
            config,
            state: ClientState::HelloRequest,
            inbox: Inbox::default(),
            transcript: TranscriptHash::new(),
            version,
            client_random: [0; 32],
            server_random: [0; 32],
            session_id: Vec::new(),
            params: None,
            offered: None,
            resumed: false,
            server_certs: Vec::new(),
            verify_result: None,
            dhm: None,
            cert_requested: false,
            sent_certificate: false,
            master_secret: Zeroizing::new([0; MASTER_SECRET_LEN]),
            pending_write: None,
            pending_read: None,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    /// Advance by one state.
    pub fn step(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        let state = self.state;
        let step = match state {
            ClientState::HelloRequest => {
                self.config.validate()?;
                self.state = ClientState::ClientHello;
                Step::Continue
            }
            ClientState::ClientHello => self.write_client_hello(io)?,
            ClientState::ServerHello => self.read_server_hello(io)?,
            ClientState::ServerCertificate => self.read_server_certificate(io)?,
            ClientState::ServerKeyExchange => self.read_server_key_exchange(io)?,
            ClientState::CertificateRequest => self.read_certificate_request(io)?,
            ClientState::ServerHelloDone => self.read_server_hello_done(io)?,
            ClientState::ClientCertificate => self.write_client_certificate(io)?,
            ClientState::ClientKeyExchange => self.write_client_key_exchange(io)?,
            ClientState::CertificateVerify => self.write_certificate_verify(io)?,
            ClientState::ClientChangeCipherSpec => self.write_change_cipher_spec(io)?,
            ClientState::ClientFinished => self.write_finished(io)?,
            ClientState::ServerChangeCipherSpec => self.read_change_cipher_spec(io)?,
            ClientState::ServerFinished => self.read_finished(io)?,
            ClientState::HandshakeOver => return Ok(Step::Done),
        };
        if self.state != state {
            debug!("client: {state:?} -> {:?}", self.state);
        }
        Ok(step)
    }

    /// Session and peer details; only meaningful once `step()` returned
    /// `Done`.
    pub fn summary(&self) -> Result<HandshakeSummary, TlsError> {
        if self.state != ClientState::HandshakeOver {
            return Err(TlsError::HandshakeFailed("handshake not complete".into()));
        }
        let suite = self.suite()?;
        let peer_certificates = self.server_certs.clone();
        Ok(HandshakeSummary {
            version: self.version,
            cipher_suite: suite,
            session: TlsSession {
                id: self.session_id.clone(),
                cipher_suite: suite,
                version: self.version,
                master_secret: *self.master_secret,
                created_at: match &self.offered {
                    Some(s) if self.resumed => s.created_at,
                    _ => unix_now(),
                },
                peer_certificates: peer_certificates.iter().map(|c| c.raw.clone()).collect(),
            },
            resumed: self.resumed,
            peer_certificates,
            verify_result: self.verify_result,
            server_name: self.config.server_name.clone(),
        })
    }

    fn suite(&self) -> Result<CipherSuite, TlsError> {
        self.params
            .map(|p| p.suite)
            .ok_or_else(|| TlsError::HandshakeFailed("no cipher suite negotiated".into()))
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

    fn write_client_hello(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        let now = unix_now();
        self.client_random = hello_random(self.config.rng.as_ref(), now)?;
        self.offered = self
            .config
            .resumption_session
            .as_ref()
            .filter(|s| s.is_resumable(self.config.session_timeout, now))
            .cloned();

        let hello = ClientHello {
            version: self.config.max_version.wire(),
            random: self.client_random,
            session_id: self.offered.as_ref().map(|s| s.id.clone()).unwrap_or_default(),
            cipher_suites: self.config.cipher_suites.clone(),
            compression_methods: vec![0],
            server_name: self.config.server_name.clone(),
        };
        debug!(
            "client: offering {} suites, max {}, resume={}",
            hello.cipher_suites.len(),
            self.config.max_version,
            self.offered.is_some()
        );
        let msg = encode_client_hello(&hello);
        self.state = ClientState::ServerHello;
        self.send(io, &msg)
    }

    fn read_server_hello(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        let Some(msg) = self.inbox.take(io)? else {
            return Ok(Step::NeedInput);
        };
        let msg = expect_handshake(msg, HandshakeType::ServerHello, "ServerHello")?;
        let (_, body) = parse_handshake_header(&msg)?;
        let sh = decode_server_hello(body)?;

        if sh.version < self.config.min_version || sh.version > self.config.max_version {
            return Err(TlsError::UnsupportedVersion);
        }
        if !self.config.cipher_suites.contains(&sh.cipher_suite) {
            return Err(TlsError::BadHandshakeMessage {
                state: "ServerHello",
                reason: format!("server chose {} which was not offered", sh.cipher_suite),
            });
        }
        if sh.compression_method != 0 {
            return Err(TlsError::BadHandshakeMessage {
                state: "ServerHello",
                reason: format!("compression method {}", sh.compression_method),
            });
        }
        self.transcript.update(&msg);
        io.set_version(sh.version);
        self.version = sh.version;
        self.server_random = sh.random;
        self.params = Some(CipherSuiteParams::from_suite(sh.cipher_suite)?);

        let resume = self.offered.as_ref().is_some_and(|s| {
            !sh.session_id.is_empty()
                && sh.session_id == s.id
                && sh.cipher_suite == s.cipher_suite
                && sh.version == s.version
        });
        self.session_id = sh.session_id;
        debug!(
            "client: server chose {} {} session_id_len={}",
            sh.version,
            sh.cipher_suite,
            self.session_id.len()
        );

        if !resume {
            self.state = ClientState::ServerCertificate;
            return Ok(Step::Continue);
        }
        if let Some(s) = &self.offered {
            self.master_secret.copy_from_slice(&s.master_secret);
            self.server_certs = s
                .peer_certificates
                .iter()
                .filter_map(|der| Certificate::from_der(der).ok())
                .collect();
        }
        self.resumed = true;
        self.derive_keys()?;
        self.state = ClientState::ServerChangeCipherSpec;
        Ok(Step::Continue)
    }

    fn read_server_certificate(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        let Some(msg) = self.inbox.take(io)? else {
            return Ok(Step::NeedInput);
        };
        let msg = expect_handshake(msg, HandshakeType::Certificate, "ServerCertificate")?;
        let (_, body) = parse_handshake_header(&msg)?;
        let chain = decode_certificate(body)?;
        if chain.is_empty() {
            return Err(TlsError::BadHandshakeMessage {
                state: "ServerCertificate",
                reason: "empty certificate list".into(),
            });
        }
        let certs = chain
            .iter()
            .map(|der| Certificate::from_der(der))
            .collect::<Result<Vec<_>, _>>()?;

        if self.config.auth_mode != AuthMode::None {
            let flags = check_chain(
                &certs,
                &self.config.trusted_certs,
                self.config.server_name.as_deref(),
                &Asn1Time::now(),
            );
            self.verify_result = Some(flags);
            if !flags.is_empty() {
                if self.config.auth_mode == AuthMode::Required {
                    return Err(TlsError::PeerCertificate(flags));
                }
                warn!("client: server certificate not verified: {flags}");
            }
        }
        debug!("client: server presented {} certificate(s)", certs.len());
        self.server_certs = certs;
        self.transcript.update(&msg);
        self.state = ClientState::ServerKeyExchange;
        Ok(Step::Continue)
    }

    fn read_server_key_exchange(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        if self.params()?.kx_alg != KeyExchangeAlg::Dhe {
            self.state = ClientState::CertificateRequest;
            return Ok(Step::Continue);
        }
        let Some(msg) = self.inbox.take(io)? else {
            return Ok(Step::NeedInput);
        };
        let msg = expect_handshake(msg, HandshakeType::ServerKeyExchange, "ServerKeyExchange")?;
        let (_, body) = parse_handshake_header(&msg)?;
        let ske = decode_server_key_exchange(body)?;

        let (dhm, used) = DhmContext::read_params(&ske.params)?;
        if used != ske.params.len() {
            return Err(TlsError::BadHandshakeMessage {
                state: "ServerKeyExchange",
                reason: "trailing bytes after DH parameters".into(),
            });
        }
        let hash = ske_signed_hash(&self.client_random, &self.server_random, &ske.params);
        let leaf = self.leaf()?;
        leaf.public_key
            .verify_pkcs1(None, &hash, &ske.signature)
            .map_err(|_| TlsError::HandshakeFailed("ServerKeyExchange signature invalid".into()))?;
        debug!("client: DH group of {} bits", dhm.len() * 8);

        self.dhm = Some(dhm);
        self.transcript.update(&msg);
        self.state = ClientState::CertificateRequest;
        Ok(Step::Continue)
    }

    fn read_certificate_request(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        let Some(msg) = self.inbox.take(io)? else {
            return Ok(Step::NeedInput);
        };
        if !msg.is_handshake(HandshakeType::CertificateRequest) {
            self.inbox.hold(msg);
            self.state = ClientState::ServerHelloDone;
            return Ok(Step::Continue);
        }
        let msg = expect_handshake(msg, HandshakeType::CertificateRequest, "CertificateRequest")?;
        let (_, body) = parse_handshake_header(&msg)?;
        let req = decode_certificate_request(body)?;
        debug!(
            "client: certificate requested, {} acceptable CA(s)",
            req.ca_names.len()
        );
        self.cert_requested = true;
        self.transcript.update(&msg);
        self.state = ClientState::ServerHelloDone;
        Ok(Step::Continue)
    }

    fn read_server_hello_done(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        let Some(msg) = self.inbox.take(io)? else {
            return Ok(Step::NeedInput);
        };
        let msg = expect_handshake(msg, HandshakeType::ServerHelloDone, "ServerHelloDone")?;
        let (_, body) = parse_handshake_header(&msg)?;
        decode_server_hello_done(body)?;
        self.transcript.update(&msg);
        self.state = ClientState::ClientCertificate;
        Ok(Step::Continue)
    }

    fn write_client_certificate(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        self.state = ClientState::ClientKeyExchange;
        if !self.cert_requested {
            return Ok(Step::Continue);
        }
        let chain = &self.config.certificate_chain;
        if !chain.is_empty() && self.config.private_key.is_some() {
            let msg = encode_certificate(chain);
            self.sent_certificate = true;
            return self.send(io, &msg);
        }
        debug!("client: no certificate to send");
        match self.version {
            TlsVersion::Ssl3 => {
                io.send_alert(Alert::warning(AlertDescription::NoCertificate))?;
                Ok(Step::Output)
            }
            TlsVersion::Tls10 => {
                let msg = encode_certificate(&[]);
                self.send(io, &msg)
            }
        }
    }

    fn write_client_key_exchange(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        let rng = self.config.rng.clone();
        let (msg, premaster) = match self.params()?.kx_alg {
            KeyExchangeAlg::Rsa => {
                // The version bytes are the highest offered, so the server
                // can detect a rollback of the negotiated version.
                let mut premaster = Zeroizing::new(vec![0u8; 48]);
                premaster[..2].copy_from_slice(&self.config.max_version.wire());
                rng.fill(&mut premaster[2..])?;
                let encrypted = self.leaf()?.public_key.encrypt_pkcs1(rng.as_ref(), &premaster)?;
                (
                    encode_client_key_exchange_rsa(self.version, &encrypted),
                    premaster,
                )
            }
            KeyExchangeAlg::Dhe => {
                let dhm = self.dhm.as_mut().ok_or_else(|| {
                    TlsError::HandshakeFailed("no DH parameters received".into())
                })?;
                let public = dhm.make_public(rng.as_ref())?;
                let secret = dhm.calc_secret()?;
                (encode_client_key_exchange_dhe(&public), secret)
            }
        };
        self.dhm = None;

        let master = derive_master_secret(
            self.version,
            &premaster,
            &self.client_random,
            &self.server_random,
        )?;
        drop(premaster);
        self.master_secret = master;
        log_master_secret(&self.config, &self.client_random, &*self.master_secret);
        self.derive_keys()?;

        self.state = ClientState::CertificateVerify;
        self.send(io, &msg)
    }

    fn write_certificate_verify(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        self.state = ClientState::ClientChangeCipherSpec;
        if !self.sent_certificate {
            return Ok(Step::Continue);
        }
        let key = self
            .config
            .private_key
            .clone()
            .ok_or_else(|| TlsError::Config("client certificate without a private key".into()))?;
        let hash = compute_verify_hash(self.version, &*self.master_secret, &self.transcript);
        let signature = key.sign_pkcs1(self.config.rng.as_ref(), None, &hash)?;
        let msg = encode_certificate_verify(&signature);
        self.send(io, &msg)
    }

    fn write_change_cipher_spec(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        let protection = self
            .pending_write
            .take()
            .ok_or_else(|| TlsError::HandshakeFailed("write keys not derived".into()))?;
        io.send_change_cipher_spec()?;
        io.activate_write(protection);
        self.state = ClientState::ClientFinished;
        Ok(Step::Output)
    }

    fn write_finished(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        let verify_data = compute_finished(
            self.version,
            &*self.master_secret,
            &self.transcript,
            TlsRole::Client,
        )?;
        let msg = encode_finished(&verify_data);
        self.state = if self.resumed {
            ClientState::HandshakeOver
        } else {
            ClientState::ServerChangeCipherSpec
        };
        self.send(io, &msg)
    }

    fn read_change_cipher_spec(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        let Some(msg) = self.inbox.take(io)? else {
            return Ok(Step::NeedInput);
        };
        expect_change_cipher_spec(msg, "ServerChangeCipherSpec")?;
        let protection = self
            .pending_read
            .take()
            .ok_or_else(|| TlsError::HandshakeFailed("read keys not derived".into()))?;
        io.activate_read(protection);
        self.state = ClientState::ServerFinished;
        Ok(Step::Continue)
    }

    fn read_finished(&mut self, io: &mut dyn HandshakeIo) -> Result<Step, TlsError> {
        let Some(msg) = self.inbox.take(io)? else {
            return Ok(Step::NeedInput);
        };
        let msg = expect_handshake(msg, HandshakeType::Finished, "ServerFinished")?;
        let (_, body) = parse_handshake_header(&msg)?;
        verify_finished(
            self.version,
            &*self.master_secret,
            &self.transcript,
            TlsRole::Server,
            body,
        )?;
        self.transcript.update(&msg);
        self.state = if self.resumed {
            ClientState::ClientChangeCipherSpec
        } else {
            ClientState::HandshakeOver
        };
        Ok(Step::Continue)
    }

    fn leaf(&self) -> Result<&Certificate, TlsError> {
        self.server_certs
            .first()
            .ok_or_else(|| TlsError::HandshakeFailed("no server certificate".into()))
    }

    fn derive_keys(&mut self) -> Result<(), TlsError> {
        let (write, read) = derive_protections(
            TlsRole::Client,
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

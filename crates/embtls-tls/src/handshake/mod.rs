//! Handshake protocol: message codec and the client and server state
//! machines.
//!
//! Each state machine is an explicit state enum advanced by `step()`. A step
//! either makes progress, reports that it needs another message from the
//! peer, or reports that the handshake is over. The caller owns the transport
//! and supplies records through [`HandshakeIo`], so a non-blocking caller
//! simply calls `step()` again once more input has arrived.

pub mod client;
pub mod codec;
pub mod server;

use crate::alert::Alert;
use crate::crypt::key_schedule::{compute_finished, derive_key_block};
use crate::crypt::transcript::TranscriptHash;
use crate::crypt::CipherSuiteParams;
use crate::record::RecordProtection;
use crate::session::TlsSession;
use crate::{CipherSuite, TlsRole, TlsVersion};
use embtls_crypto::RandomSource;
use embtls_pki::Certificate;
use embtls_types::{TlsError, VerifyFlags};
use subtle::ConstantTimeEq;

pub use client::{ClientHandshake, ClientState};
pub use server::{ServerHandshake, ServerState};

/// Handshake message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandshakeType {
    HelloRequest = 0,
    ClientHello = 1,
    ServerHello = 2,
    Certificate = 11,
    ServerKeyExchange = 12,
    CertificateRequest = 13,
    ServerHelloDone = 14,
    CertificateVerify = 15,
    ClientKeyExchange = 16,
    Finished = 20,
}

impl HandshakeType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(HandshakeType::HelloRequest),
            1 => Some(HandshakeType::ClientHello),
            2 => Some(HandshakeType::ServerHello),
            11 => Some(HandshakeType::Certificate),
            12 => Some(HandshakeType::ServerKeyExchange),
            13 => Some(HandshakeType::CertificateRequest),
            14 => Some(HandshakeType::ServerHelloDone),
            15 => Some(HandshakeType::CertificateVerify),
            16 => Some(HandshakeType::ClientKeyExchange),
            20 => Some(HandshakeType::Finished),
            _ => None,
        }
    }
}

/// Outcome of one `step()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The state advanced without sending anything.
    Continue,
    /// The state advanced and queued records for the peer.
    Output,
    /// No message from the peer is available yet; call again later.
    NeedInput,
    /// The handshake is complete.
    Done,
}

/// One unit of handshake input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A complete handshake message, header included.
    Handshake(Vec<u8>),
    ChangeCipherSpec,
    /// An SSLv2-framed CLIENT-HELLO, from the message type byte on.
    V2ClientHello(Vec<u8>),
}

impl Incoming {
    fn describe(&self) -> String {
        match self {
            Incoming::Handshake(msg) => match msg.first().copied().and_then(HandshakeType::from_u8)
            {
                Some(t) => format!("{t:?}"),
                None => "unknown handshake message".into(),
            },
            Incoming::ChangeCipherSpec => "ChangeCipherSpec".into(),
            Incoming::V2ClientHello(_) => "SSLv2 ClientHello".into(),
        }
    }

    fn is_handshake(&self, msg_type: HandshakeType) -> bool {
        matches!(self, Incoming::Handshake(m) if m.first() == Some(&(msg_type as u8)))
    }
}

/// The record channel a state machine drives.
pub trait HandshakeIo {
    /// The next handshake message or ChangeCipherSpec, or `None` when the
    /// transport has nothing more right now. Warning alerts are consumed
    /// here; fatal alerts surface as errors.
    fn next_message(&mut self) -> Result<Option<Incoming>, TlsError>;
    /// Queue one complete handshake message.
    fn send_handshake(&mut self, msg: &[u8]) -> Result<(), TlsError>;
    fn send_change_cipher_spec(&mut self) -> Result<(), TlsError>;
    fn send_alert(&mut self, alert: Alert) -> Result<(), TlsError>;
    /// Version stamped on outgoing records from now on.
    fn set_version(&mut self, version: TlsVersion);
    fn activate_write(&mut self, protection: RecordProtection);
    fn activate_read(&mut self, protection: RecordProtection);
}

/// What a finished handshake leaves behind for the connection.
#[derive(Debug, Clone)]
pub struct HandshakeSummary {
    pub version: TlsVersion,
    pub cipher_suite: CipherSuite,
    pub session: TlsSession,
    pub resumed: bool,
    /// Certificates the peer presented, leaf first.
    pub peer_certificates: Vec<Certificate>,
    /// `None` when the peer's chain was not checked.
    pub verify_result: Option<VerifyFlags>,
    /// SNI host name: the one sent (client) or received (server).
    pub server_name: Option<String>,
}

/// Input queue with room to put one message back, for the optional states
/// that have to look at a message before deciding it is not theirs.
#[derive(Default)]
pub(crate) struct Inbox {
    held: Option<Incoming>,
}

impl Inbox {
    pub(crate) fn take(&mut self, io: &mut dyn HandshakeIo) -> Result<Option<Incoming>, TlsError> {
        match self.held.take() {
            Some(msg) => Ok(Some(msg)),
            None => io.next_message(),
        }
    }

    pub(crate) fn hold(&mut self, msg: Incoming) {
        self.held = Some(msg);
    }
}

/// Unwrap a handshake message of the expected type, or fail with an
/// unexpected-message error naming `state`.
pub(crate) fn expect_handshake(
    msg: Incoming,
    want: HandshakeType,
    state: &'static str,
) -> Result<Vec<u8>, TlsError> {
    if msg.is_handshake(want) {
        if let Incoming::Handshake(bytes) = msg {
            return Ok(bytes);
        }
    }
    Err(TlsError::UnexpectedMessage(format!(
        "{} in state {state}, expected {want:?}",
        msg.describe()
    )))
}

pub(crate) fn expect_change_cipher_spec(
    msg: Incoming,
    state: &'static str,
) -> Result<(), TlsError> {
    match msg {
        Incoming::ChangeCipherSpec => Ok(()),
        other => Err(TlsError::UnexpectedMessage(format!(
            "{} in state {state}, expected ChangeCipherSpec",
            other.describe()
        ))),
    }
}

/// Hello random: four bytes of Unix time, then 28 random bytes.
pub(crate) fn hello_random(rng: &dyn RandomSource, now: u64) -> Result<[u8; 32], TlsError> {
    let mut random = [0u8; 32];
    random[..4].copy_from_slice(&(now as u32).to_be_bytes());
    rng.fill(&mut random[4..])?;
    Ok(random)
}

/// Derive both record protections from the master secret; returns
/// `(write, read)` for `role`.
pub(crate) fn derive_protections(
    role: TlsRole,
    version: TlsVersion,
    params: &CipherSuiteParams,
    master_secret: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> Result<(RecordProtection, RecordProtection), TlsError> {
    derive_key_block(version, params, master_secret, client_random, server_random)?
        .into_protections(role, version, params)
}

/// Check a received Finished body against the transcript so far.
pub(crate) fn verify_finished(
    version: TlsVersion,
    master_secret: &[u8],
    transcript: &TranscriptHash,
    sender: TlsRole,
    received: &[u8],
) -> Result<(), TlsError> {
    let expected = compute_finished(version, master_secret, transcript, sender)?;
    let received = codec::decode_finished(received, expected.len())?;
    if bool::from(expected.as_slice().ct_eq(received)) {
        Ok(())
    } else {
        Err(TlsError::FinishedMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_type_codes() {
        for t in [
            HandshakeType::HelloRequest,
            HandshakeType::ClientHello,
            HandshakeType::ServerHello,
            HandshakeType::Certificate,
            HandshakeType::ServerKeyExchange,
            HandshakeType::CertificateRequest,
            HandshakeType::ServerHelloDone,
            HandshakeType::CertificateVerify,
            HandshakeType::ClientKeyExchange,
            HandshakeType::Finished,
        ] {
            assert_eq!(HandshakeType::from_u8(t as u8), Some(t));
        }
        assert_eq!(HandshakeType::from_u8(4), None);
        assert_eq!(HandshakeType::from_u8(255), None);
    }

    #[test]
    fn test_expect_handshake() {
        let msg = Incoming::Handshake(vec![14, 0, 0, 0]);
        assert_eq!(
            expect_handshake(msg, HandshakeType::ServerHelloDone, "ServerHelloDone").unwrap(),
            vec![14, 0, 0, 0]
        );

        let err = expect_handshake(
            Incoming::Handshake(vec![2, 0, 0, 0]),
            HandshakeType::Finished,
            "ServerFinished",
        )
        .unwrap_err();
        match err {
            TlsError::UnexpectedMessage(text) => {
                assert!(text.contains("ServerHello"));
                assert!(text.contains("ServerFinished"));
            }
            other => panic!("unexpected error {other:?}"),
        }

        assert!(expect_handshake(
            Incoming::ChangeCipherSpec,
            HandshakeType::Finished,
            "ClientFinished"
        )
        .is_err());
        assert!(expect_change_cipher_spec(Incoming::ChangeCipherSpec, "x").is_ok());
        assert!(expect_change_cipher_spec(Incoming::Handshake(vec![20, 0, 0, 0]), "x").is_err());
    }

    #[test]
    fn test_hello_random_timestamp() {
        let r = hello_random(&embtls_crypto::OsRandom, 0x0102_0304).unwrap();
        assert_eq!(&r[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_verify_finished() {
        let mut t = TranscriptHash::new();
        t.update(b"hello messages");
        let master = [0x21u8; 48];
        for version in [TlsVersion::Ssl3, TlsVersion::Tls10] {
            let good = compute_finished(version, &master, &t, TlsRole::Client).unwrap();
            assert!(verify_finished(version, &master, &t, TlsRole::Client, &good).is_ok());
            assert!(matches!(
                verify_finished(version, &master, &t, TlsRole::Server, &good),
                Err(TlsError::FinishedMismatch)
            ));
            assert!(matches!(
                verify_finished(version, &master, &t, TlsRole::Client, &good[1..]),
                Err(TlsError::BadHandshakeMessage { .. })
            ));
        }
    }
}
